#![allow(clippy::uninlined_format_args)]

use clap::Parser;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pageshot::cli::Cli;
use pageshot::webdriver_manager::GLOBAL_WEBDRIVER_MANAGER;
use pageshot::{CaptureError, CaptureReport, OutputFormat};

const EXIT_SUCCESS: i32 = 0;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Logs go to stderr so stdout stays clean for the report
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pageshot=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    let cli = Cli::parse();
    let format = cli.format;
    let request = cli.into_request();

    let result = pageshot::run(&request).await;

    // Stop any driver we started, whatever happened
    GLOBAL_WEBDRIVER_MANAGER.stop_all();

    match result {
        Ok(report) => {
            print_report(&report, format);
            std::process::exit(EXIT_SUCCESS);
        }
        Err(err) => {
            print_error(&err, format);
            std::process::exit(err.exit_code());
        }
    }
}

fn print_report(report: &CaptureReport, format: OutputFormat) {
    match format {
        OutputFormat::Simple => println!("Saved screenshots to {}", report.out_dir.display()),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string())
        ),
    }
}

fn print_error(err: &CaptureError, format: OutputFormat) {
    if format == OutputFormat::Json {
        let error_json = json!({
            "error": true,
            "message": err.to_string(),
            "exit_code": err.exit_code()
        });
        println!(
            "{}",
            serde_json::to_string(&error_json).unwrap_or_else(|_| "{}".to_string())
        );
    }
    eprintln!("Error: {}", err);
}
