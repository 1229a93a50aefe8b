//! Command line and environment configuration

use std::path::PathBuf;

use clap::Parser;

use crate::capture::CaptureRequest;
use crate::login::{DEFAULT_TIMEOUT_SECS, bool_env};
use crate::types::OutputFormat;
use crate::webdriver::BrowserType;

/// Headless unless this is set to something other than 1/true/yes/on
pub const HEADLESS_ENV: &str = "SELENIUM_HEADLESS";

// Code 2 is also what clap exits with on invalid arguments
const EXIT_CODES_HELP: &str = "\
Exit codes:
  0  Success
  1  Other WebDriver error
  2  Element not found, or invalid arguments
  3  Login rejected
  4  Browser session could not be created
  5  A wait timed out
  6  Output could not be written";

#[derive(Debug, Parser)]
#[command(name = "pageshot")]
#[command(about = "Log into a web application and capture screenshots of a page", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
pub struct Cli {
    /// Base URL (e.g. http://localhost)
    #[arg(long)]
    pub base: String,

    /// Page path starting with / (e.g. /admin/Attendance_Dashboard.php)
    #[arg(long)]
    pub page: String,

    /// Override login URL (default: {base}/HRSmart/index.php)
    #[arg(long)]
    pub login_url: Option<String>,

    /// Login email
    #[arg(long, env = "SELENIUM_USER_EMAIL", default_value = "test@test.com")]
    pub email: String,

    /// Login password
    #[arg(
        long,
        env = "SELENIUM_USER_PASSWORD",
        default_value = "test",
        hide_env_values = true
    )]
    pub password: String,

    /// CSS selector to wait for before screenshots
    #[arg(long, default_value = "body")]
    pub wait: String,

    /// CSS selector to capture as an element screenshot (repeatable)
    #[arg(long = "selector")]
    pub selectors: Vec<String>,

    /// Output directory
    #[arg(long, default_value = "test-results/selenium")]
    pub out: PathBuf,

    /// Seconds for each wait
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Seconds to keep the browser open before exit
    #[arg(long, default_value_t = 0)]
    pub pause: u64,

    /// Browser to use (chrome, chromium or firefox)
    #[arg(long, default_value = "chrome")]
    pub browser: BrowserType,

    /// Use an already running WebDriver server instead of starting one
    #[arg(long, env = "WEBDRIVER_URL")]
    pub webdriver_url: Option<String>,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Simple)]
    pub format: OutputFormat,
}

impl Cli {
    /// Resolve into a capture request, reading the headless flag from the environment
    pub fn into_request(self) -> CaptureRequest {
        let headless = bool_env(HEADLESS_ENV, true);
        self.into_request_with_headless(headless)
    }

    pub fn into_request_with_headless(self, headless: bool) -> CaptureRequest {
        CaptureRequest {
            base_url: self.base,
            page_path: self.page,
            login_url: self.login_url,
            email: self.email,
            password: self.password,
            wait_selector: self.wait,
            selectors: self.selectors,
            out_root: self.out,
            timeout: self.timeout,
            pause: self.pause,
            browser: self.browser,
            headless,
            webdriver_url: self.webdriver_url,
        }
    }
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod cli_test;
