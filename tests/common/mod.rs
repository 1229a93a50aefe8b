// Common test utilities: mock application, mock WebDriver and output inspection

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::OnceLock;

include!("mock_app.rs");

mod mock_webdriver;
pub use mock_webdriver::{DriverConfig, MockWebDriver};

static MOCK_APP: OnceLock<String> = OnceLock::new();

/// Start the mock application once per test binary and return its base URL.
///
/// The server gets its own thread and runtime so tests may block on the
/// pageshot process while it serves the browser.
pub fn ensure_mock_app() -> &'static str {
    MOCK_APP.get_or_init(|| {
        let std_listener =
            std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind mock app");
        let addr: SocketAddr = std_listener.local_addr().unwrap();
        std_listener
            .set_nonblocking(true)
            .expect("Failed to set non-blocking");

        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("Failed to create runtime");
            runtime.block_on(async {
                let listener = tokio::net::TcpListener::from_std(std_listener)
                    .expect("Failed to adopt listener");
                let app = create_app().await;
                axum::serve(listener, app).await.expect("Mock app failed");
            });
        });

        format!("http://{}", addr)
    })
}

/// A local port nothing listens on
pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Run the pageshot binary with `args`
pub fn run_pageshot(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pageshot"))
        .args(args)
        .env_remove("SELENIUM_USER_EMAIL")
        .env_remove("SELENIUM_USER_PASSWORD")
        .env_remove("WEBDRIVER_URL")
        .env("SELENIUM_HEADLESS", "1")
        .output()
        .expect("Failed to run pageshot")
}

/// Every PNG below `root`
pub fn png_files(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == "png") {
                found.push(path);
            }
        }
    }
    found.sort();
    found
}

/// The single timestamped run directory below `root`
pub fn run_dir(root: &Path) -> PathBuf {
    let dirs: Vec<PathBuf> = std::fs::read_dir(root)
        .expect("Output root missing")
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    assert_eq!(dirs.len(), 1, "expected one run directory, found {:?}", dirs);
    dirs.into_iter().next().unwrap()
}

pub fn is_png(path: &Path) -> bool {
    std::fs::read(path)
        .map(|bytes| bytes.starts_with(b"\x89PNG\r\n\x1a\n"))
        .unwrap_or(false)
}

/// Is a WebDriver-capable Chrome setup available for browser tests
pub fn chromedriver_available() -> bool {
    Command::new("chromedriver")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
