//! # pageshot
#![allow(clippy::uninlined_format_args)]
//!
//! Logs into a web application through its login form and captures
//! screenshots of one page for visual verification or regression records.
//!
//! Every run writes into a fresh `{out}/{YYYYMMDD_HHMMSS}/` directory:
//!
//! - `viewport.png` - the visible 1600x900 window
//! - `full.png` - the window resized to the page content (clamped to
//!   1200..=3000 x 800..=12000)
//! - `element_<name>.png` - one per `--selector`
//!
//! ## CLI Usage
//!
//! ```bash
//! # Capture a page after logging in with the default test account
//! pageshot --base http://localhost --page /admin/Attendance_Dashboard.php
//!
//! # Capture two elements as well, waiting for the grid first
//! pageshot --base http://localhost --page /admin/Attendance_Live.php \
//!   --wait "#grid" --selector "#grid" --selector ".card .title"
//!
//! # Watch it happen, keeping the browser open for 10 seconds
//! SELENIUM_HEADLESS=0 pageshot --base http://localhost --page / --pause 10
//!
//! # Use a WebDriver server that is already running
//! pageshot --base http://localhost --page / --webdriver-url http://localhost:4444 --browser firefox
//! ```
//!
//! Credentials default to `SELENIUM_USER_EMAIL` / `SELENIUM_USER_PASSWORD`.
//! When no `--webdriver-url` is given, a driver on the standard port is reused
//! or `chromedriver`/`geckodriver` is started from `PATH`.
//!
//! ## Library Usage
//!
//! ```no_run
//! use pageshot::{Browser, BrowserType, LoginConfig, login};
//!
//! # async fn example() -> Result<(), pageshot::CaptureError> {
//! let browser = Browser::new(BrowserType::Chrome, true, None).await?;
//! let config = LoginConfig::new("http://localhost", "test@test.com", "test");
//! login::login(&browser, &config).await?;
//! let png = browser.screenshot().await?;
//! browser.close().await?;
//! # Ok(())
//! # }
//! ```

/// Screenshot capture and the end-to-end run
pub mod capture;

/// Command line configuration
pub mod cli;

/// Error kinds and exit codes
pub mod errors;

/// Login flow for the target application
pub mod login;

/// Shared value types
pub mod types;

/// Bounded polling waits
pub mod wait;

/// WebDriver browser session
pub mod webdriver;

/// Automatic WebDriver process management
pub mod webdriver_manager;

pub use capture::{CaptureRequest, run};
pub use errors::CaptureError;
pub use login::LoginConfig;
pub use types::{Artifact, ArtifactKind, CaptureReport, OutputFormat, ViewportSize};
pub use webdriver::{Browser, BrowserType};
