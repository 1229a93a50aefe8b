//! Login flow and readiness waits for the target application

use std::future::Future;
use std::time::Duration;

use fantoccini::Locator;
use tracing::{debug, info};

use crate::errors::CaptureError;
use crate::wait::{self, DEFAULT_POLL_INTERVAL};
use crate::webdriver::Browser;

/// Login page path relative to the base URL
pub const LOGIN_PATH: &str = "/HRSmart/index.php";
/// Present in the URL while the browser is still on the login page
pub const LOGIN_PAGE_MARKER: &str = "index.php";
/// Present in the URL when the application rejected the credentials
pub const LOGIN_ERROR_MARKER: &str = "index.php?err";

pub const EMAIL_FIELD_ID: &str = "email_id";
pub const PASSWORD_FIELD_ID: &str = "password";
pub const SUBMIT_BUTTON_ID: &str = "submitBtn";

/// Seconds each bounded wait may take unless configured otherwise
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Everything a single login needs
#[derive(Debug, Clone)]
pub struct LoginConfig {
    pub base_url: String,
    pub login_url: String,
    pub email: String,
    pub password: String,
    /// Seconds
    pub timeout: u64,
}

impl LoginConfig {
    /// Config for `base_url` with the login URL derived from it
    pub fn new(base_url: &str, email: impl Into<String>, password: impl Into<String>) -> Self {
        let base_url = normalize_base_url(base_url);
        Self {
            login_url: build_login_url(&base_url),
            base_url,
            email: email.into(),
            password: password.into(),
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_login_url(mut self, login_url: impl Into<String>) -> Self {
        self.login_url = login_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Where the browser is in the login flow, judged from its URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    /// Still on the login page
    Pending,
    /// Left the login page
    LoggedIn,
    /// Redirected back to the login page with an error marker
    Rejected,
}

/// Classify the current URL after the login form was submitted.
///
/// Any application page whose URL still contains `index.php` counts as the
/// login page, so such a landing page ends in a timeout rather than success.
pub fn classify_login_url(url: &str) -> LoginState {
    if url.contains(LOGIN_ERROR_MARKER) {
        LoginState::Rejected
    } else if url.contains(LOGIN_PAGE_MARKER) {
        LoginState::Pending
    } else {
        LoginState::LoggedIn
    }
}

/// Trim surrounding whitespace and trailing slashes
pub fn normalize_base_url(raw: &str) -> String {
    raw.trim_start()
        .trim_end_matches(|c: char| c == '/' || c.is_whitespace())
        .to_string()
}

pub fn build_login_url(base_url: &str) -> String {
    format!("{}{}", normalize_base_url(base_url), LOGIN_PATH)
}

/// Read a boolean-like environment flag.
///
/// Unset returns `default`; a set value is true only for `1`, `true`, `yes`
/// or `on` (case-insensitive).
pub fn bool_env(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => parse_bool_flag(&value),
        Err(_) => default,
    }
}

fn parse_bool_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Submit the login form and wait until the application lets us in
pub async fn login(browser: &Browser, config: &LoginConfig) -> Result<(), CaptureError> {
    info!("Logging in as {} at {}", config.email, config.login_url);
    browser.goto(&config.login_url).await?;

    wait::until(
        "waiting for the login form",
        config.timeout(),
        DEFAULT_POLL_INTERVAL,
        move || async move {
            let visible = browser.is_visible(Locator::Id(EMAIL_FIELD_ID)).await?;
            Ok::<_, CaptureError>(visible.then_some(()))
        },
    )
    .await?;

    browser.fill_by_id(EMAIL_FIELD_ID, &config.email).await?;
    browser.fill_by_id(PASSWORD_FIELD_ID, &config.password).await?;
    browser.click_by_id(SUBMIT_BUTTON_ID).await?;

    wait_for_login_redirect(move || browser.current_url(), config.timeout(), DEFAULT_POLL_INTERVAL)
        .await?;
    info!("Logged in");
    Ok(())
}

/// Poll the URL reported by `current_url` until it leaves the login page.
///
/// Fails with [`CaptureError::AuthenticationFailed`] when the URL gains the
/// error marker and with [`CaptureError::Timeout`] when it never changes.
pub async fn wait_for_login_redirect<F, Fut>(
    mut current_url: F,
    timeout: Duration,
    interval: Duration,
) -> Result<(), CaptureError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, CaptureError>>,
{
    let state = wait::until(
        "waiting for the login redirect",
        timeout,
        interval,
        || {
            let url = current_url();
            async move {
                let url = url.await?;
                let state = classify_login_url(&url);
                debug!("Login state {:?} at {}", state, url);
                Ok::<_, CaptureError>((state != LoginState::Pending).then_some(state))
            }
        },
    )
    .await?;

    match state {
        LoginState::Rejected => Err(CaptureError::AuthenticationFailed),
        _ => Ok(()),
    }
}

/// Wait until an element matching `selector` is in the DOM (visible or not)
pub async fn wait_for_selector(
    browser: &Browser,
    selector: &str,
    timeout: Duration,
) -> Result<(), CaptureError> {
    debug!("Waiting for selector {}", selector);
    wait::until(
        &format!("waiting for selector '{selector}'"),
        timeout,
        DEFAULT_POLL_INTERVAL,
        move || async move {
            let found = browser.try_find(Locator::Css(selector)).await?;
            Ok::<_, CaptureError>(found.map(|_| ()))
        },
    )
    .await
}

#[cfg(test)]
#[path = "login_test.rs"]
mod login_test;
