use std::path::PathBuf;

use fantoccini::error::CmdError;

/// Error type for a capture run, with one process exit code per kind
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// WebDriver server unavailable or session refused (exit code 4)
    #[error("Failed to create browser session: {0}")]
    SessionCreation(String),
    /// A bounded wait expired (exit code 5)
    #[error("Operation timed out: {0}")]
    Timeout(String),
    /// The login page redirected back with an error marker (exit code 3)
    #[error("Login failed: invalid credentials or access denied.")]
    AuthenticationFailed,
    /// Screenshot target missing (exit code 2)
    #[error("No elements found matching selector: {0}")]
    ElementNotFound(String),
    /// Output path unwritable (exit code 6)
    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Any other WebDriver command failure (exit code 1)
    #[error("WebDriver command failed: {0}")]
    WebDriver(#[from] CmdError),
    /// Generic error (exit code 1)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CaptureError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CaptureError::ElementNotFound(_) => 2,
            CaptureError::AuthenticationFailed => 3,
            CaptureError::SessionCreation(_) => 4,
            CaptureError::Timeout(_) => 5,
            CaptureError::Io { .. } => 6,
            CaptureError::WebDriver(_) | CaptureError::Other(_) => 1,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CaptureError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
#[path = "errors_test.rs"]
mod errors_test;
