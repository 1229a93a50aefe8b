//! Bounded condition waits

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::errors::CaptureError;

/// Poll interval used by every wait in the crate
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Poll `condition` until it yields a value or `timeout` expires.
///
/// The condition is always evaluated at least once, and once more at the
/// deadline. Errors returned by the condition abort the wait immediately.
/// Expiry is reported as [`CaptureError::Timeout`] carrying `action`. A
/// timeout too large to represent as a deadline never expires.
pub async fn until<T, F, Fut>(
    action: &str,
    timeout: Duration,
    interval: Duration,
    mut condition: F,
) -> Result<T, CaptureError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, CaptureError>>,
{
    let deadline = Instant::now().checked_add(timeout);
    let mut attempts = 0u32;

    loop {
        attempts = attempts.saturating_add(1);
        if let Some(value) = condition().await? {
            debug!("{} satisfied after {} attempt(s)", action, attempts);
            return Ok(value);
        }

        let Some(deadline) = deadline else {
            sleep(interval).await;
            continue;
        };
        let now = Instant::now();
        if now >= deadline {
            return Err(CaptureError::Timeout(format!(
                "{} (after {}s)",
                action,
                timeout.as_secs_f64()
            )));
        }
        sleep(interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
#[path = "wait_test.rs"]
mod wait_test;
