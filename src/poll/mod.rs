// Bounded polling for long-running remote operations

#[cfg(test)]
mod tests;

use std::time::{Duration, Instant};
use tracing::debug;

use crate::{CopilotError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollSettings {
    #[inline]
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Call `check` until it yields a value, sleeping `interval` between calls
///
/// Errors from `check` end the wait immediately. Running past `timeout`
/// returns [`CopilotError::Timeout`].
#[inline]
pub fn wait_until<T, F>(operation: &str, settings: PollSettings, mut check: F) -> Result<T>
where
    F: FnMut() -> Result<Option<T>>,
{
    let started = Instant::now();
    let mut attempts = 0_u32;

    loop {
        attempts += 1;
        if let Some(value) = check()? {
            debug!("{} finished after {} checks", operation, attempts);
            return Ok(value);
        }

        let elapsed = started.elapsed();
        if elapsed >= settings.timeout {
            return Err(CopilotError::Timeout {
                operation: operation.to_string(),
                seconds: settings.timeout.as_secs(),
            });
        }

        let remaining = settings.timeout.saturating_sub(elapsed);
        std::thread::sleep(settings.interval.min(remaining));
    }
}
