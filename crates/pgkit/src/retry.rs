//! Retry with exponential backoff for transient connection errors.
//!
//! Only reads go through here. A mutation that may or may not have reached
//! the server is never replayed.

use crate::error::{Error, Result};
use crate::types::RetryConfig;
use log::warn;
use std::thread;

/// Callback trait for retry progress notifications.
pub trait RetryCallback {
    /// Called before sleeping ahead of the next attempt (1-indexed).
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error, delay_secs: f64);
}

/// No-op callback that does nothing.
pub struct NoCallback;

impl RetryCallback for NoCallback {
    fn on_retry(&self, _attempt: u32, _max_attempts: u32, _error: &Error, _delay_secs: f64) {}
}

/// Callback that logs retries as warnings.
pub struct LogCallback;

impl RetryCallback for LogCallback {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error, delay_secs: f64) {
        warn!("Attempt {attempt}/{max_attempts} failed: {error}. Retrying in {delay_secs:.1}s...");
    }
}

/// Execute an operation, retrying retryable errors.
///
/// Returns the first success, the first non-retryable error, or the last
/// error once `max_attempts` is reached.
pub fn with_retry<T, F>(
    config: &RetryConfig,
    callback: Option<&dyn RetryCallback>,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() || attempt + 1 >= max_attempts => return Err(e),
            Err(e) => {
                let delay = config.delay_for_attempt(attempt);
                if let Some(cb) = callback {
                    cb.on_retry(attempt + 1, max_attempts, &e, delay.as_secs_f64());
                }
                thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}
