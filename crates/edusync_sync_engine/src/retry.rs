//! Bounded retry loop shared by the remote port and the synchronizer.

use crate::config::RetryConfig;
use std::fmt;
use std::thread;
use tracing::{debug, warn};

/// Why a retried operation gave up.
#[derive(Debug)]
pub(crate) enum RetryError<E> {
    /// The error was not retryable.
    Fatal(E),
    /// Every allowed attempt failed with a retryable error.
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The last error.
        last: E,
    },
}

/// Runs `op` until it succeeds, fails fatally, or runs out of attempts.
///
/// Sleeps [`RetryConfig::delay_for_attempt`] between attempts. The calling
/// thread blocks while sleeping.
pub(crate) fn run_with_retry<R, E, F, P>(
    config: &RetryConfig,
    operation: &str,
    is_retryable: P,
    mut op: F,
) -> Result<R, RetryError<E>>
where
    E: fmt::Display,
    F: FnMut() -> Result<R, E>,
    P: Fn(&E) -> bool,
{
    let attempts = config.total_attempts();
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op() {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if !is_retryable(&e) => return Err(RetryError::Fatal(e)),
            Err(e) if attempt >= attempts => {
                warn!(operation, attempts, error = %e, "retries exhausted");
                return Err(RetryError::Exhausted { attempts, last: e });
            }
            Err(e) => {
                let delay = config.delay_for_attempt(attempt);
                warn!(operation, attempt, ?delay, error = %e, "retryable failure, backing off");
                thread::sleep(delay);
            }
        }
    }
}
