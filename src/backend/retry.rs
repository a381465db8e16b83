//! Fixed-delay retry for transient backend failures.

use std::thread;
use std::time::Duration;

use crate::config::TransportConfig;

/// How often, and how patiently, a failing request is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of tries, the first one included. At least 1.
    pub attempts: u32,
    /// Pause between two tries.
    pub wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            wait: Duration::from_secs(1),
        }
    }
}

impl From<&TransportConfig> for RetryPolicy {
    fn from(config: &TransportConfig) -> Self {
        Self {
            attempts: config.attempts.max(1),
            wait: Duration::from_millis(config.wait_ms),
        }
    }
}

/// Run `op` until it succeeds, fails with an error `should_retry` rejects,
/// or the policy runs out of attempts. The last error is returned.
pub fn retry<T, E, F, P>(policy: RetryPolicy, should_retry: P, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts && should_retry(&e) => {
                tracing::warn!(attempt, attempts, error = %e, "Transient failure, retrying");
                thread::sleep(policy.wait);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
