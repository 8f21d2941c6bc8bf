//! Retry-with-backoff for links the control loop depends on.
//!
//! The firmware blocks until Wi-Fi and the broker session are up, trying
//! once per backoff period forever.  Tests bound the attempts instead.

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use super::ports::{ConnectivityError, ConnectivityPort};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause between failed attempts (milliseconds).
    pub backoff_ms: u32,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub const fn forever(backoff_ms: u32) -> Self {
        Self {
            backoff_ms,
            max_attempts: None,
        }
    }
}

/// Return once `link` is connected, or the last error once the attempt
/// budget is spent.  Returns the number of attempts made (0 when the link
/// was already up).
pub fn ensure_connected(
    link: &mut impl ConnectivityPort,
    delay: &mut impl DelayNs,
    policy: RetryPolicy,
) -> Result<u32, ConnectivityError> {
    if link.is_connected() {
        return Ok(0);
    }

    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match link.connect() {
            Ok(()) => {
                info!("{}: connected after {attempts} attempt(s)", link.name());
                return Ok(attempts);
            }
            Err(e) => {
                warn!("{}: attempt {attempts} failed: {e}", link.name());
                if policy.max_attempts.is_some_and(|max| attempts >= max) {
                    return Err(e);
                }
                delay.delay_ms(policy.backoff_ms);
            }
        }
    }
}
