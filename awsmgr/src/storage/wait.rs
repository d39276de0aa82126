//! Polling until a deleted bucket is really gone.

use super::ObjectStore;
use crate::error::{Error, Result, Service};
use log::{debug, trace};
use std::thread;
use std::time::{Duration, Instant};

const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// How often and how long to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Pause between checks.
    pub delay: Duration,
    /// Number of checks before giving up.
    pub max_attempts: u32,
}

impl WaitPolicy {
    /// Default delay between checks.
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);
    /// Default number of checks.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;

    /// Custom policy. At least one check is always made.
    pub fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY, Self::DEFAULT_MAX_ATTEMPTS)
    }
}

/// Sleep for `delay`, waking early if an interrupt is requested.
fn pause(delay: Duration) -> Result<()> {
    let deadline = Instant::now() + delay;
    loop {
        crate::check_interrupted()?;
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}

/// Block until `HeadBucket` reports the bucket missing.
///
/// Gives up with a remote `WaiterTimeout` error after
/// [`WaitPolicy::max_attempts`] checks.
pub fn wait_until_bucket_not_exists<S: ObjectStore + ?Sized>(
    store: &S,
    name: &str,
    policy: &WaitPolicy,
) -> Result<()> {
    for attempt in 1..=policy.max_attempts {
        crate::check_interrupted()?;
        if !store.bucket_exists(name)? {
            debug!("Bucket {name} confirmed deleted after {attempt} check(s)");
            return Ok(());
        }
        trace!("Bucket {name} still exists ({attempt}/{})", policy.max_attempts);
        if attempt < policy.max_attempts {
            pause(policy.delay)?;
        }
    }

    Err(Error::Remote {
        service: Service::S3,
        operation: "HeadBucket",
        code: Some("WaiterTimeout".to_string()),
        message: format!(
            "bucket {name} still exists after {} checks",
            policy.max_attempts
        ),
    })
}
