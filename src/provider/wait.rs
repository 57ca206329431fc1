//! Polling a provisioner until a stack settles.

use std::time::Duration;

use tracing::debug;

use crate::error::ProviderError;

use super::provisioner::Provisioner;
use super::types::StackDescription;

/// Default interval between polls in milliseconds.
const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

/// Default ceiling in seconds.
const DEFAULT_CEILING_SECS: u64 = 1_800;

/// Poll interval and ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Time between polls.
    pub interval: Duration,
    /// Give up after this long.
    pub ceiling: Duration,
}

impl WaitPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(interval: Duration, ceiling: Duration) -> Self {
        Self { interval, ceiling }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            Duration::from_secs(DEFAULT_CEILING_SECS),
        )
    }
}

/// Polls `describe` until the stack reaches a terminal status.
///
/// # Errors
///
/// Returns `Timeout` once the ceiling is reached, or the first describe
/// error. A stack that disappears yields `NotFound`.
pub async fn wait_for_terminal(
    provisioner: &dyn Provisioner,
    name: &str,
    policy: WaitPolicy,
) -> Result<StackDescription, ProviderError> {
    let start = std::time::Instant::now();

    loop {
        let description = provisioner.describe(name).await?;

        if description.simplified().is_terminal() {
            return Ok(description);
        }

        if start.elapsed() > policy.ceiling {
            return Err(ProviderError::Timeout {
                stack: name.to_string(),
                last_status: description.status,
            });
        }

        debug!("Stack {name} is {}, waiting", description.status);
        tokio::time::sleep(policy.interval).await;
    }
}
