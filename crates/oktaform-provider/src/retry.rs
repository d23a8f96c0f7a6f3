//! Bounded retry for mutations that race server-side eventual consistency.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ProvisionerError;

/// Wall-clock budget and backoff shape for one retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(with = "humantime_serde")]
    pub budget: Duration,
    #[serde(with = "humantime_serde")]
    pub initial: Duration,
    #[serde(with = "humantime_serde")]
    pub cap: Duration,
}

impl RetryPolicy {
    pub const fn with_budget(budget: Duration) -> Self {
        Self {
            budget,
            initial: Duration::from_millis(500),
            cap: Duration::from_secs(8),
        }
    }

    /// Schema attribute create/update/reassign.
    pub const fn schema() -> Self {
        Self::with_budget(Duration::from_secs(120))
    }

    /// User type deletion.
    pub const fn user_type_delete() -> Self {
        Self::with_budget(Duration::from_secs(30))
    }
}

/// What the classifier decided about one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Done,
    Retry,
    Fail,
}

/// Default classifier: success is done, transient errors are retried,
/// anything else fails immediately.
pub fn transient<T>(outcome: &Result<T, ProvisionerError>) -> Verdict {
    match outcome {
        Ok(_) => Verdict::Done,
        Err(e) if e.is_transient() => Verdict::Retry,
        Err(_) => Verdict::Fail,
    }
}

/// Run `op` until `classify` says done or fail, the budget runs out, the
/// deadline passes, or `cancel` fires.
///
/// On exhaustion the last attempt's error is returned.
pub async fn retry<T, Op, Fut, C>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    deadline: Instant,
    mut op: Op,
    classify: C,
) -> Result<T, ProvisionerError>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProvisionerError>>,
    C: Fn(&Result<T, ProvisionerError>) -> Verdict,
{
    let stop_at = (Instant::now() + policy.budget).min(deadline);
    let mut delay = policy.initial;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let outcome = op().await;
        match classify(&outcome) {
            Verdict::Done | Verdict::Fail => return outcome,
            Verdict::Retry => {}
        }

        let wait = jittered(delay);
        if Instant::now() + wait >= stop_at {
            tracing::debug!(attempt, "retry budget exhausted");
            return match outcome {
                Err(e) => Err(e),
                Ok(_) => Err(ProvisionerError::Transient(format!(
                    "condition not reached after {attempt} attempts"
                ))),
            };
        }

        if let Err(e) = &outcome {
            tracing::debug!(attempt, wait_ms = wait.as_millis() as u64, error = %e, "retrying");
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProvisionerError::Cancelled),
            _ = tokio::time::sleep(wait) => {}
        }
        delay = (delay * 2).min(policy.cap);
    }
}

/// Half fixed, half random.
fn jittered(delay: Duration) -> Duration {
    let half = delay / 2;
    let spread = half.as_millis() as u64;
    half + Duration::from_millis(rand::rng().random_range(0..=spread))
}
