//! Bounded retry loop with explicit retryable/terminal classification.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Exponential backoff between attempts.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Backoff {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Upper bound for any single delay.
    pub max: Duration,
    /// Multiplier applied after every retry.
    pub factor: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(10),
            factor: 2,
        }
    }
}

impl Backoff {
    /// Fixed delay between attempts.
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self {
            initial: delay,
            max: delay,
            factor: 1,
        }
    }

    /// Delay to wait before retry number `retry` (zero based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.factor
            .checked_pow(retry)
            .and_then(|multiplier| self.initial.checked_mul(multiplier))
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

/// Time budget and pacing for [`retry_within_budget`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Wall-clock ceiling for the whole loop.
    pub budget: Duration,
    /// Pacing between attempts.
    pub backoff: Backoff,
}

/// Failed attempt, tagged with whether another attempt may help.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Attempt<E> {
    /// Try again after the backoff.
    Retryable(E),
    /// Stop immediately.
    Terminal(E),
}

/// Why a retry loop gave up while only retryable errors had occurred.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AbortCause {
    /// The time budget ran out.
    Deadline,
    /// The caller cancelled the loop.
    Cancelled,
}

impl fmt::Display for AbortCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deadline => f.write_str("time budget exhausted"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Successful result together with the number of attempts it took.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryOutcome<T> {
    /// Value produced by the final attempt.
    pub value: T,
    /// Attempts made, including the successful one.
    pub attempts: u32,
}

/// Failure of a retry loop.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RetryError<E> {
    /// An attempt failed in a way retrying cannot fix.
    #[error("terminal failure after {attempts} attempt(s): {error}")]
    Terminal {
        /// Error returned by the failing attempt.
        error: E,
        /// Attempts made, including the failing one.
        attempts: u32,
    },
    /// The loop stopped before any attempt succeeded.
    #[error("{cause} after {attempts} attempt(s)")]
    Aborted {
        /// Deadline or cancellation.
        cause: AbortCause,
        /// Attempts made before giving up.
        attempts: u32,
        /// Most recent retryable error, if any attempt ran.
        last_error: Option<E>,
    },
}

/// Runs `operation` until it succeeds, fails terminally, exhausts the
/// budget, or `cancel` fires.
///
/// Neither delays nor attempts extend past the deadline: an attempt still
/// pending when the budget runs out or `cancel` fires is dropped. An attempt
/// that is already complete when polled keeps its result.
///
/// # Errors
///
/// Returns [`RetryError::Terminal`] on the first terminal failure and
/// [`RetryError::Aborted`] when the budget runs out or the token is
/// cancelled.
pub async fn retry_within_budget<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<RetryOutcome<T>, RetryError<E>>
where
    E: fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Attempt<E>>>,
{
    let deadline = Instant::now() + policy.budget;
    let mut attempts: u32 = 0;
    let mut last_error = None;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Aborted {
                cause: AbortCause::Cancelled,
                attempts,
                last_error,
            });
        }

        attempts = attempts.saturating_add(1);
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(RetryError::Aborted {
                    cause: AbortCause::Cancelled,
                    attempts,
                    last_error,
                });
            }
            outcome = operation() => outcome,
            () = sleep_until(deadline) => {
                return Err(RetryError::Aborted {
                    cause: AbortCause::Deadline,
                    attempts,
                    last_error,
                });
            }
        };
        let error = match result {
            Ok(value) => return Ok(RetryOutcome { value, attempts }),
            Err(Attempt::Terminal(error)) => return Err(RetryError::Terminal { error, attempts }),
            Err(Attempt::Retryable(error)) => error,
        };

        let now = Instant::now();
        if now >= deadline {
            return Err(RetryError::Aborted {
                cause: AbortCause::Deadline,
                attempts,
                last_error: Some(error),
            });
        }

        let delay = policy
            .backoff
            .delay_for(attempts.saturating_sub(1))
            .min(deadline.saturating_duration_since(now));
        debug!(
            event = "sweep.retry.backoff",
            attempt = attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "retryable failure, backing off"
        );
        last_error = Some(error);

        tokio::select! {
            () = cancel.cancelled() => {
                return Err(RetryError::Aborted {
                    cause: AbortCause::Cancelled,
                    attempts,
                    last_error,
                });
            }
            () = sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests;
