//! Bounded exponential backoff as an explicit state machine.
//!
//! A request moves through `Attempting -> BackingOff -> Retrying -> ...` and
//! ends in either `Succeeded` or `Exhausted`. The attempt counter is bounded
//! by [`RetryPolicy::max_attempts`], so every loop driven by
//! [`run_with_retry`] terminates.

use crate::error::{DataError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Backoff configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one (at least 1)
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for every further retry
    pub base_delay: Duration,
    /// Upper bound for a single backoff delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Policy allowing `max_retries` retries after the first attempt.
    pub const fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_retries.saturating_add(1),
            base_delay,
            max_delay: Duration::from_secs(60),
        }
    }

    /// Policy that never retries.
    pub const fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Backoff delay after the given failed attempt (1-based).
    pub fn backoff_delay(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1_u32 << exponent)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(4, Duration::from_millis(500))
    }
}

/// Result of a single attempt, as seen by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The attempt succeeded
    Success,
    /// The attempt failed with a retryable error
    Retryable {
        /// Server-requested delay, if any
        retry_after: Option<Duration>,
    },
    /// The attempt failed with an error no retry can fix
    Fatal,
}

impl AttemptOutcome {
    /// Classify the outcome of an attempt.
    pub fn of<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(err) if err.is_retryable() => Self::Retryable {
                retry_after: err.retry_after(),
            },
            Err(_) => Self::Fatal,
        }
    }
}

/// State of a retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// First attempt in progress
    Attempting {
        /// Attempt number (1-based)
        attempt: u32,
    },
    /// Waiting before the next attempt
    BackingOff {
        /// Number of the attempt that failed
        attempt: u32,
        /// Delay to wait
        delay: Duration,
    },
    /// A retry attempt in progress
    Retrying {
        /// Attempt number (1-based)
        attempt: u32,
    },
    /// Operation succeeded
    Succeeded {
        /// Attempts used
        attempts: u32,
    },
    /// No further attempts will be made
    Exhausted {
        /// Attempts used
        attempts: u32,
    },
}

impl RetryState {
    /// Initial state.
    pub const fn start() -> Self {
        Self::Attempting { attempt: 1 }
    }

    /// Whether the state machine has finished.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Exhausted { .. })
    }

    /// Transition after an attempt completed.
    ///
    /// Calling this in a non-attempt state leaves the state unchanged.
    pub fn on_outcome(self, policy: &RetryPolicy, outcome: AttemptOutcome) -> Self {
        let attempt = match self {
            Self::Attempting { attempt } | Self::Retrying { attempt } => attempt,
            other => return other,
        };

        match outcome {
            AttemptOutcome::Success => Self::Succeeded { attempts: attempt },
            AttemptOutcome::Fatal => Self::Exhausted { attempts: attempt },
            AttemptOutcome::Retryable { .. } if attempt >= policy.max_attempts => {
                Self::Exhausted { attempts: attempt }
            }
            AttemptOutcome::Retryable { retry_after } => {
                let backoff = policy.backoff_delay(attempt);
                let delay = retry_after.map_or(backoff, |requested| {
                    backoff.max(requested.min(policy.max_delay))
                });
                Self::BackingOff { attempt, delay }
            }
        }
    }

    /// Transition once the backoff delay has elapsed.
    pub const fn after_backoff(self) -> Self {
        match self {
            Self::BackingOff { attempt, .. } => Self::Retrying {
                attempt: attempt + 1,
            },
            other => other,
        }
    }
}

/// Run `op` until it succeeds, fails fatally, or the policy is exhausted.
///
/// `op` receives the 1-based attempt number. The last error is returned when
/// no attempt succeeds.
pub async fn run_with_retry<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut state = RetryState::start();
    let mut last_error: Option<DataError> = None;

    loop {
        match state {
            RetryState::Attempting { attempt } | RetryState::Retrying { attempt } => {
                let result = op(attempt).await;
                state = state.on_outcome(policy, AttemptOutcome::of(&result));
                match result {
                    Ok(value) => {
                        if attempt > 1 {
                            debug!(what, attempts = attempt, "request succeeded after retry");
                        }
                        return Ok(value);
                    }
                    Err(err) => last_error = Some(err),
                }
            }
            RetryState::BackingOff { attempt, delay } => {
                if let Some(err) = &last_error {
                    warn!(
                        what,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "request failed, backing off"
                    );
                }
                sleep(delay).await;
                state = state.after_backoff();
            }
            RetryState::Succeeded { .. } | RetryState::Exhausted { .. } => {
                let err = last_error.unwrap_or_else(|| {
                    DataError::Transport(format!("{what}: retry loop ended without an attempt"))
                });
                if let RetryState::Exhausted { attempts } = state
                    && err.is_retryable()
                {
                    warn!(what, attempts, error = %err, "retries exhausted");
                }
                return Err(err);
            }
        }
    }
}
