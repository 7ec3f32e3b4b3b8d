//! LRO - Poll a long-running operation until it reaches a terminal state

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio_util::sync::CancellationToken;

/// Result of a single poll
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus<T> {
    InProgress,
    Succeeded(T),
    Failed(String),
    /// The service reports the operation as canceled
    Canceled,
}

/// Something that can be asked for the current status of an operation
#[async_trait]
pub trait Pollable: Send {
    type Output: Send;
    type Error: std::error::Error + Send + Sync + 'static;

    async fn poll(&mut self) -> Result<PollStatus<Self::Output>, Self::Error>;

    /// Delay requested by the service in the last poll (e.g. `Retry-After`)
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Adapts an async closure into a [`Pollable`]
pub struct PollFn<F>(F);

pub fn poll_fn<F>(f: F) -> PollFn<F> {
    PollFn(f)
}

#[async_trait]
impl<F, Fut, T, E> Pollable for PollFn<F>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<PollStatus<T>, E>> + Send,
    T: Send,
    E: std::error::Error + Send + Sync + 'static,
{
    type Output = T;
    type Error = E;

    async fn poll(&mut self) -> Result<PollStatus<T>, E> {
        (self.0)().await
    }
}

/// Poller settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub max_attempts: u32,
    pub interval: Duration,
    /// Number of successive `Succeeded` polls required before returning
    pub consecutive_successes: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 120,
            interval: Duration::from_secs(5),
            consecutive_successes: 1,
        }
    }
}

impl PollerConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_consecutive_successes(mut self, count: u32) -> Self {
        self.consecutive_successes = count;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LroError {
    #[error("operation failed: {0}")]
    Failed(String),

    #[error("operation was canceled by the service")]
    Canceled,

    #[error("polling was cancelled")]
    Cancelled,

    #[error("operation did not complete after {attempts} polls")]
    Exhausted { attempts: u32 },

    #[error("polling failed: {0}")]
    Poll(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Poll until the operation succeeds, fails, or the attempt budget runs out.
///
/// Between polls the poller sleeps for the interval the service asked for, or
/// `config.interval` if it did not. Cancelling `cancel` aborts both an
/// in-flight poll and a pending sleep.
pub async fn poll_until_done<P: Pollable>(
    pollable: &mut P,
    config: &PollerConfig,
    cancel: &CancellationToken,
) -> Result<P::Output, LroError> {
    let required = config.consecutive_successes.max(1);
    let mut successes = 0;

    for attempt in 1..=config.max_attempts {
        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LroError::Cancelled),
            status = pollable.poll() => status.map_err(|e| LroError::Poll(Box::new(e)))?,
        };

        match status {
            PollStatus::Succeeded(output) => {
                successes += 1;
                if successes >= required {
                    return Ok(output);
                }
                debug!(
                    "poll {}/{}: succeeded ({}/{} consecutive)",
                    attempt, config.max_attempts, successes, required
                );
            }
            PollStatus::InProgress => {
                if successes > 0 {
                    debug!("poll {}/{}: success streak reset", attempt, config.max_attempts);
                }
                successes = 0;
                debug!("poll {}/{}: in progress", attempt, config.max_attempts);
            }
            PollStatus::Failed(message) => return Err(LroError::Failed(message)),
            PollStatus::Canceled => return Err(LroError::Canceled),
        }

        if attempt == config.max_attempts {
            break;
        }

        let delay = pollable.retry_after().unwrap_or(config.interval);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LroError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }

    Err(LroError::Exhausted {
        attempts: config.max_attempts,
    })
}
