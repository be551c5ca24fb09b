//! Retry logic with exponential backoff
//!
//! Catalog calls made while resolving URLs and every per-task fetch go through
//! this module. Delays grow exponentially, are capped at `max_delay`, and can be
//! jittered so that many workers hitting the same rate limit do not retry in
//! lockstep.
//!
//! # Example
//!
//! ```no_run
//! use qobuz_dl::retry::{IsRetryable, retry_with_backoff};
//! use qobuz_dl::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! retry_with_backoff(&config, || async { Ok::<_, MyError>(()) }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{CatalogError, Error, ResolutionError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Rate limiting and transient network failures return `true`; authorization
/// failures, missing items and local errors return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;

    /// Minimum wait requested by the remote side, if any
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl IsRetryable for CatalogError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            CatalogError::RateLimited { .. } | CatalogError::Transient(_)
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CatalogError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Catalog(e) => e.is_retryable(),
            Error::Resolution(ResolutionError::Catalog { source, .. }) => source.is_retryable(),
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::Io(e) | Error::Write { source: e, .. } => is_transient_io(e),
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::Catalog(e) => e.retry_after(),
            _ => None,
        }
    }
}

fn is_transient_io(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::NotConnected
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::Interrupted
    )
}

/// Result of a cancellable retry loop
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    /// An attempt succeeded
    Succeeded {
        /// Value produced
        value: T,
        /// Retries performed before the successful attempt
        retries: u32,
    },
    /// Non-retryable error, or retries exhausted
    Failed {
        /// Last error
        error: E,
        /// Retries performed
        retries: u32,
    },
    /// Cancellation fired during an attempt or a backoff sleep
    Cancelled {
        /// Retries performed before cancellation
        retries: u32,
    },
}

/// Execute an async operation with exponential backoff retry logic
///
/// Returns the successful result or the last error once `max_attempts`
/// retries have been used up.
pub async fn retry_with_backoff<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;
                let wait = next_wait(config, delay, e.retry_after());

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = wait.as_millis(),
                    "Operation failed, retrying"
                );

                tokio::time::sleep(wait).await;
                delay = grow(config, delay);
            }
            Err(e) => {
                log_terminal(&e, attempt);
                return Err(e);
            }
        }
    }
}

/// Cancellable variant used by scheduler workers
///
/// Each attempt and each backoff sleep is raced against `cancel`. `on_retry`
/// is invoked with the retry number and the triggering error before sleeping.
pub async fn retry_cancellable<F, Fut, T, E, R>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
    mut on_retry: R,
) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
    R: FnMut(u32, &E),
{
    let mut retries = 0;
    let mut delay = config.initial_delay;

    loop {
        if cancel.is_cancelled() {
            return RetryOutcome::Cancelled { retries };
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return RetryOutcome::Cancelled { retries },
            r = operation(retries) => r,
        };

        match result {
            Ok(value) => return RetryOutcome::Succeeded { value, retries },
            Err(e) if e.is_retryable() && retries < config.max_attempts => {
                retries += 1;
                let wait = next_wait(config, delay, e.retry_after());
                tracing::warn!(
                    error = %e,
                    attempt = retries,
                    max_attempts = config.max_attempts,
                    delay_ms = wait.as_millis(),
                    "Attempt failed, retrying"
                );
                on_retry(retries, &e);

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return RetryOutcome::Cancelled { retries },
                    _ = tokio::time::sleep(wait) => {}
                }
                delay = grow(config, delay);
            }
            Err(error) => {
                log_terminal(&error, retries);
                return RetryOutcome::Failed { error, retries };
            }
        }
    }
}

fn next_wait(config: &RetryConfig, delay: Duration, hint: Option<Duration>) -> Duration {
    let base = if config.jitter { add_jitter(delay) } else { delay };
    match hint {
        Some(hint) => base.max(hint.min(config.max_delay)),
        None => base,
    }
}

fn grow(config: &RetryConfig, delay: Duration) -> Duration {
    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier).min(config.max_delay)
}

fn log_terminal<E: IsRetryable + std::fmt::Display>(e: &E, retries: u32) {
    if e.is_retryable() {
        tracing::error!(
            error = %e,
            attempts = retries + 1,
            "Operation failed after all retry attempts exhausted"
        );
    } else {
        tracing::error!(error = %e, "Operation failed with non-retryable error");
    }
}

/// Add random jitter to a delay
///
/// The result is uniformly distributed between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
