// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry and requeue policy.
//!
//! Transient API errors (429, 5xx, connection failures) on reads are retried
//! in place with exponential backoff. Everything else surfaces to the
//! reconciler, which requeues: immediately after an optimistic-concurrency
//! conflict, after a fixed interval otherwise.

use crate::binding_errors::BindingError;
use crate::constants::CONFLICT_REQUEUE_DURATION_SECS;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Maximum total time to spend retrying (1 minute)
const MAX_ELAPSED_TIME_SECS: u64 = 60;

/// Initial retry interval (100ms)
const INITIAL_INTERVAL_MILLIS: u64 = 100;

/// Maximum interval between retries (10 seconds)
const MAX_INTERVAL_SECS: u64 = 10;

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Simple exponential backoff.
pub struct ExponentialBackoff {
    /// Current interval duration
    pub current_interval: Duration,
    /// Initial interval duration
    pub initial_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Maximum total elapsed time
    pub max_elapsed_time: Option<Duration>,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
    start_time: Instant,
}

impl ExponentialBackoff {
    fn new(
        initial_interval: Duration,
        max_interval: Duration,
        max_elapsed_time: Option<Duration>,
        multiplier: f64,
    ) -> Self {
        Self {
            current_interval: initial_interval,
            initial_interval,
            max_interval,
            max_elapsed_time,
            multiplier,
            start_time: Instant::now(),
        }
    }

    /// Get the next backoff interval, or None if max elapsed time exceeded.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if let Some(max_elapsed) = self.max_elapsed_time {
            if self.start_time.elapsed() >= max_elapsed {
                return None;
            }
        }

        let interval = self.current_interval;
        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        Some(interval)
    }
}

/// Default backoff for Kubernetes API reads.
///
/// Retries occur at approximately 100ms, 200ms, 400ms, ... capped at 10s,
/// for at most one minute.
#[must_use]
pub fn default_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(INITIAL_INTERVAL_MILLIS),
        Duration::from_secs(MAX_INTERVAL_SECS),
        Some(Duration::from_secs(MAX_ELAPSED_TIME_SECS)),
        BACKOFF_MULTIPLIER,
    )
}

/// Retry an API call with exponential backoff.
///
/// Retries on transient errors (HTTP 429, 5xx, service errors) and fails
/// immediately on everything else.
///
/// # Errors
///
/// Returns the last error once it is not retryable or the backoff is exhausted.
pub async fn retry_api_call<T, F, Fut>(
    mut operation: F,
    operation_name: &str,
) -> Result<T, BindingError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, BindingError>>,
{
    let mut backoff = default_backoff();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        "Kubernetes API call succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) if !is_retryable_error(&e) => return Err(e),
            Err(e) => {
                let Some(duration) = backoff.next_backoff() else {
                    error!(
                        operation = operation_name,
                        attempt = attempt,
                        error = %e,
                        "Backoff exhausted, giving up"
                    );
                    return Err(e);
                };
                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    retry_after = ?duration,
                    error = %e,
                    "Retryable Kubernetes API error, will retry"
                );
                tokio::time::sleep(duration).await;
            }
        }
    }
}

/// Determine if an error is transient.
///
/// # Retryable Errors
///
/// - **HTTP 429** (Too Many Requests)
/// - **HTTP 5xx** (Server Errors)
/// - **Service Errors** (network/connection issues)
#[must_use]
pub fn is_retryable_error(err: &BindingError) -> bool {
    match err {
        BindingError::Kube(kube::Error::Api(api_err)) => {
            api_err.code == 429 || (500..600).contains(&api_err.code)
        }
        BindingError::Kube(kube::Error::Service(_)) => true,
        _ => false,
    }
}

/// Requeue delay after a failed reconciliation.
///
/// Conflicts requeue immediately; everything else waits `requeue`.
#[must_use]
pub fn requeue_delay(err: &BindingError, requeue: Duration) -> Duration {
    if err.is_conflict() {
        Duration::from_secs(CONFLICT_REQUEUE_DURATION_SECS)
    } else {
        requeue
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
