// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `retry.rs`

#[cfg(test)]
mod tests {
    use super::super::{default_backoff, is_retryable_error, requeue_delay, retry_api_call};
    use crate::binding_errors::BindingError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn api_error(code: u16, reason: &str) -> BindingError {
        BindingError::Kube(kube::Error::Api(Box::new(kube::core::Status {
            status: Some(kube::core::response::StatusSummary::Failure),
            message: format!("{reason} error"),
            reason: reason.to_string(),
            code,
            metadata: None,
            details: None,
        })))
    }

    /// Test that backoff configuration has expected values
    #[test]
    fn test_backoff_configuration() {
        let backoff = default_backoff();

        assert_eq!(backoff.initial_interval, Duration::from_millis(100));
        assert_eq!(backoff.max_interval, Duration::from_secs(10));
        assert_eq!(backoff.max_elapsed_time, Some(Duration::from_secs(60)));

        #[allow(clippy::float_cmp)]
        {
            assert_eq!(backoff.multiplier, 2.0);
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let mut backoff = default_backoff();
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(400)));

        for _ in 0..10 {
            backoff.next_backoff();
        }
        assert_eq!(backoff.current_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_429_and_5xx_are_retryable() {
        assert!(is_retryable_error(&api_error(429, "TooManyRequests")));
        assert!(is_retryable_error(&api_error(500, "InternalError")));
        assert!(is_retryable_error(&api_error(503, "ServiceUnavailable")));
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        assert!(!is_retryable_error(&api_error(400, "BadRequest")));
        assert!(!is_retryable_error(&api_error(403, "Forbidden")));
        assert!(!is_retryable_error(&BindingError::ApplicationNotFound));
        assert!(!is_retryable_error(&BindingError::NotFound {
            kind: "secrets".to_string(),
            namespace: "demo".to_string(),
            name: "missing".to_string(),
        }));
    }

    #[test]
    fn test_conflict_requeues_immediately() {
        let requeue = Duration::from_secs(45);
        let conflict = BindingError::Conflict {
            kind: "deployments".to_string(),
            namespace: "demo".to_string(),
            name: "app".to_string(),
            message: "the object has been modified".to_string(),
        };

        assert_eq!(requeue_delay(&conflict, requeue), Duration::ZERO);
        assert_eq!(
            requeue_delay(&BindingError::ApplicationNotFound, requeue),
            requeue
        );
    }

    #[tokio::test]
    async fn test_retry_fails_fast_on_permanent_error() {
        let attempts = AtomicUsize::new(0);
        let result: Result<(), _> = retry_api_call(
            || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(api_error(403, "Forbidden"))
            },
            "get forbidden",
        )
        .await;

        assert!(result.unwrap_err().is_forbidden());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_error() {
        let attempts = AtomicUsize::new(0);
        let result = retry_api_call(
            || async {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(api_error(503, "ServiceUnavailable"))
                } else {
                    Ok("ok")
                }
            },
            "get flaky",
        )
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
