// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `retry.rs`

#[cfg(test)]
mod tests {
    use crate::cloudflare::error::CloudflareError;
    use crate::reconcilers::retry::{
        cloudflare_backoff, default_backoff, retry_cloudflare_call,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_default_backoff_grows_exponentially() {
        let mut backoff = default_backoff();

        let first = backoff.next_backoff().unwrap();
        let second = backoff.next_backoff().unwrap();
        let third = backoff.next_backoff().unwrap();

        // Jitter is ±10%, so comparisons use generous margins
        assert!(first < Duration::from_millis(150));
        assert!(second > first / 2);
        assert!(third > second / 2);
        assert!(third > Duration::from_millis(300));
    }

    #[test]
    fn test_backoff_caps_at_max_interval() {
        let mut backoff = cloudflare_backoff();

        let mut last = Duration::ZERO;
        for _ in 0..12 {
            if let Some(interval) = backoff.next_backoff() {
                last = interval;
            }
        }

        // 10s cap plus 10% jitter headroom
        assert!(last <= Duration::from_secs(11));
    }

    #[tokio::test]
    async fn test_retry_cloudflare_succeeds_first_try() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, _> = retry_cloudflare_call(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            },
            "test op",
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_cloudflare_retries_rate_limit() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, _> = retry_cloudflare_call(
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(CloudflareError::RateLimited)
                } else {
                    Ok(7)
                }
            },
            "test op",
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_cloudflare_fails_fast_on_auth() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, _> = retry_cloudflare_call(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CloudflareError::Auth("bad token".to_string()))
            },
            "test op",
        )
        .await;

        assert!(matches!(result, Err(CloudflareError::Auth(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_cloudflare_fails_fast_on_not_found() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, _> = retry_cloudflare_call(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CloudflareError::NotFound("zones/missing".to_string()))
            },
            "test op",
        )
        .await;

        assert!(matches!(result, Err(CloudflareError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_cloudflare_retries_server_errors() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, _> = retry_cloudflare_call(
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(CloudflareError::Api {
                        code: 502,
                        message: "bad gateway".to_string(),
                    })
                } else {
                    Ok(1)
                }
            },
            "test op",
        )
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
