// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry logic with exponential backoff for external calls.
//!
//! Two profiles exist: Kubernetes API calls (slower cadence, 5 minute cap)
//! and Cloudflare API calls (faster cadence, 2 minute cap). Both fail fast on
//! permanent errors and retry transient ones (429, 5xx, transport failures)
//! with jittered exponential backoff.

use crate::cloudflare::error::CloudflareError;
use anyhow::Result;
use rand::RngExt;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Maximum total time to spend retrying Kubernetes calls (5 minutes)
const MAX_ELAPSED_TIME_SECS: u64 = 300;

/// Initial retry interval (100ms)
const INITIAL_INTERVAL_MILLIS: u64 = 100;

/// Maximum interval between retries (30 seconds)
const MAX_INTERVAL_SECS: u64 = 30;

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Cloudflare retry initial interval (50ms)
const CF_INITIAL_INTERVAL_MILLIS: u64 = 50;

/// Cloudflare retry maximum interval (10 seconds)
const CF_MAX_INTERVAL_SECS: u64 = 10;

/// Cloudflare retry maximum elapsed time (2 minutes)
const CF_MAX_ELAPSED_TIME_SECS: u64 = 120;

/// Simple exponential backoff implementation with jitter.
pub struct ExponentialBackoff {
    /// Current interval duration
    pub current_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Maximum total elapsed time
    pub max_elapsed_time: Option<Duration>,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
    /// Start time for tracking total elapsed time
    start_time: Instant,
}

impl ExponentialBackoff {
    fn new(
        initial_interval: Duration,
        max_interval: Duration,
        max_elapsed_time: Option<Duration>,
        multiplier: f64,
        randomization_factor: f64,
    ) -> Self {
        Self {
            current_interval: initial_interval,
            max_interval,
            max_elapsed_time,
            multiplier,
            randomization_factor,
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
        let jittered = self.apply_jitter(interval);

        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        Some(jittered)
    }

    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let min = secs - delta;
        let max = secs + delta;

        let mut rng = rand::rng();
        let jittered = rng.random_range(min..=max);

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Backoff profile for Kubernetes API retries (100ms → 30s, 5 minute cap).
#[must_use]
pub fn default_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(INITIAL_INTERVAL_MILLIS),
        Duration::from_secs(MAX_INTERVAL_SECS),
        Some(Duration::from_secs(MAX_ELAPSED_TIME_SECS)),
        BACKOFF_MULTIPLIER,
        RANDOMIZATION_FACTOR,
    )
}

/// Backoff profile for Cloudflare API retries (50ms → 10s, 2 minute cap).
///
/// Shorter than the Kubernetes profile: the reconciliation itself requeues on
/// failure, so long in-call retries only hold the worker.
#[must_use]
pub fn cloudflare_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(CF_INITIAL_INTERVAL_MILLIS),
        Duration::from_secs(CF_MAX_INTERVAL_SECS),
        Some(Duration::from_secs(CF_MAX_ELAPSED_TIME_SECS)),
        BACKOFF_MULTIPLIER,
        RANDOMIZATION_FACTOR,
    )
}

/// Retry a Kubernetes API call with exponential backoff.
///
/// Retries on 429/5xx/connection errors; fails immediately on other errors.
///
/// # Errors
///
/// Returns an error if a non-retryable error is encountered or the retry
/// budget is exhausted.
pub async fn retry_api_call<T, F, Fut>(mut operation: F, operation_name: &str) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, kube::Error>>,
{
    let mut backoff = default_backoff();
    let start_time = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        "Kubernetes API call succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) => {
                if !is_retryable_kube_error(&e) {
                    error!(
                        operation = operation_name,
                        error = %e,
                        "Non-retryable Kubernetes API error, failing immediately"
                    );
                    return Err(e.into());
                }

                if let Some(duration) = backoff.next_backoff() {
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        retry_after = ?duration,
                        error = %e,
                        "Retryable Kubernetes API error, will retry"
                    );
                    tokio::time::sleep(duration).await;
                } else {
                    error!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        error = %e,
                        "Backoff exhausted, giving up"
                    );
                    return Err(anyhow::anyhow!(
                        "Backoff exhausted after {attempt} attempts: {e}"
                    ));
                }
            }
        }
    }
}

/// Retry a Cloudflare API call with exponential backoff.
///
/// Retries [`CloudflareError::is_retryable`] errors (429, 5xx, transport);
/// auth, not-found, and envelope errors fail immediately.
///
/// # Errors
///
/// Returns the last error if a non-retryable error is encountered or the
/// retry budget is exhausted.
pub async fn retry_cloudflare_call<T, F, Fut>(
    mut operation: F,
    operation_name: &str,
) -> Result<T, CloudflareError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, CloudflareError>>,
{
    let mut backoff = cloudflare_backoff();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        "Cloudflare API call succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) => {
                if !e.is_retryable() {
                    return Err(e);
                }

                if let Some(duration) = backoff.next_backoff() {
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        retry_after = ?duration,
                        error = %e,
                        "Retryable Cloudflare API error, will retry"
                    );
                    tokio::time::sleep(duration).await;
                } else {
                    error!(
                        operation = operation_name,
                        attempt = attempt,
                        error = %e,
                        "Cloudflare retry budget exhausted, giving up"
                    );
                    return Err(e);
                }
            }
        }
    }
}

/// Determine if a Kubernetes error is retryable.
///
/// Retryable: HTTP 429, 5xx, and connection-level failures. Everything else
/// (4xx client errors, schema violations) fails fast.
fn is_retryable_kube_error(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(api_err) => {
            api_err.code == 429 || (api_err.code >= 500 && api_err.code < 600)
        }
        kube::Error::Service(_) => true,
        _ => false,
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
