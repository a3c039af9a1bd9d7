// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error taxonomy for Cloudflare API calls.
//!
//! The variants map onto how the reconcilers react:
//!
//! - [`CloudflareError::Auth`] sets `CredentialsValid=False` and backs off
//!   aggressively
//! - [`CloudflareError::NotFound`] is recoverable or terminal depending on
//!   the call site (a missing record is normal, a missing account is not)
//! - [`CloudflareError::RateLimited`] and transport failures ride the short
//!   retry backoff
//! - [`CloudflareError::Api`] carries the envelope error verbatim

use thiserror::Error;

/// Error returned by every [`crate::cloudflare::CloudflareApi`] operation.
#[derive(Debug, Error)]
pub enum CloudflareError {
    /// The API token was rejected or is inactive.
    #[error("Cloudflare authentication failed: {0}")]
    Auth(String),

    /// The requested object does not exist.
    #[error("Cloudflare object not found: {0}")]
    NotFound(String),

    /// The API asked us to slow down (HTTP 429).
    #[error("Cloudflare rate limit exceeded")]
    RateLimited,

    /// An envelope-level error (`success: false`) or a 5xx status.
    #[error("Cloudflare API error {code}: {message}")]
    Api {
        /// Cloudflare error code (or HTTP status for 5xx responses)
        code: i64,
        /// Error message from the envelope
        message: String,
    },

    /// Network-level failure.
    #[error("Cloudflare transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The response body did not match the expected shape.
    #[error("Cloudflare response decode error: {0}")]
    Decode(String),

    /// An endpoint path could not be joined onto the base URL.
    #[error("invalid Cloudflare API URL: {0}")]
    Url(#[from] url::ParseError),
}

impl CloudflareError {
    /// Whether a retry with backoff may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            CloudflareError::RateLimited | CloudflareError::Transport(_) => true,
            // 5xx responses are folded into Api with their status as code
            CloudflareError::Api { code, .. } => (500..600).contains(code),
            CloudflareError::Auth(_)
            | CloudflareError::NotFound(_)
            | CloudflareError::Decode(_)
            | CloudflareError::Url(_) => false,
        }
    }

    /// Whether the error indicates bad credentials.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, CloudflareError::Auth(_))
    }

    /// Whether the error is a missing-object lookup result.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudflareError::NotFound(_))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
