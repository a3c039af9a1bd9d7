// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `error.rs`

#[cfg(test)]
mod tests {
    use crate::cloudflare::error::CloudflareError;

    #[test]
    fn test_rate_limited_is_retryable() {
        assert!(CloudflareError::RateLimited.is_retryable());
    }

    #[test]
    fn test_server_errors_are_retryable() {
        let err = CloudflareError::Api {
            code: 502,
            message: "bad gateway".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_envelope_errors_are_not_retryable() {
        let err = CloudflareError::Api {
            code: 81044,
            message: "record does not exist".to_string(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_auth_is_terminal_and_flagged() {
        let err = CloudflareError::Auth("invalid token".to_string());
        assert!(!err.is_retryable());
        assert!(err.is_auth());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_found_classification() {
        let err = CloudflareError::NotFound("zones/abc".to_string());
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
        assert!(!err.is_auth());
    }

    #[test]
    fn test_decode_is_terminal() {
        assert!(!CloudflareError::Decode("bad shape".to_string()).is_retryable());
    }

    #[test]
    fn test_display_includes_code_and_message() {
        let err = CloudflareError::Api {
            code: 1003,
            message: "Invalid or missing zone id".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("1003"));
        assert!(text.contains("Invalid or missing zone id"));
    }
}
