// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `cloudflare.rs`

#[cfg(test)]
mod tests {
    use crate::cloudflare::types::ApiEnvelope;
    use crate::cloudflare::CloudflareApi;

    #[test]
    fn test_with_base_url_accepts_trailing_slash_variants() {
        assert!(CloudflareApi::with_base_url("t".to_string(), "http://127.0.0.1:9000").is_ok());
        assert!(CloudflareApi::with_base_url("t".to_string(), "http://127.0.0.1:9000/").is_ok());
        assert!(
            CloudflareApi::with_base_url("t".to_string(), "http://127.0.0.1:9000/client/v4")
                .is_ok()
        );
    }

    #[test]
    fn test_with_base_url_rejects_garbage() {
        assert!(CloudflareApi::with_base_url("t".to_string(), "not a url").is_err());
    }

    #[test]
    fn test_envelope_decodes_success() {
        let envelope: ApiEnvelope<Vec<String>> = serde_json::from_str(
            r#"{"success": true, "errors": [], "result": ["a", "b"]}"#,
        )
        .unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.result.unwrap(), vec!["a", "b"]);
        assert!(envelope.result_info.is_none());
    }

    #[test]
    fn test_envelope_decodes_error_payload() {
        let envelope: ApiEnvelope<serde_json::Value> = serde_json::from_str(
            r#"{"success": false, "errors": [{"code": 10000, "message": "Authentication error"}], "result": null}"#,
        )
        .unwrap();
        assert!(!envelope.success);
        assert_eq!(envelope.errors[0].code, 10000);
        assert_eq!(envelope.errors[0].message, "Authentication error");
        assert!(envelope.result.is_none());
    }

    #[test]
    fn test_envelope_decodes_result_info() {
        let envelope: ApiEnvelope<Vec<u32>> = serde_json::from_str(
            r#"{"success": true, "errors": [], "result": [1],
                "result_info": {"page": 2, "per_page": 100, "total_pages": 3, "count": 1, "total_count": 201}}"#,
        )
        .unwrap();
        let info = envelope.result_info.unwrap();
        assert_eq!(info.page, 2);
        assert_eq!(info.total_pages, 3);
    }

    #[test]
    fn test_first_error_message_extracts_detail() {
        let body = r#"{"success": false, "errors": [{"code": 7003, "message": "no route"}], "result": null}"#;
        assert_eq!(super::super::first_error_message(body), "no route");
    }

    #[test]
    fn test_first_error_message_tolerates_non_json() {
        assert_eq!(
            super::super::first_error_message("<html>bad gateway</html>"),
            "no error detail"
        );
    }
}
