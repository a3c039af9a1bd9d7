// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `dns.rs`

#[cfg(test)]
mod tests {
    use crate::cloudflare::types::{DnsRecord, DnsRecordUpsert};

    #[test]
    fn test_dns_record_decodes_wire_shape() {
        let record: DnsRecord = serde_json::from_value(serde_json::json!({
            "id": "rec1",
            "type": "CNAME",
            "name": "app.example.com",
            "content": "abc.cfargotunnel.com",
            "proxied": true,
            "ttl": 1,
            "comment": "managed by cfgate, tunnel=edge",
            "zone_id": "z1",
            "created_on": "2025-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(record.r#type, "CNAME");
        assert_eq!(record.content, "abc.cfargotunnel.com");
        assert_eq!(record.proxied, Some(true));
        assert_eq!(record.ttl, 1);
        assert_eq!(
            record.comment.as_deref(),
            Some("managed by cfgate, tunnel=edge")
        );
    }

    #[test]
    fn test_dns_record_tolerates_missing_optionals() {
        let record: DnsRecord = serde_json::from_value(serde_json::json!({
            "id": "rec2",
            "type": "TXT",
            "name": "_cfgate.app.example.com",
            "content": "managed by cfgate, tunnel=edge",
            "ttl": 300
        }))
        .unwrap();

        assert!(record.proxied.is_none());
        assert!(record.comment.is_none());
    }

    #[test]
    fn test_upsert_omits_absent_fields() {
        let upsert = DnsRecordUpsert {
            r#type: "CNAME".to_string(),
            name: "app.example.com".to_string(),
            content: "abc.cfargotunnel.com".to_string(),
            proxied: None,
            ttl: 1,
            comment: None,
        };

        let json = serde_json::to_value(&upsert).unwrap();
        assert!(json.get("proxied").is_none());
        assert!(json.get("comment").is_none());
        assert_eq!(json["type"], "CNAME");
        assert_eq!(json["ttl"], 1);
    }

    #[test]
    fn test_upsert_serializes_ownership_comment() {
        let upsert = DnsRecordUpsert {
            r#type: "CNAME".to_string(),
            name: "app.example.com".to_string(),
            content: "abc.cfargotunnel.com".to_string(),
            proxied: Some(true),
            ttl: 1,
            comment: Some(crate::ownership::ownership_comment("edge")),
        };

        let json = serde_json::to_value(&upsert).unwrap();
        assert_eq!(json["comment"], "managed by cfgate, tunnel=edge");
        assert_eq!(json["proxied"], true);
    }
}
