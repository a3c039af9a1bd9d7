// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `crd.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{
        AccessDecision, AccessRule, AccessRuleCriterion, CloudflareAccessPolicy,
        CloudflareAccessPolicySpec, CloudflareCredentials, CloudflareDNSSync,
        CloudflareDNSSyncSpec, CloudflareTunnel, CloudflareTunnelSpec, RecordSyncState,
        SecretReference, TargetKind, TargetReference, TunnelReference, ZoneSpec,
    };
    use kube::core::CustomResourceExt;

    fn tunnel_spec() -> CloudflareTunnelSpec {
        CloudflareTunnelSpec {
            account_id: "0123456789abcdef0123456789abcdef".to_string(),
            name: None,
            cloudflare: CloudflareCredentials {
                secret_ref: SecretReference {
                    name: "cloudflare-creds".to_string(),
                    namespace: None,
                },
                api_token_key: None,
            },
            deployment: None,
            origin: None,
            ingress: None,
            dns: None,
        }
    }

    #[test]
    fn test_tunnel_crd_identity() {
        let crd = CloudflareTunnel::crd();
        assert_eq!(crd.spec.group, "cfgate.io");
        assert_eq!(crd.spec.names.kind, "CloudflareTunnel");
        assert!(crd.spec.names.short_names.as_ref().is_some_and(|s| s
            .iter()
            .any(|n| n == "cft")));
    }

    #[test]
    fn test_dnssync_crd_identity() {
        let crd = CloudflareDNSSync::crd();
        assert_eq!(crd.spec.group, "cfgate.io");
        assert_eq!(crd.spec.names.kind, "CloudflareDNSSync");
    }

    #[test]
    fn test_accesspolicy_crd_identity() {
        let crd = CloudflareAccessPolicy::crd();
        assert_eq!(crd.spec.group, "cfgate.io");
        assert_eq!(crd.spec.names.kind, "CloudflareAccessPolicy");
    }

    #[test]
    fn test_tunnel_spec_serializes_camel_case() {
        let json = serde_json::to_value(tunnel_spec()).unwrap();
        assert!(json.get("accountId").is_some());
        assert!(json.get("cloudflare").is_some());
        // Optional fields are omitted, not nulled
        assert!(json.get("deployment").is_none());
        assert!(json.get("dns").is_none());
    }

    #[test]
    fn test_secret_reference_round_trip() {
        let secret_ref = SecretReference {
            name: "creds".to_string(),
            namespace: Some("cf-system".to_string()),
        };
        let json = serde_json::to_string(&secret_ref).unwrap();
        let back: SecretReference = serde_json::from_str(&json).unwrap();
        assert_eq!(back, secret_ref);
    }

    #[test]
    fn test_dnssync_spec_deserializes_minimal() {
        let spec: CloudflareDNSSyncSpec = serde_json::from_value(serde_json::json!({
            "tunnelRef": {"name": "edge"},
            "zones": [{"name": "example.com"}]
        }))
        .unwrap();

        assert_eq!(
            spec.tunnel_ref,
            TunnelReference {
                name: "edge".to_string(),
                namespace: None
            }
        );
        assert_eq!(
            spec.zones,
            vec![ZoneSpec {
                name: "example.com".to_string(),
                id: None
            }]
        );
        assert!(spec.gateway_routes.is_none());
        assert!(spec.fallback_credentials_ref.is_none());
    }

    #[test]
    fn test_access_decision_wire_values() {
        assert_eq!(AccessDecision::Allow.as_str(), "allow");
        assert_eq!(AccessDecision::Deny.as_str(), "deny");
        assert_eq!(AccessDecision::Bypass.as_str(), "bypass");
        assert_eq!(AccessDecision::NonIdentity.as_str(), "non_identity");
    }

    #[test]
    fn test_access_decision_serde_snake_case() {
        let json = serde_json::to_string(&AccessDecision::NonIdentity).unwrap();
        assert_eq!(json, "\"non_identity\"");
    }

    #[test]
    fn test_target_kind_strings() {
        assert_eq!(TargetKind::Gateway.as_str(), "Gateway");
        assert_eq!(TargetKind::HTTPRoute.as_str(), "HTTPRoute");
        assert_eq!(TargetKind::UDPRoute.as_str(), "UDPRoute");
    }

    #[test]
    fn test_criterion_is_populated() {
        let empty = AccessRuleCriterion::default();
        assert!(!empty.is_populated());

        let emails = AccessRuleCriterion {
            emails: Some(vec!["a@example.com".to_string()]),
            ..Default::default()
        };
        assert!(emails.is_populated());

        let everyone = AccessRuleCriterion {
            everyone: Some(true),
            ..Default::default()
        };
        assert!(everyone.is_populated());
    }

    #[test]
    fn test_access_policy_spec_target_exclusivity_shape() {
        // The CRD carries both fields; exactly one must be set. The
        // reconciler enforces the exclusivity; here we only pin the shape.
        let spec = CloudflareAccessPolicySpec {
            target_ref: Some(TargetReference {
                group: None,
                kind: TargetKind::HTTPRoute,
                name: "app".to_string(),
                namespace: None,
                section_name: None,
            }),
            target_refs: None,
            account_id: None,
            cloudflare: None,
            application: Default::default(),
            rules: vec![AccessRule {
                name: None,
                decision: AccessDecision::Allow,
                precedence: None,
                include: vec![AccessRuleCriterion {
                    everyone: Some(true),
                    ..Default::default()
                }],
                exclude: None,
                require: None,
                session_duration: None,
                approval_required: None,
            }],
            service_tokens: None,
            mtls: None,
        };

        let json = serde_json::to_value(&spec).unwrap();
        assert!(json.get("targetRef").is_some());
        assert!(json.get("targetRefs").is_none());
        assert_eq!(json["rules"][0]["decision"], "allow");
    }

    #[test]
    fn test_record_sync_state_serializes_as_pascal_case() {
        assert_eq!(
            serde_json::to_string(&RecordSyncState::Synced).unwrap(),
            "\"Synced\""
        );
        assert_eq!(
            serde_json::to_string(&RecordSyncState::Failed).unwrap(),
            "\"Failed\""
        );
    }
}
