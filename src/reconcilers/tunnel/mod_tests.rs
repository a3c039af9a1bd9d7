// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the tunnel reconciler's pure logic.

#[cfg(test)]
mod tests {
    use crate::crd::{
        CloudflareCredentials, CloudflareTunnel, CloudflareTunnelSpec, IngressRuleSpec,
        OriginConfig, SecretReference,
    };
    use crate::reconcilers::tunnel::{
        deletion_policy_is_orphan, external_tunnel_name, render_inline_config,
    };
    use std::collections::BTreeMap;

    fn tunnel(name: &str) -> CloudflareTunnel {
        let mut tunnel = CloudflareTunnel::new(
            name,
            CloudflareTunnelSpec {
                account_id: "0123456789abcdef0123456789abcdef".to_string(),
                name: None,
                cloudflare: CloudflareCredentials {
                    secret_ref: SecretReference {
                        name: "creds".to_string(),
                        namespace: None,
                    },
                    api_token_key: None,
                },
                deployment: None,
                origin: None,
                ingress: None,
                dns: None,
            },
        );
        tunnel.metadata.namespace = Some("edge".to_string());
        tunnel
    }

    #[test]
    fn test_deletion_policy_defaults_to_delete() {
        assert!(!deletion_policy_is_orphan(&tunnel("t1")));
    }

    #[test]
    fn test_deletion_policy_orphan_annotation() {
        let mut t = tunnel("t1");
        let mut annotations = BTreeMap::new();
        annotations.insert(
            "cfgate.io/deletion-policy".to_string(),
            "orphan".to_string(),
        );
        t.metadata.annotations = Some(annotations);
        assert!(deletion_policy_is_orphan(&t));
    }

    #[test]
    fn test_deletion_policy_explicit_delete() {
        let mut t = tunnel("t1");
        let mut annotations = BTreeMap::new();
        annotations.insert(
            "cfgate.io/deletion-policy".to_string(),
            "delete".to_string(),
        );
        t.metadata.annotations = Some(annotations);
        assert!(!deletion_policy_is_orphan(&t));
    }

    #[test]
    fn test_external_tunnel_name_defaults_to_resource_name() {
        assert_eq!(external_tunnel_name(&tunnel("t1")), "t1");
    }

    #[test]
    fn test_external_tunnel_name_spec_override() {
        let mut t = tunnel("t1");
        t.spec.name = Some("edge-prod".to_string());
        assert_eq!(external_tunnel_name(&t), "edge-prod");
    }

    #[test]
    fn test_render_inline_config_absent_without_ingress() {
        let rendered = render_inline_config(&tunnel("t1"), "tid", Vec::new()).unwrap();
        assert!(rendered.is_none());
    }

    #[test]
    fn test_render_inline_config_with_rules() {
        let mut t = tunnel("t1");
        t.spec.origin = Some(OriginConfig {
            connect_timeout_secs: Some(10),
            ..Default::default()
        });
        t.spec.ingress = Some(vec![IngressRuleSpec {
            hostname: Some("app.example.com".to_string()),
            path: None,
            service: "http://web.apps.svc:8080".to_string(),
            origin: None,
        }]);

        let rendered = render_inline_config(&t, "tid-1", Vec::new()).unwrap().unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&rendered).unwrap();

        assert_eq!(value["tunnel"], "tid-1");
        assert_eq!(value["originRequest"]["connectTimeout"], "10s");

        // Declared rule plus the appended catch-all
        let ingress = value["ingress"].as_sequence().unwrap();
        assert_eq!(ingress.len(), 2);
        assert_eq!(ingress[1]["service"], "http_status:404");
    }

    #[test]
    fn test_render_inline_config_appends_route_entries_before_catch_all() {
        let mut t = tunnel("t1");
        t.spec.ingress = Some(vec![IngressRuleSpec {
            hostname: Some("app.example.com".to_string()),
            path: None,
            service: "http://web.apps.svc:8080".to_string(),
            origin: None,
        }]);

        let route_entries = vec![crate::agent_config::IngressEntry {
            hostname: Some("api.example.com".to_string()),
            path: None,
            service: "http://api.apps.svc.cluster.local:8080".to_string(),
            origin_request: None,
        }];

        let rendered = render_inline_config(&t, "tid-1", route_entries)
            .unwrap()
            .unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&rendered).unwrap();

        let ingress = value["ingress"].as_sequence().unwrap();
        assert_eq!(ingress.len(), 3);
        assert_eq!(ingress[0]["hostname"], "app.example.com");
        assert_eq!(ingress[1]["hostname"], "api.example.com");
        assert_eq!(ingress[2]["service"], "http_status:404");
    }
}
