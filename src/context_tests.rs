// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `context.rs`
//!
//! Store-backed queries are covered by the integration tests; these pin the
//! annotation parsing the watch mappers depend on.

#[cfg(test)]
mod tests {
    use crate::context::{gateway_dns_sync_enabled, gateway_tunnel_ref, parse_tunnel_ref};
    use crate::gateway::{Gateway, GatewaySpec};
    use std::collections::BTreeMap;

    fn gateway(annotations: &[(&str, &str)]) -> Gateway {
        let mut gateway = Gateway::new(
            "edge-gw",
            GatewaySpec {
                gateway_class_name: "cfgate".to_string(),
                listeners: Vec::new(),
            },
        );
        gateway.metadata.namespace = Some("infra".to_string());
        if !annotations.is_empty() {
            let map: BTreeMap<String, String> = annotations
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect();
            gateway.metadata.annotations = Some(map);
        }
        gateway
    }

    #[test]
    fn test_parse_tunnel_ref_qualified() {
        assert_eq!(
            parse_tunnel_ref("edge/t1", "fallback"),
            ("edge".to_string(), "t1".to_string())
        );
    }

    #[test]
    fn test_parse_tunnel_ref_bare_name_uses_default_namespace() {
        assert_eq!(
            parse_tunnel_ref("t1", "infra"),
            ("infra".to_string(), "t1".to_string())
        );
    }

    #[test]
    fn test_gateway_tunnel_ref_annotation() {
        let gw = gateway(&[("cfgate.io/tunnel-ref", "edge/t1")]);
        assert_eq!(
            gateway_tunnel_ref(&gw),
            Some(("edge".to_string(), "t1".to_string()))
        );
    }

    #[test]
    fn test_gateway_tunnel_ref_bare_defaults_to_gateway_namespace() {
        let gw = gateway(&[("cfgate.io/tunnel-ref", "t1")]);
        assert_eq!(
            gateway_tunnel_ref(&gw),
            Some(("infra".to_string(), "t1".to_string()))
        );
    }

    #[test]
    fn test_gateway_without_annotation_has_no_tunnel() {
        assert_eq!(gateway_tunnel_ref(&gateway(&[])), None);
    }

    #[test]
    fn test_dns_sync_enabled_annotation() {
        assert!(gateway_dns_sync_enabled(&gateway(&[(
            "cfgate.io/dns-sync",
            "enabled"
        )])));
        assert!(!gateway_dns_sync_enabled(&gateway(&[(
            "cfgate.io/dns-sync",
            "disabled"
        )])));
        assert!(!gateway_dns_sync_enabled(&gateway(&[])));
    }
}
