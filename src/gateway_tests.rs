// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `gateway.rs`

#[cfg(test)]
mod tests {
    use crate::gateway::{
        HTTPRouteSpec, ParentReference, ReferenceGrantSpec, RouteParentStatus, RouteStatus,
    };

    #[test]
    fn test_parent_reference_defaults_to_gateway() {
        let parent = ParentReference {
            group: None,
            kind: None,
            name: "edge-gw".to_string(),
            namespace: None,
            section_name: None,
        };
        assert!(parent.is_gateway());
    }

    #[test]
    fn test_parent_reference_explicit_gateway() {
        let parent = ParentReference {
            group: Some("gateway.networking.k8s.io".to_string()),
            kind: Some("Gateway".to_string()),
            name: "edge-gw".to_string(),
            namespace: Some("infra".to_string()),
            section_name: Some("https".to_string()),
        };
        assert!(parent.is_gateway());
    }

    #[test]
    fn test_parent_reference_foreign_kind() {
        let parent = ParentReference {
            group: None,
            kind: Some("Service".to_string()),
            name: "mesh".to_string(),
            namespace: None,
            section_name: None,
        };
        assert!(!parent.is_gateway());
    }

    #[test]
    fn test_httproute_spec_deserializes_consumed_subset() {
        // Unknown fields (matches, filters, timeouts) must be ignored
        let spec: HTTPRouteSpec = serde_json::from_value(serde_json::json!({
            "parentRefs": [{"name": "edge-gw", "sectionName": "https"}],
            "hostnames": ["app.example.com"],
            "rules": [{
                "matches": [{"path": {"type": "PathPrefix", "value": "/"}}],
                "backendRefs": [{"name": "web", "port": 8080}]
            }]
        }))
        .unwrap();

        assert_eq!(spec.hostnames.as_deref(), Some(&["app.example.com".to_string()][..]));
        let parents = spec.parent_refs.unwrap();
        assert_eq!(parents[0].section_name.as_deref(), Some("https"));
        let rules = spec.rules.unwrap();
        let backends = rules[0].backend_refs.as_ref().unwrap();
        assert_eq!(backends[0].name, "web");
        assert_eq!(backends[0].port, Some(8080));
    }

    #[test]
    fn test_route_status_round_trip_preserves_controller_name() {
        let status = RouteStatus {
            parents: vec![RouteParentStatus {
                parent_ref: ParentReference {
                    group: None,
                    kind: None,
                    name: "edge-gw".to_string(),
                    namespace: None,
                    section_name: None,
                },
                controller_name: "cfgate.io/gateway-controller".to_string(),
                conditions: vec![],
            }],
        };

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(
            json["parents"][0]["controllerName"],
            "cfgate.io/gateway-controller"
        );
        let back: RouteStatus = serde_json::from_value(json).unwrap();
        assert_eq!(back.parents.len(), 1);
    }

    #[test]
    fn test_reference_grant_deserializes() {
        let spec: ReferenceGrantSpec = serde_json::from_value(serde_json::json!({
            "from": [{
                "group": "cfgate.io",
                "kind": "CloudflareAccessPolicy",
                "namespace": "team-a"
            }],
            "to": [{
                "group": "gateway.networking.k8s.io",
                "kind": "HTTPRoute"
            }]
        }))
        .unwrap();

        assert_eq!(spec.from[0].kind, "CloudflareAccessPolicy");
        assert_eq!(spec.to[0].kind, "HTTPRoute");
        assert!(spec.to[0].name.is_none());
    }
}
