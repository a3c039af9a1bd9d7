// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the ReferenceGrant check.

#[cfg(test)]
mod tests {
    use crate::crd::TargetKind;
    use crate::gateway::{
        ReferenceGrant, ReferenceGrantFrom, ReferenceGrantSpec, ReferenceGrantTo,
    };
    use crate::reconcilers::accesspolicy::targets::grant_permits;

    fn grant(from_namespace: &str, to_kind: &str, to_name: Option<&str>) -> ReferenceGrant {
        ReferenceGrant::new(
            "grant",
            ReferenceGrantSpec {
                from: vec![ReferenceGrantFrom {
                    group: "cfgate.io".to_string(),
                    kind: "CloudflareAccessPolicy".to_string(),
                    namespace: from_namespace.to_string(),
                }],
                to: vec![ReferenceGrantTo {
                    group: "gateway.networking.k8s.io".to_string(),
                    kind: to_kind.to_string(),
                    name: to_name.map(str::to_string),
                }],
            },
        )
    }

    #[test]
    fn test_matching_grant_permits() {
        let grants = vec![grant("team-a", "HTTPRoute", None)];
        assert!(grant_permits(&grants, "team-a", TargetKind::HTTPRoute, "app"));
    }

    #[test]
    fn test_no_grants_denies() {
        assert!(!grant_permits(&[], "team-a", TargetKind::HTTPRoute, "app"));
    }

    #[test]
    fn test_wrong_from_namespace_denies() {
        let grants = vec![grant("team-b", "HTTPRoute", None)];
        assert!(!grant_permits(&grants, "team-a", TargetKind::HTTPRoute, "app"));
    }

    #[test]
    fn test_wrong_to_kind_denies() {
        let grants = vec![grant("team-a", "Gateway", None)];
        assert!(!grant_permits(&grants, "team-a", TargetKind::HTTPRoute, "app"));
    }

    #[test]
    fn test_name_scoped_grant() {
        let grants = vec![grant("team-a", "HTTPRoute", Some("app"))];
        assert!(grant_permits(&grants, "team-a", TargetKind::HTTPRoute, "app"));
        assert!(!grant_permits(&grants, "team-a", TargetKind::HTTPRoute, "other"));
    }

    #[test]
    fn test_wrong_from_kind_denies() {
        let mut g = grant("team-a", "HTTPRoute", None);
        g.spec.from[0].kind = "CloudflareDNSSync".to_string();
        assert!(!grant_permits(&[g], "team-a", TargetKind::HTTPRoute, "app"));
    }

    #[test]
    fn test_any_matching_grant_among_many_permits() {
        let grants = vec![
            grant("team-b", "Gateway", None),
            grant("team-a", "HTTPRoute", None),
        ];
        assert!(grant_permits(&grants, "team-a", TargetKind::HTTPRoute, "app"));
    }
}
