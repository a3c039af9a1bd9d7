// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `tunnels.rs`

#[cfg(test)]
mod tests {
    use crate::cloudflare::tunnels::{
        generate_tunnel_secret, pick_adoption_candidate, tunnel_domain,
    };
    use crate::cloudflare::types::TunnelInfo;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;

    fn tunnel(id: &str, name: &str, created_at: Option<&str>) -> TunnelInfo {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "name": name,
            "created_at": created_at,
        }))
        .unwrap()
    }

    #[test]
    fn test_generate_tunnel_secret_is_32_random_bytes() {
        let secret = generate_tunnel_secret();
        let decoded = BASE64.decode(&secret).unwrap();
        assert_eq!(decoded.len(), 32);

        // Two generations must not collide
        assert_ne!(secret, generate_tunnel_secret());
    }

    #[test]
    fn test_tunnel_domain_uses_fixed_suffix() {
        assert_eq!(
            tunnel_domain("3f1a9c2e-0000-1111-2222-333344445555"),
            "3f1a9c2e-0000-1111-2222-333344445555.cfargotunnel.com"
        );
    }

    #[test]
    fn test_pick_adoption_candidate_empty() {
        assert!(pick_adoption_candidate(vec![]).is_none());
    }

    #[test]
    fn test_pick_adoption_candidate_single() {
        let picked = pick_adoption_candidate(vec![tunnel("a", "edge", None)]).unwrap();
        assert_eq!(picked.id, "a");
    }

    #[test]
    fn test_pick_adoption_candidate_prefers_oldest() {
        let picked = pick_adoption_candidate(vec![
            tunnel("young", "edge", Some("2025-06-01T00:00:00Z")),
            tunnel("old", "edge", Some("2024-01-01T00:00:00Z")),
            tunnel("mid", "edge", Some("2024-12-31T23:59:59Z")),
        ])
        .unwrap();
        assert_eq!(picked.id, "old");
    }

    #[test]
    fn test_pick_adoption_candidate_missing_timestamp_sorts_last() {
        let picked = pick_adoption_candidate(vec![
            tunnel("no-ts", "edge", None),
            tunnel("dated", "edge", Some("2025-01-01T00:00:00Z")),
        ])
        .unwrap();
        assert_eq!(picked.id, "dated");
    }

    #[test]
    fn test_tunnel_info_active_connections() {
        let idle: TunnelInfo = serde_json::from_value(serde_json::json!({
            "id": "t", "name": "edge", "connections": []
        }))
        .unwrap();
        assert!(!idle.has_active_connections());

        let busy: TunnelInfo = serde_json::from_value(serde_json::json!({
            "id": "t", "name": "edge",
            "connections": [{"id": "c1", "colo_name": "AMS"}]
        }))
        .unwrap();
        assert!(busy.has_active_connections());
    }
}
