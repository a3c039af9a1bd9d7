// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the tunnel status updater.

#[cfg(test)]
mod tests {
    use crate::crd::{
        CloudflareCredentials, CloudflareTunnel, CloudflareTunnelSpec, CloudflareTunnelStatus,
        SecretReference,
    };
    use crate::reconcilers::status::find_condition;
    use crate::reconcilers::tunnel::status_helpers::{
        TunnelStatusUpdater, CONDITION_CREDENTIALS_VALID, CONDITION_READY,
    };

    fn tunnel_with_status(status: Option<CloudflareTunnelStatus>) -> CloudflareTunnel {
        let mut tunnel = CloudflareTunnel::new(
            "edge",
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
        tunnel.metadata.generation = Some(3);
        tunnel.status = status;
        tunnel
    }

    #[test]
    fn test_fresh_updater_is_unchanged() {
        let updater = TunnelStatusUpdater::new(&tunnel_with_status(None));
        assert!(!updater.is_changed());
    }

    #[test]
    fn test_setting_identity_marks_changed() {
        let mut updater = TunnelStatusUpdater::new(&tunnel_with_status(None));
        updater.set_tunnel_identity("tid", "edge", "tid.cfargotunnel.com");
        assert!(updater.is_changed());
    }

    #[test]
    fn test_identical_identity_does_not_mark_changed() {
        let status = CloudflareTunnelStatus {
            tunnel_id: Some("tid".to_string()),
            tunnel_name: Some("edge".to_string()),
            tunnel_domain: Some("tid.cfargotunnel.com".to_string()),
            ..Default::default()
        };
        let mut updater = TunnelStatusUpdater::new(&tunnel_with_status(Some(status)));
        updater.set_tunnel_identity("tid", "edge", "tid.cfargotunnel.com");
        assert!(!updater.is_changed());
    }

    #[test]
    fn test_condition_flip_marks_changed() {
        let mut updater = TunnelStatusUpdater::new(&tunnel_with_status(None));
        updater.set_credentials_valid(true, "verified");
        assert!(updater.is_changed());
    }

    #[test]
    fn test_same_condition_twice_changes_once() {
        let mut first = TunnelStatusUpdater::new(&tunnel_with_status(None));
        first.set_credentials_valid(true, "verified");

        // Simulate the second reconciliation: start from the written status
        let status = CloudflareTunnelStatus {
            conditions: vec![crate::reconcilers::status::create_condition(
                CONDITION_CREDENTIALS_VALID,
                "True",
                "TokenVerified",
                "verified",
            )],
            ..Default::default()
        };
        let mut second = TunnelStatusUpdater::new(&tunnel_with_status(Some(status)));
        second.set_credentials_valid(true, "verified");
        assert!(!second.is_changed());
    }

    #[test]
    fn test_ready_replicas_and_observed_generation() {
        let mut updater = TunnelStatusUpdater::new(&tunnel_with_status(None));
        updater.set_ready_replicas(2);
        updater.set_observed_generation();
        assert!(updater.is_changed());
        assert_eq!(updater.ready_replicas(), Some(2));
    }

    #[test]
    fn test_conditions_accumulate_by_type() {
        let mut updater = TunnelStatusUpdater::new(&tunnel_with_status(None));
        updater.set_condition(CONDITION_READY, "False", "AgentNotReady", "0/2 ready");
        updater.set_condition(CONDITION_READY, "True", "AgentReady", "2/2 ready");
        updater.set_credentials_valid(true, "verified");
        assert!(updater.is_changed());
    }

    #[test]
    fn test_find_condition_helper_round_trip() {
        let status = CloudflareTunnelStatus {
            conditions: vec![crate::reconcilers::status::create_condition(
                CONDITION_READY,
                "True",
                "AgentReady",
                "2/2 ready",
            )],
            ..Default::default()
        };
        let found = find_condition(&status.conditions, CONDITION_READY).unwrap();
        assert_eq!(found.status, "True");
    }
}
