// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `tunnel_resources.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{
        AgentDeploymentSpec, CloudflareCredentials, CloudflareTunnel, CloudflareTunnelSpec,
        SecretReference, TunnelProtocol,
    };
    use crate::tunnel_resources::{
        build_agent_args, build_agent_deployment, build_config_map, build_labels,
        build_owner_references, build_token_secret, config_checksum, config_map_name,
        deployment_name, token_secret_name,
    };

    fn tunnel(name: &str) -> CloudflareTunnel {
        let mut tunnel = CloudflareTunnel::new(
            name,
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
            },
        );
        tunnel.metadata.namespace = Some("edge".to_string());
        tunnel.metadata.uid = Some("uid-1".to_string());
        tunnel
    }

    #[test]
    fn test_child_names() {
        assert_eq!(token_secret_name("edge"), "edge-token");
        assert_eq!(config_map_name("edge"), "edge-config");
        assert_eq!(deployment_name("edge"), "edge-cloudflared");
    }

    #[test]
    fn test_build_labels_selects_tunnel() {
        let labels = build_labels("edge");
        assert_eq!(labels.get("cfgate.io/tunnel").unwrap(), "edge");
        assert_eq!(labels.get("app.kubernetes.io/part-of").unwrap(), "cfgate");
        assert_eq!(
            labels.get("app.kubernetes.io/managed-by").unwrap(),
            "CloudflareTunnel"
        );
    }

    #[test]
    fn test_owner_references_cascade() {
        let refs = build_owner_references(&tunnel("edge"));
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, "CloudflareTunnel");
        assert_eq!(refs[0].name, "edge");
        assert_eq!(refs[0].uid, "uid-1");
        assert_eq!(refs[0].controller, Some(true));
        assert_eq!(refs[0].block_owner_deletion, Some(true));
    }

    #[test]
    fn test_token_secret_shape() {
        let secret = build_token_secret(&tunnel("edge"), "tok-abc");
        assert_eq!(secret.metadata.name.as_deref(), Some("edge-token"));
        assert_eq!(secret.type_.as_deref(), Some("Opaque"));
        let data = secret.string_data.unwrap();
        assert_eq!(data.get("TUNNEL_TOKEN").unwrap(), "tok-abc");
        assert!(secret.metadata.owner_references.is_some());
    }

    #[test]
    fn test_config_map_carries_rendered_document() {
        let cm = build_config_map(&tunnel("edge"), "tunnel: tid\n");
        assert_eq!(cm.metadata.name.as_deref(), Some("edge-config"));
        assert_eq!(cm.data.unwrap().get("config.yaml").unwrap(), "tunnel: tid\n");
    }

    #[test]
    fn test_agent_args_default() {
        let args = build_agent_args(&tunnel("edge"), false);
        assert_eq!(
            args,
            vec![
                "tunnel",
                "--no-autoupdate",
                "--metrics",
                "0.0.0.0:2000",
                "run"
            ]
        );
    }

    #[test]
    fn test_agent_args_protocol_and_config() {
        let mut t = tunnel("edge");
        t.spec.deployment = Some(AgentDeploymentSpec {
            protocol: Some(TunnelProtocol::Quic),
            extra_args: Some(vec!["--loglevel".to_string(), "debug".to_string()]),
            ..Default::default()
        });

        let args = build_agent_args(&t, true);
        assert!(args.windows(2).any(|w| w == ["--protocol", "quic"]));
        assert!(args
            .windows(2)
            .any(|w| w == ["--config", "/etc/cfgate/config.yaml"]));
        assert!(args.windows(2).any(|w| w == ["--loglevel", "debug"]));
        assert_eq!(args.last().map(String::as_str), Some("run"));
    }

    #[test]
    fn test_agent_args_auto_protocol_omitted() {
        let mut t = tunnel("edge");
        t.spec.deployment = Some(AgentDeploymentSpec {
            protocol: Some(TunnelProtocol::Auto),
            ..Default::default()
        });
        let args = build_agent_args(&t, false);
        assert!(!args.iter().any(|a| a == "--protocol"));
    }

    #[test]
    fn test_deployment_defaults() {
        let deployment = build_agent_deployment(&tunnel("edge"), None);
        let spec = deployment.spec.unwrap();
        assert_eq!(spec.replicas, Some(2));

        let pod_spec = spec.template.spec.unwrap();
        let container = &pod_spec.containers[0];
        assert_eq!(container.name, "cloudflared");
        assert!(container
            .image
            .as_deref()
            .unwrap()
            .starts_with("cloudflare/cloudflared"));

        // Token env sourced from the child secret
        let env = container.env.as_ref().unwrap();
        let token_env = env.iter().find(|e| e.name == "TUNNEL_TOKEN").unwrap();
        let selector = token_env
            .value_from
            .as_ref()
            .unwrap()
            .secret_key_ref
            .as_ref()
            .unwrap();
        assert_eq!(selector.name, "edge-token");
        assert_eq!(selector.key, "TUNNEL_TOKEN");

        // Probes hit /ready on the metrics port
        let readiness = container.readiness_probe.as_ref().unwrap();
        let http_get = readiness.http_get.as_ref().unwrap();
        assert_eq!(http_get.path.as_deref(), Some("/ready"));

        // Remote-config mode mounts no config volume
        assert!(pod_spec.volumes.is_none());
        assert!(container.volume_mounts.is_none());
    }

    #[test]
    fn test_deployment_replica_override_and_checksum() {
        let mut t = tunnel("edge");
        t.spec.deployment = Some(AgentDeploymentSpec {
            replicas: Some(5),
            ..Default::default()
        });

        let deployment = build_agent_deployment(&t, Some("abc123"));
        let spec = deployment.spec.unwrap();
        assert_eq!(spec.replicas, Some(5));

        let template_meta = spec.template.metadata.unwrap();
        assert_eq!(
            template_meta
                .annotations
                .unwrap()
                .get("cfgate.io/config-checksum")
                .unwrap(),
            "abc123"
        );

        let pod_spec = spec.template.spec.unwrap();
        assert!(pod_spec.volumes.is_some());
        assert!(pod_spec.containers[0].volume_mounts.is_some());
    }

    #[test]
    fn test_config_checksum_is_stable_hex() {
        let a = config_checksum("tunnel: tid\n");
        let b = config_checksum("tunnel: tid\n");
        let c = config_checksum("tunnel: other\n");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }
}
