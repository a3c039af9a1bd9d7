// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes resource builders for the tunnel agent.
//!
//! This module provides functions to build the child resources of a
//! `CloudflareTunnel` (`Deployment`, token `Secret`, config `ConfigMap`).
//! All functions are pure and easily testable.

use crate::constants::{
    AGENT_CONFIG_FILENAME, AGENT_CONFIG_MOUNT_PATH, AGENT_METRICS_PORT, AGENT_READY_PATH,
    API_GROUP_VERSION, DEFAULT_AGENT_IMAGE, DEFAULT_AGENT_REPLICAS, KIND_TUNNEL,
    LIVENESS_FAILURE_THRESHOLD, LIVENESS_INITIAL_DELAY_SECS, LIVENESS_PERIOD_SECS,
    LIVENESS_TIMEOUT_SECS, READINESS_FAILURE_THRESHOLD, READINESS_INITIAL_DELAY_SECS,
    READINESS_PERIOD_SECS, READINESS_TIMEOUT_SECS, TUNNEL_TOKEN_ENV, TUNNEL_TOKEN_SECRET_KEY,
};
use crate::crd::{CloudflareTunnel, TunnelProtocol};
use crate::labels::{
    ANNOTATION_CONFIG_CHECKSUM, APP_NAME_CLOUDFLARED, COMPONENT_TUNNEL_AGENT, K8S_COMPONENT,
    K8S_INSTANCE, K8S_MANAGED_BY, K8S_NAME, K8S_PART_OF, MANAGED_BY_TUNNEL, PART_OF_CFGATE,
    TUNNEL_LABEL,
};
use k8s_openapi::api::{
    apps::v1::{Deployment, DeploymentSpec},
    core::v1::{
        ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, EnvVar, EnvVarSource,
        HTTPGetAction, PodSpec, PodTemplateSpec, Probe, Secret, SecretKeySelector, Volume,
        VolumeMount,
    },
};
use k8s_openapi::apimachinery::pkg::{
    apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference},
    util::intstr::IntOrString,
};
use kube::ResourceExt;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::debug;

const VOLUME_CONFIG: &str = "agent-config";

/// Name of the child token secret for a tunnel.
#[must_use]
pub fn token_secret_name(tunnel_name: &str) -> String {
    format!("{tunnel_name}-token")
}

/// Name of the child config map for a tunnel.
#[must_use]
pub fn config_map_name(tunnel_name: &str) -> String {
    format!("{tunnel_name}-config")
}

/// Name of the child agent deployment for a tunnel.
#[must_use]
pub fn deployment_name(tunnel_name: &str) -> String {
    format!("{tunnel_name}-cloudflared")
}

/// Builds standardized Kubernetes labels for tunnel child resources.
#[must_use]
pub fn build_labels(tunnel_name: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert("app".into(), APP_NAME_CLOUDFLARED.into());
    labels.insert(TUNNEL_LABEL.into(), tunnel_name.into());
    labels.insert(K8S_NAME.into(), APP_NAME_CLOUDFLARED.into());
    labels.insert(K8S_INSTANCE.into(), tunnel_name.into());
    labels.insert(K8S_COMPONENT.into(), COMPONENT_TUNNEL_AGENT.into());
    labels.insert(K8S_MANAGED_BY.into(), MANAGED_BY_TUNNEL.into());
    labels.insert(K8S_PART_OF.into(), PART_OF_CFGATE.into());
    labels
}

/// Builds owner references for a resource owned by a `CloudflareTunnel`.
///
/// Sets up cascade deletion so that when the tunnel resource is deleted, its
/// child resources are automatically deleted with it.
#[must_use]
pub fn build_owner_references(tunnel: &CloudflareTunnel) -> Vec<OwnerReference> {
    vec![OwnerReference {
        api_version: API_GROUP_VERSION.to_string(),
        kind: KIND_TUNNEL.to_string(),
        name: tunnel.name_any(),
        uid: tunnel.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }]
}

/// Hex sha256 of a rendered config document, stamped onto the pod template
/// so config changes roll the agent pods.
#[must_use]
pub fn config_checksum(rendered: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(rendered.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Builds the child `Opaque` secret holding the connector token.
#[must_use]
pub fn build_token_secret(tunnel: &CloudflareTunnel, token: &str) -> Secret {
    let name = tunnel.name_any();
    let namespace = tunnel.namespace().unwrap_or_default();

    debug!(tunnel = %name, namespace = %namespace, "Building tunnel token secret");

    let mut string_data = BTreeMap::new();
    string_data.insert(TUNNEL_TOKEN_SECRET_KEY.to_string(), token.to_string());

    Secret {
        metadata: ObjectMeta {
            name: Some(token_secret_name(&name)),
            namespace: Some(namespace),
            labels: Some(build_labels(&name)),
            owner_references: Some(build_owner_references(tunnel)),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        string_data: Some(string_data),
        ..Default::default()
    }
}

/// Builds the child `ConfigMap` carrying the rendered agent config document.
#[must_use]
pub fn build_config_map(tunnel: &CloudflareTunnel, rendered: &str) -> ConfigMap {
    let name = tunnel.name_any();
    let namespace = tunnel.namespace().unwrap_or_default();

    let mut data = BTreeMap::new();
    data.insert(AGENT_CONFIG_FILENAME.to_string(), rendered.to_string());

    ConfigMap {
        metadata: ObjectMeta {
            name: Some(config_map_name(&name)),
            namespace: Some(namespace),
            labels: Some(build_labels(&name)),
            owner_references: Some(build_owner_references(tunnel)),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    }
}

/// Build the agent container command line.
///
/// `--protocol` is omitted for `auto`; `--config` only appears with inline
/// ingress; extra args slot in before the final `run`.
#[must_use]
pub fn build_agent_args(tunnel: &CloudflareTunnel, with_config_file: bool) -> Vec<String> {
    let mut args = vec![
        "tunnel".to_string(),
        "--no-autoupdate".to_string(),
        "--metrics".to_string(),
        format!("0.0.0.0:{AGENT_METRICS_PORT}"),
    ];

    let deployment = tunnel.spec.deployment.as_ref();

    match deployment.and_then(|d| d.protocol) {
        None | Some(TunnelProtocol::Auto) => {}
        Some(TunnelProtocol::Quic) => {
            args.push("--protocol".to_string());
            args.push("quic".to_string());
        }
        Some(TunnelProtocol::Http2) => {
            args.push("--protocol".to_string());
            args.push("http2".to_string());
        }
    }

    if with_config_file {
        args.push("--config".to_string());
        args.push(format!("{AGENT_CONFIG_MOUNT_PATH}/{AGENT_CONFIG_FILENAME}"));
    }

    if let Some(extra) = deployment.and_then(|d| d.extra_args.as_ref()) {
        args.extend(extra.iter().cloned());
    }

    args.push("run".to_string());
    args
}

fn probe(initial_delay: i32, period: i32, timeout: i32, failure_threshold: i32) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(AGENT_READY_PATH.to_string()),
            port: IntOrString::Int(i32::from(AGENT_METRICS_PORT)),
            ..Default::default()
        }),
        initial_delay_seconds: Some(initial_delay),
        period_seconds: Some(period),
        timeout_seconds: Some(timeout),
        failure_threshold: Some(failure_threshold),
        ..Default::default()
    }
}

/// Builds the agent `Deployment` for a tunnel.
///
/// # Arguments
///
/// * `tunnel` - The owning `CloudflareTunnel`
/// * `config_checksum` - sha256 of the rendered config document when inline
///   ingress is used; its presence switches the agent to config-file mode
#[must_use]
pub fn build_agent_deployment(
    tunnel: &CloudflareTunnel,
    config_checksum: Option<&str>,
) -> Deployment {
    let name = tunnel.name_any();
    let namespace = tunnel.namespace().unwrap_or_default();
    let labels = build_labels(&name);
    let deployment_spec = tunnel.spec.deployment.as_ref();

    debug!(tunnel = %name, namespace = %namespace, "Building agent deployment");

    let image = deployment_spec
        .and_then(|d| d.image.clone())
        .unwrap_or_else(|| DEFAULT_AGENT_IMAGE.to_string());
    let replicas = deployment_spec
        .and_then(|d| d.replicas)
        .unwrap_or(DEFAULT_AGENT_REPLICAS);

    let mut pod_annotations = BTreeMap::new();
    if let Some(checksum) = config_checksum {
        pod_annotations.insert(ANNOTATION_CONFIG_CHECKSUM.to_string(), checksum.to_string());
    }

    let mut volume_mounts: Option<Vec<VolumeMount>> = None;
    let mut volumes: Option<Vec<Volume>> = None;
    if config_checksum.is_some() {
        volume_mounts = Some(vec![VolumeMount {
            name: VOLUME_CONFIG.to_string(),
            mount_path: AGENT_CONFIG_MOUNT_PATH.to_string(),
            read_only: Some(true),
            ..Default::default()
        }]);
        volumes = Some(vec![Volume {
            name: VOLUME_CONFIG.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: config_map_name(&name),
                ..Default::default()
            }),
            ..Default::default()
        }]);
    }

    let container = Container {
        name: APP_NAME_CLOUDFLARED.to_string(),
        image: Some(image),
        image_pull_policy: deployment_spec.and_then(|d| d.image_pull_policy.clone()),
        args: Some(build_agent_args(tunnel, config_checksum.is_some())),
        env: Some(vec![EnvVar {
            name: TUNNEL_TOKEN_ENV.to_string(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: token_secret_name(&name),
                    key: TUNNEL_TOKEN_SECRET_KEY.to_string(),
                    optional: Some(false),
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]),
        ports: Some(vec![ContainerPort {
            name: Some("metrics".to_string()),
            container_port: i32::from(AGENT_METRICS_PORT),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        liveness_probe: Some(probe(
            LIVENESS_INITIAL_DELAY_SECS,
            LIVENESS_PERIOD_SECS,
            LIVENESS_TIMEOUT_SECS,
            LIVENESS_FAILURE_THRESHOLD,
        )),
        readiness_probe: Some(probe(
            READINESS_INITIAL_DELAY_SECS,
            READINESS_PERIOD_SECS,
            READINESS_TIMEOUT_SECS,
            READINESS_FAILURE_THRESHOLD,
        )),
        resources: deployment_spec.and_then(|d| d.resources.clone()),
        volume_mounts,
        ..Default::default()
    };

    Deployment {
        metadata: ObjectMeta {
            name: Some(deployment_name(&name)),
            namespace: Some(namespace),
            labels: Some(labels.clone()),
            owner_references: Some(build_owner_references(tunnel)),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    annotations: if pod_annotations.is_empty() {
                        None
                    } else {
                        Some(pod_annotations)
                    },
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    node_selector: deployment_spec.and_then(|d| d.node_selector.clone()),
                    tolerations: deployment_spec.and_then(|d| d.tolerations.clone()),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
#[path = "tunnel_resources_tests.rs"]
mod tunnel_resources_tests;
