// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster-gated integration tests for the cfgate operator.
//!
//! These tests require a Kubernetes cluster with the cfgate CRDs applied
//! (`cargo run --bin crdgen` + `kubectl apply -f deploy/crds/`) and skip
//! silently when no cluster is reachable.
//!
//! Run with: cargo test --test operator_integration -- --ignored

mod common;

use cfgate::crd::{
    CloudflareCredentials, CloudflareDNSSync, CloudflareDNSSyncSpec, CloudflareTunnel,
    CloudflareTunnelSpec, SecretReference, TunnelReference, ZoneSpec,
};
use common::{cleanup_test_namespace, create_test_namespace, get_kube_client_or_skip};
use kube::api::{Api, DeleteParams, PostParams};
use std::collections::BTreeMap;

const TEST_NAMESPACE: &str = "cfgate-integration-test";

fn test_tunnel(name: &str) -> CloudflareTunnel {
    let mut tunnel = CloudflareTunnel::new(
        name,
        CloudflareTunnelSpec {
            account_id: "0123456789abcdef0123456789abcdef".to_string(),
            name: None,
            cloudflare: CloudflareCredentials {
                secret_ref: SecretReference {
                    name: "cloudflare-api-token".to_string(),
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
    // Orphan policy: the test cluster has no real Cloudflare credentials,
    // so deletion must not try to reach the external API
    let mut annotations = BTreeMap::new();
    annotations.insert("cfgate.io/deletion-policy".to_string(), "orphan".to_string());
    tunnel.metadata.annotations = Some(annotations);
    tunnel.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    tunnel
}

#[tokio::test]
#[ignore] // Run with: cargo test --test operator_integration -- --ignored
async fn test_kubernetes_connectivity() {
    let Some(client) = get_kube_client_or_skip().await else {
        return;
    };

    let version = client.apiserver_version().await.unwrap();
    println!("Connected to Kubernetes {}.{}", version.major, version.minor);
}

#[tokio::test]
#[ignore]
async fn test_tunnel_crud_round_trip() {
    let Some(client) = get_kube_client_or_skip().await else {
        return;
    };

    create_test_namespace(&client, TEST_NAMESPACE).await.unwrap();
    let tunnels: Api<CloudflareTunnel> = Api::namespaced(client.clone(), TEST_NAMESPACE);

    let created = tunnels
        .create(&PostParams::default(), &test_tunnel("it-tunnel"))
        .await
        .unwrap();
    assert_eq!(created.spec.account_id.len(), 32);

    let fetched = tunnels.get("it-tunnel").await.unwrap();
    assert_eq!(
        fetched
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get("cfgate.io/deletion-policy"))
            .map(String::as_str),
        Some("orphan")
    );

    tunnels
        .delete("it-tunnel", &DeleteParams::default())
        .await
        .unwrap();

    cleanup_test_namespace(&client, TEST_NAMESPACE).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_dnssync_crud_round_trip() {
    let Some(client) = get_kube_client_or_skip().await else {
        return;
    };

    create_test_namespace(&client, TEST_NAMESPACE).await.unwrap();
    let syncs: Api<CloudflareDNSSync> = Api::namespaced(client.clone(), TEST_NAMESPACE);

    let sync = CloudflareDNSSync::new(
        "it-dns",
        CloudflareDNSSyncSpec {
            tunnel_ref: TunnelReference {
                name: "it-tunnel".to_string(),
                namespace: None,
            },
            zones: vec![ZoneSpec {
                name: "example.com".to_string(),
                id: None,
            }],
            gateway_routes: None,
            hostnames: None,
            record_defaults: None,
            ownership: None,
            cleanup: None,
            fallback_credentials_ref: None,
        },
    );

    syncs.create(&PostParams::default(), &sync).await.unwrap();
    let fetched = syncs.get("it-dns").await.unwrap();
    assert_eq!(fetched.spec.zones[0].name, "example.com");

    syncs.delete("it-dns", &DeleteParams::default()).await.unwrap();
    cleanup_test_namespace(&client, TEST_NAMESPACE).await.unwrap();
}
