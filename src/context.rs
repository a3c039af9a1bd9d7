// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for all controllers with reflector stores.
//!
//! This module provides the core infrastructure for the shared reflector
//! store pattern. All controllers receive an `Arc<Context>` that contains:
//! - Kubernetes client
//! - Reflector stores for cfgate CRDs and the consumed Gateway API kinds
//! - The Cloudflare credential cache
//!
//! The stores enable O(1) in-memory lookups for annotation- and
//! reference-based resource selection, eliminating API queries in watch
//! mappers. Watch mappers may over-enqueue; reconciliation is idempotent.

use crate::crd::{CloudflareAccessPolicy, CloudflareDNSSync, CloudflareTunnel, TargetKind};
use crate::credentials::CredentialsCache;
use crate::gateway::{Gateway, GatewayClass, HTTPRoute};
use crate::labels::{ANNOTATION_DNS_SYNC, ANNOTATION_TUNNEL_REF, DNS_SYNC_ENABLED};
use k8s_openapi::api::apps::v1::Deployment;
use kube::runtime::reflector::Store;
use kube::{Client, ResourceExt};
use std::sync::Arc;

/// Shared context passed to all controllers.
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client for API operations
    pub client: Client,

    /// Reflector stores for cross-controller queries
    pub stores: Stores,

    /// Cloudflare client cache keyed by credential secret version
    pub credentials: Arc<CredentialsCache>,
}

/// Collection of all reflector stores for cross-controller queries.
///
/// Each store is populated by a dedicated reflector task and provides
/// in-memory access to resources without API calls.
#[derive(Clone)]
pub struct Stores {
    // cfgate resources
    pub tunnels: Store<CloudflareTunnel>,
    pub dns_syncs: Store<CloudflareDNSSync>,
    pub access_policies: Store<CloudflareAccessPolicy>,

    // Gateway API resources (consumed)
    pub gateway_classes: Store<GatewayClass>,
    pub gateways: Store<Gateway>,
    pub http_routes: Store<HTTPRoute>,

    // Agent deployments owned by tunnels
    pub agent_deployments: Store<Deployment>,
}

/// Parse a `cfgate.io/tunnel-ref` annotation value into `(namespace, name)`.
///
/// The canonical form is `<namespace>/<name>`; a bare name defaults to the
/// annotated object's own namespace.
#[must_use]
pub fn parse_tunnel_ref(value: &str, default_namespace: &str) -> (String, String) {
    match value.split_once('/') {
        Some((namespace, name)) => (namespace.to_string(), name.to_string()),
        None => (default_namespace.to_string(), value.to_string()),
    }
}

/// The `(namespace, name)` of the tunnel a gateway is bound to, if any.
#[must_use]
pub fn gateway_tunnel_ref(gateway: &Gateway) -> Option<(String, String)> {
    let value = gateway.annotations().get(ANNOTATION_TUNNEL_REF)?;
    let namespace = gateway.namespace().unwrap_or_default();
    Some(parse_tunnel_ref(value, &namespace))
}

/// Whether a gateway opts into DNS sync.
#[must_use]
pub fn gateway_dns_sync_enabled(gateway: &Gateway) -> bool {
    gateway
        .annotations()
        .get(ANNOTATION_DNS_SYNC)
        .is_some_and(|v| v == DNS_SYNC_ENABLED)
}

impl Stores {
    /// Get a specific `CloudflareTunnel` by name and namespace.
    #[must_use]
    pub fn get_tunnel(&self, name: &str, namespace: &str) -> Option<Arc<CloudflareTunnel>> {
        self.tunnels
            .state()
            .iter()
            .find(|t| t.name_any() == name && t.namespace().as_deref() == Some(namespace))
            .cloned()
    }

    /// Get a specific `Gateway` by name and namespace.
    #[must_use]
    pub fn get_gateway(&self, name: &str, namespace: &str) -> Option<Arc<Gateway>> {
        self.gateways
            .state()
            .iter()
            .find(|g| g.name_any() == name && g.namespace().as_deref() == Some(namespace))
            .cloned()
    }

    /// Get a specific `GatewayClass` by name (cluster-scoped).
    #[must_use]
    pub fn get_gateway_class(&self, name: &str) -> Option<Arc<GatewayClass>> {
        self.gateway_classes
            .state()
            .iter()
            .find(|gc| gc.name_any() == name)
            .cloned()
    }

    /// Get a specific `HTTPRoute` by name and namespace.
    #[must_use]
    pub fn get_http_route(&self, name: &str, namespace: &str) -> Option<Arc<HTTPRoute>> {
        self.http_routes
            .state()
            .iter()
            .find(|r| r.name_any() == name && r.namespace().as_deref() == Some(namespace))
            .cloned()
    }

    /// Get a specific `Deployment` by name and namespace.
    #[must_use]
    pub fn get_deployment(&self, name: &str, namespace: &str) -> Option<Arc<Deployment>> {
        self.agent_deployments
            .state()
            .iter()
            .find(|d| {
                d.metadata.name.as_deref() == Some(name)
                    && d.metadata.namespace.as_deref() == Some(namespace)
            })
            .cloned()
    }

    /// Gateways bound to a tunnel via the `cfgate.io/tunnel-ref` annotation.
    #[must_use]
    pub fn gateways_for_tunnel(
        &self,
        tunnel_namespace: &str,
        tunnel_name: &str,
    ) -> Vec<Arc<Gateway>> {
        self.gateways
            .state()
            .iter()
            .filter(|gateway| {
                gateway_tunnel_ref(gateway)
                    .is_some_and(|(ns, name)| ns == tunnel_namespace && name == tunnel_name)
            })
            .cloned()
            .collect()
    }

    /// Routes whose `parentRefs` point at a gateway.
    #[must_use]
    pub fn routes_for_gateway(
        &self,
        gateway_namespace: &str,
        gateway_name: &str,
    ) -> Vec<Arc<HTTPRoute>> {
        self.http_routes
            .state()
            .iter()
            .filter(|route| {
                let route_namespace = route.namespace().unwrap_or_default();
                route.spec.parent_refs.as_ref().is_some_and(|parents| {
                    parents.iter().any(|parent| {
                        parent.is_gateway()
                            && parent.name == gateway_name
                            && parent.namespace.as_deref().unwrap_or(&route_namespace)
                                == gateway_namespace
                    })
                })
            })
            .cloned()
            .collect()
    }

    /// The tunnel a gateway is annotated with, resolved through the store.
    #[must_use]
    pub fn tunnel_for_gateway(&self, gateway: &Gateway) -> Option<Arc<CloudflareTunnel>> {
        let (namespace, name) = gateway_tunnel_ref(gateway)?;
        self.get_tunnel(&name, &namespace)
    }

    /// `CloudflareDNSSync` resources referencing a tunnel. Used by watch
    /// mappers to enqueue syncs when the tunnel (or its routes) change.
    #[must_use]
    pub fn dnssyncs_for_tunnel(
        &self,
        tunnel_namespace: &str,
        tunnel_name: &str,
    ) -> Vec<(String, String)> {
        self.dns_syncs
            .state()
            .iter()
            .filter(|sync| {
                let sync_namespace = sync.namespace().unwrap_or_default();
                let ref_namespace = sync
                    .spec
                    .tunnel_ref
                    .namespace
                    .as_deref()
                    .unwrap_or(&sync_namespace);
                sync.spec.tunnel_ref.name == tunnel_name && ref_namespace == tunnel_namespace
            })
            .map(|sync| (sync.name_any(), sync.namespace().unwrap_or_default()))
            .collect()
    }

    /// `CloudflareDNSSync` resources affected by a gateway change: those
    /// whose tunnel the gateway is annotated with.
    #[must_use]
    pub fn dnssyncs_for_gateway(&self, gateway: &Gateway) -> Vec<(String, String)> {
        match gateway_tunnel_ref(gateway) {
            Some((namespace, name)) => self.dnssyncs_for_tunnel(&namespace, &name),
            None => Vec::new(),
        }
    }

    /// Access policies targeting a route or gateway, for watch mappers.
    #[must_use]
    pub fn policies_targeting(
        &self,
        kind: TargetKind,
        target_namespace: &str,
        target_name: &str,
    ) -> Vec<(String, String)> {
        self.access_policies
            .state()
            .iter()
            .filter(|policy| {
                let policy_namespace = policy.namespace().unwrap_or_default();
                let single = policy.spec.target_ref.iter();
                let many = policy.spec.target_refs.iter().flatten();
                single.chain(many).any(|target| {
                    target.kind == kind
                        && target.name == target_name
                        && target.namespace.as_deref().unwrap_or(&policy_namespace)
                            == target_namespace
                })
            })
            .map(|policy| (policy.name_any(), policy.namespace().unwrap_or_default()))
            .collect()
    }

    /// Routes opting into a named access policy via the
    /// `cfgate.io/access-policy` annotation. The annotation only reaches
    /// policies in the route's own namespace.
    #[must_use]
    pub fn routes_annotated_with_policy(
        &self,
        policy_namespace: &str,
        policy_name: &str,
    ) -> Vec<Arc<HTTPRoute>> {
        self.http_routes
            .state()
            .iter()
            .filter(|route| {
                route.namespace().as_deref() == Some(policy_namespace)
                    && route
                        .annotations()
                        .get(crate::labels::ANNOTATION_ACCESS_POLICY)
                        .is_some_and(|name| name == policy_name)
            })
            .cloned()
            .collect()
    }

    /// Number of routes currently bound to a tunnel through annotated
    /// gateways. Reflected on tunnel status.
    #[must_use]
    pub fn connected_route_count(&self, tunnel_namespace: &str, tunnel_name: &str) -> i32 {
        let mut count = 0usize;
        for gateway in self.gateways_for_tunnel(tunnel_namespace, tunnel_name) {
            let gateway_namespace = gateway.namespace().unwrap_or_default();
            count += self
                .routes_for_gateway(&gateway_namespace, &gateway.name_any())
                .len();
        }
        i32::try_from(count).unwrap_or(i32::MAX)
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
