// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Consumed subset of the Gateway API resource model.
//!
//! cfgate watches `gateway.networking.k8s.io` resources but does not install
//! or own their CRDs; this module models exactly the fields the reconcilers
//! consume (route hostnames, parent references, listener admission rules,
//! reference grants) plus the route status stanza cfgate writes. Fields the
//! operator never reads are intentionally absent; unknown fields are ignored
//! on deserialization.

use crate::crd::Condition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `GatewayClass` binds gateways to the controller that implements them.
///
/// cfgate only consumes `spec.controllerName` to decide whether a gateway
/// belongs to it.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1",
    kind = "GatewayClass",
    doc = "GatewayClass (consumed subset): the controllerName cfgate matches against its own."
)]
#[serde(rename_all = "camelCase")]
pub struct GatewayClassSpec {
    /// Controller responsible for gateways of this class.
    pub controller_name: String,
}

/// Which namespaces a listener admits routes from.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteNamespaces {
    /// `All`, `Same`, or `Selector`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    /// Namespace label selector, used when `from` is `Selector`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
}

/// Route admission rules of a listener.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AllowedRoutes {
    /// Namespace admission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<RouteNamespaces>,
}

/// One listener of a gateway.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Listener {
    /// Listener name, referenced by route `sectionName`.
    pub name: String,

    /// Hostname the listener matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Listener port.
    pub port: i32,

    /// Listener protocol.
    pub protocol: String,

    /// Route admission rules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_routes: Option<AllowedRoutes>,
}

/// `Gateway` (consumed subset).
///
/// The `cfgate.io/tunnel-ref` and `cfgate.io/dns-sync` annotations on a
/// gateway bind it to a tunnel and opt it into hostname discovery.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1",
    kind = "Gateway",
    namespaced,
    doc = "Gateway (consumed subset): class name, listeners, and the cfgate annotations."
)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySpec {
    /// Name of the `GatewayClass` this gateway belongs to.
    pub gateway_class_name: String,

    /// Listeners exposed by the gateway.
    #[serde(default)]
    pub listeners: Vec<Listener>,
}

/// Reference from a route to a parent it wants to attach to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParentReference {
    /// Group of the parent. Defaults to `gateway.networking.k8s.io`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// Kind of the parent. Defaults to `Gateway`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Name of the parent.
    pub name: String,

    /// Namespace of the parent. Defaults to the route's namespace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Listener name within the parent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
}

impl ParentReference {
    /// Whether this reference points at a Gateway in the Gateway API group,
    /// accounting for the defaulted fields.
    #[must_use]
    pub fn is_gateway(&self) -> bool {
        self.kind.as_deref().is_none_or(|k| k == "Gateway")
            && self
                .group
                .as_deref()
                .is_none_or(|g| g == crate::constants::GATEWAY_API_GROUP)
    }
}

/// Reference from a route rule to a backend.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackendRef {
    /// Group of the backend. Empty (core) for `Service`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// Kind of the backend. Defaults to `Service`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Name of the backend.
    pub name: String,

    /// Namespace of the backend. Defaults to the route's namespace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Backend port.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
}

/// One rule of an HTTP route (consumed subset: backends only).
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HTTPRouteRule {
    /// Backends traffic is forwarded to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_refs: Option<Vec<BackendRef>>,
}

/// Attachment status of a route to one parent.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteParentStatus {
    /// The parent this entry reports on.
    pub parent_ref: ParentReference,

    /// Controller that wrote this entry. Entries from foreign controllers
    /// are preserved verbatim.
    pub controller_name: String,

    /// `Accepted` and `ResolvedRefs` conditions.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Status stanza shared by all route kinds.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteStatus {
    /// One entry per parent reference, per controller.
    #[serde(default)]
    pub parents: Vec<RouteParentStatus>,
}

/// `HTTPRoute` (consumed subset).
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1",
    kind = "HTTPRoute",
    namespaced,
    doc = "HTTPRoute (consumed subset): hostnames, parent references, backend references, and the parent status cfgate stamps."
)]
#[kube(status = "RouteStatus")]
#[serde(rename_all = "camelCase")]
pub struct HTTPRouteSpec {
    /// Parents the route wants to attach to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_refs: Option<Vec<ParentReference>>,

    /// Hostnames the route serves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostnames: Option<Vec<String>>,

    /// Routing rules (backends only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<HTTPRouteRule>>,
}

/// `GRPCRoute` (consumed subset).
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1",
    kind = "GRPCRoute",
    namespaced,
    doc = "GRPCRoute (consumed subset): hostnames and parent references."
)]
#[kube(status = "RouteStatus")]
#[serde(rename_all = "camelCase")]
pub struct GRPCRouteSpec {
    /// Parents the route wants to attach to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_refs: Option<Vec<ParentReference>>,

    /// Hostnames the route serves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostnames: Option<Vec<String>>,
}

/// `TCPRoute` (consumed subset). The kind has no hostname field; the
/// `cfgate.io/hostname` annotation supplies one.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1alpha2",
    kind = "TCPRoute",
    namespaced,
    doc = "TCPRoute (consumed subset): parent references; hostname via annotation."
)]
#[kube(status = "RouteStatus")]
#[serde(rename_all = "camelCase")]
pub struct TCPRouteSpec {
    /// Parents the route wants to attach to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_refs: Option<Vec<ParentReference>>,
}

/// `UDPRoute` (consumed subset). The kind has no hostname field; the
/// `cfgate.io/hostname` annotation supplies one.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1alpha2",
    kind = "UDPRoute",
    namespaced,
    doc = "UDPRoute (consumed subset): parent references; hostname via annotation."
)]
#[kube(status = "RouteStatus")]
#[serde(rename_all = "camelCase")]
pub struct UDPRouteSpec {
    /// Parents the route wants to attach to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_refs: Option<Vec<ParentReference>>,
}

/// Source side of a reference grant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceGrantFrom {
    /// Group of the referencing resource.
    pub group: String,

    /// Kind of the referencing resource.
    pub kind: String,

    /// Namespace of the referencing resource.
    pub namespace: String,
}

/// Target side of a reference grant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceGrantTo {
    /// Group of the referenced resource.
    pub group: String,

    /// Kind of the referenced resource.
    pub kind: String,

    /// Restrict the grant to a single resource name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// `ReferenceGrant` permits cross-namespace references into its namespace.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1beta1",
    kind = "ReferenceGrant",
    namespaced,
    doc = "ReferenceGrant (consumed subset): from/to pairs cfgate checks before honoring cross-namespace policy targets."
)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceGrantSpec {
    /// Permitted referencing resources.
    pub from: Vec<ReferenceGrantFrom>,

    /// Referenceable resources in the grant's namespace.
    pub to: Vec<ReferenceGrantTo>,
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod gateway_tests;
