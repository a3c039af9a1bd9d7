// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for Cloudflare state management.
//!
//! This module defines all Kubernetes Custom Resource Definitions used by cfgate
//! to project declarative desired state onto the Cloudflare control plane.
//!
//! # Resource Types
//!
//! ## Tunnels
//!
//! - [`CloudflareTunnel`] - A named Cloudflare Tunnel plus the in-cluster agent
//!   deployment that serves it
//!
//! ## DNS
//!
//! - [`CloudflareDNSSync`] - A binding from a tunnel to a set of hostnames that
//!   are converged to CNAME records in Cloudflare zones
//!
//! ## Zero Trust
//!
//! - [`CloudflareAccessPolicy`] - An Access application with rules attached to
//!   Gateway API targets
//!
//! # Example: Creating a Tunnel
//!
//! ```rust,no_run
//! use cfgate::crd::{CloudflareCredentials, CloudflareTunnelSpec, SecretReference};
//!
//! let spec = CloudflareTunnelSpec {
//!     account_id: "0123456789abcdef0123456789abcdef".to_string(),
//!     name: Some("edge-tunnel".to_string()),
//!     cloudflare: CloudflareCredentials {
//!         secret_ref: SecretReference {
//!             name: "cloudflare-api-token".to_string(),
//!             namespace: None,
//!         },
//!         api_token_key: None,
//!     },
//!     deployment: None,
//!     origin: None,
//!     ingress: None,
//!     dns: None,
//! };
//! ```

use k8s_openapi::api::core::v1::{ResourceRequirements, Toleration};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Condition represents an observation of a resource's current state.
///
/// Conditions are used in status subresources to communicate the state of
/// a resource to users and controllers.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition. Common types include: Ready, `CredentialsValid`,
    /// `TunnelConfigured`, `ZonesResolved`, `DNSSynced`, `DeletionBlocked`.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Reference to a Kubernetes Secret, optionally in another namespace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    /// Name of the secret.
    pub name: String,

    /// Namespace of the secret. Defaults to the namespace of the referencing
    /// resource.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Cloudflare API credentials sourced from a Kubernetes Secret.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudflareCredentials {
    /// Secret containing the API token.
    pub secret_ref: SecretReference,

    /// Data key holding the token. Defaults to `CLOUDFLARE_API_TOKEN`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token_key: Option<String>,
}

/// Reference to a `CloudflareTunnel`, optionally in another namespace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TunnelReference {
    /// Name of the `CloudflareTunnel`.
    pub name: String,

    /// Namespace of the tunnel. Defaults to the namespace of the referencing
    /// resource.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

// ============================================================================
// Tunnel
// ============================================================================

/// Transport protocol the tunnel agent uses towards the Cloudflare edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TunnelProtocol {
    /// Let the agent negotiate (the `--protocol` flag is omitted).
    Auto,
    /// Force QUIC.
    Quic,
    /// Force HTTP/2.
    Http2,
}

/// Agent deployment settings for a tunnel.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentDeploymentSpec {
    /// Container image for the tunnel agent.
    /// Defaults to the pinned `cloudflare/cloudflared` release.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Image pull policy for the agent container.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,

    /// Number of agent replicas. Defaults to 2.
    #[schemars(range(min = 0, max = 64))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Node selector applied to the agent pods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,

    /// Tolerations applied to the agent pods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerations: Option<Vec<Toleration>>,

    /// Resource requests/limits for the agent container.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// Additional arguments appended to the agent command line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_args: Option<Vec<String>>,

    /// Edge transport protocol. Defaults to `auto`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<TunnelProtocol>,
}

/// Origin connection options, applied tunnel-wide or per ingress rule.
///
/// Route-level annotations (`cfgate.io/origin-*`) override these field-wise
/// for the rules generated from that route.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OriginConfig {
    /// Timeout for establishing a connection to the origin, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u32>,

    /// Disable TLS verification of the origin certificate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_tls_verify: Option<bool>,

    /// Host header to send to the origin instead of the request host.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_host_header: Option<String>,

    /// SNI server name for origin TLS handshakes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_server_name: Option<String>,

    /// Path to a CA bundle used to verify the origin certificate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_pool: Option<String>,

    /// Use HTTP/2 towards the origin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http2_origin: Option<bool>,
}

/// One inline ingress rule of the tunnel agent configuration.
///
/// Inline ingress is the alternative to remote-config mode: when any rules
/// are present the operator renders a full agent config document and mounts
/// it into the agent pods. The final rule is always a catch-all; one is
/// appended if the list does not end with one.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngressRuleSpec {
    /// Hostname the rule matches. Absent on the catch-all rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Path regex the rule matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Service to proxy to, e.g. `http://web.apps.svc:8080` or `http_status:404`.
    pub service: String,

    /// Origin options overriding the tunnel-wide defaults for this rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<OriginConfig>,
}

/// A Cloudflare zone, by name and optionally a pre-resolved id.
///
/// Supplying `id` bypasses the name lookup and the last-two-labels zone
/// heuristic, which is required for multi-label public suffixes (`co.uk`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSpec {
    /// Zone name, e.g. `example.com`.
    pub name: String,

    /// Pre-resolved zone id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Defaults applied to records the operator creates.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordDefaults {
    /// Proxy records through Cloudflare. Defaults to true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxied: Option<bool>,

    /// Record TTL in seconds; `1` means automatic. Defaults to 1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
}

/// Ownership marker configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipConfig {
    /// Maintain a companion TXT record `<prefix>.<hostname>` carrying the
    /// owner id. Defaults to true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txt_record: Option<bool>,

    /// Prefix of the companion TXT record. Defaults to `_cfgate`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txt_prefix: Option<String>,

    /// Stamp the ownership comment onto managed records. Defaults to true.
    /// Disabling this effectively orphans every record the operator creates:
    /// without the marker they are never updated or deleted again.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<bool>,
}

/// Cleanup behavior for externally created DNS records.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CleanupPolicy {
    /// Delete a managed record when its route (or explicit entry) disappears
    /// from the desired set. Defaults to true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_route_removal: Option<bool>,

    /// Delete managed records when the owning resource is deleted.
    /// Defaults to true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<bool>,

    /// Restrict deletion-path cleanup to records whose ownership comment
    /// names this tunnel. Defaults to true. Records without the ownership
    /// marker are never touched regardless of this setting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub only_managed: Option<bool>,
}

/// DNS management settings, shared between the tunnel (defaults) and
/// `CloudflareDNSSync` (overrides).
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DnsConfig {
    /// Zones managed records may live in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zones: Option<Vec<ZoneSpec>>,

    /// Defaults for created records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_defaults: Option<RecordDefaults>,

    /// Ownership marker configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ownership: Option<OwnershipConfig>,

    /// Cleanup behavior.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<CleanupPolicy>,
}

/// `CloudflareTunnel` declares one Cloudflare Tunnel and the in-cluster agent
/// deployment serving it.
///
/// The operator converges `(accountId, name)` to exactly one external tunnel,
/// adopting a pre-existing tunnel with a matching name instead of creating a
/// duplicate. A connector token is materialized into a child secret and a
/// `cloudflared` deployment authenticates with it.
///
/// Deletion honors the `cfgate.io/deletion-policy` annotation: `delete`
/// (default) removes the external tunnel; `orphan` leaves it behind.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cfgate.io",
    version = "v1alpha1",
    kind = "CloudflareTunnel",
    namespaced,
    shortname = "cft",
    shortname = "tunnel",
    doc = "CloudflareTunnel declares a named Cloudflare Tunnel plus the in-cluster cloudflared deployment that serves it. Pre-existing external tunnels with a matching name are adopted.",
    printcolumn = r#"{"name":"TunnelId","type":"string","jsonPath":".status.tunnelId"}"#,
    printcolumn = r#"{"name":"Domain","type":"string","jsonPath":".status.tunnelDomain"}"#,
    printcolumn = r#"{"name":"Replicas","type":"integer","jsonPath":".status.readyReplicas"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#
)]
#[kube(status = "CloudflareTunnelStatus")]
#[serde(rename_all = "camelCase")]
pub struct CloudflareTunnelSpec {
    /// Cloudflare account the tunnel belongs to.
    #[schemars(regex(pattern = r"^[0-9a-f]{32}$"))]
    pub account_id: String,

    /// External tunnel name. Defaults to the resource name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// API credentials used for every Cloudflare call on behalf of this tunnel.
    pub cloudflare: CloudflareCredentials,

    /// Agent deployment settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<AgentDeploymentSpec>,

    /// Tunnel-wide origin connection defaults.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<OriginConfig>,

    /// Inline ingress rules. When present the operator renders a config
    /// document and mounts it into the agent pods; when absent the tunnel
    /// runs in remote-config mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingress: Option<Vec<IngressRuleSpec>>,

    /// DNS management defaults inherited by `CloudflareDNSSync` resources
    /// referencing this tunnel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns: Option<DnsConfig>,
}

/// `CloudflareTunnel` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudflareTunnelStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    /// Id of the external tunnel (created or adopted).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tunnel_id: Option<String>,
    /// Name of the external tunnel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tunnel_name: Option<String>,
    /// DNS name CNAME targets point at: `<tunnelId>.cfargotunnel.com`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tunnel_domain: Option<String>,
    /// Ready replicas of the agent deployment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_replicas: Option<i32>,
    /// Number of routes currently bound to this tunnel through annotated gateways.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_route_count: Option<i32>,
}

// ============================================================================
// DNS Sync
// ============================================================================

/// Hostname discovery from Gateway API routes.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRouteSource {
    /// Collect hostnames from routes attached to gateways annotated with this
    /// tunnel (`cfgate.io/tunnel-ref`) and `cfgate.io/dns-sync: enabled`.
    pub enabled: bool,

    /// Only include routes carrying this annotation. Either `key` (any value)
    /// or `key=value`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation_filter: Option<String>,
}

/// An explicitly declared hostname.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExplicitHostname {
    /// Fully qualified hostname to manage.
    pub hostname: String,

    /// Record target template. `{{ .TunnelDomain }}` expands to the tunnel's
    /// domain. Defaults to the tunnel domain itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Override the proxied default for this record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxied: Option<bool>,

    /// Override the TTL default for this record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
}

/// `CloudflareDNSSync` binds a tunnel to a set of hostnames and converges
/// each of them to a CNAME pointing at the tunnel domain.
///
/// Hostnames come from an explicit list, from Gateway API routes, or both.
/// Records the operator did not create (no ownership marker in the record
/// comment) are reported but never modified or deleted.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cfgate.io",
    version = "v1alpha1",
    kind = "CloudflareDNSSync",
    namespaced,
    shortname = "cfdns",
    doc = "CloudflareDNSSync derives a hostname set from Gateway API routes and explicit declarations and converges Cloudflare DNS to it, subject to ownership rules.",
    printcolumn = r#"{"name":"Tunnel","type":"string","jsonPath":".spec.tunnelRef.name"}"#,
    printcolumn = r#"{"name":"Synced","type":"integer","jsonPath":".status.syncedRecords"}"#,
    printcolumn = r#"{"name":"Failed","type":"integer","jsonPath":".status.failedRecords"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#
)]
#[kube(status = "CloudflareDNSSyncStatus")]
#[serde(rename_all = "camelCase")]
pub struct CloudflareDNSSyncSpec {
    /// Tunnel whose domain the records point at and whose credentials are used.
    pub tunnel_ref: TunnelReference,

    /// Zones managed records may live in.
    pub zones: Vec<ZoneSpec>,

    /// Hostname discovery from Gateway API routes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_routes: Option<GatewayRouteSource>,

    /// Explicitly declared hostnames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostnames: Option<Vec<ExplicitHostname>>,

    /// Defaults for created records. Overrides the tunnel's `dns.recordDefaults`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_defaults: Option<RecordDefaults>,

    /// Ownership marker configuration. Overrides the tunnel's `dns.ownership`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ownership: Option<OwnershipConfig>,

    /// Cleanup behavior. Overrides the tunnel's `dns.cleanup`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<CleanupPolicy>,

    /// Credentials used for deletion-path cleanup when the tunnel (and its
    /// credential secret) is already gone. The secret must carry a
    /// `CLOUDFLARE_API_TOKEN` key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_credentials_ref: Option<SecretReference>,
}

/// Convergence state of one managed record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum RecordSyncState {
    /// The external record matches the desired state (or is a reported
    /// foreign record left untouched).
    Synced,
    /// The record has not been converged yet.
    Pending,
    /// The last convergence attempt failed; see `error`.
    Failed,
}

/// Status entry for one hostname under management.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncedRecordStatus {
    /// The hostname.
    pub hostname: String,

    /// Record type, `CNAME` for tunnel records.
    pub r#type: String,

    /// Record content (the tunnel domain, or a templated target).
    pub target: String,

    /// Whether the record is proxied.
    pub proxied: bool,

    /// Convergence state.
    pub status: RecordSyncState,

    /// External record id, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,

    /// Error message for failed records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `CloudflareDNSSync` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudflareDNSSyncStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    /// Per-record convergence state.
    #[serde(default)]
    pub records: Vec<SyncedRecordStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synced_records: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_records: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_records: Option<i32>,
    /// RFC3339 time of the last completed sync. Writes that would change only
    /// this field are skipped to avoid a reconciliation feedback loop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<String>,
}

// ============================================================================
// Access Policy
// ============================================================================

/// Gateway API kind an access policy can target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum TargetKind {
    Gateway,
    HTTPRoute,
    GRPCRoute,
    TCPRoute,
    UDPRoute,
}

impl TargetKind {
    /// The Kubernetes kind string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TargetKind::Gateway => "Gateway",
            TargetKind::HTTPRoute => "HTTPRoute",
            TargetKind::GRPCRoute => "GRPCRoute",
            TargetKind::TCPRoute => "TCPRoute",
            TargetKind::UDPRoute => "UDPRoute",
        }
    }
}

/// Reference to a Gateway API object a policy attaches to.
///
/// The group is fixed to `gateway.networking.k8s.io`; it is carried so the
/// reference round-trips through policy-ancestor status entries unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetReference {
    /// API group of the target. Defaults to `gateway.networking.k8s.io`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// Kind of the target.
    pub kind: TargetKind,

    /// Name of the target.
    pub name: String,

    /// Namespace of the target. Cross-namespace references require a
    /// `ReferenceGrant` in the target namespace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Listener (Gateway targets) the policy attaches to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
}

/// Cookie attributes of the Access application.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CookieAttributes {
    /// `SameSite` attribute: `none`, `lax`, or `strict`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,

    /// Set the `HttpOnly` attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,

    /// Bind the authorization cookie to the application.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_binding_cookie: Option<bool>,
}

/// Access application settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessApplicationConfig {
    /// Application name. Defaults to `<namespace>/<policy-name>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Application domain. When absent it is derived from the hostnames of
    /// the policy targets; ambiguity across targets is a terminal error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Path appended to the domain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Session duration, e.g. `24h`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_duration: Option<String>,

    /// Application type, e.g. `self_hosted`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_type: Option<String>,

    /// Authorization cookie attributes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie: Option<CookieAttributes>,

    /// Message shown on denied requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_deny_message: Option<String>,

    /// Redirect URL for denied requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_deny_url: Option<String>,

    /// Show the application in the App Launcher.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_launcher_visible: Option<bool>,
}

/// Decision an access rule applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccessDecision {
    Allow,
    Deny,
    Bypass,
    NonIdentity,
}

impl AccessDecision {
    /// Wire value used by the Cloudflare API.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AccessDecision::Allow => "allow",
            AccessDecision::Deny => "deny",
            AccessDecision::Bypass => "bypass",
            AccessDecision::NonIdentity => "non_identity",
        }
    }
}

/// GSuite group identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GSuiteIdentity {
    /// Group email address.
    pub email: String,
    /// Identity provider id.
    pub identity_provider_id: String,
}

/// GitHub organization/team identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitHubIdentity {
    /// Organization name.
    pub name: String,
    /// Teams within the organization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teams: Option<Vec<String>>,
    /// Identity provider id.
    pub identity_provider_id: String,
}

/// Azure AD group identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureIdentity {
    /// Group ids.
    pub ids: Vec<String>,
    /// Identity provider id.
    pub identity_provider_id: String,
}

/// Okta group identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OktaIdentity {
    /// Group names.
    pub names: Vec<String>,
    /// Identity provider id.
    pub identity_provider_id: String,
}

/// SAML attribute identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SamlIdentity {
    /// SAML attribute name.
    pub attribute_name: String,
    /// SAML attribute value.
    pub attribute_value: String,
    /// Identity provider id.
    pub identity_provider_id: String,
}

/// One identity predicate of an access rule.
///
/// Exactly the variants with a value participate; at least one must be set
/// (enforced by CRD admission via `anyOf`, re-checked at reconcile time).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessRuleCriterion {
    /// Match specific email addresses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emails: Option<Vec<String>>,

    /// Match every address under these domains.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_domains: Option<Vec<String>>,

    /// Match Zero Trust list references by list id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lists: Option<Vec<String>>,

    /// Match source addresses in these CIDR ranges.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_ranges: Option<Vec<String>>,

    /// Match requests originating from these ISO 3166-1 country codes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countries: Option<Vec<String>>,

    /// Match everyone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub everyone: Option<bool>,

    /// Require a valid client certificate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<bool>,

    /// Match client certificates with these common names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_names: Option<Vec<String>>,

    /// Match specific service tokens by id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_tokens: Option<Vec<String>>,

    /// Match any valid service token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub any_valid_service_token: Option<bool>,

    /// Match Access group references by group id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,

    /// Match a GSuite group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gsuite: Option<GSuiteIdentity>,

    /// Match a GitHub organization/team.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<GitHubIdentity>,

    /// Match Azure AD groups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureIdentity>,

    /// Match Okta groups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub okta: Option<OktaIdentity>,

    /// Match a SAML attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saml: Option<SamlIdentity>,
}

impl AccessRuleCriterion {
    /// Whether any predicate variant is present.
    #[must_use]
    pub fn is_populated(&self) -> bool {
        self.emails.is_some()
            || self.email_domains.is_some()
            || self.lists.is_some()
            || self.ip_ranges.is_some()
            || self.countries.is_some()
            || self.everyone.is_some()
            || self.certificate.is_some()
            || self.common_names.is_some()
            || self.service_tokens.is_some()
            || self.any_valid_service_token.is_some()
            || self.groups.is_some()
            || self.gsuite.is_some()
            || self.github.is_some()
            || self.azure.is_some()
            || self.okta.is_some()
            || self.saml.is_some()
    }
}

/// One access rule attached to the application.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessRule {
    /// Rule name. Defaults to `<policy-name>-<index>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Decision the rule applies.
    pub decision: AccessDecision,

    /// Evaluation precedence; lower values evaluate first. Defaults to the
    /// rule's position in this list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precedence: Option<i32>,

    /// Identity predicates; matching any grants the rule (logical OR).
    pub include: Vec<AccessRuleCriterion>,

    /// Identity predicates excluding matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<AccessRuleCriterion>>,

    /// Identity predicates that must all hold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require: Option<Vec<AccessRuleCriterion>>,

    /// Session duration override for this rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_duration: Option<String>,

    /// Require explicit approval before the session is granted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_required: Option<bool>,
}

/// A service token to mint and store in a child secret.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTokenSpec {
    /// Token name, unique within the account.
    pub name: String,

    /// Name of the child secret holding the client id and secret.
    /// Defaults to `<policy-name>-<token-name>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,

    /// Token lifetime, e.g. `8760h`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

/// Mutual TLS settings of the application.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MtlsConfig {
    /// Id of an mTLS certificate already uploaded to the account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<String>,

    /// Hostnames the certificate is associated with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostnames: Option<Vec<String>>,
}

/// Per-target attachment status (the Gateway API policy-ancestor pattern).
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyAncestorStatus {
    /// The target this entry reports on.
    pub ancestor_ref: TargetReference,

    /// Controller that wrote this entry.
    pub controller_name: String,

    /// `Accepted` and `ResolvedRefs` conditions for the target.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// `CloudflareAccessPolicy` attaches a Zero Trust Access application and its
/// rules to Gateway API targets.
///
/// Exactly one of `targetRef` and `targetRefs` must be set. Targets in other
/// namespaces require a `ReferenceGrant` in the target namespace permitting
/// the reference; targets that fail resolution are reported per-target and do
/// not abort the rest.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cfgate.io",
    version = "v1alpha1",
    kind = "CloudflareAccessPolicy",
    namespaced,
    shortname = "cfap",
    doc = "CloudflareAccessPolicy attaches a Cloudflare Access application and its rules to Gateway API route or gateway targets, with per-target ancestor status.",
    printcolumn = r#"{"name":"AppId","type":"string","jsonPath":".status.applicationId"}"#,
    printcolumn = r#"{"name":"Targets","type":"integer","jsonPath":".status.attachedTargets"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#
)]
#[kube(status = "CloudflareAccessPolicyStatus")]
#[serde(rename_all = "camelCase")]
pub struct CloudflareAccessPolicySpec {
    /// Single attachment target. Mutually exclusive with `targetRefs`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_ref: Option<TargetReference>,

    /// Multiple attachment targets. Mutually exclusive with `targetRef`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_refs: Option<Vec<TargetReference>>,

    /// Cloudflare account the application lives in. Defaults to the account
    /// of the tunnel the credentials are inherited from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,

    /// Credential override. When absent, credentials are inherited from the
    /// first tunnel referenced transitively by a targeted route's parent
    /// gateway.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloudflare: Option<CloudflareCredentials>,

    /// Access application settings.
    pub application: AccessApplicationConfig,

    /// Rules attached to the application, in declared precedence order.
    pub rules: Vec<AccessRule>,

    /// Service tokens to mint; client credentials land in child secrets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_tokens: Option<Vec<ServiceTokenSpec>>,

    /// Mutual TLS settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtls: Option<MtlsConfig>,
}

/// `CloudflareAccessPolicy` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudflareAccessPolicyStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    /// Id of the external Access application.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    /// Audience tag of the application.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_aud: Option<String>,
    /// Number of targets currently attached (ancestors with `Accepted=True`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attached_targets: Option<i32>,
    /// Ids of minted service tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_token_ids: Option<Vec<String>>,
    /// Id of the mTLS certificate rule, when configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtls_rule_id: Option<String>,
    /// Per-target attachment status.
    #[serde(default)]
    pub ancestors: Vec<PolicyAncestorStatus>,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
