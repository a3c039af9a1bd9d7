// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Wire types of the Cloudflare v4 API surface cfgate consumes.
//!
//! Only the fields the reconcilers read are modeled; everything else is
//! ignored on deserialization.

use serde::{Deserialize, Serialize};

/// The standard Cloudflare response envelope.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Whether the call succeeded.
    pub success: bool,

    /// Envelope-level errors when `success` is false.
    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,

    /// The payload.
    pub result: Option<T>,

    /// Pagination info on list endpoints.
    #[serde(default)]
    pub result_info: Option<ResultInfo>,
}

/// One envelope error.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    /// Cloudflare error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
}

/// Pagination block of list responses.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ResultInfo {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub total_count: u32,
}

/// Result of `/user/tokens/verify`.
#[derive(Debug, Deserialize)]
pub struct TokenVerification {
    /// Token status; `active` is the only healthy value.
    pub status: String,
}

// ============================================================================
// Tunnels
// ============================================================================

/// An externally materialized tunnel.
#[derive(Debug, Clone, Deserialize)]
pub struct TunnelInfo {
    /// Stable tunnel id.
    pub id: String,

    /// Tunnel name, unique among live tunnels of the account.
    pub name: String,

    /// RFC3339 creation timestamp; the adoption tie-break key.
    #[serde(default)]
    pub created_at: Option<String>,

    /// RFC3339 deletion timestamp; deleted tunnels keep their name.
    #[serde(default)]
    pub deleted_at: Option<String>,

    /// Live connector connections.
    #[serde(default)]
    pub connections: Vec<TunnelConnection>,

    /// Aggregate tunnel status as reported by Cloudflare.
    #[serde(default)]
    pub status: Option<String>,
}

impl TunnelInfo {
    /// Whether any connector is currently connected.
    #[must_use]
    pub fn has_active_connections(&self) -> bool {
        !self.connections.is_empty()
    }
}

/// One live connection of a tunnel connector.
#[derive(Debug, Clone, Deserialize)]
pub struct TunnelConnection {
    /// Connection id.
    #[serde(default)]
    pub id: Option<String>,

    /// Edge colo the connection terminates at.
    #[serde(default)]
    pub colo_name: Option<String>,

    /// Source address of the connector.
    #[serde(default)]
    pub origin_ip: Option<String>,
}

/// Body of a tunnel creation call.
#[derive(Debug, Serialize)]
pub struct TunnelCreate {
    /// Tunnel name.
    pub name: String,

    /// Base64-encoded tunnel secret.
    pub tunnel_secret: String,

    /// Configuration source; cfgate always creates remotely configured
    /// tunnels (`cloudflare`), inline ingress only shapes the agent config.
    pub config_src: &'static str,
}

// ============================================================================
// Zones & DNS records
// ============================================================================

/// A Cloudflare zone.
#[derive(Debug, Clone, Deserialize)]
pub struct ZoneInfo {
    /// Zone id.
    pub id: String,
    /// Zone name.
    pub name: String,
    /// Zone status.
    #[serde(default)]
    pub status: Option<String>,
}

/// An external DNS record.
#[derive(Debug, Clone, Deserialize)]
pub struct DnsRecord {
    /// Record id.
    pub id: String,

    /// Record type (`CNAME`, `TXT`, ...).
    pub r#type: String,

    /// Fully qualified record name.
    pub name: String,

    /// Record content.
    pub content: String,

    /// Whether the record is proxied. Absent on types that cannot proxy.
    #[serde(default)]
    pub proxied: Option<bool>,

    /// TTL in seconds; `1` means automatic.
    pub ttl: u32,

    /// Free-form comment; carries the ownership marker on managed records.
    #[serde(default)]
    pub comment: Option<String>,
}

/// Body of a record create/update call.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DnsRecordUpsert {
    /// Record type.
    pub r#type: String,

    /// Fully qualified record name.
    pub name: String,

    /// Record content.
    pub content: String,

    /// Whether to proxy the record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxied: Option<bool>,

    /// TTL in seconds; `1` means automatic.
    pub ttl: u32,

    /// Record comment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

// ============================================================================
// Access
// ============================================================================

/// A Zero Trust Access application.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessApplication {
    /// Application id.
    pub id: String,

    /// Application name.
    pub name: String,

    /// Application domain (may include a path).
    pub domain: String,

    /// Audience tag.
    #[serde(default)]
    pub aud: Option<String>,

    /// Session duration.
    #[serde(default)]
    pub session_duration: Option<String>,

    /// Application type.
    #[serde(default)]
    pub r#type: Option<String>,

    /// Tags; carries the ownership marker on managed applications.
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Body of an application create/update call.
#[derive(Debug, Clone, Serialize)]
pub struct AccessApplicationUpsert {
    /// Application name.
    pub name: String,

    /// Application domain.
    pub domain: String,

    /// Application type, e.g. `self_hosted`.
    pub r#type: String,

    /// Session duration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_duration: Option<String>,

    /// Ownership and user tags.
    pub tags: Vec<String>,

    /// Message shown on denied requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_deny_message: Option<String>,

    /// Redirect URL for denied requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_deny_url: Option<String>,

    /// App Launcher visibility.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_launcher_visible: Option<bool>,

    /// `SameSite` cookie attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_site_cookie_attribute: Option<String>,

    /// `HttpOnly` cookie attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_only_cookie_attribute: Option<bool>,

    /// Bind the authorization cookie to the application.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_binding_cookie: Option<bool>,
}

/// An Access policy (rule) attached to an application.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessAppPolicy {
    /// Policy id.
    pub id: String,

    /// Policy name.
    pub name: String,

    /// Decision (`allow`, `deny`, `bypass`, `non_identity`).
    pub decision: String,

    /// Evaluation precedence.
    #[serde(default)]
    pub precedence: Option<i32>,

    /// Include predicate terms.
    #[serde(default)]
    pub include: Vec<serde_json::Value>,

    /// Exclude predicate terms.
    #[serde(default)]
    pub exclude: Vec<serde_json::Value>,

    /// Require predicate terms.
    #[serde(default)]
    pub require: Vec<serde_json::Value>,
}

/// Body of a policy create/update call.
#[derive(Debug, Clone, Serialize)]
pub struct AccessAppPolicyUpsert {
    /// Policy name.
    pub name: String,

    /// Decision.
    pub decision: String,

    /// Evaluation precedence.
    pub precedence: i32,

    /// Include predicate terms.
    pub include: Vec<serde_json::Value>,

    /// Exclude predicate terms.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<serde_json::Value>,

    /// Require predicate terms.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub require: Vec<serde_json::Value>,

    /// Session duration override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_duration: Option<String>,

    /// Require explicit approval.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_required: Option<bool>,
}

/// An mTLS certificate uploaded to the account.
#[derive(Debug, Clone, Deserialize)]
pub struct MtlsCertificate {
    /// Certificate id.
    pub id: String,

    /// Certificate name.
    #[serde(default)]
    pub name: Option<String>,

    /// Hostnames the certificate is associated with.
    #[serde(default)]
    pub associated_hostnames: Vec<String>,
}

/// A service token. The client secret is only returned on creation.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceToken {
    /// Token id.
    pub id: String,

    /// Token name.
    pub name: String,

    /// Client id.
    pub client_id: String,

    /// Client secret; present only in the creation response.
    #[serde(default)]
    pub client_secret: Option<String>,
}
