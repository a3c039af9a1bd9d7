// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tunnel agent configuration document rendering.
//!
//! When a tunnel declares inline ingress rules (the alternative to
//! remote-config mode) the operator renders the agent's `config.yaml` and
//! mirrors it into a child `ConfigMap`. The document shape follows what the
//! agent parses:
//!
//! ```yaml
//! tunnel: <id>
//! protocol: quic
//! metrics: 0.0.0.0:2000
//! no-autoupdate: true
//! originRequest:
//!   connectTimeout: 30s
//! ingress:
//!   - hostname: app.example.com
//!     service: http://web.apps.svc:8080
//!   - service: http_status:404
//! ```
//!
//! The last ingress rule must be a catch-all (no hostname, no path);
//! [`ensure_catch_all`] appends the default `http_status:404` rule when the
//! declared list does not end with one.

use crate::constants::{AGENT_METRICS_PORT, CATCH_ALL_SERVICE};
use crate::crd::{IngressRuleSpec, OriginConfig};
use crate::labels::{
    ANNOTATION_ORIGIN_CA_POOL, ANNOTATION_ORIGIN_CONNECT_TIMEOUT, ANNOTATION_ORIGIN_HTTP2,
    ANNOTATION_ORIGIN_HTTP_HOST_HEADER, ANNOTATION_ORIGIN_NO_TLS_VERIFY,
    ANNOTATION_ORIGIN_SERVER_NAME, ANNOTATION_ORIGIN_SSL_VERIFY,
};
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// Origin options as the agent config spells them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OriginRequest {
    /// Connection timeout as a duration string, e.g. `30s`.
    #[serde(rename = "connectTimeout", skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<String>,

    /// Disable origin TLS verification.
    #[serde(rename = "noTLSVerify", skip_serializing_if = "Option::is_none")]
    pub no_tls_verify: Option<bool>,

    /// Host header override.
    #[serde(rename = "httpHostHeader", skip_serializing_if = "Option::is_none")]
    pub http_host_header: Option<String>,

    /// SNI server name.
    #[serde(rename = "originServerName", skip_serializing_if = "Option::is_none")]
    pub origin_server_name: Option<String>,

    /// CA bundle path.
    #[serde(rename = "caPool", skip_serializing_if = "Option::is_none")]
    pub ca_pool: Option<String>,

    /// Use HTTP/2 to the origin.
    #[serde(rename = "http2Origin", skip_serializing_if = "Option::is_none")]
    pub http2_origin: Option<bool>,
}

impl OriginRequest {
    /// Whether every field is unset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == OriginRequest::default()
    }
}

/// One rendered ingress rule.
#[derive(Clone, Debug, Serialize)]
pub struct IngressEntry {
    /// Hostname matched; absent on the catch-all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Path regex matched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Service proxied to.
    pub service: String,

    /// Per-rule origin options.
    #[serde(rename = "originRequest", skip_serializing_if = "Option::is_none")]
    pub origin_request: Option<OriginRequest>,
}

impl IngressEntry {
    /// Whether the rule is a catch-all (matches every request).
    #[must_use]
    pub fn is_catch_all(&self) -> bool {
        self.hostname.is_none() && self.path.is_none()
    }
}

/// The rendered agent configuration document.
#[derive(Debug, Serialize)]
pub struct AgentConfig {
    /// Tunnel id the agent serves.
    pub tunnel: String,

    /// Path to a credentials file; unused in token-auth mode.
    #[serde(rename = "credentials-file", skip_serializing_if = "Option::is_none")]
    pub credentials_file: Option<String>,

    /// Edge transport protocol; omitted for `auto`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    /// Metrics/readiness listen address.
    pub metrics: String,

    /// Never self-update inside a pod.
    #[serde(rename = "no-autoupdate")]
    pub no_autoupdate: bool,

    /// Tunnel-wide origin defaults.
    #[serde(rename = "originRequest", skip_serializing_if = "Option::is_none")]
    pub origin_request: Option<OriginRequest>,

    /// Ordered ingress rules; the last one is always a catch-all.
    pub ingress: Vec<IngressEntry>,
}

/// Convert spec-level origin options to the agent config spelling.
#[must_use]
pub fn origin_request_from_config(config: &OriginConfig) -> OriginRequest {
    OriginRequest {
        connect_timeout: config.connect_timeout_secs.map(|s| format!("{s}s")),
        no_tls_verify: config.no_tls_verify,
        http_host_header: config.http_host_header.clone(),
        origin_server_name: config.origin_server_name.clone(),
        ca_pool: config.ca_pool.clone(),
        http2_origin: config.http2_origin,
    }
}

/// Overlay route annotations onto a base origin request, field-wise.
///
/// Unparseable annotation values are logged and skipped; a typo must not take
/// the whole tunnel config down.
#[must_use]
pub fn origin_request_from_annotations(
    annotations: &BTreeMap<String, String>,
    base: OriginRequest,
) -> OriginRequest {
    let mut origin = base;

    if let Some(value) = annotations.get(ANNOTATION_ORIGIN_CONNECT_TIMEOUT) {
        match value.parse::<u32>() {
            Ok(secs) => origin.connect_timeout = Some(format!("{secs}s")),
            Err(_) => warn!(value = %value, "Ignoring unparseable origin-connect-timeout annotation"),
        }
    }
    if let Some(value) = annotations.get(ANNOTATION_ORIGIN_NO_TLS_VERIFY) {
        match value.parse::<bool>() {
            Ok(flag) => origin.no_tls_verify = Some(flag),
            Err(_) => warn!(value = %value, "Ignoring unparseable origin-no-tls-verify annotation"),
        }
    }
    if let Some(value) = annotations.get(ANNOTATION_ORIGIN_SSL_VERIFY) {
        // ssl-verify is the positive spelling of no-tls-verify
        match value.parse::<bool>() {
            Ok(flag) => origin.no_tls_verify = Some(!flag),
            Err(_) => warn!(value = %value, "Ignoring unparseable origin-ssl-verify annotation"),
        }
    }
    if let Some(value) = annotations.get(ANNOTATION_ORIGIN_HTTP_HOST_HEADER) {
        origin.http_host_header = Some(value.clone());
    }
    if let Some(value) = annotations.get(ANNOTATION_ORIGIN_SERVER_NAME) {
        origin.origin_server_name = Some(value.clone());
    }
    if let Some(value) = annotations.get(ANNOTATION_ORIGIN_CA_POOL) {
        origin.ca_pool = Some(value.clone());
    }
    if let Some(value) = annotations.get(ANNOTATION_ORIGIN_HTTP2) {
        match value.parse::<bool>() {
            Ok(flag) => origin.http2_origin = Some(flag),
            Err(_) => warn!(value = %value, "Ignoring unparseable origin-http2 annotation"),
        }
    }

    origin
}

/// Convert a declared ingress rule, overlaying tunnel-wide origin defaults.
#[must_use]
pub fn ingress_entry_from_spec(rule: &IngressRuleSpec) -> IngressEntry {
    let origin_request = rule
        .origin
        .as_ref()
        .map(origin_request_from_config)
        .filter(|o| !o.is_empty());

    IngressEntry {
        hostname: rule.hostname.clone(),
        path: rule.path.clone(),
        service: rule.service.clone(),
        origin_request,
    }
}

/// Append the default catch-all rule unless the list already ends with one.
pub fn ensure_catch_all(rules: &mut Vec<IngressEntry>) {
    if rules.last().is_none_or(|last| !last.is_catch_all()) {
        rules.push(IngressEntry {
            hostname: None,
            path: None,
            service: CATCH_ALL_SERVICE.to_string(),
            origin_request: None,
        });
    }
}

/// Render the full agent config document as YAML.
///
/// # Arguments
///
/// * `tunnel_id` - External tunnel id
/// * `protocol` - Edge protocol flag value, `None` for `auto`
/// * `origin` - Tunnel-wide origin defaults
/// * `rules` - Declared ingress rules; a catch-all is appended if missing
///
/// # Errors
///
/// Returns an error if YAML serialization fails.
pub fn render_config(
    tunnel_id: &str,
    protocol: Option<&str>,
    origin: Option<OriginRequest>,
    mut rules: Vec<IngressEntry>,
) -> Result<String> {
    ensure_catch_all(&mut rules);

    let config = AgentConfig {
        tunnel: tunnel_id.to_string(),
        credentials_file: None,
        protocol: protocol.map(str::to_string),
        metrics: format!("0.0.0.0:{AGENT_METRICS_PORT}"),
        no_autoupdate: true,
        origin_request: origin.filter(|o| !o.is_empty()),
        ingress: rules,
    };

    Ok(serde_yaml::to_string(&config)?)
}

#[cfg(test)]
#[path = "agent_config_tests.rs"]
mod agent_config_tests;
