// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired-record derivation for DNS sync.
//!
//! The desired set is the explicit hostname list followed by hostnames
//! discovered from Gateway API routes, deduplicated while preserving
//! first-seen order. Explicit entries may template their target with
//! `{{ .TunnelDomain }}`; route-derived records always target the tunnel
//! domain.

use crate::context::{gateway_dns_sync_enabled, Stores};
use crate::crd::CloudflareDNSSync;
use crate::reconcilers::dnssync::EffectiveDnsConfig;
use kube::ResourceExt;
use std::collections::HashSet;
use tracing::debug;

/// One record the sync wants to exist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DesiredRecord {
    /// Fully qualified hostname.
    pub hostname: String,
    /// CNAME content.
    pub target: String,
    /// Whether the record is proxied.
    pub proxied: bool,
    /// TTL; `1` is automatic.
    pub ttl: u32,
}

/// Expand `{{ .TunnelDomain }}` in a target template.
///
/// Both the spaced and the compact spelling are recognized.
#[must_use]
pub fn expand_target_template(template: &str, tunnel_domain: &str) -> String {
    template
        .replace("{{ .TunnelDomain }}", tunnel_domain)
        .replace("{{.TunnelDomain}}", tunnel_domain)
}

/// Parse an annotation filter of the form `key` or `key=value` and test it
/// against a route's annotations.
#[must_use]
pub fn annotation_filter_matches(
    filter: Option<&str>,
    annotations: &std::collections::BTreeMap<String, String>,
) -> bool {
    let Some(filter) = filter else {
        return true;
    };

    match filter.split_once('=') {
        Some((key, value)) => annotations.get(key).is_some_and(|v| v == value),
        None => annotations.contains_key(filter),
    }
}

/// Compute the desired record set for one `(DNSSync, tunnel)` pair.
///
/// # Arguments
///
/// * `sync` - The `CloudflareDNSSync` resource
/// * `tunnel_namespace` / `tunnel_name` - The resolved tunnel identity
/// * `tunnel_domain` - The tunnel's DNS target
/// * `config` - Effective record defaults
/// * `stores` - Reflector stores for gateway/route discovery
#[must_use]
pub fn derive_desired_records(
    sync: &CloudflareDNSSync,
    tunnel_namespace: &str,
    tunnel_name: &str,
    tunnel_domain: &str,
    config: &EffectiveDnsConfig,
    stores: &Stores,
) -> Vec<DesiredRecord> {
    let mut desired = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    // Explicit hostnames first; each may override target, proxied, and TTL
    for explicit in sync.spec.hostnames.as_deref().unwrap_or_default() {
        if !seen.insert(explicit.hostname.clone()) {
            continue;
        }
        let target = explicit
            .target
            .as_deref()
            .map_or_else(|| tunnel_domain.to_string(), |t| {
                expand_target_template(t, tunnel_domain)
            });
        desired.push(DesiredRecord {
            hostname: explicit.hostname.clone(),
            target,
            proxied: explicit.proxied.unwrap_or(config.proxied),
            ttl: explicit.ttl.unwrap_or(config.ttl),
        });
    }

    // Gateway-route discovery
    let gateway_source = sync.spec.gateway_routes.as_ref();
    if gateway_source.is_some_and(|source| source.enabled) {
        let annotation_filter = gateway_source.and_then(|s| s.annotation_filter.as_deref());

        for gateway in stores.gateways_for_tunnel(tunnel_namespace, tunnel_name) {
            if !gateway_dns_sync_enabled(&gateway) {
                continue;
            }
            let gateway_namespace = gateway.namespace().unwrap_or_default();

            for route in stores.routes_for_gateway(&gateway_namespace, &gateway.name_any()) {
                if !annotation_filter_matches(annotation_filter, route.annotations()) {
                    debug!(
                        route = %route.name_any(),
                        "Route filtered out by annotation filter"
                    );
                    continue;
                }

                for hostname in route.spec.hostnames.as_deref().unwrap_or_default() {
                    if seen.insert(hostname.clone()) {
                        desired.push(DesiredRecord {
                            hostname: hostname.clone(),
                            target: tunnel_domain.to_string(),
                            proxied: config.proxied,
                            ttl: config.ttl,
                        });
                    }
                }
            }
        }
    }

    desired
}

#[cfg(test)]
#[path = "hostnames_tests.rs"]
mod hostnames_tests;
