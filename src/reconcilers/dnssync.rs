// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS sync reconciliation logic.
//!
//! For each `(CloudflareDNSSync, tunnel)` pair: derive the desired hostname
//! set (explicit entries plus Gateway API route discovery), resolve zones,
//! converge each hostname to a CNAME at the tunnel domain, delete managed
//! records that left the desired set, and report per-record status. Foreign
//! records (no ownership marker) are reported but never modified.
//!
//! Deletion: cleanup policy permitting, every managed record in the
//! configured zones is swept using the tunnel's credentials, or the
//! `fallbackCredentialsRef` when the tunnel is already gone. Sweep failures
//! never block finalizer removal; a missing client (no tunnel, no fallback)
//! does, and the deletion retries.

pub mod cleanup;
pub mod hostnames;
pub mod status_helpers;
pub mod sync;

use self::status_helpers::{
    DnsSyncStatusUpdater, CONDITION_DNS_SYNCED, CONDITION_READY, CONDITION_ZONES_RESOLVED,
};
use crate::constants::{DEFAULT_TXT_OWNERSHIP_PREFIX, DNS_SYNC_FINALIZER, DNS_TTL_AUTO};
use crate::context::Context;
use crate::credentials::{client_for_tunnel, fallback_client};
use crate::crd::{
    CloudflareDNSSync, CloudflareTunnel, DnsConfig, RecordSyncState, ZoneSpec,
};
use crate::reconcilers::finalizers::{ensure_finalizer, handle_deletion, FinalizerCleanup};
use crate::reconcilers::status::{STATUS_FALSE, STATUS_TRUE};
use anyhow::{Context as _, Result};
use kube::{Api, ResourceExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Effective DNS settings after merging the sync spec over the tunnel's
/// `dns` defaults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectiveDnsConfig {
    /// Proxy created records.
    pub proxied: bool,
    /// TTL of created records; `1` is automatic.
    pub ttl: u32,
    /// Maintain companion TXT ownership records.
    pub txt_enabled: bool,
    /// Prefix of companion TXT records.
    pub txt_prefix: String,
    /// Stamp the ownership comment onto managed records.
    pub comment_enabled: bool,
    /// Delete managed records when they leave the desired set.
    pub cleanup_on_route_removal: bool,
    /// Sweep managed records when the resource is deleted.
    pub cleanup_on_delete: bool,
    /// Restrict the deletion sweep to records naming this tunnel.
    pub only_managed: bool,
}

/// Merge the sync spec over the tunnel's `dns` defaults, field-wise.
#[must_use]
pub fn effective_dns_config(
    sync: &CloudflareDNSSync,
    tunnel_dns: Option<&DnsConfig>,
) -> EffectiveDnsConfig {
    let spec = &sync.spec;

    let record_defaults = spec
        .record_defaults
        .as_ref()
        .or_else(|| tunnel_dns.and_then(|d| d.record_defaults.as_ref()));
    let ownership = spec
        .ownership
        .as_ref()
        .or_else(|| tunnel_dns.and_then(|d| d.ownership.as_ref()));
    let cleanup = spec
        .cleanup
        .as_ref()
        .or_else(|| tunnel_dns.and_then(|d| d.cleanup.as_ref()));

    EffectiveDnsConfig {
        proxied: record_defaults.and_then(|d| d.proxied).unwrap_or(true),
        ttl: record_defaults.and_then(|d| d.ttl).unwrap_or(DNS_TTL_AUTO),
        txt_enabled: ownership.and_then(|o| o.txt_record).unwrap_or(true),
        txt_prefix: ownership
            .and_then(|o| o.txt_prefix.clone())
            .unwrap_or_else(|| DEFAULT_TXT_OWNERSHIP_PREFIX.to_string()),
        comment_enabled: ownership.and_then(|o| o.comment).unwrap_or(true),
        cleanup_on_route_removal: cleanup.and_then(|c| c.on_route_removal).unwrap_or(true),
        cleanup_on_delete: cleanup.and_then(|c| c.on_delete).unwrap_or(true),
        only_managed: cleanup.and_then(|c| c.only_managed).unwrap_or(true),
    }
}

/// The zones a sync manages: its own list, falling back to the tunnel's.
#[must_use]
pub fn effective_zones(sync: &CloudflareDNSSync, tunnel_dns: Option<&DnsConfig>) -> Vec<ZoneSpec> {
    if !sync.spec.zones.is_empty() {
        return sync.spec.zones.clone();
    }
    tunnel_dns
        .and_then(|d| d.zones.clone())
        .unwrap_or_default()
}

/// Fetch the referenced tunnel fresh from the API server.
async fn fetch_tunnel(
    ctx: &Arc<Context>,
    sync: &CloudflareDNSSync,
) -> Result<CloudflareTunnel, kube::Error> {
    let sync_namespace = sync.namespace().unwrap_or_default();
    let namespace = sync
        .spec
        .tunnel_ref
        .namespace
        .as_deref()
        .unwrap_or(&sync_namespace);
    let api: Api<CloudflareTunnel> = Api::namespaced(ctx.client.clone(), namespace);
    api.get(&sync.spec.tunnel_ref.name).await
}

/// Reconciles a `CloudflareDNSSync` resource.
///
/// # Errors
///
/// Returns an error if the tunnel or its credentials cannot be resolved, a
/// zone lookup fails, or the status write fails. Per-record convergence
/// failures surface as `Failed` entries, not as reconciliation errors.
#[allow(clippy::too_many_lines)]
pub async fn reconcile_dnssync(ctx: Arc<Context>, sync: CloudflareDNSSync) -> Result<()> {
    let namespace = sync.namespace().unwrap_or_default();
    let name = sync.name_any();

    info!("Reconciling CloudflareDNSSync: {}/{}", namespace, name);

    if sync.metadata.deletion_timestamp.is_some() {
        return delete_dnssync(ctx, sync).await;
    }

    ensure_finalizer(&ctx.client, &sync, DNS_SYNC_FINALIZER).await?;

    let spec_changed = crate::reconcilers::should_reconcile(
        sync.metadata.generation,
        sync.status.as_ref().and_then(|s| s.observed_generation),
    );
    debug!(
        sync = %name,
        spec_changed = spec_changed,
        "Starting DNS convergence (periodic resync when spec unchanged)"
    );

    let mut status = DnsSyncStatusUpdater::new(&sync);

    // Resolve the tunnel; its domain is the CNAME target
    let tunnel = match fetch_tunnel(&ctx, &sync).await {
        Ok(tunnel) => tunnel,
        Err(e) => {
            status.set_condition(
                CONDITION_READY,
                STATUS_FALSE,
                "TunnelNotFound",
                &format!("tunnel {} not found", sync.spec.tunnel_ref.name),
            );
            status.apply(&ctx.client).await?;
            return Err(e).context("tunnel lookup failed");
        }
    };

    let Some(tunnel_domain) = tunnel.status.as_ref().and_then(|s| s.tunnel_domain.clone())
    else {
        // The tunnel reconciler has not published an id yet; requeue via error
        status.set_condition(
            CONDITION_DNS_SYNCED,
            STATUS_FALSE,
            "TunnelPending",
            "tunnel has no domain yet",
        );
        status.apply(&ctx.client).await?;
        anyhow::bail!("tunnel {} has no tunnel domain yet", tunnel.name_any());
    };
    let tunnel_name = tunnel
        .status
        .as_ref()
        .and_then(|s| s.tunnel_name.clone())
        .unwrap_or_else(|| tunnel.name_any());
    let tunnel_namespace = tunnel.namespace().unwrap_or_default();

    let api = client_for_tunnel(&ctx.client, &ctx.credentials, &tunnel).await?;

    let tunnel_dns = tunnel.spec.dns.as_ref();
    let config = effective_dns_config(&sync, tunnel_dns);
    let zones = effective_zones(&sync, tunnel_dns);

    // Zone resolution gates everything downstream
    let resolved_zones = match sync::resolve_zones(&api, &zones).await {
        Ok(resolved) => {
            status.set_zones_resolved(true, &format!("{} zone(s) resolved", resolved.len()));
            resolved
        }
        Err(e) => {
            status.set_zones_resolved(false, &e.to_string());
            status.set_condition(
                CONDITION_READY,
                STATUS_FALSE,
                "ZoneLookupFailed",
                "one or more zones could not be resolved",
            );
            status.apply(&ctx.client).await?;
            return Err(e).context("zone resolution failed");
        }
    };

    let desired = hostnames::derive_desired_records(
        &sync,
        &tunnel_namespace,
        &tunnel.name_any(),
        &tunnel_domain,
        &config,
        &ctx.stores,
    );
    debug!(sync = %name, desired = desired.len(), "Derived desired record set");

    let previous = DnsSyncStatusUpdater::previous_records(&sync);
    let entries =
        sync::converge_records(&api, &resolved_zones, &desired, &tunnel_name, &config).await;

    sync::delete_orphans(&api, &resolved_zones, &previous, &desired, &config).await;

    let failed = entries
        .iter()
        .filter(|e| e.status == RecordSyncState::Failed)
        .count();
    if failed == 0 {
        status.set_condition(
            CONDITION_DNS_SYNCED,
            STATUS_TRUE,
            "Synced",
            &format!("{} record(s) converged", entries.len()),
        );
        status.set_condition(CONDITION_READY, STATUS_TRUE, "Synced", "all records synced");
    } else {
        status.set_condition(
            CONDITION_DNS_SYNCED,
            STATUS_FALSE,
            "RecordsFailed",
            &format!("{failed} record(s) failed to converge"),
        );
        status.set_condition(
            CONDITION_READY,
            STATUS_FALSE,
            "RecordsFailed",
            &format!("{failed} record(s) failed to converge"),
        );
    }

    status.set_records(entries);
    status.set_observed_generation();
    status.apply(&ctx.client).await?;

    Ok(())
}

/// External cleanup for DNS sync deletion.
///
/// Credentials come from the tunnel when it still exists, else from the
/// fallback secret. Only failing to obtain *any* client blocks the
/// finalizer; sweep failures are logged and deletion proceeds.
#[async_trait::async_trait]
impl FinalizerCleanup for CloudflareDNSSync {
    async fn cleanup(&self, ctx: &Arc<Context>) -> Result<()> {
        let namespace = self.namespace().unwrap_or_default();
        let name = self.name_any();

        // The tunnel may already be gone; merge what we can still see
        let tunnel = fetch_tunnel(ctx, self).await.ok();
        let tunnel_dns = tunnel.as_ref().and_then(|t| t.spec.dns.as_ref());
        let config = effective_dns_config(self, tunnel_dns);

        if !config.cleanup_on_delete {
            info!(sync = %name, "Cleanup-on-delete disabled; leaving external records");
            return Ok(());
        }

        let api = match &tunnel {
            Some(tunnel) => {
                match client_for_tunnel(&ctx.client, &ctx.credentials, tunnel).await {
                    Ok(api) => Some(api),
                    Err(e) => {
                        warn!(sync = %name, error = %e, "Tunnel credentials unavailable for cleanup");
                        None
                    }
                }
            }
            None => None,
        };

        let api = match api {
            Some(api) => api,
            None => match &self.spec.fallback_credentials_ref {
                Some(fallback) => {
                    info!(sync = %name, "Using fallback credentials for DNS cleanup");
                    fallback_client(&ctx.client, &ctx.credentials, fallback, &namespace)
                        .await
                        .context("fallback credentials failed")?
                }
                None => {
                    anyhow::bail!(
                        "DNSSync {namespace}/{name}: tunnel credentials unavailable and no fallbackCredentialsRef configured"
                    );
                }
            },
        };

        let tunnel_name = tunnel
            .as_ref()
            .map(|t| {
                t.status
                    .as_ref()
                    .and_then(|s| s.tunnel_name.clone())
                    .unwrap_or_else(|| t.name_any())
            })
            .or_else(|| Some(self.spec.tunnel_ref.name.clone()));

        let zones = effective_zones(self, tunnel_dns);
        let deleted = cleanup::cleanup_zones(
            &api,
            &zones,
            tunnel_name.as_deref(),
            config.only_managed,
        )
        .await;
        info!(sync = %name, deleted = deleted, "DNS cleanup completed");

        Ok(())
    }
}

/// Deletion entry point used by the controller wrapper.
///
/// # Errors
///
/// Returns an error only when no Cloudflare client could be obtained at all;
/// sweep failures never block the finalizer.
pub async fn delete_dnssync(ctx: Arc<Context>, sync: CloudflareDNSSync) -> Result<()> {
    handle_deletion(&ctx, &sync, DNS_SYNC_FINALIZER).await
}

#[cfg(test)]
#[path = "dnssync/mod_tests.rs"]
mod mod_tests;
