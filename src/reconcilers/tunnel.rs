// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tunnel reconciliation logic.
//!
//! Converges `(accountId, name)` to exactly one external tunnel, emits a
//! connector token secret plus the agent deployment that authenticates with
//! it, and reflects identity and readiness on status.
//!
//! Adoption: a pre-existing live tunnel with the desired name is adopted
//! instead of duplicated. This survives operator restarts and lets users
//! pre-create tunnels. When several live tunnels share the name (possible via
//! concurrent creation) the oldest wins and siblings are left alone.
//!
//! Deletion: honors the `cfgate.io/deletion-policy` annotation. `delete`
//! (default) removes the external tunnel once it is disconnected; `orphan`
//! removes only the finalizer. Child objects are garbage-collected through
//! owner references either way.

pub mod status_helpers;

use self::status_helpers::{
    TunnelStatusUpdater, CONDITION_DELETION_BLOCKED, CONDITION_READY, CONDITION_TUNNEL_CONFIGURED,
};
use crate::agent_config::{
    ingress_entry_from_spec, origin_request_from_annotations, origin_request_from_config,
    render_config, IngressEntry,
};
use crate::cloudflare::tunnels::{generate_tunnel_secret, pick_adoption_candidate, tunnel_domain};
use crate::cloudflare::types::TunnelInfo;
use crate::cloudflare::CloudflareApi;
use crate::constants::{DEFAULT_AGENT_REPLICAS, TUNNEL_FINALIZER};
use crate::context::Context;
use crate::credentials::client_for_tunnel;
use crate::crd::{CloudflareTunnel, TunnelProtocol};
use crate::labels::{ANNOTATION_DELETION_POLICY, DELETION_POLICY_ORPHAN};
use crate::reconcilers::finalizers::{ensure_finalizer, handle_deletion, FinalizerCleanup};
use crate::reconcilers::resources::create_or_apply;
use crate::reconcilers::retry::retry_cloudflare_call;
use crate::reconcilers::status::{STATUS_FALSE, STATUS_TRUE};
use crate::tunnel_resources::{
    build_agent_deployment, build_config_map, build_token_secret, config_checksum,
    deployment_name,
};
use anyhow::{Context as _, Result};
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Whether the tunnel's deletion policy is `orphan`.
#[must_use]
pub fn deletion_policy_is_orphan(tunnel: &CloudflareTunnel) -> bool {
    tunnel
        .annotations()
        .get(ANNOTATION_DELETION_POLICY)
        .is_some_and(|v| v == DELETION_POLICY_ORPHAN)
}

/// The external tunnel name: `spec.name` or the resource name.
#[must_use]
pub fn external_tunnel_name(tunnel: &CloudflareTunnel) -> String {
    tunnel
        .spec
        .name
        .clone()
        .unwrap_or_else(|| tunnel.name_any())
}

/// Adopt the existing external tunnel with the desired name, or create one.
async fn adopt_or_create_tunnel(
    api: &CloudflareApi,
    account_id: &str,
    name: &str,
) -> Result<TunnelInfo> {
    let existing = retry_cloudflare_call(
        || api.list_tunnels(account_id, Some(name)),
        "list tunnels by name",
    )
    .await?;

    if let Some(adopted) = pick_adoption_candidate(existing) {
        info!(tunnel = name, tunnel_id = %adopted.id, "Adopted existing external tunnel");
        return Ok(adopted);
    }

    let secret = generate_tunnel_secret();
    let created =
        retry_cloudflare_call(|| api.create_tunnel(account_id, name, &secret), "create tunnel")
            .await?;
    info!(tunnel = name, tunnel_id = %created.id, "Created external tunnel");
    Ok(created)
}

/// Ingress entries derived from routes attached to the tunnel's gateways.
///
/// Each route hostname maps to its first backend service; the
/// `cfgate.io/origin-*` annotations overlay the tunnel-wide origin defaults
/// for the generated entries.
fn route_ingress_entries(ctx: &Arc<Context>, tunnel: &CloudflareTunnel) -> Vec<IngressEntry> {
    let namespace = tunnel.namespace().unwrap_or_default();
    let name = tunnel.name_any();
    let base_origin = tunnel
        .spec
        .origin
        .as_ref()
        .map(origin_request_from_config)
        .unwrap_or_default();

    let mut entries = Vec::new();
    for gateway in ctx.stores.gateways_for_tunnel(&namespace, &name) {
        let gateway_namespace = gateway.namespace().unwrap_or_default();
        for route in ctx
            .stores
            .routes_for_gateway(&gateway_namespace, &gateway.name_any())
        {
            let route_namespace = route.namespace().unwrap_or_default();
            let Some(backend) = route
                .spec
                .rules
                .as_deref()
                .unwrap_or_default()
                .iter()
                .flat_map(|rule| rule.backend_refs.as_deref().unwrap_or_default())
                .next()
            else {
                continue;
            };

            let backend_namespace = backend.namespace.as_deref().unwrap_or(&route_namespace);
            let port = backend.port.unwrap_or(80);
            let service =
                format!("http://{}.{backend_namespace}.svc.cluster.local:{port}", backend.name);

            let origin = origin_request_from_annotations(route.annotations(), base_origin.clone());
            let origin = (!origin.is_empty()).then_some(origin);

            for hostname in route.spec.hostnames.as_deref().unwrap_or_default() {
                entries.push(IngressEntry {
                    hostname: Some(hostname.clone()),
                    path: None,
                    service: service.clone(),
                    origin_request: origin.clone(),
                });
            }
        }
    }

    entries
}

/// Render the inline ingress config document, if the tunnel declares one.
///
/// Declared rules come first, then route-derived entries, then the implicit
/// catch-all.
fn render_inline_config(
    tunnel: &CloudflareTunnel,
    tunnel_id: &str,
    route_entries: Vec<IngressEntry>,
) -> Result<Option<String>> {
    let Some(rules) = tunnel.spec.ingress.as_ref() else {
        return Ok(None);
    };

    let protocol = match tunnel.spec.deployment.as_ref().and_then(|d| d.protocol) {
        None | Some(TunnelProtocol::Auto) => None,
        Some(TunnelProtocol::Quic) => Some("quic"),
        Some(TunnelProtocol::Http2) => Some("http2"),
    };
    let origin = tunnel.spec.origin.as_ref().map(origin_request_from_config);
    let mut entries: Vec<IngressEntry> = rules.iter().map(ingress_entry_from_spec).collect();
    entries.extend(route_entries);

    let rendered = render_config(tunnel_id, protocol, origin, entries)
        .context("failed to render agent config document")?;
    Ok(Some(rendered))
}

/// Reconciles a `CloudflareTunnel` resource.
///
/// # Arguments
///
/// * `ctx` - Shared controller context
/// * `tunnel` - The `CloudflareTunnel` resource to reconcile
///
/// # Errors
///
/// Returns an error if credential resolution, any Cloudflare call, or a
/// child-object write fails. The controller requeues with backoff.
#[allow(clippy::too_many_lines)]
pub async fn reconcile_tunnel(ctx: Arc<Context>, tunnel: CloudflareTunnel) -> Result<()> {
    let namespace = tunnel.namespace().unwrap_or_default();
    let name = tunnel.name_any();

    info!("Reconciling CloudflareTunnel: {}/{}", namespace, name);

    if tunnel.metadata.deletion_timestamp.is_some() {
        return delete_tunnel(ctx, tunnel).await;
    }

    ensure_finalizer(&ctx.client, &tunnel, TUNNEL_FINALIZER).await?;

    let spec_changed = crate::reconcilers::should_reconcile(
        tunnel.metadata.generation,
        tunnel.status.as_ref().and_then(|s| s.observed_generation),
    );
    debug!(
        tunnel = %name,
        spec_changed = spec_changed,
        "Starting tunnel convergence (periodic resync when spec unchanged)"
    );

    let mut status = TunnelStatusUpdater::new(&tunnel);

    // Credentials first; nothing external is reachable without them
    let api = match client_for_tunnel(&ctx.client, &ctx.credentials, &tunnel).await {
        Ok(api) => {
            status.set_credentials_valid(true, "API token verified");
            api
        }
        Err(e) => {
            status.set_credentials_valid(false, &format!("{e:#}"));
            status.set_condition(
                CONDITION_READY,
                STATUS_FALSE,
                "InvalidCredentials",
                "Cloudflare credentials could not be resolved",
            );
            status.apply(&ctx.client).await?;
            return Err(e.context("credential resolution failed"));
        }
    };

    let account_id = &tunnel.spec.account_id;
    let external_name = external_tunnel_name(&tunnel);

    let external = adopt_or_create_tunnel(&api, account_id, &external_name).await?;
    let domain = tunnel_domain(&external.id);
    status.set_tunnel_identity(&external.id, &external_name, &domain);

    // Connector token into the child secret
    let token = retry_cloudflare_call(
        || api.get_tunnel_token(account_id, &external.id),
        "fetch tunnel token",
    )
    .await?;
    create_or_apply(&ctx.client, &namespace, &build_token_secret(&tunnel, &token)).await?;

    // Inline ingress config, when declared
    let route_entries = if tunnel.spec.ingress.is_some() {
        route_ingress_entries(&ctx, &tunnel)
    } else {
        Vec::new()
    };
    let checksum = match render_inline_config(&tunnel, &external.id, route_entries)? {
        Some(rendered) => {
            create_or_apply(&ctx.client, &namespace, &build_config_map(&tunnel, &rendered))
                .await?;
            Some(config_checksum(&rendered))
        }
        None => None,
    };

    // Agent deployment
    let deployment = build_agent_deployment(&tunnel, checksum.as_deref());
    create_or_apply(&ctx.client, &namespace, &deployment).await?;

    status.set_condition(
        CONDITION_TUNNEL_CONFIGURED,
        STATUS_TRUE,
        "Configured",
        "External tunnel and agent workload are configured",
    );

    // Readiness from the owned deployment's status
    let desired_replicas = tunnel
        .spec
        .deployment
        .as_ref()
        .and_then(|d| d.replicas)
        .unwrap_or(DEFAULT_AGENT_REPLICAS);
    let ready_replicas = ctx
        .stores
        .get_deployment(&deployment_name(&name), &namespace)
        .and_then(|d| d.status.as_ref().and_then(|s| s.ready_replicas))
        .unwrap_or(0);
    status.set_ready_replicas(ready_replicas);
    status.set_connected_route_count(ctx.stores.connected_route_count(&namespace, &name));

    if ready_replicas >= desired_replicas && desired_replicas > 0 {
        status.set_condition(
            CONDITION_READY,
            STATUS_TRUE,
            "AgentReady",
            &format!("{ready_replicas}/{desired_replicas} agent replicas ready"),
        );
    } else {
        status.set_condition(
            CONDITION_READY,
            STATUS_FALSE,
            "AgentNotReady",
            &format!("{ready_replicas}/{desired_replicas} agent replicas ready"),
        );
    }

    status.set_observed_generation();
    status.apply(&ctx.client).await?;

    debug!(
        tunnel = %name,
        tunnel_id = %external.id,
        domain = %domain,
        "CloudflareTunnel reconciled"
    );
    Ok(())
}

/// External cleanup for tunnel deletion.
///
/// With the `orphan` policy external state is left untouched. Otherwise the
/// external tunnel is deleted once disconnected; live connections surface as
/// `DeletionBlocked` and the deletion is retried. Child objects are removed
/// by garbage collection through their owner references.
#[async_trait::async_trait]
impl FinalizerCleanup for CloudflareTunnel {
    async fn cleanup(&self, ctx: &Arc<Context>) -> Result<()> {
        let namespace = self.namespace().unwrap_or_default();
        let name = self.name_any();

        if deletion_policy_is_orphan(self) {
            info!(
                tunnel = %name,
                namespace = %namespace,
                "Deletion policy is orphan; leaving external tunnel in place"
            );
            return Ok(());
        }

        let api = client_for_tunnel(&ctx.client, &ctx.credentials, self)
            .await
            .context("cannot resolve credentials for tunnel cleanup")?;

        let account_id = &self.spec.account_id;
        let external_name = external_tunnel_name(self);

        // Prefer the recorded id; fall back to a name lookup so cleanup also
        // works when status was never written
        let tunnel_id = match self.status.as_ref().and_then(|s| s.tunnel_id.clone()) {
            Some(id) => Some(id),
            None => {
                let found = retry_cloudflare_call(
                    || api.list_tunnels(account_id, Some(&external_name)),
                    "list tunnels for cleanup",
                )
                .await?;
                pick_adoption_candidate(found).map(|t| t.id)
            }
        };

        let Some(tunnel_id) = tunnel_id else {
            info!(tunnel = %name, "No external tunnel to clean up");
            return Ok(());
        };

        match api.get_tunnel(account_id, &tunnel_id).await {
            Ok(external) if external.has_active_connections() => {
                let mut status = TunnelStatusUpdater::new(self);
                status.set_condition(
                    CONDITION_DELETION_BLOCKED,
                    STATUS_TRUE,
                    "ActiveConnections",
                    &format!(
                        "{} connector connection(s) still attached",
                        external.connections.len()
                    ),
                );
                status.apply(&ctx.client).await?;
                anyhow::bail!(
                    "tunnel {tunnel_id} still has {} active connection(s)",
                    external.connections.len()
                );
            }
            Ok(_) => {
                retry_cloudflare_call(
                    || api.delete_tunnel(account_id, &tunnel_id),
                    "delete tunnel",
                )
                .await?;
                info!(tunnel = %name, tunnel_id = %tunnel_id, "External tunnel deleted");
            }
            Err(e) if e.is_not_found() => {
                warn!(tunnel = %name, tunnel_id = %tunnel_id, "External tunnel already gone");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(())
    }
}

/// Deletion entry point used by the controller wrapper.
///
/// # Errors
///
/// Returns an error if cleanup fails; the finalizer stays until it succeeds.
pub async fn delete_tunnel(ctx: Arc<Context>, tunnel: CloudflareTunnel) -> Result<()> {
    handle_deletion(&ctx, &tunnel, TUNNEL_FINALIZER).await
}

#[cfg(test)]
#[path = "tunnel/mod_tests.rs"]
mod mod_tests;
