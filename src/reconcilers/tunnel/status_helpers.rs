// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status batching for the tunnel reconciler.
//!
//! All status mutations of one reconciliation pass accumulate in a
//! [`TunnelStatusUpdater`] and land in a single `patch_status` call, skipped
//! entirely when nothing observable changed.

use crate::crd::{CloudflareTunnel, CloudflareTunnelStatus};
use crate::reconcilers::status::{create_condition, upsert_condition, STATUS_FALSE, STATUS_TRUE};
use anyhow::Result;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::debug;

/// Condition type: overall readiness
pub const CONDITION_READY: &str = "Ready";
/// Condition type: credential resolution
pub const CONDITION_CREDENTIALS_VALID: &str = "CredentialsValid";
/// Condition type: external tunnel and children converged
pub const CONDITION_TUNNEL_CONFIGURED: &str = "TunnelConfigured";
/// Condition type: external deletion blocked by live connections
pub const CONDITION_DELETION_BLOCKED: &str = "DeletionBlocked";

/// Accumulates status changes and applies them in one write.
pub struct TunnelStatusUpdater {
    name: String,
    namespace: String,
    generation: Option<i64>,
    status: CloudflareTunnelStatus,
    changed: bool,
}

impl TunnelStatusUpdater {
    /// Start from the resource's current status.
    #[must_use]
    pub fn new(tunnel: &CloudflareTunnel) -> Self {
        Self {
            name: tunnel.name_any(),
            namespace: tunnel.namespace().unwrap_or_default(),
            generation: tunnel.metadata.generation,
            status: tunnel.status.clone().unwrap_or_default(),
            changed: false,
        }
    }

    /// Set a condition, tracking whether anything observable changed.
    pub fn set_condition(&mut self, r#type: &str, status: &str, reason: &str, message: &str) {
        let condition = create_condition(r#type, status, reason, message);
        if upsert_condition(&mut self.status.conditions, condition) {
            self.changed = true;
        }
    }

    /// Record credential resolution state.
    pub fn set_credentials_valid(&mut self, valid: bool, message: &str) {
        let (status, reason) = if valid {
            (STATUS_TRUE, "TokenVerified")
        } else {
            (STATUS_FALSE, "InvalidCredentials")
        };
        self.set_condition(CONDITION_CREDENTIALS_VALID, status, reason, message);
    }

    /// Record the external tunnel identity.
    pub fn set_tunnel_identity(&mut self, id: &str, name: &str, domain: &str) {
        if self.status.tunnel_id.as_deref() != Some(id) {
            self.status.tunnel_id = Some(id.to_string());
            self.changed = true;
        }
        if self.status.tunnel_name.as_deref() != Some(name) {
            self.status.tunnel_name = Some(name.to_string());
            self.changed = true;
        }
        if self.status.tunnel_domain.as_deref() != Some(domain) {
            self.status.tunnel_domain = Some(domain.to_string());
            self.changed = true;
        }
    }

    /// Record agent readiness.
    pub fn set_ready_replicas(&mut self, ready: i32) {
        if self.status.ready_replicas != Some(ready) {
            self.status.ready_replicas = Some(ready);
            self.changed = true;
        }
    }

    /// Record the bound route count.
    pub fn set_connected_route_count(&mut self, count: i32) {
        if self.status.connected_route_count != Some(count) {
            self.status.connected_route_count = Some(count);
            self.changed = true;
        }
    }

    /// Mark the spec generation as fully processed.
    pub fn set_observed_generation(&mut self) {
        if self.status.observed_generation != self.generation {
            self.status.observed_generation = self.generation;
            self.changed = true;
        }
    }

    /// Whether an apply would write anything.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Current ready-replica count in the pending status.
    #[must_use]
    pub fn ready_replicas(&self) -> Option<i32> {
        self.status.ready_replicas
    }

    /// Apply the batched status if anything changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the status patch fails.
    pub async fn apply(&self, client: &Client) -> Result<()> {
        if !self.changed {
            debug!(
                tunnel = %self.name,
                namespace = %self.namespace,
                "Tunnel status unchanged, skipping write"
            );
            return Ok(());
        }

        let api: Api<CloudflareTunnel> = Api::namespaced(client.clone(), &self.namespace);
        let patch = json!({ "status": self.status });
        api.patch_status(&self.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "status_helpers_tests.rs"]
mod status_helpers_tests;
