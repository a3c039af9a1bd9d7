// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status batching for the access policy reconciler.

use crate::crd::{
    CloudflareAccessPolicy, CloudflareAccessPolicyStatus, PolicyAncestorStatus,
};
use crate::reconcilers::status::{create_condition, upsert_condition};
use anyhow::Result;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::debug;

/// Condition type: overall readiness
pub const CONDITION_READY: &str = "Ready";
/// Condition type: credential resolution
pub const CONDITION_CREDENTIALS_VALID: &str = "CredentialsValid";
/// Ancestor condition type: policy accepted for the target
pub const CONDITION_ACCEPTED: &str = "Accepted";
/// Ancestor condition type: all references resolved
pub const CONDITION_RESOLVED_REFS: &str = "ResolvedRefs";

/// Compare ancestor lists ignoring condition transition timestamps.
fn ancestors_equal(a: &[PolicyAncestorStatus], b: &[PolicyAncestorStatus]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).all(|(x, y)| {
        x.ancestor_ref == y.ancestor_ref
            && x.controller_name == y.controller_name
            && x.conditions.len() == y.conditions.len()
            && x.conditions.iter().zip(y.conditions.iter()).all(|(c, d)| {
                c.r#type == d.r#type
                    && c.status == d.status
                    && c.reason == d.reason
                    && c.message == d.message
            })
    })
}

/// Accumulates status changes and applies them in one write.
pub struct AccessPolicyStatusUpdater {
    name: String,
    namespace: String,
    generation: Option<i64>,
    status: CloudflareAccessPolicyStatus,
    changed: bool,
}

impl AccessPolicyStatusUpdater {
    /// Start from the resource's current status.
    #[must_use]
    pub fn new(policy: &CloudflareAccessPolicy) -> Self {
        Self {
            name: policy.name_any(),
            namespace: policy.namespace().unwrap_or_default(),
            generation: policy.metadata.generation,
            status: policy.status.clone().unwrap_or_default(),
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

    /// Record the external application identity.
    pub fn set_application(&mut self, id: &str, aud: Option<&str>) {
        if self.status.application_id.as_deref() != Some(id) {
            self.status.application_id = Some(id.to_string());
            self.changed = true;
        }
        if self.status.application_aud.as_deref() != aud {
            self.status.application_aud = aud.map(str::to_string);
            self.changed = true;
        }
    }

    /// Record minted service token ids.
    pub fn set_service_token_ids(&mut self, ids: Vec<String>) {
        let new = if ids.is_empty() { None } else { Some(ids) };
        if self.status.service_token_ids != new {
            self.status.service_token_ids = new;
            self.changed = true;
        }
    }

    /// Record the mTLS rule id.
    pub fn set_mtls_rule_id(&mut self, id: Option<String>) {
        if self.status.mtls_rule_id != id {
            self.status.mtls_rule_id = id;
            self.changed = true;
        }
    }

    /// Replace the ancestor entries and the attached-target count.
    pub fn set_ancestors(&mut self, ancestors: Vec<PolicyAncestorStatus>, attached: i32) {
        if !ancestors_equal(&self.status.ancestors, &ancestors) {
            self.status.ancestors = ancestors;
            self.changed = true;
        }
        if self.status.attached_targets != Some(attached) {
            self.status.attached_targets = Some(attached);
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

    /// Apply the batched status if anything changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the status patch fails.
    pub async fn apply(&self, client: &Client) -> Result<()> {
        if !self.changed {
            debug!(
                policy = %self.name,
                namespace = %self.namespace,
                "AccessPolicy status unchanged, skipping write"
            );
            return Ok(());
        }

        let api: Api<CloudflareAccessPolicy> = Api::namespaced(client.clone(), &self.namespace);
        let patch = json!({ "status": self.status });
        api.patch_status(&self.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "status_helpers_tests.rs"]
mod status_helpers_tests;
