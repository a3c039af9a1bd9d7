// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status batching for the DNS sync reconciler.
//!
//! `lastSyncTime` is only advanced when something else changed. This breaks
//! the feedback loop where every reconciliation would rewrite status, emit an
//! "object updated" event, and re-enqueue itself through the watches.

use crate::crd::{
    CloudflareDNSSync, CloudflareDNSSyncStatus, RecordSyncState, SyncedRecordStatus,
};
use crate::reconcilers::status::{create_condition, upsert_condition, STATUS_FALSE, STATUS_TRUE};
use anyhow::Result;
use chrono::Utc;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::debug;

/// Condition type: overall readiness
pub const CONDITION_READY: &str = "Ready";
/// Condition type: zone resolution
pub const CONDITION_ZONES_RESOLVED: &str = "ZonesResolved";
/// Condition type: record convergence
pub const CONDITION_DNS_SYNCED: &str = "DNSSynced";

/// Accumulates status changes and applies them in one write.
pub struct DnsSyncStatusUpdater {
    name: String,
    namespace: String,
    generation: Option<i64>,
    status: CloudflareDNSSyncStatus,
    changed: bool,
}

impl DnsSyncStatusUpdater {
    /// Start from the resource's current status.
    #[must_use]
    pub fn new(sync: &CloudflareDNSSync) -> Self {
        Self {
            name: sync.name_any(),
            namespace: sync.namespace().unwrap_or_default(),
            generation: sync.metadata.generation,
            status: sync.status.clone().unwrap_or_default(),
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

    /// Record zone resolution state.
    pub fn set_zones_resolved(&mut self, resolved: bool, message: &str) {
        let (status, reason) = if resolved {
            (STATUS_TRUE, "ZonesResolved")
        } else {
            (STATUS_FALSE, "ZoneLookupFailed")
        };
        self.set_condition(CONDITION_ZONES_RESOLVED, status, reason, message);
    }

    /// Replace the per-record entries and recompute the aggregate counts.
    ///
    /// `lastSyncTime` advances only when the entries actually changed.
    pub fn set_records(&mut self, records: Vec<SyncedRecordStatus>) {
        let synced = count(&records, RecordSyncState::Synced);
        let pending = count(&records, RecordSyncState::Pending);
        let failed = count(&records, RecordSyncState::Failed);

        if self.status.records != records
            || self.status.synced_records != Some(synced)
            || self.status.pending_records != Some(pending)
            || self.status.failed_records != Some(failed)
        {
            self.status.records = records;
            self.status.synced_records = Some(synced);
            self.status.pending_records = Some(pending);
            self.status.failed_records = Some(failed);
            self.status.last_sync_time = Some(Utc::now().to_rfc3339());
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

    /// The entries recorded by the previous reconciliation.
    #[must_use]
    pub fn previous_records(sync: &CloudflareDNSSync) -> Vec<SyncedRecordStatus> {
        sync.status
            .as_ref()
            .map(|s| s.records.clone())
            .unwrap_or_default()
    }

    /// Apply the batched status if anything changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the status patch fails.
    pub async fn apply(&self, client: &Client) -> Result<()> {
        if !self.changed {
            debug!(
                sync = %self.name,
                namespace = %self.namespace,
                "DNSSync status unchanged, skipping write"
            );
            return Ok(());
        }

        let api: Api<CloudflareDNSSync> = Api::namespaced(client.clone(), &self.namespace);
        let patch = json!({ "status": self.status });
        api.patch_status(&self.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

fn count(records: &[SyncedRecordStatus], state: RecordSyncState) -> i32 {
    i32::try_from(records.iter().filter(|r| r.status == state).count()).unwrap_or(i32::MAX)
}

#[cfg(test)]
#[path = "status_helpers_tests.rs"]
mod status_helpers_tests;
