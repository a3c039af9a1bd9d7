// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes reconciliation controllers for Cloudflare resources.
//!
//! This module contains the reconciliation logic for all cfgate Custom
//! Resources. Each reconciler watches for changes to its respective resource
//! type and converges external Cloudflare state accordingly.
//!
//! # Reconciliation Architecture
//!
//! cfgate follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - Monitor resource changes via Kubernetes API
//! 2. **Reconcile** - Compare desired state (CRD spec) with external state
//! 3. **Update** - Issue Cloudflare create/update/delete calls to converge
//! 4. **Status** - Report reconciliation results back to Kubernetes
//!
//! Reconcilers never talk to each other; they coordinate through shared
//! external objects whose ownership is declared in record metadata (see
//! `crate::ownership`).
//!
//! # Available Reconcilers
//!
//! - [`reconcile_tunnel`] / [`delete_tunnel`] - External tunnel plus agent workload
//! - [`reconcile_dnssync`] / [`delete_dnssync`] - Hostname-to-CNAME convergence
//! - [`reconcile_accesspolicy`] / [`delete_accesspolicy`] - Access application attachment
//! - [`reconcile_httproute`] - Route-to-gateway validation and parent status

pub mod accesspolicy;
pub mod dnssync;
pub mod finalizers;
pub mod httproute;
pub mod resources;
pub mod retry;
pub mod status;
pub mod tunnel;

#[cfg(test)]
mod mod_tests;

pub use accesspolicy::{delete_accesspolicy, reconcile_accesspolicy};
pub use dnssync::{delete_dnssync, reconcile_dnssync};
pub use httproute::reconcile_httproute;
pub use tunnel::{delete_tunnel, reconcile_tunnel};

/// Check if a resource's spec has changed by comparing generation with `observed_generation`.
///
/// This is the standard Kubernetes pattern for determining if reconciliation is needed.
/// The `metadata.generation` field is incremented by Kubernetes only when the spec changes,
/// while `status.observed_generation` is set by the controller after processing a spec.
///
/// # Arguments
///
/// * `current_generation` - The resource's current `metadata.generation`
/// * `observed_generation` - The controller's last `status.observed_generation`
///
/// # Returns
///
/// * `true` - Reconciliation is needed (spec changed or first reconciliation)
/// * `false` - No reconciliation needed (spec unchanged, status-only update)
#[must_use]
pub fn should_reconcile(current_generation: Option<i64>, observed_generation: Option<i64>) -> bool {
    match (current_generation, observed_generation) {
        (Some(current), Some(observed)) => current != observed,
        (Some(_), None) => true, // First reconciliation
        _ => false,              // No generation tracking available
    }
}

/// Check if a status value has actually changed compared to the current status.
///
/// This helper prevents unnecessary status updates that would trigger
/// reconciliation loops: in kube-rs, status updates produce "object updated"
/// events, and writing an unchanged status on every pass would re-enqueue
/// forever through the secondary watches.
#[must_use]
pub fn status_changed<T: PartialEq>(current_value: &Option<T>, new_value: &Option<T>) -> bool {
    current_value != new_value
}
