// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generic finalizer management for Kubernetes resources.
//!
//! This module provides reusable functions for adding, removing, and handling
//! finalizers on cfgate custom resources. Finalizer edits go through merge
//! patches rather than full updates to minimize write conflicts with other
//! controllers touching the same object.
//!
//! # Example
//!
//! ```rust,ignore
//! use cfgate::reconcilers::finalizers::{ensure_finalizer, handle_deletion, FinalizerCleanup};
//! use cfgate::constants::TUNNEL_FINALIZER;
//!
//! async fn reconcile(ctx: Arc<Context>, tunnel: CloudflareTunnel) -> Result<()> {
//!     if tunnel.metadata.deletion_timestamp.is_some() {
//!         return handle_deletion(&ctx, &tunnel, TUNNEL_FINALIZER).await;
//!     }
//!     ensure_finalizer(&ctx.client, &tunnel, TUNNEL_FINALIZER).await?;
//!     // Normal reconciliation logic...
//!     Ok(())
//! }
//! ```

use crate::context::Context;
use anyhow::Result;
use kube::api::{Patch, PatchParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Trait for resources that require cleanup operations when being deleted.
///
/// Implement this trait to define the external cleanup that must run before
/// the finalizer is removed. Cleanup receives the shared [`Context`] because
/// every cfgate cleanup path needs credentials resolved through it.
#[async_trait::async_trait]
pub trait FinalizerCleanup: Resource + ResourceExt + Clone {
    /// Perform cleanup operations before the finalizer is removed.
    ///
    /// # Errors
    ///
    /// Returning an error keeps the finalizer in place; deletion stays
    /// blocked until a later reconciliation succeeds.
    async fn cleanup(&self, ctx: &Arc<Context>) -> Result<()>;
}

/// Add a finalizer to a resource if not already present.
///
/// The operation is idempotent and patches only `metadata.finalizers` via a
/// merge patch.
///
/// # Errors
///
/// Returns an error if the API patch operation fails.
pub async fn ensure_finalizer<T>(client: &Client, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + ResourceExt
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let namespace = resource.namespace().unwrap_or_default();
    let name = resource.name_any();

    // Check if finalizer is already present
    if resource
        .meta()
        .finalizers
        .as_ref()
        .is_none_or(|f| !f.contains(&finalizer.to_string()))
    {
        info!(
            "Adding finalizer {} to {}/{} {}",
            finalizer,
            namespace,
            name,
            T::kind(&())
        );

        let mut finalizers = resource.meta().finalizers.clone().unwrap_or_default();
        finalizers.push(finalizer.to_string());

        let api: Api<T> = Api::namespaced(client.clone(), &namespace);
        let patch = json!({ "metadata": { "finalizers": finalizers } });
        api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
    }

    Ok(())
}

/// Remove a finalizer from a resource.
///
/// The operation is idempotent. Typically called through [`handle_deletion`],
/// which runs cleanup first.
///
/// # Errors
///
/// Returns an error if the API patch operation fails.
pub async fn remove_finalizer<T>(client: &Client, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + ResourceExt
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let namespace = resource.namespace().unwrap_or_default();
    let name = resource.name_any();

    // Check if finalizer is present
    if resource
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.contains(&finalizer.to_string()))
    {
        info!(
            "Removing finalizer {} from {}/{} {}",
            finalizer,
            namespace,
            name,
            T::kind(&())
        );

        let mut finalizers = resource.meta().finalizers.clone().unwrap_or_default();
        finalizers.retain(|f| f != finalizer);

        let api: Api<T> = Api::namespaced(client.clone(), &namespace);
        let patch = json!({ "metadata": { "finalizers": finalizers } });
        api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
    }

    Ok(())
}

/// Handle resource deletion with cleanup and finalizer removal.
///
/// 1. Runs the resource's [`FinalizerCleanup::cleanup`]
/// 2. Removes the finalizer so Kubernetes can complete the deletion
///
/// Call this when a resource has a deletion timestamp. If cleanup fails, the
/// finalizer remains and deletion is retried on a later reconciliation.
///
/// # Errors
///
/// Returns an error if cleanup or the finalizer removal fails.
pub async fn handle_deletion<T>(ctx: &Arc<Context>, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + ResourceExt
        + FinalizerCleanup
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let namespace = resource.namespace().unwrap_or_default();
    let name = resource.name_any();

    info!("{} {}/{} is being deleted", T::kind(&()), namespace, name);

    // Only proceed if the finalizer is present
    if resource
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.contains(&finalizer.to_string()))
    {
        info!(
            "Running cleanup for {} {}/{}",
            T::kind(&()),
            namespace,
            name
        );

        resource.cleanup(ctx).await?;

        remove_finalizer(&ctx.client, resource, finalizer).await?;
    }

    Ok(())
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
