// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generic resource creation and update helpers for Kubernetes resources.
//!
//! Child objects (token secrets, agent deployments, config maps, service
//! token secrets) all go through server-side apply so repeated
//! reconciliations converge without conflict churn.

use anyhow::Result;
use kube::api::{Patch, PatchParams, PostParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use tracing::{debug, info};

/// Field manager name cfgate uses for server-side apply
pub const FIELD_MANAGER: &str = "cfgate-controller";

/// Create or update a resource using server-side apply strategy.
///
/// Checks if the resource exists; if it does, patches it with server-side
/// apply, otherwise creates it.
///
/// # Errors
///
/// Returns an error if the resource has no name or the API operation fails.
pub async fn create_or_apply<T>(client: &Client, namespace: &str, resource: &T) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + ResourceExt
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let name = resource
        .meta()
        .name
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("Resource must have a name"))?;

    let api: Api<T> = Api::namespaced(client.clone(), namespace);

    debug!(
        namespace = %namespace,
        name = %name,
        kind = %T::kind(&()),
        "Creating or updating resource with Apply strategy"
    );

    if api.get(name).await.is_ok() {
        api.patch(
            name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(resource),
        )
        .await?;
        info!("Updated {} {}/{}", T::kind(&()), namespace, name);
    } else {
        api.create(&PostParams::default(), resource).await?;
        info!("Created {} {}/{}", T::kind(&()), namespace, name);
    }

    Ok(())
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
