// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTPRoute reconciliation logic.
//!
//! Validates each route against its parent gateways and stamps one
//! `RouteParentStatus` per cfgate-owned parent with `Accepted` and
//! `ResolvedRefs` conditions. Entries written by foreign controllers are
//! preserved verbatim; parents whose gateway class belongs to another
//! controller are left entirely alone.

use crate::constants::GATEWAY_CONTROLLER_NAME;
use crate::context::Context;
use crate::gateway::{Gateway, HTTPRoute, ParentReference, RouteParentStatus, RouteStatus};
use crate::labels::ANNOTATION_TUNNEL_REF;
use crate::reconcilers::status::{create_condition, STATUS_FALSE, STATUS_TRUE};
use anyhow::Result;
use k8s_openapi::api::core::v1::{Namespace, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::{Patch, PatchParams};
use kube::{Api, ResourceExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Condition type: route accepted by the parent
pub const CONDITION_ACCEPTED: &str = "Accepted";
/// Condition type: backend references resolved
pub const CONDITION_RESOLVED_REFS: &str = "ResolvedRefs";

/// Outcome of validating one parent reference.
struct ParentValidation {
    accepted: (String, String),      // (reason, message) with True iff reason == "Accepted"
    resolved_refs: (String, String), // (reason, message) with True iff reason == "ResolvedRefs"
}

/// Match Kubernetes label-selector semantics against a label set.
///
/// `matchLabels` and `matchExpressions` are ANDed; an empty selector matches
/// everything.
#[must_use]
pub fn matches_selector(selector: &LabelSelector, labels: &BTreeMap<String, String>) -> bool {
    if let Some(match_labels) = &selector.match_labels {
        for (key, value) in match_labels {
            if labels.get(key) != Some(value) {
                return false;
            }
        }
    }

    if let Some(expressions) = &selector.match_expressions {
        for expression in expressions {
            let actual = labels.get(&expression.key);
            let values = expression.values.as_deref().unwrap_or_default();
            let ok = match expression.operator.as_str() {
                "In" => actual.is_some_and(|v| values.contains(v)),
                "NotIn" => actual.is_none_or(|v| !values.contains(v)),
                "Exists" => actual.is_some(),
                "DoesNotExist" => actual.is_none(),
                _ => false,
            };
            if !ok {
                return false;
            }
        }
    }

    true
}

/// Whether a listener admits routes from the given namespace.
async fn listener_admits_namespace(
    ctx: &Arc<Context>,
    gateway: &Gateway,
    listener_name: &str,
    route_namespace: &str,
) -> Result<bool> {
    let Some(listener) = gateway
        .spec
        .listeners
        .iter()
        .find(|l| l.name == listener_name)
    else {
        return Ok(false);
    };

    let from = listener
        .allowed_routes
        .as_ref()
        .and_then(|a| a.namespaces.as_ref())
        .and_then(|n| n.from.as_deref())
        .unwrap_or("Same");

    match from {
        "All" => Ok(true),
        "Same" => Ok(gateway.namespace().as_deref() == Some(route_namespace)),
        "Selector" => {
            let Some(selector) = listener
                .allowed_routes
                .as_ref()
                .and_then(|a| a.namespaces.as_ref())
                .and_then(|n| n.selector.as_ref())
            else {
                return Ok(false);
            };
            let namespaces: Api<Namespace> = Api::all(ctx.client.clone());
            let namespace = namespaces.get(route_namespace).await?;
            Ok(matches_selector(
                selector,
                namespace.metadata.labels.as_ref().unwrap_or(&BTreeMap::new()),
            ))
        }
        _ => Ok(false),
    }
}

/// Resolve backend service references of a route.
///
/// Only `kind: Service` (or unset) backends are supported; missing services
/// and foreign kinds fail `ResolvedRefs`.
async fn validate_backends(
    ctx: &Arc<Context>,
    route: &HTTPRoute,
    route_namespace: &str,
) -> Result<(String, String)> {
    for rule in route.spec.rules.as_deref().unwrap_or_default() {
        for backend in rule.backend_refs.as_deref().unwrap_or_default() {
            if backend.kind.as_deref().is_some_and(|k| k != "Service") {
                return Ok((
                    "InvalidKind".to_string(),
                    format!(
                        "backend {} has unsupported kind {}",
                        backend.name,
                        backend.kind.as_deref().unwrap_or_default()
                    ),
                ));
            }

            let namespace = backend.namespace.as_deref().unwrap_or(route_namespace);
            let services: Api<Service> = Api::namespaced(ctx.client.clone(), namespace);
            if services.get(&backend.name).await.is_err() {
                return Ok((
                    "BackendNotFound".to_string(),
                    format!("service {namespace}/{} not found", backend.name),
                ));
            }
        }
    }

    Ok((
        "ResolvedRefs".to_string(),
        "all backend references resolved".to_string(),
    ))
}

/// Validate one parent reference. Returns `None` when the parent belongs to
/// another controller and must not be stamped.
async fn validate_parent(
    ctx: &Arc<Context>,
    route: &HTTPRoute,
    route_namespace: &str,
    parent: &ParentReference,
) -> Result<Option<ParentValidation>> {
    let gateway_namespace = parent.namespace.as_deref().unwrap_or(route_namespace);

    let Some(gateway) = ctx.stores.get_gateway(&parent.name, gateway_namespace) else {
        return Ok(Some(ParentValidation {
            accepted: (
                "NoMatchingParent".to_string(),
                format!("gateway {gateway_namespace}/{} not found", parent.name),
            ),
            resolved_refs: (
                "ResolvedRefs".to_string(),
                "backends not evaluated".to_string(),
            ),
        }));
    };

    // Foreign gateway classes are none of our business
    let controller = ctx
        .stores
        .get_gateway_class(&gateway.spec.gateway_class_name)
        .map(|gc| gc.spec.controller_name.clone());
    if controller.as_deref() != Some(GATEWAY_CONTROLLER_NAME) {
        debug!(
            gateway = %parent.name,
            class = %gateway.spec.gateway_class_name,
            "Parent gateway belongs to another controller; skipping"
        );
        return Ok(None);
    }

    if !gateway.annotations().contains_key(ANNOTATION_TUNNEL_REF) {
        return Ok(Some(ParentValidation {
            accepted: (
                "TunnelRefMissing".to_string(),
                format!(
                    "gateway {gateway_namespace}/{} carries no {ANNOTATION_TUNNEL_REF} annotation",
                    parent.name
                ),
            ),
            resolved_refs: (
                "ResolvedRefs".to_string(),
                "backends not evaluated".to_string(),
            ),
        }));
    }

    if let Some(section) = parent.section_name.as_deref() {
        if !gateway.spec.listeners.iter().any(|l| l.name == section) {
            return Ok(Some(ParentValidation {
                accepted: (
                    "NoMatchingListener".to_string(),
                    format!("listener {section} not found on gateway {}", parent.name),
                ),
                resolved_refs: (
                    "ResolvedRefs".to_string(),
                    "backends not evaluated".to_string(),
                ),
            }));
        }
        if !listener_admits_namespace(ctx, &gateway, section, route_namespace).await? {
            return Ok(Some(ParentValidation {
                accepted: (
                    "NotAllowedByListeners".to_string(),
                    format!(
                        "listener {section} does not admit routes from namespace {route_namespace}"
                    ),
                ),
                resolved_refs: (
                    "ResolvedRefs".to_string(),
                    "backends not evaluated".to_string(),
                ),
            }));
        }
    }

    let resolved_refs = validate_backends(ctx, route, route_namespace).await?;

    Ok(Some(ParentValidation {
        accepted: ("Accepted".to_string(), "route accepted".to_string()),
        resolved_refs,
    }))
}

fn parent_status(parent: &ParentReference, validation: &ParentValidation) -> RouteParentStatus {
    let accepted_true = validation.accepted.0 == "Accepted";
    let resolved_true = validation.resolved_refs.0 == "ResolvedRefs";

    RouteParentStatus {
        parent_ref: parent.clone(),
        controller_name: GATEWAY_CONTROLLER_NAME.to_string(),
        conditions: vec![
            create_condition(
                CONDITION_ACCEPTED,
                if accepted_true { STATUS_TRUE } else { STATUS_FALSE },
                &validation.accepted.0,
                &validation.accepted.1,
            ),
            create_condition(
                CONDITION_RESOLVED_REFS,
                if resolved_true { STATUS_TRUE } else { STATUS_FALSE },
                &validation.resolved_refs.0,
                &validation.resolved_refs.1,
            ),
        ],
    }
}

/// Merge our freshly computed entries over the existing parent status,
/// preserving entries stamped by foreign controllers.
#[must_use]
pub fn merge_parent_statuses(
    existing: &[RouteParentStatus],
    ours: Vec<RouteParentStatus>,
) -> Vec<RouteParentStatus> {
    let mut merged: Vec<RouteParentStatus> = existing
        .iter()
        .filter(|entry| entry.controller_name != GATEWAY_CONTROLLER_NAME)
        .cloned()
        .collect();
    merged.extend(ours);
    merged
}

/// Compare parent status lists ignoring condition transition timestamps.
fn statuses_equal(a: &[RouteParentStatus], b: &[RouteParentStatus]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).all(|(x, y)| {
        x.parent_ref == y.parent_ref
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

/// Reconciles an `HTTPRoute` resource.
///
/// # Errors
///
/// Returns an error if a Kubernetes read or the status write fails.
pub async fn reconcile_httproute(ctx: Arc<Context>, route: HTTPRoute) -> Result<()> {
    let namespace = route.namespace().unwrap_or_default();
    let name = route.name_any();

    debug!("Reconciling HTTPRoute: {}/{}", namespace, name);

    let mut ours = Vec::new();
    for parent in route.spec.parent_refs.as_deref().unwrap_or_default() {
        if !parent.is_gateway() {
            continue;
        }
        if let Some(validation) = validate_parent(&ctx, &route, &namespace, parent).await? {
            ours.push(parent_status(parent, &validation));
        }
    }

    let existing = route
        .status
        .as_ref()
        .map(|s| s.parents.clone())
        .unwrap_or_default();
    let merged = merge_parent_statuses(&existing, ours);

    if statuses_equal(&existing, &merged) {
        debug!(route = %name, "Route parent status unchanged, skipping write");
        return Ok(());
    }

    let api: Api<HTTPRoute> = Api::namespaced(ctx.client.clone(), &namespace);
    let patch = serde_json::json!({ "status": RouteStatus { parents: merged } });
    api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;

    info!(route = %name, namespace = %namespace, "Route parent status updated");
    Ok(())
}

#[cfg(test)]
#[path = "httproute_tests.rs"]
mod httproute_tests;
