// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Target resolution for access policies.
//!
//! A policy targets Gateway API objects. Each target is resolved
//! independently: existence, the cross-namespace `ReferenceGrant` check, and
//! hostname extraction. Failures are per-target; one broken target never
//! aborts the rest (gateway deletions are common and must not block
//! unrelated attachments).

use crate::constants::{API_GROUP, GATEWAY_API_GROUP, KIND_ACCESS_POLICY};
use crate::context::Context;
use crate::crd::{TargetKind, TargetReference};
use crate::gateway::{GRPCRoute, ReferenceGrant, TCPRoute, UDPRoute};
use crate::labels::ANNOTATION_HOSTNAME;
use kube::{Api, ResourceExt};
use std::sync::Arc;
use tracing::debug;

/// Why a target failed resolution; feeds the ancestor conditions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetFailure {
    /// CamelCase condition reason.
    pub reason: String,
    /// Human-readable message.
    pub message: String,
}

impl TargetFailure {
    fn new(reason: &str, message: String) -> Self {
        Self {
            reason: reason.to_string(),
            message,
        }
    }
}

/// A successfully resolved target.
#[derive(Clone, Debug)]
pub struct ResolvedTarget {
    /// Hostnames the target serves (route hostnames or listener hostnames).
    pub hostnames: Vec<String>,
}

/// Resolution outcome of one target reference.
#[derive(Clone, Debug)]
pub struct TargetResolution {
    /// The reference as declared (round-trips into ancestor status).
    pub reference: TargetReference,
    /// The resolved target or the failure to report.
    pub outcome: Result<ResolvedTarget, TargetFailure>,
}

/// Whether any grant in the target namespace permits this policy reference.
///
/// A grant matches when one `from` entry names this operator's group, the
/// `CloudflareAccessPolicy` kind, and the policy namespace, and one `to`
/// entry names the Gateway API group, the target kind, and (when present)
/// the target name.
#[must_use]
pub fn grant_permits(
    grants: &[ReferenceGrant],
    policy_namespace: &str,
    target_kind: TargetKind,
    target_name: &str,
) -> bool {
    grants.iter().any(|grant| {
        let from_matches = grant.spec.from.iter().any(|from| {
            from.group == API_GROUP
                && from.kind == KIND_ACCESS_POLICY
                && from.namespace == policy_namespace
        });
        let to_matches = grant.spec.to.iter().any(|to| {
            to.group == GATEWAY_API_GROUP
                && to.kind == target_kind.as_str()
                && to.name.as_deref().is_none_or(|n| n == target_name)
        });
        from_matches && to_matches
    })
}

/// Hostnames of a gateway target: listener hostnames, optionally restricted
/// to the listener named by `sectionName`.
fn gateway_hostnames(
    gateway: &crate::gateway::Gateway,
    section_name: Option<&str>,
) -> Vec<String> {
    gateway
        .spec
        .listeners
        .iter()
        .filter(|l| section_name.is_none_or(|s| l.name == s))
        .filter_map(|l| l.hostname.clone())
        .collect()
}

/// Resolve one target reference.
pub async fn resolve_target(
    ctx: &Arc<Context>,
    policy_namespace: &str,
    target: &TargetReference,
) -> TargetResolution {
    let target_namespace = target
        .namespace
        .clone()
        .unwrap_or_else(|| policy_namespace.to_string());

    // Cross-namespace references need an explicit grant in the target namespace
    if target_namespace != policy_namespace {
        let grants_api: Api<ReferenceGrant> =
            Api::namespaced(ctx.client.clone(), &target_namespace);
        let grants = match grants_api.list(&kube::api::ListParams::default()).await {
            Ok(list) => list.items,
            Err(e) => {
                return TargetResolution {
                    reference: target.clone(),
                    outcome: Err(TargetFailure::new(
                        "RefNotPermitted",
                        format!("failed to list ReferenceGrants in {target_namespace}: {e}"),
                    )),
                };
            }
        };

        if !grant_permits(&grants, policy_namespace, target.kind, &target.name) {
            debug!(
                target = %target.name,
                namespace = %target_namespace,
                "Cross-namespace reference without matching ReferenceGrant"
            );
            return TargetResolution {
                reference: target.clone(),
                outcome: Err(TargetFailure::new(
                    "RefNotPermitted",
                    format!(
                        "ReferenceGrant missing for {}/{} in namespace {target_namespace}",
                        target.kind.as_str(),
                        target.name
                    ),
                )),
            };
        }
    }

    let not_found = || {
        TargetFailure::new(
            "TargetNotFound",
            format!(
                "{} {target_namespace}/{} not found",
                target.kind.as_str(),
                target.name
            ),
        )
    };

    let outcome = match target.kind {
        TargetKind::Gateway => ctx
            .stores
            .get_gateway(&target.name, &target_namespace)
            .map(|gateway| ResolvedTarget {
                hostnames: gateway_hostnames(&gateway, target.section_name.as_deref()),
            })
            .ok_or_else(not_found),
        TargetKind::HTTPRoute => ctx
            .stores
            .get_http_route(&target.name, &target_namespace)
            .map(|route| ResolvedTarget {
                hostnames: route.spec.hostnames.clone().unwrap_or_default(),
            })
            .ok_or_else(not_found),
        TargetKind::GRPCRoute => {
            let api: Api<GRPCRoute> = Api::namespaced(ctx.client.clone(), &target_namespace);
            match api.get(&target.name).await {
                Ok(route) => Ok(ResolvedTarget {
                    hostnames: route.spec.hostnames.clone().unwrap_or_default(),
                }),
                Err(_) => Err(not_found()),
            }
        }
        TargetKind::TCPRoute => {
            let api: Api<TCPRoute> = Api::namespaced(ctx.client.clone(), &target_namespace);
            match api.get(&target.name).await {
                Ok(route) => Ok(ResolvedTarget {
                    hostnames: annotation_hostname(route.annotations()),
                }),
                Err(_) => Err(not_found()),
            }
        }
        TargetKind::UDPRoute => {
            let api: Api<UDPRoute> = Api::namespaced(ctx.client.clone(), &target_namespace);
            match api.get(&target.name).await {
                Ok(route) => Ok(ResolvedTarget {
                    hostnames: annotation_hostname(route.annotations()),
                }),
                Err(_) => Err(not_found()),
            }
        }
    };

    TargetResolution {
        reference: target.clone(),
        outcome,
    }
}

/// TCP/UDP routes carry no hostname field; the annotation supplies one.
fn annotation_hostname(
    annotations: &std::collections::BTreeMap<String, String>,
) -> Vec<String> {
    annotations
        .get(ANNOTATION_HOSTNAME)
        .map(|h| vec![h.clone()])
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "targets_tests.rs"]
mod targets_tests;
