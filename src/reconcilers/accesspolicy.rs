// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Access policy reconciliation logic.
//!
//! Converges one Zero Trust Access application per policy, attaches its rules
//! in precedence order, mints service tokens into child secrets, and stamps a
//! policy-ancestor status entry per target (the Gateway API policy attachment
//! pattern).
//!
//! Target resolution is per-target: a missing route or absent
//! `ReferenceGrant` yields a `False` ancestor entry for that target while the
//! rest converge normally.
//!
//! Credentials: the policy's own `cloudflare` block when set; otherwise
//! inherited from the first tunnel referenced transitively through a targeted
//! route's parent gateway. Only the credential secret must exist; the tunnel
//! need not be `Ready`, so applications can be provisioned ahead of tunnel
//! readiness.

pub mod status_helpers;
pub mod targets;

use self::status_helpers::{
    AccessPolicyStatusUpdater, CONDITION_ACCEPTED, CONDITION_CREDENTIALS_VALID, CONDITION_READY,
    CONDITION_RESOLVED_REFS,
};
use self::targets::{resolve_target, TargetResolution};
use crate::cloudflare::access::build_policy_payload;
use crate::cloudflare::types::{
    AccessAppPolicy, AccessAppPolicyUpsert, AccessApplication, AccessApplicationUpsert,
};
use crate::cloudflare::CloudflareApi;
use crate::constants::{ACCESS_POLICY_FINALIZER, API_GROUP_VERSION, KIND_ACCESS_POLICY};
use crate::context::Context;
use crate::credentials::client_from_credentials;
use crate::crd::{
    AccessDecision, AccessRule, AccessRuleCriterion, CloudflareAccessPolicy, CloudflareTunnel,
    PolicyAncestorStatus, TargetReference,
};
use crate::ownership::{is_owned_application, OWNERSHIP_SENTINEL};
use crate::reconcilers::finalizers::{ensure_finalizer, handle_deletion, FinalizerCleanup};
use crate::reconcilers::resources::create_or_apply;
use crate::reconcilers::retry::retry_cloudflare_call;
use crate::reconcilers::status::{create_condition, STATUS_FALSE, STATUS_TRUE};
use anyhow::{Context as _, Result};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Secret key for the service token client id
const SERVICE_TOKEN_CLIENT_ID_KEY: &str = "CF_ACCESS_CLIENT_ID";
/// Secret key for the service token client secret
const SERVICE_TOKEN_CLIENT_SECRET_KEY: &str = "CF_ACCESS_CLIENT_SECRET";
/// Name suffix of the synthesized mTLS rule
const MTLS_RULE_SUFFIX: &str = "mtls";

/// The declared targets, enforcing `targetRef` xor `targetRefs`.
///
/// An empty result is legal at this level: routes can also attach through
/// the `cfgate.io/access-policy` annotation, and having no target at all is
/// only rejected after the annotation scan.
///
/// # Errors
///
/// Returns an error when both fields are set, or `targetRefs` is present but
/// empty (CRD admission catches most cases; this is the residual fail-fast).
pub fn policy_targets(policy: &CloudflareAccessPolicy) -> Result<Vec<TargetReference>> {
    match (&policy.spec.target_ref, &policy.spec.target_refs) {
        (Some(single), None) => Ok(vec![single.clone()]),
        (None, Some(many)) if !many.is_empty() => Ok(many.clone()),
        (None, Some(_)) => anyhow::bail!("targetRefs must not be empty"),
        (Some(_), Some(_)) => anyhow::bail!("targetRef and targetRefs are mutually exclusive"),
        (None, None) => Ok(Vec::new()),
    }
}

/// Derive the application domain: explicit `application.domain`, else the
/// single distinct hostname across all resolved targets.
///
/// # Errors
///
/// Returns an error when no hostname is derivable or the union is ambiguous.
pub fn extract_domain(
    explicit: Option<&str>,
    resolutions: &[TargetResolution],
) -> Result<String> {
    if let Some(domain) = explicit {
        return Ok(domain.to_string());
    }

    let mut distinct: Vec<&str> = Vec::new();
    for resolution in resolutions {
        if let Ok(resolved) = &resolution.outcome {
            for hostname in &resolved.hostnames {
                if !distinct.contains(&hostname.as_str()) {
                    distinct.push(hostname);
                }
            }
        }
    }

    match distinct.as_slice() {
        [single] => Ok((*single).to_string()),
        [] => anyhow::bail!("no hostname derivable from targets; set spec.application.domain"),
        many => anyhow::bail!(
            "ambiguous application domain across targets ({}); set spec.application.domain",
            many.join(", ")
        ),
    }
}

/// The first tunnel reachable transitively from the resolved targets, used
/// for credential inheritance.
fn inherit_tunnel(
    ctx: &Arc<Context>,
    policy_namespace: &str,
    targets: &[TargetReference],
) -> Option<Arc<CloudflareTunnel>> {
    for target in targets {
        let target_namespace = target
            .namespace
            .clone()
            .unwrap_or_else(|| policy_namespace.to_string());

        match target.kind {
            crate::crd::TargetKind::Gateway => {
                if let Some(gateway) = ctx.stores.get_gateway(&target.name, &target_namespace) {
                    if let Some(tunnel) = ctx.stores.tunnel_for_gateway(&gateway) {
                        return Some(tunnel);
                    }
                }
            }
            _ => {
                // Routes reach a tunnel through their parent gateways
                if let Some(route) = ctx.stores.get_http_route(&target.name, &target_namespace) {
                    for parent in route.spec.parent_refs.as_deref().unwrap_or_default() {
                        if !parent.is_gateway() {
                            continue;
                        }
                        let gateway_namespace = parent
                            .namespace
                            .clone()
                            .unwrap_or_else(|| target_namespace.clone());
                        if let Some(gateway) =
                            ctx.stores.get_gateway(&parent.name, &gateway_namespace)
                        {
                            if let Some(tunnel) = ctx.stores.tunnel_for_gateway(&gateway) {
                                return Some(tunnel);
                            }
                        }
                    }
                }
            }
        }
    }
    None
}

/// The application name: explicit, or `<namespace>/<name>`.
fn application_name(policy: &CloudflareAccessPolicy) -> String {
    policy.spec.application.name.clone().unwrap_or_else(|| {
        format!(
            "{}/{}",
            policy.namespace().unwrap_or_default(),
            policy.name_any()
        )
    })
}

/// Build the application upsert payload from the policy spec.
fn build_application_payload(
    policy: &CloudflareAccessPolicy,
    domain: &str,
) -> AccessApplicationUpsert {
    let app = &policy.spec.application;

    let domain_with_path = match app.path.as_deref() {
        Some(path) => format!("{domain}{path}"),
        None => domain.to_string(),
    };

    AccessApplicationUpsert {
        name: application_name(policy),
        domain: domain_with_path,
        r#type: app.app_type.clone().unwrap_or_else(|| "self_hosted".to_string()),
        session_duration: app.session_duration.clone(),
        tags: vec![OWNERSHIP_SENTINEL.to_string()],
        custom_deny_message: app.custom_deny_message.clone(),
        custom_deny_url: app.custom_deny_url.clone(),
        app_launcher_visible: app.app_launcher_visible,
        same_site_cookie_attribute: app.cookie.as_ref().and_then(|c| c.same_site.clone()),
        http_only_cookie_attribute: app.cookie.as_ref().and_then(|c| c.http_only),
        enable_binding_cookie: app.cookie.as_ref().and_then(|c| c.enable_binding_cookie),
    }
}

/// Whether the managed application drifted from the desired payload in any
/// field cfgate manages.
#[must_use]
pub fn application_differs(existing: &AccessApplication, desired: &AccessApplicationUpsert) -> bool {
    existing.name != desired.name
        || existing.domain != desired.domain
        || (desired.session_duration.is_some()
            && existing.session_duration != desired.session_duration)
        || existing.r#type.as_deref() != Some(desired.r#type.as_str())
}

/// Whether an attached rule drifted from the desired payload.
#[must_use]
pub fn rule_differs(existing: &AccessAppPolicy, desired: &AccessAppPolicyUpsert) -> bool {
    existing.decision != desired.decision
        || existing.precedence != Some(desired.precedence)
        || existing.include != desired.include
        || existing.exclude != desired.exclude
        || existing.require != desired.require
}

/// Create or adopt the external application.
async fn converge_application(
    api: &CloudflareApi,
    account_id: &str,
    payload: &AccessApplicationUpsert,
) -> Result<AccessApplication> {
    let existing = retry_cloudflare_call(
        || api.find_access_app_by_domain(account_id, &payload.domain),
        "find access application",
    )
    .await?;

    match existing {
        Some(app) if !is_owned_application(app.tags.as_deref()) => {
            // Foreign application at this domain; refuse to act
            anyhow::bail!(
                "access application {} at {} exists without ownership tag; refusing to manage it",
                app.id,
                payload.domain
            );
        }
        Some(app) if application_differs(&app, payload) => {
            let updated = retry_cloudflare_call(
                || api.update_access_app(account_id, &app.id, payload),
                "update access application",
            )
            .await?;
            Ok(updated)
        }
        Some(app) => {
            debug!(app_id = %app.id, "Access application already converged");
            Ok(app)
        }
        None => {
            let created = retry_cloudflare_call(
                || api.create_access_app(account_id, payload),
                "create access application",
            )
            .await?;
            Ok(created)
        }
    }
}

/// Synthesize the mTLS rule as an extra desired rule, when configured.
fn mtls_rule(policy: &CloudflareAccessPolicy) -> Option<AccessRule> {
    policy.spec.mtls.as_ref()?;
    Some(AccessRule {
        name: Some(format!("{}-{MTLS_RULE_SUFFIX}", policy.name_any())),
        decision: AccessDecision::NonIdentity,
        precedence: None,
        include: vec![AccessRuleCriterion {
            certificate: Some(true),
            ..Default::default()
        }],
        exclude: None,
        require: None,
        session_duration: None,
        approval_required: None,
    })
}

/// Upsert desired rules in precedence order and delete stale managed rules.
///
/// Returns the id of the synthesized mTLS rule, when one is configured.
async fn converge_rules(
    api: &CloudflareApi,
    account_id: &str,
    app_id: &str,
    policy: &CloudflareAccessPolicy,
) -> Result<Option<String>> {
    let policy_name = policy.name_any();

    let mut desired: Vec<AccessRule> = policy.spec.rules.clone();
    let mtls = mtls_rule(policy);
    let mtls_name = mtls.as_ref().and_then(|r| r.name.clone());
    if let Some(rule) = &mtls {
        desired.push(rule.clone());
    }

    let payloads: Vec<AccessAppPolicyUpsert> = desired
        .iter()
        .enumerate()
        .map(|(idx, rule)| build_policy_payload(&policy_name, rule, idx))
        .collect();

    let existing = retry_cloudflare_call(
        || api.list_app_policies(account_id, app_id),
        "list application rules",
    )
    .await?;

    let mut mtls_rule_id = None;
    for payload in &payloads {
        let current = existing.iter().find(|p| p.name == payload.name);
        let converged = match current {
            Some(rule) if rule_differs(rule, payload) => {
                retry_cloudflare_call(
                    || api.update_app_policy(account_id, app_id, &rule.id, payload),
                    "update application rule",
                )
                .await?
            }
            Some(rule) => rule.clone(),
            None => {
                retry_cloudflare_call(
                    || api.create_app_policy(account_id, app_id, payload),
                    "create application rule",
                )
                .await?
            }
        };

        if mtls_name.as_deref() == Some(payload.name.as_str()) {
            mtls_rule_id = Some(converged.id);
        }
    }

    // Stale rules on a managed application are ours to remove
    for stale in existing
        .iter()
        .filter(|e| !payloads.iter().any(|p| p.name == e.name))
    {
        info!(rule = %stale.name, "Deleting stale application rule");
        retry_cloudflare_call(
            || api.delete_app_policy(account_id, app_id, &stale.id),
            "delete stale application rule",
        )
        .await?;
    }

    Ok(mtls_rule_id)
}

/// Owner reference for child secrets of a policy.
fn policy_owner_references(policy: &CloudflareAccessPolicy) -> Vec<OwnerReference> {
    vec![OwnerReference {
        api_version: API_GROUP_VERSION.to_string(),
        kind: KIND_ACCESS_POLICY.to_string(),
        name: policy.name_any(),
        uid: policy.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }]
}

/// Mint missing service tokens and persist their credentials in child secrets.
async fn converge_service_tokens(
    ctx: &Arc<Context>,
    api: &CloudflareApi,
    account_id: &str,
    policy: &CloudflareAccessPolicy,
) -> Result<Vec<String>> {
    let Some(specs) = policy.spec.service_tokens.as_ref() else {
        return Ok(Vec::new());
    };

    let namespace = policy.namespace().unwrap_or_default();
    let existing = retry_cloudflare_call(
        || api.list_service_tokens(account_id),
        "list service tokens",
    )
    .await?;

    let mut ids = Vec::with_capacity(specs.len());
    for spec in specs {
        if let Some(token) = existing.iter().find(|t| t.name == spec.name) {
            // The client secret is only visible at mint time; an existing
            // token is reused as-is
            ids.push(token.id.clone());
            continue;
        }

        let minted = retry_cloudflare_call(
            || api.create_service_token(account_id, &spec.name, spec.duration.as_deref()),
            "create service token",
        )
        .await?;

        let secret_name = spec
            .secret_name
            .clone()
            .unwrap_or_else(|| format!("{}-{}", policy.name_any(), spec.name));
        let mut string_data = BTreeMap::new();
        string_data.insert(
            SERVICE_TOKEN_CLIENT_ID_KEY.to_string(),
            minted.client_id.clone(),
        );
        string_data.insert(
            SERVICE_TOKEN_CLIENT_SECRET_KEY.to_string(),
            minted.client_secret.clone().unwrap_or_default(),
        );

        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(secret_name),
                namespace: Some(namespace.clone()),
                owner_references: Some(policy_owner_references(policy)),
                ..Default::default()
            },
            type_: Some("Opaque".to_string()),
            string_data: Some(string_data),
            ..Default::default()
        };
        create_or_apply(&ctx.client, &namespace, &secret).await?;

        info!(token = %spec.name, "Service token minted and stored");
        ids.push(minted.id);
    }

    Ok(ids)
}

/// Build the ancestor entry for one target resolution.
fn ancestor_entry(resolution: &TargetResolution, accepted: bool) -> PolicyAncestorStatus {
    let mut conditions = Vec::with_capacity(2);
    match &resolution.outcome {
        Ok(_) => {
            conditions.push(create_condition(
                CONDITION_ACCEPTED,
                if accepted { STATUS_TRUE } else { STATUS_FALSE },
                if accepted { "Accepted" } else { "Pending" },
                if accepted {
                    "policy attached to target"
                } else {
                    "application not yet converged"
                },
            ));
            conditions.push(create_condition(
                CONDITION_RESOLVED_REFS,
                STATUS_TRUE,
                "ResolvedRefs",
                "target resolved",
            ));
        }
        Err(failure) => {
            conditions.push(create_condition(
                CONDITION_ACCEPTED,
                STATUS_FALSE,
                &failure.reason,
                &failure.message,
            ));
            conditions.push(create_condition(
                CONDITION_RESOLVED_REFS,
                STATUS_FALSE,
                &failure.reason,
                &failure.message,
            ));
        }
    }

    PolicyAncestorStatus {
        ancestor_ref: resolution.reference.clone(),
        controller_name: crate::constants::GATEWAY_CONTROLLER_NAME.to_string(),
        conditions,
    }
}

/// Reconciles a `CloudflareAccessPolicy` resource.
///
/// # Errors
///
/// Returns an error if credentials cannot be resolved, the domain is
/// ambiguous, or Cloudflare convergence fails. Per-target resolution
/// failures are reported in ancestor status, not as errors.
#[allow(clippy::too_many_lines)]
pub async fn reconcile_accesspolicy(
    ctx: Arc<Context>,
    policy: CloudflareAccessPolicy,
) -> Result<()> {
    let namespace = policy.namespace().unwrap_or_default();
    let name = policy.name_any();

    info!("Reconciling CloudflareAccessPolicy: {}/{}", namespace, name);

    if policy.metadata.deletion_timestamp.is_some() {
        return delete_accesspolicy(ctx, policy).await;
    }

    ensure_finalizer(&ctx.client, &policy, ACCESS_POLICY_FINALIZER).await?;

    let mut status = AccessPolicyStatusUpdater::new(&policy);

    // Residual validation after CRD admission
    for (idx, rule) in policy.spec.rules.iter().enumerate() {
        if rule.include.iter().all(|c| !c.is_populated()) {
            status.set_condition(
                CONDITION_READY,
                STATUS_FALSE,
                "InvalidRule",
                &format!("rule {idx} has no populated include criterion"),
            );
            status.apply(&ctx.client).await?;
            anyhow::bail!("rule {idx} has no populated include criterion");
        }
    }

    let mut declared_targets = match policy_targets(&policy) {
        Ok(targets) => targets,
        Err(e) => {
            status.set_condition(CONDITION_READY, STATUS_FALSE, "InvalidTargets", &format!("{e}"));
            status.apply(&ctx.client).await?;
            return Err(e);
        }
    };

    // Routes may opt in by annotation instead of being named as targets
    for route in ctx.stores.routes_annotated_with_policy(&namespace, &name) {
        let route_name = route.name_any();
        let already_declared = declared_targets.iter().any(|t| {
            t.kind == crate::crd::TargetKind::HTTPRoute
                && t.name == route_name
                && t.namespace.as_deref().unwrap_or(&namespace) == namespace
        });
        if !already_declared {
            debug!(route = %route_name, "Route attached via access-policy annotation");
            declared_targets.push(TargetReference {
                group: None,
                kind: crate::crd::TargetKind::HTTPRoute,
                name: route_name,
                namespace: None,
                section_name: None,
            });
        }
    }

    if declared_targets.is_empty() {
        status.set_condition(
            CONDITION_READY,
            STATUS_FALSE,
            "InvalidTargets",
            "no targetRef, targetRefs, or annotated route attaches this policy",
        );
        status.apply(&ctx.client).await?;
        anyhow::bail!("policy {namespace}/{name} has no targets");
    }

    // Per-target resolution; failures become ancestor entries
    let mut resolutions = Vec::with_capacity(declared_targets.len());
    for target in &declared_targets {
        resolutions.push(resolve_target(&ctx, &namespace, target).await);
    }

    // Credentials: own block, else inherit through the first targeted tunnel
    let (api, account_id) = match &policy.spec.cloudflare {
        Some(credentials) => {
            let api =
                client_from_credentials(&ctx.client, &ctx.credentials, credentials, &namespace)
                    .await;
            let account = policy.spec.account_id.clone();
            match (api, account) {
                (Ok(api), Some(account)) => (api, account),
                (Ok(_), None) => {
                    status.set_condition(
                        CONDITION_READY,
                        STATUS_FALSE,
                        "AccountUnknown",
                        "spec.accountId is required with explicit credentials",
                    );
                    status.apply(&ctx.client).await?;
                    anyhow::bail!("spec.accountId is required with explicit credentials");
                }
                (Err(e), _) => {
                    status.set_condition(
                        CONDITION_CREDENTIALS_VALID,
                        STATUS_FALSE,
                        "InvalidCredentials",
                        &format!("{e:#}"),
                    );
                    status.apply(&ctx.client).await?;
                    return Err(e);
                }
            }
        }
        None => match inherit_tunnel(&ctx, &namespace, &declared_targets) {
            Some(tunnel) => {
                let api = match crate::credentials::client_for_tunnel(
                    &ctx.client,
                    &ctx.credentials,
                    &tunnel,
                )
                .await
                {
                    Ok(api) => api,
                    Err(e) => {
                        status.set_condition(
                            CONDITION_CREDENTIALS_VALID,
                            STATUS_FALSE,
                            "InvalidCredentials",
                            &format!("{e:#}"),
                        );
                        status.apply(&ctx.client).await?;
                        return Err(e);
                    }
                };
                let account = policy
                    .spec
                    .account_id
                    .clone()
                    .unwrap_or_else(|| tunnel.spec.account_id.clone());
                (api, account)
            }
            None => {
                status.set_condition(
                    CONDITION_CREDENTIALS_VALID,
                    STATUS_FALSE,
                    "NoCredentialSource",
                    "no cloudflare block and no tunnel reachable through targets",
                );
                status.apply(&ctx.client).await?;
                anyhow::bail!("no credential source for policy {namespace}/{name}");
            }
        },
    };
    status.set_condition(
        CONDITION_CREDENTIALS_VALID,
        STATUS_TRUE,
        "TokenVerified",
        "API token verified",
    );

    // Domain; ambiguity is terminal
    let domain = match extract_domain(policy.spec.application.domain.as_deref(), &resolutions) {
        Ok(domain) => domain,
        Err(e) => {
            status.set_condition(
                CONDITION_READY,
                STATUS_FALSE,
                "DomainAmbiguous",
                &format!("{e}"),
            );
            let ancestors: Vec<PolicyAncestorStatus> = resolutions
                .iter()
                .map(|r| ancestor_entry(r, false))
                .collect();
            status.set_ancestors(ancestors, 0);
            status.apply(&ctx.client).await?;
            return Err(e);
        }
    };

    // mTLS certificate must exist before the rule references certificates
    if let Some(mtls) = &policy.spec.mtls {
        if let Some(certificate_id) = &mtls.certificate_id {
            retry_cloudflare_call(
                || api.get_mtls_certificate(&account_id, certificate_id),
                "verify mTLS certificate",
            )
            .await
            .context("mTLS certificate lookup failed")?;
        }
        if let Some(hostnames) = &mtls.hostnames {
            retry_cloudflare_call(
                || api.update_mtls_hostname_settings(&account_id, hostnames),
                "update mTLS hostname settings",
            )
            .await?;
        }
    }

    let payload = build_application_payload(&policy, &domain);
    let application = converge_application(&api, &account_id, &payload).await?;
    status.set_application(&application.id, application.aud.as_deref());

    let mtls_rule_id = converge_rules(&api, &account_id, &application.id, &policy).await?;
    status.set_mtls_rule_id(mtls_rule_id);

    let token_ids = converge_service_tokens(&ctx, &api, &account_id, &policy).await?;
    status.set_service_token_ids(token_ids);

    // Ancestor entries; resolved targets are attached now that the
    // application converged
    let ancestors: Vec<PolicyAncestorStatus> =
        resolutions.iter().map(|r| ancestor_entry(r, true)).collect();
    let attached = i32::try_from(
        resolutions
            .iter()
            .filter(|r| r.outcome.is_ok())
            .count(),
    )
    .unwrap_or(i32::MAX);
    status.set_ancestors(ancestors, attached);

    let failed_targets = resolutions.len() - usize::try_from(attached).unwrap_or(0);
    if failed_targets == 0 {
        status.set_condition(
            CONDITION_READY,
            STATUS_TRUE,
            "Attached",
            &format!("{attached} target(s) attached"),
        );
    } else {
        status.set_condition(
            CONDITION_READY,
            STATUS_FALSE,
            "TargetsFailed",
            &format!("{failed_targets} target(s) failed resolution"),
        );
    }

    status.set_observed_generation();
    status.apply(&ctx.client).await?;

    Ok(())
}

/// External cleanup for access policy deletion.
///
/// Deletes the managed application (rules go with it) and any minted service
/// tokens. Cleanup failures are logged but never block finalizer removal:
/// the credential path is frequently already gone when policies are deleted,
/// and a stuck policy resource is worse than an orphaned application.
#[async_trait::async_trait]
impl FinalizerCleanup for CloudflareAccessPolicy {
    async fn cleanup(&self, ctx: &Arc<Context>) -> Result<()> {
        let namespace = self.namespace().unwrap_or_default();
        let name = self.name_any();

        let Some(application_id) = self.status.as_ref().and_then(|s| s.application_id.clone())
        else {
            debug!(policy = %name, "No application recorded; nothing to clean up");
            return Ok(());
        };

        let declared_targets = policy_targets(self).unwrap_or_default();
        let credential_source = match &self.spec.cloudflare {
            Some(credentials) => {
                client_from_credentials(&ctx.client, &ctx.credentials, credentials, &namespace)
                    .await
                    .ok()
                    .zip(self.spec.account_id.clone())
            }
            None => match inherit_tunnel(ctx, &namespace, &declared_targets) {
                Some(tunnel) => crate::credentials::client_for_tunnel(
                    &ctx.client,
                    &ctx.credentials,
                    &tunnel,
                )
                .await
                .ok()
                .map(|api| {
                    let account = self
                        .spec
                        .account_id
                        .clone()
                        .unwrap_or_else(|| tunnel.spec.account_id.clone());
                    (api, account)
                }),
                None => None,
            },
        };

        let Some((api, account_id)) = credential_source else {
            warn!(
                policy = %name,
                "No credentials available for cleanup; orphaning external application"
            );
            return Ok(());
        };

        match api.delete_access_app(&account_id, &application_id).await {
            Ok(()) => info!(policy = %name, app_id = %application_id, "Access application deleted"),
            Err(e) if e.is_not_found() => {
                debug!(policy = %name, "Access application already gone");
            }
            Err(e) => {
                warn!(policy = %name, error = %e, "Application deletion failed; proceeding");
            }
        }

        for token_id in self
            .status
            .as_ref()
            .and_then(|s| s.service_token_ids.as_ref())
            .into_iter()
            .flatten()
        {
            if let Err(e) = api.delete_service_token(&account_id, token_id).await {
                warn!(policy = %name, token_id = %token_id, error = %e, "Service token deletion failed; proceeding");
            }
        }

        Ok(())
    }
}

/// Deletion entry point used by the controller wrapper.
///
/// # Errors
///
/// Returns an error only if the finalizer patch itself fails.
pub async fn delete_accesspolicy(ctx: Arc<Context>, policy: CloudflareAccessPolicy) -> Result<()> {
    handle_deletion(&ctx, &policy, ACCESS_POLICY_FINALIZER).await
}

#[cfg(test)]
#[path = "accesspolicy/mod_tests.rs"]
mod mod_tests;
