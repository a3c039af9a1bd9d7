// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Zero Trust Access endpoints: applications, per-application policies,
//! and service tokens.
//!
//! Applications are account-scoped. Ownership of an application is carried in
//! its tag list (applications have no comment field); see `crate::ownership`.

use super::error::CloudflareError;
use super::types::{
    AccessAppPolicy, AccessAppPolicyUpsert, AccessApplication, AccessApplicationUpsert,
    MtlsCertificate, ServiceToken,
};
use super::CloudflareApi;
use crate::crd::{AccessRule, AccessRuleCriterion};
use serde_json::{json, Value};
use tracing::info;

impl CloudflareApi {
    /// List every Access application of an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn list_access_apps(
        &self,
        account_id: &str,
    ) -> Result<Vec<AccessApplication>, CloudflareError> {
        self.get_paginated(&format!("accounts/{account_id}/access/apps"), &[])
            .await
    }

    /// Find an application by exact domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn find_access_app_by_domain(
        &self,
        account_id: &str,
        domain: &str,
    ) -> Result<Option<AccessApplication>, CloudflareError> {
        let apps = self.list_access_apps(account_id).await?;
        Ok(apps.into_iter().find(|a| a.domain == domain))
    }

    /// Create an application.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn create_access_app(
        &self,
        account_id: &str,
        app: &AccessApplicationUpsert,
    ) -> Result<AccessApplication, CloudflareError> {
        info!(account = account_id, app = %app.name, domain = %app.domain, "Creating Access application");
        self.post(&format!("accounts/{account_id}/access/apps"), app)
            .await
    }

    /// Update an application in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn update_access_app(
        &self,
        account_id: &str,
        app_id: &str,
        app: &AccessApplicationUpsert,
    ) -> Result<AccessApplication, CloudflareError> {
        info!(account = account_id, app_id = app_id, "Updating Access application");
        self.put(&format!("accounts/{account_id}/access/apps/{app_id}"), app)
            .await
    }

    /// Delete an application (its policies go with it).
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn delete_access_app(
        &self,
        account_id: &str,
        app_id: &str,
    ) -> Result<(), CloudflareError> {
        info!(account = account_id, app_id = app_id, "Deleting Access application");
        self.delete(&format!("accounts/{account_id}/access/apps/{app_id}"))
            .await
    }

    /// List the policies of an application.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn list_app_policies(
        &self,
        account_id: &str,
        app_id: &str,
    ) -> Result<Vec<AccessAppPolicy>, CloudflareError> {
        self.get_paginated(
            &format!("accounts/{account_id}/access/apps/{app_id}/policies"),
            &[],
        )
        .await
    }

    /// Create a policy on an application.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn create_app_policy(
        &self,
        account_id: &str,
        app_id: &str,
        policy: &AccessAppPolicyUpsert,
    ) -> Result<AccessAppPolicy, CloudflareError> {
        info!(app_id = app_id, policy = %policy.name, "Creating Access policy");
        self.post(
            &format!("accounts/{account_id}/access/apps/{app_id}/policies"),
            policy,
        )
        .await
    }

    /// Update a policy in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn update_app_policy(
        &self,
        account_id: &str,
        app_id: &str,
        policy_id: &str,
        policy: &AccessAppPolicyUpsert,
    ) -> Result<AccessAppPolicy, CloudflareError> {
        info!(app_id = app_id, policy_id = policy_id, "Updating Access policy");
        self.put(
            &format!("accounts/{account_id}/access/apps/{app_id}/policies/{policy_id}"),
            policy,
        )
        .await
    }

    /// Delete a policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn delete_app_policy(
        &self,
        account_id: &str,
        app_id: &str,
        policy_id: &str,
    ) -> Result<(), CloudflareError> {
        info!(app_id = app_id, policy_id = policy_id, "Deleting Access policy");
        self.delete(&format!(
            "accounts/{account_id}/access/apps/{app_id}/policies/{policy_id}"
        ))
        .await
    }

    /// List the service tokens of an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn list_service_tokens(
        &self,
        account_id: &str,
    ) -> Result<Vec<ServiceToken>, CloudflareError> {
        self.get_paginated(&format!("accounts/{account_id}/access/service_tokens"), &[])
            .await
    }

    /// Mint a service token. The response is the only time the client secret
    /// is visible; the caller must persist it immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn create_service_token(
        &self,
        account_id: &str,
        name: &str,
        duration: Option<&str>,
    ) -> Result<ServiceToken, CloudflareError> {
        info!(account = account_id, token = name, "Creating Access service token");
        let mut body = json!({ "name": name });
        if let Some(duration) = duration {
            body["duration"] = json!(duration);
        }
        self.post(&format!("accounts/{account_id}/access/service_tokens"), &body)
            .await
    }

    /// Fetch an mTLS certificate by id.
    ///
    /// # Errors
    ///
    /// Returns [`CloudflareError::NotFound`] if the certificate does not
    /// exist in the account.
    pub async fn get_mtls_certificate(
        &self,
        account_id: &str,
        certificate_id: &str,
    ) -> Result<MtlsCertificate, CloudflareError> {
        self.get(
            &format!("accounts/{account_id}/access/certificates/{certificate_id}"),
            &[],
        )
        .await
    }

    /// Replace the mTLS hostname settings, enabling client certificate
    /// forwarding for the given hostnames.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn update_mtls_hostname_settings(
        &self,
        account_id: &str,
        hostnames: &[String],
    ) -> Result<(), CloudflareError> {
        info!(account = account_id, hostnames = ?hostnames, "Updating mTLS hostname settings");
        let settings: Vec<Value> = hostnames
            .iter()
            .map(|hostname| {
                json!({
                    "hostname": hostname,
                    "china_network": false,
                    "client_certificate_forwarding": true,
                })
            })
            .collect();
        let _: Vec<Value> = self
            .put(
                &format!("accounts/{account_id}/access/certificates/settings"),
                &json!({ "settings": settings }),
            )
            .await?;
        Ok(())
    }

    /// Delete a service token.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn delete_service_token(
        &self,
        account_id: &str,
        token_id: &str,
    ) -> Result<(), CloudflareError> {
        info!(account = account_id, token_id = token_id, "Deleting Access service token");
        self.delete(&format!(
            "accounts/{account_id}/access/service_tokens/{token_id}"
        ))
        .await
    }
}

/// Expand one rule criterion into Cloudflare predicate terms.
///
/// List-valued variants fan out to one term per element (`emails` with three
/// addresses becomes three `email` terms, matched with OR inside `include`).
#[must_use]
pub fn criterion_terms(criterion: &AccessRuleCriterion) -> Vec<Value> {
    let mut terms = Vec::new();

    if let Some(emails) = &criterion.emails {
        for email in emails {
            terms.push(json!({ "email": { "email": email } }));
        }
    }
    if let Some(domains) = &criterion.email_domains {
        for domain in domains {
            terms.push(json!({ "email_domain": { "domain": domain } }));
        }
    }
    if let Some(lists) = &criterion.lists {
        for id in lists {
            terms.push(json!({ "email_list": { "id": id } }));
        }
    }
    if let Some(ranges) = &criterion.ip_ranges {
        for range in ranges {
            terms.push(json!({ "ip": { "ip": range } }));
        }
    }
    if let Some(countries) = &criterion.countries {
        for code in countries {
            terms.push(json!({ "geo": { "country_code": code } }));
        }
    }
    if criterion.everyone == Some(true) {
        terms.push(json!({ "everyone": {} }));
    }
    if criterion.certificate == Some(true) {
        terms.push(json!({ "certificate": {} }));
    }
    if let Some(names) = &criterion.common_names {
        for name in names {
            terms.push(json!({ "common_name": { "common_name": name } }));
        }
    }
    if let Some(tokens) = &criterion.service_tokens {
        for id in tokens {
            terms.push(json!({ "service_token": { "token_id": id } }));
        }
    }
    if criterion.any_valid_service_token == Some(true) {
        terms.push(json!({ "any_valid_service_token": {} }));
    }
    if let Some(groups) = &criterion.groups {
        for id in groups {
            terms.push(json!({ "group": { "id": id } }));
        }
    }
    if let Some(gsuite) = &criterion.gsuite {
        terms.push(json!({ "gsuite": {
            "email": gsuite.email,
            "identity_provider_id": gsuite.identity_provider_id,
        } }));
    }
    if let Some(github) = &criterion.github {
        terms.push(json!({ "github-organization": {
            "name": github.name,
            "teams": github.teams,
            "identity_provider_id": github.identity_provider_id,
        } }));
    }
    if let Some(azure) = &criterion.azure {
        terms.push(json!({ "azureAD": {
            "ids": azure.ids,
            "identity_provider_id": azure.identity_provider_id,
        } }));
    }
    if let Some(okta) = &criterion.okta {
        terms.push(json!({ "okta": {
            "names": okta.names,
            "identity_provider_id": okta.identity_provider_id,
        } }));
    }
    if let Some(saml) = &criterion.saml {
        terms.push(json!({ "saml": {
            "attribute_name": saml.attribute_name,
            "attribute_value": saml.attribute_value,
            "identity_provider_id": saml.identity_provider_id,
        } }));
    }

    terms
}

/// Expand a list of criteria into a flat term list.
fn terms_of(criteria: Option<&[AccessRuleCriterion]>) -> Vec<Value> {
    criteria
        .unwrap_or_default()
        .iter()
        .flat_map(criterion_terms)
        .collect()
}

/// Build the policy upsert payload for one declared rule.
///
/// `position` supplies the name suffix and precedence fallback when the rule
/// declares neither.
#[must_use]
pub fn build_policy_payload(
    policy_name: &str,
    rule: &AccessRule,
    position: usize,
) -> AccessAppPolicyUpsert {
    let precedence = rule
        .precedence
        .unwrap_or_else(|| i32::try_from(position + 1).unwrap_or(i32::MAX));

    AccessAppPolicyUpsert {
        name: rule
            .name
            .clone()
            .unwrap_or_else(|| format!("{policy_name}-{position}")),
        decision: rule.decision.as_str().to_string(),
        precedence,
        include: terms_of(Some(&rule.include)),
        exclude: terms_of(rule.exclude.as_deref()),
        require: terms_of(rule.require.as_deref()),
        session_duration: rule.session_duration.clone(),
        approval_required: rule.approval_required,
    }
}

#[cfg(test)]
#[path = "access_tests.rs"]
mod access_tests;
