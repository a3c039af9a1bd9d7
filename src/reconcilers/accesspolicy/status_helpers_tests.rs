// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the access policy status updater.

#[cfg(test)]
mod tests {
    use crate::crd::{
        AccessRule, AccessDecision, AccessRuleCriterion, CloudflareAccessPolicy,
        CloudflareAccessPolicySpec, CloudflareAccessPolicyStatus, PolicyAncestorStatus,
        TargetKind, TargetReference,
    };
    use crate::reconcilers::accesspolicy::status_helpers::{
        AccessPolicyStatusUpdater, CONDITION_ACCEPTED,
    };
    use crate::reconcilers::status::create_condition;

    fn policy(status: Option<CloudflareAccessPolicyStatus>) -> CloudflareAccessPolicy {
        let mut policy = CloudflareAccessPolicy::new(
            "policy",
            CloudflareAccessPolicySpec {
                target_ref: Some(TargetReference {
                    group: None,
                    kind: TargetKind::HTTPRoute,
                    name: "app".to_string(),
                    namespace: None,
                    section_name: None,
                }),
                target_refs: None,
                account_id: None,
                cloudflare: None,
                application: Default::default(),
                rules: vec![AccessRule {
                    name: None,
                    decision: AccessDecision::Allow,
                    precedence: None,
                    include: vec![AccessRuleCriterion {
                        everyone: Some(true),
                        ..Default::default()
                    }],
                    exclude: None,
                    require: None,
                    session_duration: None,
                    approval_required: None,
                }],
                service_tokens: None,
                mtls: None,
            },
        );
        policy.metadata.namespace = Some("apps".to_string());
        policy.metadata.generation = Some(2);
        policy.status = status;
        policy
    }

    fn ancestor(name: &str, accepted: &str) -> PolicyAncestorStatus {
        PolicyAncestorStatus {
            ancestor_ref: TargetReference {
                group: None,
                kind: TargetKind::HTTPRoute,
                name: name.to_string(),
                namespace: None,
                section_name: None,
            },
            controller_name: "cfgate.io/gateway-controller".to_string(),
            conditions: vec![create_condition(
                CONDITION_ACCEPTED,
                accepted,
                "Accepted",
                "policy attached to target",
            )],
        }
    }

    #[test]
    fn test_set_application_marks_changed() {
        let mut updater = AccessPolicyStatusUpdater::new(&policy(None));
        updater.set_application("app1", Some("aud1"));
        assert!(updater.is_changed());
    }

    #[test]
    fn test_identical_application_is_unchanged() {
        let status = CloudflareAccessPolicyStatus {
            application_id: Some("app1".to_string()),
            application_aud: Some("aud1".to_string()),
            ..Default::default()
        };
        let mut updater = AccessPolicyStatusUpdater::new(&policy(Some(status)));
        updater.set_application("app1", Some("aud1"));
        assert!(!updater.is_changed());
    }

    #[test]
    fn test_ancestors_compared_without_timestamps() {
        let status = CloudflareAccessPolicyStatus {
            ancestors: vec![ancestor("app", "True")],
            attached_targets: Some(1),
            ..Default::default()
        };
        let mut updater = AccessPolicyStatusUpdater::new(&policy(Some(status)));

        // A fresh entry with the same observable content but a newer
        // timestamp must not count as a change
        updater.set_ancestors(vec![ancestor("app", "True")], 1);
        assert!(!updater.is_changed());
    }

    #[test]
    fn test_ancestor_flip_marks_changed() {
        let status = CloudflareAccessPolicyStatus {
            ancestors: vec![ancestor("app", "True")],
            attached_targets: Some(1),
            ..Default::default()
        };
        let mut updater = AccessPolicyStatusUpdater::new(&policy(Some(status)));
        updater.set_ancestors(vec![ancestor("app", "False")], 0);
        assert!(updater.is_changed());
    }

    #[test]
    fn test_service_token_ids_and_mtls_rule() {
        let mut updater = AccessPolicyStatusUpdater::new(&policy(None));
        updater.set_service_token_ids(vec!["tok1".to_string()]);
        updater.set_mtls_rule_id(Some("rule9".to_string()));
        updater.set_observed_generation();
        assert!(updater.is_changed());
    }

    #[test]
    fn test_empty_token_ids_stay_absent() {
        let mut updater = AccessPolicyStatusUpdater::new(&policy(None));
        updater.set_service_token_ids(Vec::new());
        assert!(!updater.is_changed());
    }
}
