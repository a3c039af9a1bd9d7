// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the access policy reconciler's pure logic.

#[cfg(test)]
mod tests {
    use crate::cloudflare::types::{AccessAppPolicy, AccessApplication};
    use crate::reconcilers::accesspolicy::targets::{
        ResolvedTarget, TargetFailure, TargetResolution,
    };
    use crate::reconcilers::accesspolicy::{
        application_differs, extract_domain, policy_targets, rule_differs,
    };
    use crate::cloudflare::access::build_policy_payload;
    use crate::crd::{
        AccessDecision, AccessRule, AccessRuleCriterion, CloudflareAccessPolicy,
        CloudflareAccessPolicySpec, TargetKind, TargetReference,
    };

    fn target(name: &str) -> TargetReference {
        TargetReference {
            group: None,
            kind: TargetKind::HTTPRoute,
            name: name.to_string(),
            namespace: None,
            section_name: None,
        }
    }

    fn policy(spec_mutator: impl FnOnce(&mut CloudflareAccessPolicySpec)) -> CloudflareAccessPolicy {
        let mut spec = CloudflareAccessPolicySpec {
            target_ref: Some(target("app")),
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
        };
        spec_mutator(&mut spec);
        CloudflareAccessPolicy::new("policy", spec)
    }

    fn resolved(hostnames: &[&str]) -> TargetResolution {
        TargetResolution {
            reference: target("app"),
            outcome: Ok(ResolvedTarget {
                hostnames: hostnames.iter().map(|h| (*h).to_string()).collect(),
            }),
        }
    }

    fn failed() -> TargetResolution {
        TargetResolution {
            reference: target("gone"),
            outcome: Err(TargetFailure {
                reason: "TargetNotFound".to_string(),
                message: "HTTPRoute gone".to_string(),
            }),
        }
    }

    #[test]
    fn test_policy_targets_single() {
        let targets = policy_targets(&policy(|_| {})).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].name, "app");
    }

    #[test]
    fn test_policy_targets_many() {
        let p = policy(|spec| {
            spec.target_ref = None;
            spec.target_refs = Some(vec![target("a"), target("b")]);
        });
        assert_eq!(policy_targets(&p).unwrap().len(), 2);
    }

    #[test]
    fn test_policy_targets_mutually_exclusive() {
        let p = policy(|spec| {
            spec.target_refs = Some(vec![target("b")]);
        });
        assert!(policy_targets(&p).is_err());
    }

    #[test]
    fn test_policy_targets_none_is_empty() {
        // Annotation-attached policies declare no targetRef at all
        let p = policy(|spec| {
            spec.target_ref = None;
        });
        assert!(policy_targets(&p).unwrap().is_empty());
    }

    #[test]
    fn test_policy_targets_empty_list_is_error() {
        let p = policy(|spec| {
            spec.target_ref = None;
            spec.target_refs = Some(Vec::new());
        });
        assert!(policy_targets(&p).is_err());
    }

    #[test]
    fn test_extract_domain_explicit_wins() {
        let domain = extract_domain(
            Some("portal.example.com"),
            &[resolved(&["other.example.com"])],
        )
        .unwrap();
        assert_eq!(domain, "portal.example.com");
    }

    #[test]
    fn test_extract_domain_single_hostname() {
        let domain = extract_domain(None, &[resolved(&["app.example.com"])]).unwrap();
        assert_eq!(domain, "app.example.com");
    }

    #[test]
    fn test_extract_domain_duplicate_hostnames_collapse() {
        let domain = extract_domain(
            None,
            &[resolved(&["app.example.com"]), resolved(&["app.example.com"])],
        )
        .unwrap();
        assert_eq!(domain, "app.example.com");
    }

    #[test]
    fn test_extract_domain_ambiguous_is_error() {
        let err = extract_domain(
            None,
            &[resolved(&["a.example.com", "b.example.com"])],
        )
        .unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn test_extract_domain_failed_targets_only_is_error() {
        assert!(extract_domain(None, &[failed()]).is_err());
    }

    #[test]
    fn test_extract_domain_ignores_failed_targets() {
        let domain =
            extract_domain(None, &[failed(), resolved(&["app.example.com"])]).unwrap();
        assert_eq!(domain, "app.example.com");
    }

    fn external_app(name: &str, domain: &str) -> AccessApplication {
        serde_json::from_value(serde_json::json!({
            "id": "app1",
            "name": name,
            "domain": domain,
            "type": "self_hosted",
            "session_duration": "24h",
            "tags": ["managed by cfgate"],
        }))
        .unwrap()
    }

    #[test]
    fn test_application_differs_on_domain() {
        let existing = external_app("ns/policy", "old.example.com");
        let p = policy(|_| {});
        let desired = super::super::build_application_payload(&p, "new.example.com");
        assert!(application_differs(&existing, &desired));
    }

    #[test]
    fn test_application_identical_is_not_different() {
        let p = policy(|spec| {
            spec.application.name = Some("portal".to_string());
            spec.application.session_duration = Some("24h".to_string());
        });
        let desired = super::super::build_application_payload(&p, "app.example.com");
        let existing = external_app("portal", "app.example.com");
        assert!(!application_differs(&existing, &desired));
    }

    fn external_rule(name: &str, decision: &str, precedence: i32) -> AccessAppPolicy {
        serde_json::from_value(serde_json::json!({
            "id": "rule1",
            "name": name,
            "decision": decision,
            "precedence": precedence,
            "include": [{"everyone": {}}],
        }))
        .unwrap()
    }

    #[test]
    fn test_rule_differs_on_decision() {
        let p = policy(|_| {});
        let payload = build_policy_payload("policy", &p.spec.rules[0], 0);
        let existing = external_rule("policy-0", "deny", 1);
        assert!(rule_differs(&existing, &payload));
    }

    #[test]
    fn test_rule_identical_is_not_different() {
        let p = policy(|_| {});
        let payload = build_policy_payload("policy", &p.spec.rules[0], 0);
        let existing = external_rule("policy-0", "allow", 1);
        assert!(!rule_differs(&existing, &payload));
    }

    #[test]
    fn test_rule_differs_on_include_terms() {
        let p = policy(|spec| {
            spec.rules[0].include = vec![AccessRuleCriterion {
                email_domains: Some(vec!["corp.example".to_string()]),
                ..Default::default()
            }];
        });
        let payload = build_policy_payload("policy", &p.spec.rules[0], 0);
        let existing = external_rule("policy-0", "allow", 1);
        assert!(rule_differs(&existing, &payload));
    }
}
