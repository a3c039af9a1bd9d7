// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `status.rs`

#[cfg(test)]
mod tests {
    use crate::crd::Condition;
    use crate::reconcilers::status::{
        condition_changed, create_condition, find_condition, get_last_transition_time,
        upsert_condition,
    };

    const CONDITION_TYPE_READY: &str = "Ready";
    const STATUS_TRUE: &str = "True";
    const STATUS_FALSE: &str = "False";

    #[test]
    fn test_create_condition_basic() {
        let condition = create_condition(CONDITION_TYPE_READY, STATUS_TRUE, "Synced", "all good");

        assert_eq!(condition.r#type, CONDITION_TYPE_READY);
        assert_eq!(condition.status, STATUS_TRUE);
        assert_eq!(condition.reason, Some("Synced".to_string()));
        assert_eq!(condition.message, Some("all good".to_string()));
        assert!(condition.last_transition_time.is_some());
    }

    #[test]
    fn test_create_condition_timestamp_is_rfc3339() {
        let condition = create_condition("Ready", STATUS_TRUE, "Ready", "Ready");
        let timestamp = condition.last_transition_time.as_ref().unwrap();
        assert!(timestamp.contains('T'));
        assert!(timestamp.contains('+') || timestamp.contains('Z'));
    }

    #[test]
    fn test_condition_changed_detects_status_flip() {
        let existing = Some(create_condition("Ready", STATUS_TRUE, "Ready", "Ready"));
        let new_cond = create_condition("Ready", STATUS_FALSE, "NotReady", "Not ready");
        assert!(condition_changed(&existing, &new_cond));
    }

    #[test]
    fn test_condition_changed_detects_message_change() {
        let existing = Some(create_condition("Ready", STATUS_TRUE, "Ready", "old"));
        let new_cond = create_condition("Ready", STATUS_TRUE, "Ready", "new");
        assert!(condition_changed(&existing, &new_cond));
    }

    #[test]
    fn test_condition_changed_true_when_absent() {
        assert!(condition_changed(
            &None,
            &create_condition("Ready", STATUS_TRUE, "Ready", "Ready")
        ));
    }

    #[test]
    fn test_condition_unchanged_when_only_reason_differs() {
        let existing = Some(create_condition("Ready", STATUS_TRUE, "ReasonA", "msg"));
        let new_cond = create_condition("Ready", STATUS_TRUE, "ReasonB", "msg");
        assert!(!condition_changed(&existing, &new_cond));
    }

    #[test]
    fn test_get_last_transition_time_preserves_existing() {
        let mut condition = create_condition("Ready", STATUS_TRUE, "Ready", "Ready");
        condition.last_transition_time = Some("2025-01-01T00:00:00+00:00".to_string());
        let conditions = vec![condition];

        assert_eq!(
            get_last_transition_time(&conditions, "Ready"),
            "2025-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn test_get_last_transition_time_defaults_to_now() {
        let time = get_last_transition_time(&[], "Ready");
        assert!(time.contains('T'));
    }

    #[test]
    fn test_find_condition() {
        let conditions = vec![
            create_condition("Ready", STATUS_TRUE, "Ready", "Ready"),
            create_condition("ZonesResolved", STATUS_FALSE, "LookupFailed", "boom"),
        ];

        assert!(find_condition(&conditions, "Ready").is_some());
        assert_eq!(
            find_condition(&conditions, "ZonesResolved").unwrap().status,
            STATUS_FALSE
        );
        assert!(find_condition(&conditions, "Missing").is_none());
    }

    #[test]
    fn test_upsert_condition_inserts_new() {
        let mut conditions: Vec<Condition> = Vec::new();
        let changed = upsert_condition(
            &mut conditions,
            create_condition("Ready", STATUS_TRUE, "Ready", "Ready"),
        );
        assert!(changed);
        assert_eq!(conditions.len(), 1);
    }

    #[test]
    fn test_upsert_condition_replaces_same_type() {
        let mut conditions = vec![create_condition("Ready", STATUS_FALSE, "Pending", "wait")];
        let changed = upsert_condition(
            &mut conditions,
            create_condition("Ready", STATUS_TRUE, "Ready", "done"),
        );
        assert!(changed);
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].status, STATUS_TRUE);
    }

    #[test]
    fn test_upsert_condition_unchanged_preserves_transition_time() {
        let mut original = create_condition("Ready", STATUS_TRUE, "Ready", "done");
        original.last_transition_time = Some("2025-01-01T00:00:00+00:00".to_string());
        let mut conditions = vec![original];

        let changed = upsert_condition(
            &mut conditions,
            create_condition("Ready", STATUS_TRUE, "Ready", "done"),
        );

        assert!(!changed);
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2025-01-01T00:00:00+00:00")
        );
    }

    #[test]
    fn test_upsert_condition_status_flip_updates_transition_time() {
        let mut original = create_condition("Ready", STATUS_FALSE, "Pending", "wait");
        original.last_transition_time = Some("2025-01-01T00:00:00+00:00".to_string());
        let mut conditions = vec![original];

        let changed = upsert_condition(
            &mut conditions,
            create_condition("Ready", STATUS_TRUE, "Ready", "done"),
        );

        assert!(changed);
        assert_ne!(
            conditions[0].last_transition_time.as_deref(),
            Some("2025-01-01T00:00:00+00:00")
        );
    }
}
