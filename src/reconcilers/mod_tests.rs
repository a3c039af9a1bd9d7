// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the reconciler fabric helpers.

#[cfg(test)]
mod tests {
    use crate::reconcilers::{should_reconcile, status_changed};

    #[test]
    fn test_should_reconcile_on_generation_change() {
        assert!(should_reconcile(Some(2), Some(1)));
        assert!(should_reconcile(Some(10), Some(3)));
    }

    #[test]
    fn test_should_not_reconcile_when_generations_match() {
        assert!(!should_reconcile(Some(5), Some(5)));
    }

    #[test]
    fn test_should_reconcile_first_observation() {
        assert!(should_reconcile(Some(1), None));
    }

    #[test]
    fn test_should_not_reconcile_without_generation() {
        assert!(!should_reconcile(None, None));
        assert!(!should_reconcile(None, Some(1)));
    }

    #[test]
    fn test_status_changed() {
        assert!(status_changed(&Some(1), &Some(2)));
        assert!(status_changed(&None::<i32>, &Some(1)));
        assert!(status_changed(&Some(1), &None));
        assert!(!status_changed(&Some(1), &Some(1)));
        assert!(!status_changed(&None::<i32>, &None));
    }
}
