// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers for Kubernetes resources.
//!
//! This module provides utility functions for creating and managing
//! Kubernetes status conditions following the standard conventions.
//!
//! # Condition Format
//!
//! - `type`: The aspect of the resource being reported (e.g., "Ready")
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: A programmatic identifier (CamelCase)
//! - `message`: A human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp when the condition changed

use crate::crd::Condition;
use chrono::Utc;

/// Condition status value "True"
pub const STATUS_TRUE: &str = "True";

/// Condition status value "False"
pub const STATUS_FALSE: &str = "False";

/// Create a new Kubernetes condition with the current timestamp.
///
/// # Arguments
///
/// * `condition_type` - The type of condition (e.g., "Ready", "`ZonesResolved`")
/// * `status` - The status: "True", "False", or "Unknown"
/// * `reason` - A programmatic identifier in `CamelCase`
/// * `message` - A human-readable explanation
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Check if a condition has changed compared to the existing status.
///
/// A condition is considered changed if the type, status value, or message
/// differ. `reason` and `lastTransitionTime` are not compared, as they
/// typically change with the condition itself.
#[must_use]
pub fn condition_changed(existing: &Option<Condition>, new_condition: &Condition) -> bool {
    if let Some(current) = existing {
        current.r#type != new_condition.r#type
            || current.status != new_condition.status
            || current.message != new_condition.message
    } else {
        // No existing condition, so it has changed
        true
    }
}

/// Get the last transition time from an existing condition, or current time if none exists.
///
/// Preserves `lastTransitionTime` when only the message changes but the
/// status value is the same.
#[must_use]
pub fn get_last_transition_time(existing_conditions: &[Condition], condition_type: &str) -> String {
    existing_conditions
        .iter()
        .find(|c| c.r#type == condition_type)
        .and_then(|c| c.last_transition_time.as_ref())
        .map_or_else(|| Utc::now().to_rfc3339(), std::string::ToString::to_string)
}

/// Find a condition by type in a list of conditions.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Insert or replace a condition in a condition list.
///
/// The transition time is preserved when the status value did not actually
/// flip, so `lastTransitionTime` reflects transitions rather than writes.
/// Returns `true` if the list changed in a way worth persisting.
pub fn upsert_condition(conditions: &mut Vec<Condition>, mut new_condition: Condition) -> bool {
    let existing = conditions
        .iter()
        .position(|c| c.r#type == new_condition.r#type);

    match existing {
        Some(idx) => {
            let current = &conditions[idx];
            if current.status == new_condition.status {
                new_condition.last_transition_time = current.last_transition_time.clone();
            }
            let changed = current.status != new_condition.status
                || current.reason != new_condition.reason
                || current.message != new_condition.message;
            conditions[idx] = new_condition;
            changed
        }
        None => {
            conditions.push(new_condition);
            true
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
