// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `resources.rs`

#[cfg(test)]
mod tests {
    use crate::reconcilers::resources::FIELD_MANAGER;

    #[test]
    fn test_field_manager_name() {
        // The field manager is part of the server-side-apply identity;
        // changing it silently would fight the previous manager over fields
        assert_eq!(FIELD_MANAGER, "cfgate-controller");
    }
}
