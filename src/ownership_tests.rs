// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `ownership.rs`

#[cfg(test)]
mod tests {
    use crate::ownership::{
        is_owned, is_owned_application, ownership_comment, tunnel_from_comment,
        txt_ownership_name, OWNERSHIP_SENTINEL,
    };

    #[test]
    fn test_ownership_comment_format() {
        assert_eq!(ownership_comment("edge"), "managed by cfgate, tunnel=edge");
        assert_eq!(
            ownership_comment("prod-tunnel"),
            "managed by cfgate, tunnel=prod-tunnel"
        );
    }

    #[test]
    fn test_ownership_comment_starts_with_sentinel() {
        assert!(ownership_comment("anything").starts_with(OWNERSHIP_SENTINEL));
    }

    #[test]
    fn test_is_owned_on_generated_comment() {
        let comment = ownership_comment("edge");
        assert!(is_owned(Some(&comment)));
    }

    #[test]
    fn test_is_owned_rejects_foreign_comments() {
        assert!(!is_owned(Some("managed by external-dns")));
        assert!(!is_owned(Some("")));
        assert!(!is_owned(None));
    }

    #[test]
    fn test_is_owned_survives_user_extension() {
        // A user appending to the comment must not orphan the record
        assert!(is_owned(Some("managed by cfgate, tunnel=edge (JIRA-123)")));
        assert!(is_owned(Some("note: managed by cfgate, tunnel=edge")));
    }

    #[test]
    fn test_tunnel_from_comment() {
        assert_eq!(
            tunnel_from_comment("managed by cfgate, tunnel=edge"),
            Some("edge")
        );
        assert_eq!(
            tunnel_from_comment("managed by cfgate, tunnel=edge, extra"),
            Some("edge")
        );
        assert_eq!(tunnel_from_comment("managed by cfgate"), None);
        assert_eq!(tunnel_from_comment("managed by cfgate, tunnel="), None);
    }

    #[test]
    fn test_txt_ownership_name_uses_prefix() {
        assert_eq!(
            txt_ownership_name("_cfgate", "app.example.com"),
            "_cfgate.app.example.com"
        );
        assert_eq!(
            txt_ownership_name("_owner", "x.example.com"),
            "_owner.x.example.com"
        );
    }

    #[test]
    fn test_is_owned_application_checks_tags() {
        let owned = vec!["managed by cfgate".to_string(), "team-a".to_string()];
        let foreign = vec!["team-a".to_string()];

        assert!(is_owned_application(Some(&owned)));
        assert!(!is_owned_application(Some(&foreign)));
        assert!(!is_owned_application(Some(&[])));
        assert!(!is_owned_application(None));
    }
}
