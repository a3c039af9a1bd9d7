// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The ownership protocol for external Cloudflare objects.
//!
//! Every external object cfgate creates carries an ownership marker: a record
//! comment (or, for Access applications, a tag) containing the literal
//! sentinel `managed by cfgate`, optionally naming the owning tunnel. The
//! marker *is* the ownership claim: no reconciliation path mutates or deletes
//! an external object lacking it, and a user stripping the marker orphans the
//! object while a user adding it hands the object over.
//!
//! DNS ownership can additionally be recorded in a companion TXT record at
//! `<prefix>.<hostname>` whose content repeats the comment.

/// Literal sentinel every ownership marker starts with.
pub const OWNERSHIP_SENTINEL: &str = "managed by cfgate";

/// Build the ownership comment for objects owned on behalf of a tunnel.
///
/// # Example
///
/// ```rust
/// use cfgate::ownership::ownership_comment;
///
/// assert_eq!(ownership_comment("edge"), "managed by cfgate, tunnel=edge");
/// ```
#[must_use]
pub fn ownership_comment(tunnel_name: &str) -> String {
    format!("{OWNERSHIP_SENTINEL}, tunnel={tunnel_name}")
}

/// Whether a record comment claims cfgate ownership.
///
/// The check is a substring match so user-extended comments (for example a
/// ticket reference appended after ours) keep the claim intact.
#[must_use]
pub fn is_owned(comment: Option<&str>) -> bool {
    comment.is_some_and(|c| c.contains(OWNERSHIP_SENTINEL))
}

/// Extract the tunnel name from an ownership comment, if present.
#[must_use]
pub fn tunnel_from_comment(comment: &str) -> Option<&str> {
    let idx = comment.find("tunnel=")?;
    let rest = &comment[idx + "tunnel=".len()..];
    let end = rest.find([',', ' ']).unwrap_or(rest.len());
    let name = &rest[..end];
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Name of the companion TXT ownership record for a hostname.
#[must_use]
pub fn txt_ownership_name(prefix: &str, hostname: &str) -> String {
    format!("{prefix}.{hostname}")
}

/// Whether an Access application's tag list claims cfgate ownership.
///
/// Applications have no comment field; the sentinel is carried as a tag.
#[must_use]
pub fn is_owned_application(tags: Option<&[String]>) -> bool {
    tags.is_some_and(|tags| tags.iter().any(|t| t.contains(OWNERSHIP_SENTINEL)))
}

#[cfg(test)]
#[path = "ownership_tests.rs"]
mod ownership_tests;
