// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tunnel lifecycle endpoints.
//!
//! Tunnels are account-scoped (`/accounts/{account}/cfd_tunnel`). Deleted
//! tunnels linger with a `deleted_at` timestamp and keep their name, so every
//! listing here excludes them; adoption must never bind to a tombstone.

use super::error::CloudflareError;
use super::types::{TunnelCreate, TunnelInfo};
use super::CloudflareApi;
use crate::constants::{TUNNEL_DOMAIN_SUFFIX, TUNNEL_SECRET_BYTES};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngExt;
use tracing::{info, warn};

impl CloudflareApi {
    /// List live (non-deleted) tunnels of an account, optionally filtered by
    /// exact name.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn list_tunnels(
        &self,
        account_id: &str,
        name: Option<&str>,
    ) -> Result<Vec<TunnelInfo>, CloudflareError> {
        let mut query = vec![("is_deleted", "false".to_string())];
        if let Some(name) = name {
            query.push(("name", name.to_string()));
        }
        self.get_paginated(&format!("accounts/{account_id}/cfd_tunnel"), &query)
            .await
    }

    /// Fetch one tunnel by id, including its live connections.
    ///
    /// # Errors
    ///
    /// Returns [`CloudflareError::NotFound`] if the tunnel does not exist.
    pub async fn get_tunnel(
        &self,
        account_id: &str,
        tunnel_id: &str,
    ) -> Result<TunnelInfo, CloudflareError> {
        self.get(&format!("accounts/{account_id}/cfd_tunnel/{tunnel_id}"), &[])
            .await
    }

    /// Create a remotely configured tunnel.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails (including a name collision
    /// with a live tunnel).
    pub async fn create_tunnel(
        &self,
        account_id: &str,
        name: &str,
        tunnel_secret: &str,
    ) -> Result<TunnelInfo, CloudflareError> {
        info!(account = account_id, tunnel = name, "Creating Cloudflare tunnel");
        let body = TunnelCreate {
            name: name.to_string(),
            tunnel_secret: tunnel_secret.to_string(),
            config_src: "cloudflare",
        };
        self.post(&format!("accounts/{account_id}/cfd_tunnel"), &body)
            .await
    }

    /// Delete a tunnel. The tunnel must be disconnected; Cloudflare rejects
    /// deletion while connectors are attached.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn delete_tunnel(
        &self,
        account_id: &str,
        tunnel_id: &str,
    ) -> Result<(), CloudflareError> {
        info!(account = account_id, tunnel_id = tunnel_id, "Deleting Cloudflare tunnel");
        self.delete(&format!("accounts/{account_id}/cfd_tunnel/{tunnel_id}"))
            .await
    }

    /// Fetch the connector token for a tunnel. The agent authenticates with
    /// this token via the `TUNNEL_TOKEN` environment variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn get_tunnel_token(
        &self,
        account_id: &str,
        tunnel_id: &str,
    ) -> Result<String, CloudflareError> {
        self.get(
            &format!("accounts/{account_id}/cfd_tunnel/{tunnel_id}/token"),
            &[],
        )
        .await
    }
}

/// Generate a fresh base64-encoded tunnel secret.
#[must_use]
pub fn generate_tunnel_secret() -> String {
    let mut rng = rand::rng();
    let mut secret = [0u8; TUNNEL_SECRET_BYTES];
    rng.fill(&mut secret);
    BASE64.encode(secret)
}

/// The DNS name CNAME targets point at for a tunnel id.
#[must_use]
pub fn tunnel_domain(tunnel_id: &str) -> String {
    format!("{tunnel_id}.{TUNNEL_DOMAIN_SUFFIX}")
}

/// Pick the adoption candidate among same-named tunnels.
///
/// Concurrent creation can leave several live tunnels sharing a name; the
/// oldest by `created_at` wins and a warning names the siblings. Siblings are
/// never deleted automatically.
#[must_use]
pub fn pick_adoption_candidate(mut tunnels: Vec<TunnelInfo>) -> Option<TunnelInfo> {
    if tunnels.is_empty() {
        return None;
    }

    if tunnels.len() > 1 {
        // RFC3339 sorts lexicographically; missing timestamps sort last
        tunnels.sort_by(|a, b| {
            a.created_at
                .as_deref()
                .unwrap_or("\u{10FFFF}")
                .cmp(b.created_at.as_deref().unwrap_or("\u{10FFFF}"))
        });
        let siblings: Vec<&str> = tunnels[1..].iter().map(|t| t.id.as_str()).collect();
        warn!(
            tunnel = %tunnels[0].name,
            adopted = %tunnels[0].id,
            siblings = ?siblings,
            "Multiple live tunnels share this name; adopting the oldest"
        );
    }

    tunnels.into_iter().next()
}

#[cfg(test)]
#[path = "tunnels_tests.rs"]
mod tunnels_tests;
