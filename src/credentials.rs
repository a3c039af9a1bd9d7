// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cloudflare credential resolution and the per-secret client cache.
//!
//! Clients are cached keyed by `(secret UID, secret resourceVersion)`: any
//! mutation of the credential secret produces a new resource version and
//! therefore a cache miss, so rotated tokens take effect on the next
//! reconciliation without explicit invalidation. The cache amortizes both
//! client construction and the token verification round-trip.
//!
//! Expiration is lazy (checked at get time, default TTL 30s); a background
//! [`CredentialsCache::sweep`] can additionally prune expired entries.
//!
//! The DNS sync deletion path may outlive its tunnel: [`fallback_client`]
//! builds a client from a `FallbackCredentialsRef` secret's
//! `CLOUDFLARE_API_TOKEN` key when the tunnel lookup fails.

use crate::cloudflare::CloudflareApi;
use crate::constants::{API_TOKEN_SECRET_KEY, CREDENTIAL_CACHE_TTL_SECS};
use crate::crd::{CloudflareCredentials, CloudflareTunnel, SecretReference};
use anyhow::{Context as _, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client, ResourceExt};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Cache key: the secret's identity plus its version.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    uid: String,
    resource_version: String,
}

struct CachedClient {
    api: Arc<CloudflareApi>,
    created: Instant,
}

/// In-memory, process-local cache of Cloudflare clients.
///
/// Guarded by a single readers-writer lock; the hot path takes the read
/// side only.
pub struct CredentialsCache {
    inner: RwLock<HashMap<CacheKey, CachedClient>>,
    ttl: Duration,
}

impl Default for CredentialsCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialsCache {
    /// Create a cache with the default TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(CREDENTIAL_CACHE_TTL_SECS))
    }

    /// Create a cache with an explicit TTL.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Return the cached client for this secret version, or build, store,
    /// and return a fresh one.
    ///
    /// # Arguments
    ///
    /// * `secret` - The credential secret; its UID and resource version form
    ///   the cache key
    /// * `build` - Builder invoked on a cache miss; typically constructs the
    ///   client and verifies the token
    ///
    /// # Errors
    ///
    /// Returns an error if the secret carries no UID/resource version or the
    /// builder fails. Builder failures are not cached.
    pub async fn get_or_create<F, Fut>(
        &self,
        secret: &Secret,
        build: F,
    ) -> Result<Arc<CloudflareApi>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CloudflareApi>>,
    {
        let key = CacheKey {
            uid: secret
                .metadata
                .uid
                .clone()
                .context("credential secret has no UID")?,
            resource_version: secret
                .metadata
                .resource_version
                .clone()
                .context("credential secret has no resourceVersion")?,
        };

        {
            let cache = self.inner.read().await;
            if let Some(entry) = cache.get(&key) {
                if entry.created.elapsed() < self.ttl {
                    debug!(secret = %secret.name_any(), "Credential cache hit");
                    return Ok(entry.api.clone());
                }
            }
        }

        debug!(secret = %secret.name_any(), "Credential cache miss, building client");
        let api = Arc::new(build().await?);

        let mut cache = self.inner.write().await;
        cache.insert(
            key,
            CachedClient {
                api: api.clone(),
                created: Instant::now(),
            },
        );

        Ok(api)
    }

    /// Drop every expired entry. Expiration is otherwise lazy; this exists
    /// for the optional background sweep.
    pub async fn sweep(&self) {
        let mut cache = self.inner.write().await;
        let before = cache.len();
        cache.retain(|_, entry| entry.created.elapsed() < self.ttl);
        let evicted = before - cache.len();
        if evicted > 0 {
            info!(evicted = evicted, "Swept expired credential cache entries");
        }
    }

    /// Number of live entries (expired-but-unswept entries included).
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Whether the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

/// Read a referenced secret, defaulting the namespace.
///
/// # Errors
///
/// Returns an error if the secret does not exist or the API call fails.
pub async fn read_secret(
    client: &Client,
    secret_ref: &SecretReference,
    default_namespace: &str,
) -> Result<Secret> {
    let namespace = secret_ref
        .namespace
        .as_deref()
        .unwrap_or(default_namespace);
    let api: Api<Secret> = Api::namespaced(client.clone(), namespace);
    api.get(&secret_ref.name)
        .await
        .with_context(|| format!("failed to read secret {namespace}/{}", secret_ref.name))
}

/// Extract the API token from a secret's data under the given key.
///
/// # Errors
///
/// Returns an error if the key is absent or the value is not UTF-8.
pub fn api_token_from_secret(secret: &Secret, key: &str) -> Result<String> {
    let data = secret
        .data
        .as_ref()
        .with_context(|| format!("secret {} has no data", secret.name_any()))?;
    let value = data.get(key).with_context(|| {
        format!("secret {} has no key {key}", secret.name_any())
    })?;
    let token = std::str::from_utf8(&value.0)
        .with_context(|| format!("secret key {key} is not valid UTF-8"))?;
    Ok(token.trim().to_string())
}

/// Resolve a Cloudflare client from an explicit credentials block.
///
/// The cache is consulted first; on a miss the client is built and the token
/// verified before being stored.
///
/// # Errors
///
/// Returns an error if the secret cannot be read, the token key is missing,
/// or verification fails.
pub async fn client_from_credentials(
    client: &Client,
    cache: &CredentialsCache,
    credentials: &CloudflareCredentials,
    default_namespace: &str,
) -> Result<Arc<CloudflareApi>> {
    let secret = read_secret(client, &credentials.secret_ref, default_namespace).await?;
    let key = credentials
        .api_token_key
        .as_deref()
        .unwrap_or(API_TOKEN_SECRET_KEY);
    let token = api_token_from_secret(&secret, key)?;

    cache
        .get_or_create(&secret, || async move {
            let api = CloudflareApi::new(token)?;
            api.verify_token().await?;
            Ok(api)
        })
        .await
}

/// Resolve the Cloudflare client of a tunnel.
///
/// # Errors
///
/// Returns an error if the credential secret cannot be resolved or verified.
pub async fn client_for_tunnel(
    client: &Client,
    cache: &CredentialsCache,
    tunnel: &CloudflareTunnel,
) -> Result<Arc<CloudflareApi>> {
    let namespace = tunnel.namespace().unwrap_or_default();
    client_from_credentials(client, cache, &tunnel.spec.cloudflare, &namespace).await
}

/// Resolve a client from fallback credentials (DNS sync deletion path).
///
/// The referenced secret must carry a `CLOUDFLARE_API_TOKEN` key.
///
/// # Errors
///
/// Returns an error if the secret cannot be read or the token is invalid.
pub async fn fallback_client(
    client: &Client,
    cache: &CredentialsCache,
    fallback_ref: &SecretReference,
    default_namespace: &str,
) -> Result<Arc<CloudflareApi>> {
    let credentials = CloudflareCredentials {
        secret_ref: fallback_ref.clone(),
        api_token_key: None,
    };
    client_from_credentials(client, cache, &credentials, default_namespace).await
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod credentials_tests;
