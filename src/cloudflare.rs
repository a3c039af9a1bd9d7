// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cloudflare v4 API client.
//!
//! This module provides the typed client the reconcilers use for every
//! external call. It handles:
//!
//! - Bearer-token authentication and token verification
//! - The standard `{success, errors, result, result_info}` response envelope
//! - Pagination of list endpoints
//! - Mapping HTTP and envelope errors onto the [`error::CloudflareError`]
//!   taxonomy the retry layer understands
//!
//! Endpoint groups live in submodules: [`tunnels`] (tunnel lifecycle and
//! connector tokens), [`dns`] (zones and records), [`access`] (Zero Trust
//! applications, rules, service tokens).
//!
//! # Example
//!
//! ```rust,no_run
//! use cfgate::cloudflare::CloudflareApi;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let api = CloudflareApi::new("api-token".to_string())?;
//! api.verify_token().await?;
//! let zone = api.find_zone_id("example.com").await?;
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod dns;
pub mod error;
pub mod tunnels;
pub mod types;

use crate::constants::{CLOUDFLARE_API_BASE, CLOUDFLARE_PAGE_SIZE};
use error::CloudflareError;
use reqwest::{Client as HttpClient, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use types::{ApiEnvelope, TokenVerification};
use url::Url;

/// Request timeout for individual Cloudflare API calls
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Typed client for the Cloudflare v4 API.
///
/// One client exists per credential secret version; the credential cache
/// (`crate::credentials`) amortizes construction and token verification.
#[derive(Debug, Clone)]
pub struct CloudflareApi {
    /// HTTP client for API requests
    http: HttpClient,
    /// Bearer token
    token: String,
    /// API base URL; overridable for tests
    base: Url,
}

impl CloudflareApi {
    /// Create a client against the production API endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(token: String) -> Result<Self, CloudflareError> {
        Self::with_base_url(token, CLOUDFLARE_API_BASE)
    }

    /// Create a client against an explicit base URL.
    ///
    /// Used by tests to point the client at a mock server.
    ///
    /// # Errors
    ///
    /// Returns an error if `base` is not a valid URL or the HTTP client
    /// cannot be constructed.
    pub fn with_base_url(token: String, base: &str) -> Result<Self, CloudflareError> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(CloudflareError::Transport)?;

        let base = Url::parse(&format!("{}/", base.trim_end_matches('/')))?;

        Ok(Self { http, token, base })
    }

    /// Verify the bearer token against `/user/tokens/verify`.
    ///
    /// # Errors
    ///
    /// Returns [`CloudflareError::Auth`] for invalid or expired tokens.
    pub async fn verify_token(&self) -> Result<(), CloudflareError> {
        let verification: TokenVerification = self.get("user/tokens/verify", &[]).await?;
        if verification.status == "active" {
            Ok(())
        } else {
            Err(CloudflareError::Auth(format!(
                "API token is not active (status: {})",
                verification.status
            )))
        }
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, CloudflareError> {
        let url = self.base.join(path)?;
        Ok(self.http.request(method, url).bearer_auth(&self.token))
    }

    /// Send a request and return the decoded Cloudflare envelope, with HTTP
    /// status and `success: false` mapped onto the error taxonomy.
    async fn send_envelope<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        path: &str,
    ) -> Result<ApiEnvelope<T>, CloudflareError> {
        let response = builder.send().await.map_err(CloudflareError::Transport)?;
        let status = response.status();

        let body = response.text().await.map_err(CloudflareError::Transport)?;

        // Status-level classification first, envelope errors second
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(CloudflareError::Auth(format!(
                    "{path}: {}",
                    first_error_message(&body)
                )));
            }
            StatusCode::NOT_FOUND => {
                return Err(CloudflareError::NotFound(path.to_string()));
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(CloudflareError::RateLimited);
            }
            s if s.is_server_error() => {
                return Err(CloudflareError::Api {
                    code: i64::from(s.as_u16()),
                    message: first_error_message(&body),
                });
            }
            _ => {}
        }

        let envelope: ApiEnvelope<T> = serde_json::from_str(&body).map_err(|e| {
            warn!(path = path, error = %e, "Failed to decode Cloudflare response");
            CloudflareError::Decode(format!("{path}: {e}"))
        })?;

        if !envelope.success {
            let (code, message) = envelope
                .errors
                .first()
                .map_or((0, "unknown error".to_string()), |e| {
                    (e.code, e.message.clone())
                });
            return Err(CloudflareError::Api { code, message });
        }

        Ok(envelope)
    }

    /// Send a request and unwrap the envelope's result payload.
    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        path: &str,
    ) -> Result<T, CloudflareError> {
        let envelope = self.send_envelope(builder, path).await?;
        envelope
            .result
            .ok_or_else(|| CloudflareError::Decode(format!("{path}: missing result")))
    }

    /// GET a single result.
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, CloudflareError> {
        debug!(path = path, "Cloudflare GET");
        let builder = self.request(Method::GET, path)?.query(query);
        self.send(builder, path).await
    }

    /// GET a list endpoint, walking every page.
    pub(crate) async fn get_paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, CloudflareError> {
        let mut page = 1u32;
        let mut items: Vec<T> = Vec::new();

        loop {
            debug!(path = path, page = page, "Cloudflare GET (paginated)");
            let builder = self
                .request(Method::GET, path)?
                .query(query)
                .query(&[("page", page.to_string())])
                .query(&[("per_page", CLOUDFLARE_PAGE_SIZE.to_string())]);

            let envelope: ApiEnvelope<Vec<T>> = self.send_envelope(builder, path).await?;

            let batch = envelope.result.unwrap_or_default();
            let batch_len = batch.len() as u32;
            items.extend(batch);

            let done = envelope
                .result_info
                .is_none_or(|info| info.page >= info.total_pages || info.total_pages == 0)
                || batch_len < CLOUDFLARE_PAGE_SIZE;

            if done {
                return Ok(items);
            }
            page += 1;
        }
    }

    /// POST a JSON body.
    pub(crate) async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, CloudflareError> {
        debug!(path = path, "Cloudflare POST");
        let builder = self.request(Method::POST, path)?.json(body);
        self.send(builder, path).await
    }

    /// PUT a JSON body.
    pub(crate) async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, CloudflareError> {
        debug!(path = path, "Cloudflare PUT");
        let builder = self.request(Method::PUT, path)?.json(body);
        self.send(builder, path).await
    }

    /// DELETE a resource. Some endpoints return the deleted object, some
    /// return `result: null`; either counts as success.
    pub(crate) async fn delete(&self, path: &str) -> Result<(), CloudflareError> {
        debug!(path = path, "Cloudflare DELETE");
        let builder = self.request(Method::DELETE, path)?;
        let _: ApiEnvelope<serde_json::Value> = self.send_envelope(builder, path).await?;
        Ok(())
    }
}

/// Pull the first envelope error message out of a raw body, for error paths
/// where the typed decode is not attempted.
fn first_error_message(body: &str) -> String {
    serde_json::from_str::<ApiEnvelope<serde_json::Value>>(body)
        .ok()
        .and_then(|e| e.errors.first().map(|err| err.message.clone()))
        .unwrap_or_else(|| "no error detail".to_string())
}

#[cfg(test)]
#[path = "cloudflare_tests.rs"]
mod cloudflare_tests;
