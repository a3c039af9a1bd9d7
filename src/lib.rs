// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # cfgate - Cloudflare Tunnel, DNS and Access Operator for Kubernetes
//!
//! cfgate is a Kubernetes operator written in Rust that projects declarative
//! desired state (secure tunnels, DNS records, and zero-trust access
//! policies) onto the Cloudflare control plane, driven by Gateway API route
//! declarations.
//!
//! ## Overview
//!
//! Four reconcilers run concurrently under the kube-rs controller runtime:
//!
//! - The **tunnel reconciler** materializes each `CloudflareTunnel` as an
//!   external tunnel plus an in-cluster `cloudflared` deployment, adopting
//!   pre-existing external tunnels by name.
//! - The **DNS sync reconciler** derives a hostname set from Gateway API
//!   routes and explicit declarations and converges Cloudflare DNS to it,
//!   never touching records it does not own.
//! - The **access policy reconciler** attaches Zero Trust applications and
//!   rules to route and gateway targets with per-target ancestor status.
//! - The **HTTPRoute reconciler** validates routes against parent gateways
//!   and stamps per-parent acceptance status.
//!
//! Reconcilers never talk to each other; they coordinate through shared
//! external objects whose ownership is declared in record metadata (the
//! `managed by cfgate` marker; see [`ownership`]).
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types
//! - [`gateway`] - Consumed subset of the Gateway API resource model
//! - [`reconcilers`] - Reconciliation logic for each resource type
//! - [`cloudflare`] - Cloudflare v4 API client
//! - [`credentials`] - Credential resolution and the per-secret client cache
//! - [`tunnel_resources`] - Child object builders for the tunnel agent
//! - [`agent_config`] - Agent config document rendering
//!
//! ## Example
//!
//! ```rust,no_run
//! use cfgate::crd::{CloudflareCredentials, CloudflareTunnelSpec, SecretReference};
//!
//! let spec = CloudflareTunnelSpec {
//!     account_id: "0123456789abcdef0123456789abcdef".to_string(),
//!     name: Some("edge".to_string()),
//!     cloudflare: CloudflareCredentials {
//!         secret_ref: SecretReference {
//!             name: "cloudflare-api-token".to_string(),
//!             namespace: None,
//!         },
//!         api_token_key: None,
//!     },
//!     deployment: None,
//!     origin: None,
//!     ingress: None,
//!     dns: None,
//! };
//! ```

pub mod agent_config;
pub mod cloudflare;
pub mod constants;
pub mod context;
pub mod crd;
pub mod credentials;
pub mod gateway;
pub mod labels;
pub mod metrics;
pub mod ownership;
pub mod reconcilers;
pub mod tunnel_resources;
