// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the cfgate operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for all cfgate CRDs
pub const API_GROUP: &str = "cfgate.io";

/// API version for all cfgate CRDs
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "cfgate.io/v1alpha1";

/// Kind name for `CloudflareTunnel` resource
pub const KIND_TUNNEL: &str = "CloudflareTunnel";

/// Kind name for `CloudflareDNSSync` resource
pub const KIND_DNS_SYNC: &str = "CloudflareDNSSync";

/// Kind name for `CloudflareAccessPolicy` resource
pub const KIND_ACCESS_POLICY: &str = "CloudflareAccessPolicy";

/// Kind name for the Gateway API `HTTPRoute` resource
pub const KIND_HTTP_ROUTE: &str = "HTTPRoute";

/// Gateway API group consumed by the route and policy reconcilers
pub const GATEWAY_API_GROUP: &str = "gateway.networking.k8s.io";

/// Controller name stamped into `GatewayClass` matches and route parent status
pub const GATEWAY_CONTROLLER_NAME: &str = "cfgate.io/gateway-controller";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer blocking `CloudflareTunnel` deletion until external cleanup completes
pub const TUNNEL_FINALIZER: &str = "cloudflaretunnel.cfgate.io/finalizer";

/// Finalizer blocking `CloudflareDNSSync` deletion until DNS cleanup completes
pub const DNS_SYNC_FINALIZER: &str = "cloudflarednssync.cfgate.io/finalizer";

/// Finalizer blocking `CloudflareAccessPolicy` deletion until the application is removed
pub const ACCESS_POLICY_FINALIZER: &str = "cloudflareaccesspolicy.cfgate.io/finalizer";

// ============================================================================
// Cloudflare Constants
// ============================================================================

/// Base URL of the Cloudflare v4 API
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// DNS suffix under which every tunnel is addressable (`<tunnel-id>.<suffix>`)
pub const TUNNEL_DOMAIN_SUFFIX: &str = "cfargotunnel.com";

/// Secret key holding the Cloudflare API token, unless overridden per resource
pub const API_TOKEN_SECRET_KEY: &str = "CLOUDFLARE_API_TOKEN";

/// TTL value Cloudflare interprets as "automatic"
pub const DNS_TTL_AUTO: u32 = 1;

/// Default TXT ownership record prefix (`<prefix>.<hostname>`)
pub const DEFAULT_TXT_OWNERSHIP_PREFIX: &str = "_cfgate";

/// Number of random bytes in a generated tunnel secret
pub const TUNNEL_SECRET_BYTES: usize = 32;

/// Page size used when walking paginated Cloudflare list endpoints
pub const CLOUDFLARE_PAGE_SIZE: u32 = 100;

// ============================================================================
// Tunnel Agent Constants
// ============================================================================

/// Default container image for the tunnel agent
pub const DEFAULT_AGENT_IMAGE: &str = "cloudflare/cloudflared:2025.6.1";

/// Default number of agent replicas
pub const DEFAULT_AGENT_REPLICAS: i32 = 2;

/// Container port the agent serves metrics and readiness on
pub const AGENT_METRICS_PORT: u16 = 2000;

/// Readiness/liveness probe path on the agent metrics port
pub const AGENT_READY_PATH: &str = "/ready";

/// Environment variable the agent reads its connector token from
pub const TUNNEL_TOKEN_ENV: &str = "TUNNEL_TOKEN";

/// Secret data key holding the connector token
pub const TUNNEL_TOKEN_SECRET_KEY: &str = "TUNNEL_TOKEN";

/// Mount path for the rendered agent configuration file
pub const AGENT_CONFIG_MOUNT_PATH: &str = "/etc/cfgate";

/// File name of the rendered agent configuration
pub const AGENT_CONFIG_FILENAME: &str = "config.yaml";

/// Service used by the implicit catch-all ingress rule
pub const CATCH_ALL_SERVICE: &str = "http_status:404";

// ============================================================================
// Kubernetes Health Check Constants
// ============================================================================

/// Liveness probe initial delay (wait for the agent to connect)
pub const LIVENESS_INITIAL_DELAY_SECS: i32 = 30;

/// Liveness probe period (how often to check)
pub const LIVENESS_PERIOD_SECS: i32 = 10;

/// Liveness probe timeout
pub const LIVENESS_TIMEOUT_SECS: i32 = 5;

/// Liveness probe failure threshold
pub const LIVENESS_FAILURE_THRESHOLD: i32 = 3;

/// Readiness probe initial delay
pub const READINESS_INITIAL_DELAY_SECS: i32 = 10;

/// Readiness probe period
pub const READINESS_PERIOD_SECS: i32 = 5;

/// Readiness probe timeout
pub const READINESS_TIMEOUT_SECS: i32 = 3;

/// Readiness probe failure threshold
pub const READINESS_FAILURE_THRESHOLD: i32 = 3;

// ============================================================================
// Controller Error Handling Constants
// ============================================================================

/// Requeue duration for controller errors (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Requeue duration after a successful reconciliation (5 minutes); external
/// drift is re-detected at this cadence
pub const REQUEUE_WHEN_READY_SECS: u64 = 300;

// ============================================================================
// Credential Cache Constants
// ============================================================================

/// Time-to-live of a cached Cloudflare client (seconds)
pub const CREDENTIAL_CACHE_TTL_SECS: u64 = 30;

// ============================================================================
// Leader Election Constants
// ============================================================================

/// Default leader election lease duration (15 seconds)
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 15;

/// Default leader election retry period (2 seconds)
pub const DEFAULT_LEASE_RETRY_PERIOD_SECS: u64 = 2;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
