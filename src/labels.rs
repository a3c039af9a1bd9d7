// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation constants used across all reconcilers.
//!
//! This module defines standard Kubernetes labels and cfgate-specific
//! labels/annotations to ensure consistency across all resources created or
//! consumed by the controller.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the component name within the architecture (e.g., "tunnel-agent")
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the name of the application (e.g., "cloudflared")
pub const K8S_NAME: &str = "app.kubernetes.io/name";

/// Standard label for a unique name identifying the instance of an application
pub const K8S_INSTANCE: &str = "app.kubernetes.io/instance";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

// ============================================================================
// Kubernetes Standard Label Values
// ============================================================================

/// Value for `app.kubernetes.io/part-of` indicating a resource is part of cfgate
pub const PART_OF_CFGATE: &str = "cfgate";

/// Component value for tunnel agent deployments
pub const COMPONENT_TUNNEL_AGENT: &str = "tunnel-agent";

/// Application name for the tunnel agent
pub const APP_NAME_CLOUDFLARED: &str = "cloudflared";

/// Value for `app.kubernetes.io/managed-by` on resources owned by the tunnel controller
pub const MANAGED_BY_TUNNEL: &str = "CloudflareTunnel";

// ============================================================================
// cfgate-Specific Labels
// ============================================================================

/// Label identifying the owning tunnel on child resources (token secret, deployment)
pub const TUNNEL_LABEL: &str = "cfgate.io/tunnel";

// ============================================================================
// cfgate Annotations
// ============================================================================

/// Gateway annotation binding a gateway to `<namespace>/<tunnel-name>`
pub const ANNOTATION_TUNNEL_REF: &str = "cfgate.io/tunnel-ref";

/// Gateway annotation enabling DNS sync when set to [`DNS_SYNC_ENABLED`]
pub const ANNOTATION_DNS_SYNC: &str = "cfgate.io/dns-sync";

/// Value of [`ANNOTATION_DNS_SYNC`] that enables hostname discovery
pub const DNS_SYNC_ENABLED: &str = "enabled";

/// Tunnel annotation selecting the external deletion policy: `delete` (default) or `orphan`
pub const ANNOTATION_DELETION_POLICY: &str = "cfgate.io/deletion-policy";

/// Deletion policy value that leaves external state untouched
pub const DELETION_POLICY_ORPHAN: &str = "orphan";

/// Route annotation overriding the origin connect timeout (seconds)
pub const ANNOTATION_ORIGIN_CONNECT_TIMEOUT: &str = "cfgate.io/origin-connect-timeout";

/// Route annotation disabling origin TLS verification
pub const ANNOTATION_ORIGIN_NO_TLS_VERIFY: &str = "cfgate.io/origin-no-tls-verify";

/// Route annotation rewriting the Host header sent to the origin
pub const ANNOTATION_ORIGIN_HTTP_HOST_HEADER: &str = "cfgate.io/origin-http-host-header";

/// Route annotation setting the SNI server name for origin TLS
pub const ANNOTATION_ORIGIN_SERVER_NAME: &str = "cfgate.io/origin-server-name";

/// Route annotation pointing at a CA bundle path for origin verification
pub const ANNOTATION_ORIGIN_CA_POOL: &str = "cfgate.io/origin-ca-pool";

/// Route annotation enabling HTTP/2 to the origin
pub const ANNOTATION_ORIGIN_HTTP2: &str = "cfgate.io/origin-http2";

/// Route annotation enabling origin certificate verification
pub const ANNOTATION_ORIGIN_SSL_VERIFY: &str = "cfgate.io/origin-ssl-verify";

/// Annotation supplying a hostname on TCP/UDP routes (the route type lacks one)
pub const ANNOTATION_HOSTNAME: &str = "cfgate.io/hostname";

/// Route annotation attaching a named access policy
pub const ANNOTATION_ACCESS_POLICY: &str = "cfgate.io/access-policy";

/// Pod template annotation carrying the sha256 of the rendered agent config;
/// a config change rolls the agent pods
pub const ANNOTATION_CONFIG_CHECKSUM: &str = "cfgate.io/config-checksum";
