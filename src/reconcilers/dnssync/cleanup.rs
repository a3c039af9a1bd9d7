// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Deletion-path cleanup of managed DNS records.
//!
//! When a `CloudflareDNSSync` is deleted (cleanup policy permitting), every
//! record in the configured zones carrying the ownership marker is removed.
//! With `onlyManaged` (the default) the sweep is restricted to records whose
//! marker names this tunnel. Records without a marker are never touched,
//! regardless of policy.
//!
//! Individual deletion failures are logged and do not block finalizer
//! removal; deletion must eventually make progress even if external records
//! end up orphaned.

use crate::cloudflare::types::DnsRecord;
use crate::cloudflare::CloudflareApi;
use crate::crd::ZoneSpec;
use crate::ownership::{is_owned, tunnel_from_comment, OWNERSHIP_SENTINEL};
use crate::reconcilers::dnssync::sync::RECORD_TYPE_TXT;
use crate::reconcilers::retry::retry_cloudflare_call;
use tracing::{info, warn};

/// Whether a record is in scope for the deletion sweep.
///
/// Unmarked records are never in scope. With `only_managed`, records whose
/// marker names a different tunnel are excluded; markers naming no tunnel
/// remain in scope.
#[must_use]
pub fn should_sweep(record: &DnsRecord, tunnel_name: Option<&str>, only_managed: bool) -> bool {
    let marked = is_owned(record.comment.as_deref())
        || (record.r#type == RECORD_TYPE_TXT && record.content.contains(OWNERSHIP_SENTINEL));
    if !marked {
        return false;
    }

    if only_managed {
        if let Some(tunnel) = tunnel_name {
            let record_tunnel = record
                .comment
                .as_deref()
                .and_then(tunnel_from_comment)
                .or_else(|| tunnel_from_comment(&record.content));
            if record_tunnel.is_some_and(|t| t != tunnel) {
                return false;
            }
        }
    }

    true
}

/// Sweep the configured zones and delete managed records.
///
/// # Arguments
///
/// * `api` - Cloudflare client (tunnel credentials or fallback)
/// * `zones` - Configured zones, resolved by id or name
/// * `tunnel_name` - Restrict deletion to this tunnel's records when
///   `only_managed` is set and the name is known
/// * `only_managed` - Restrict the sweep to records naming this tunnel
///
/// # Returns
///
/// The number of records deleted. Per-record failures are logged, counted
/// out, and do not abort the sweep.
pub async fn cleanup_zones(
    api: &CloudflareApi,
    zones: &[ZoneSpec],
    tunnel_name: Option<&str>,
    only_managed: bool,
) -> u32 {
    let mut deleted = 0u32;

    for zone in zones {
        let zone_id = match &zone.id {
            Some(id) => id.clone(),
            None => {
                match retry_cloudflare_call(
                    || api.find_zone_id(&zone.name),
                    "resolve zone for cleanup",
                )
                .await
                {
                    Ok(Some(id)) => id,
                    Ok(None) => {
                        warn!(zone = %zone.name, "Zone not found during cleanup; skipping");
                        continue;
                    }
                    Err(e) => {
                        warn!(zone = %zone.name, error = %e, "Zone lookup failed during cleanup; skipping");
                        continue;
                    }
                }
            }
        };

        let records = match api.list_records(&zone_id, None, None).await {
            Ok(records) => records,
            Err(e) => {
                warn!(zone = %zone.name, error = %e, "Record listing failed during cleanup; skipping zone");
                continue;
            }
        };

        for record in records {
            if !should_sweep(&record, tunnel_name, only_managed) {
                continue;
            }

            match api.delete_record(&zone_id, &record.id).await {
                Ok(()) => {
                    info!(
                        zone = %zone.name,
                        name = %record.name,
                        r#type = %record.r#type,
                        "Deleted managed record during cleanup"
                    );
                    deleted += 1;
                }
                Err(e) => {
                    warn!(
                        zone = %zone.name,
                        name = %record.name,
                        error = %e,
                        "Record deletion failed during cleanup; continuing"
                    );
                }
            }
        }
    }

    deleted
}

#[cfg(test)]
#[path = "cleanup_tests.rs"]
mod cleanup_tests;
