// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-hostname convergence against Cloudflare DNS.
//!
//! The non-interference rule lives here: a record lacking the ownership
//! marker in its comment is reported (status `Synced`, existing content) but
//! never written to. Managed records are updated only when content, proxied
//! flag, TTL, or comment actually differ, so a drift-free reconciliation
//! issues no external writes.

use crate::cloudflare::error::CloudflareError;
use crate::cloudflare::types::{DnsRecord, DnsRecordUpsert};
use crate::cloudflare::CloudflareApi;
use crate::crd::{RecordSyncState, SyncedRecordStatus, ZoneSpec};
use crate::ownership::{is_owned, ownership_comment, txt_ownership_name};
use crate::reconcilers::dnssync::EffectiveDnsConfig;
use crate::reconcilers::dnssync::hostnames::DesiredRecord;
use crate::reconcilers::retry::retry_cloudflare_call;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Record type of the managed hostname records.
pub const RECORD_TYPE_CNAME: &str = "CNAME";
/// Record type of the companion ownership records.
pub const RECORD_TYPE_TXT: &str = "TXT";
/// TTL of companion TXT records.
const TXT_RECORD_TTL: u32 = 300;

/// Resolve every configured zone to its id.
///
/// Pre-resolved ids are taken as-is; names go through the API. Any lookup
/// failure fails the whole resolution (the `ZonesResolved` condition).
///
/// # Errors
///
/// Returns an error if a lookup fails or a zone does not exist.
pub async fn resolve_zones(
    api: &CloudflareApi,
    zones: &[ZoneSpec],
) -> Result<BTreeMap<String, String>, CloudflareError> {
    let mut resolved = BTreeMap::new();

    for zone in zones {
        if let Some(id) = &zone.id {
            resolved.insert(zone.name.clone(), id.clone());
            continue;
        }

        let id = retry_cloudflare_call(|| api.find_zone_id(&zone.name), "resolve zone id")
            .await?
            .ok_or_else(|| CloudflareError::NotFound(format!("zone {}", zone.name)))?;
        debug!(zone = %zone.name, zone_id = %id, "Resolved zone id");
        resolved.insert(zone.name.clone(), id);
    }

    Ok(resolved)
}

/// Extract the zone of a hostname by the last-two-labels heuristic and look
/// it up among the resolved zones.
///
/// Multi-label public suffixes (`co.uk`) defeat the heuristic; the
/// workaround is a pre-resolved `zone.id` whose `name` matches the suffix,
/// which this lookup also honors via the longest-suffix fallback.
#[must_use]
pub fn zone_for_hostname<'a>(
    zones: &'a BTreeMap<String, String>,
    hostname: &str,
) -> Option<(&'a str, &'a str)> {
    let labels: Vec<&str> = hostname.split('.').collect();
    if labels.len() >= 2 {
        let apex = labels[labels.len() - 2..].join(".");
        if let Some((name, id)) = zones.get_key_value(apex.as_str()) {
            return Some((name, id));
        }
    }

    // Longest configured zone that is a suffix of the hostname
    zones
        .iter()
        .filter(|(name, _)| {
            hostname == name.as_str() || hostname.ends_with(&format!(".{name}"))
        })
        .max_by_key(|(name, _)| name.len())
        .map(|(name, id)| (name.as_str(), id.as_str()))
}

fn entry(
    desired: &DesiredRecord,
    state: RecordSyncState,
    record_id: Option<String>,
    error: Option<String>,
) -> SyncedRecordStatus {
    SyncedRecordStatus {
        hostname: desired.hostname.clone(),
        r#type: RECORD_TYPE_CNAME.to_string(),
        target: desired.target.clone(),
        proxied: desired.proxied,
        status: state,
        record_id,
        error,
    }
}

/// Converge one desired record; returns its status entry.
async fn converge_one(
    api: &CloudflareApi,
    zone_id: &str,
    desired: &DesiredRecord,
    tunnel_name: &str,
    config: &EffectiveDnsConfig,
) -> Result<SyncedRecordStatus, CloudflareError> {
    let existing = retry_cloudflare_call(
        || api.find_record(zone_id, &desired.hostname, RECORD_TYPE_CNAME),
        "find CNAME record",
    )
    .await?;

    let comment = config
        .comment_enabled
        .then(|| ownership_comment(tunnel_name));

    let upsert = DnsRecordUpsert {
        r#type: RECORD_TYPE_CNAME.to_string(),
        name: desired.hostname.clone(),
        content: desired.target.clone(),
        proxied: Some(desired.proxied),
        ttl: desired.ttl,
        comment: comment.clone(),
    };

    let entry = match existing {
        None => {
            let created = retry_cloudflare_call(
                || api.create_record(zone_id, &upsert),
                "create CNAME record",
            )
            .await?;
            entry(desired, RecordSyncState::Synced, Some(created.id), None)
        }
        Some(record) if !is_owned(record.comment.as_deref()) => {
            // Foreign record: report, never touch
            info!(
                hostname = %desired.hostname,
                content = %record.content,
                "Record exists without ownership marker; leaving untouched"
            );
            SyncedRecordStatus {
                hostname: desired.hostname.clone(),
                r#type: record.r#type.clone(),
                target: record.content.clone(),
                proxied: record.proxied.unwrap_or(false),
                status: RecordSyncState::Synced,
                record_id: Some(record.id),
                error: None,
            }
        }
        Some(record) if record_differs(&record, &upsert) => {
            let updated = retry_cloudflare_call(
                || api.update_record(zone_id, &record.id, &upsert),
                "update CNAME record",
            )
            .await?;
            entry(desired, RecordSyncState::Synced, Some(updated.id), None)
        }
        Some(record) => {
            debug!(hostname = %desired.hostname, "Record already converged");
            entry(desired, RecordSyncState::Synced, Some(record.id), None)
        }
    };

    Ok(entry)
}

/// Whether an owned record differs from the desired upsert in any compared
/// field (content, proxied, TTL, comment).
#[must_use]
pub fn record_differs(record: &DnsRecord, desired: &DnsRecordUpsert) -> bool {
    record.content != desired.content
        || record.proxied.unwrap_or(false) != desired.proxied.unwrap_or(false)
        || record.ttl != desired.ttl
        || record.comment != desired.comment
}

/// Upsert the companion TXT ownership record for a hostname.
///
/// TXT failures are non-fatal: the CNAME is already converged and the
/// companion only serves discovery.
async fn upsert_ownership_txt(
    api: &CloudflareApi,
    zone_id: &str,
    hostname: &str,
    tunnel_name: &str,
    config: &EffectiveDnsConfig,
) {
    let name = txt_ownership_name(&config.txt_prefix, hostname);
    let content = ownership_comment(tunnel_name);

    let upsert = DnsRecordUpsert {
        r#type: RECORD_TYPE_TXT.to_string(),
        name: name.clone(),
        content: content.clone(),
        proxied: None,
        ttl: TXT_RECORD_TTL,
        comment: Some(content),
    };

    let result = async {
        match api.find_record(zone_id, &name, RECORD_TYPE_TXT).await? {
            None => api.create_record(zone_id, &upsert).await.map(|_| ()),
            Some(existing) if record_differs(&existing, &upsert) => api
                .update_record(zone_id, &existing.id, &upsert)
                .await
                .map(|_| ()),
            Some(_) => Ok(()),
        }
    }
    .await;

    if let Err(e) = result {
        warn!(hostname = hostname, error = %e, "Ownership TXT upsert failed (non-fatal)");
    }
}

/// Converge every desired record and return the per-record status entries.
///
/// Individual record failures produce `Failed` entries; they do not abort the
/// remaining hostnames.
pub async fn converge_records(
    api: &CloudflareApi,
    zones: &BTreeMap<String, String>,
    desired: &[DesiredRecord],
    tunnel_name: &str,
    config: &EffectiveDnsConfig,
) -> Vec<SyncedRecordStatus> {
    let mut entries = Vec::with_capacity(desired.len());

    for record in desired {
        let Some((_, zone_id)) = zone_for_hostname(zones, &record.hostname) else {
            warn!(hostname = %record.hostname, "Hostname matches no configured zone");
            entries.push(entry(
                record,
                RecordSyncState::Failed,
                None,
                Some("hostname matches no configured zone".to_string()),
            ));
            continue;
        };

        match converge_one(api, zone_id, record, tunnel_name, config).await {
            Ok(synced) => {
                if config.txt_enabled {
                    upsert_ownership_txt(api, zone_id, &record.hostname, tunnel_name, config)
                        .await;
                }
                entries.push(synced);
            }
            Err(e) => {
                warn!(hostname = %record.hostname, error = %e, "Record convergence failed");
                entries.push(entry(record, RecordSyncState::Failed, None, Some(e.to_string())));
            }
        }
    }

    entries
}

/// Delete records that were in the previous status but left the desired set.
///
/// Only records carrying the ownership marker are deleted; the companion TXT
/// record goes with them. External orphans that never appeared in status are
/// not touched here (only deletion-path cleanup considers them).
pub async fn delete_orphans(
    api: &CloudflareApi,
    zones: &BTreeMap<String, String>,
    previous: &[SyncedRecordStatus],
    desired: &[DesiredRecord],
    config: &EffectiveDnsConfig,
) {
    if !config.cleanup_on_route_removal {
        return;
    }

    for prev in previous {
        if prev.r#type != RECORD_TYPE_CNAME {
            continue;
        }
        if desired.iter().any(|d| d.hostname == prev.hostname) {
            continue;
        }

        let Some((_, zone_id)) = zone_for_hostname(zones, &prev.hostname) else {
            continue;
        };

        let lookup = api
            .find_record(zone_id, &prev.hostname, RECORD_TYPE_CNAME)
            .await;
        match lookup {
            Ok(Some(record)) if is_owned(record.comment.as_deref()) => {
                info!(hostname = %prev.hostname, "Deleting orphaned managed record");
                if let Err(e) = api.delete_record(zone_id, &record.id).await {
                    warn!(hostname = %prev.hostname, error = %e, "Orphan deletion failed");
                    continue;
                }

                // Companion TXT, when present
                let txt_name = txt_ownership_name(&config.txt_prefix, &prev.hostname);
                match api.find_record(zone_id, &txt_name, RECORD_TYPE_TXT).await {
                    Ok(Some(txt)) => {
                        if let Err(e) = api.delete_record(zone_id, &txt.id).await {
                            warn!(hostname = %prev.hostname, error = %e, "Companion TXT deletion failed");
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(hostname = %prev.hostname, error = %e, "Companion TXT lookup failed");
                    }
                }
            }
            Ok(Some(_)) => {
                info!(
                    hostname = %prev.hostname,
                    "Previous hostname now foreign-owned; leaving record untouched"
                );
            }
            Ok(None) => {}
            Err(e) => {
                warn!(hostname = %prev.hostname, error = %e, "Orphan lookup failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod sync_tests;
