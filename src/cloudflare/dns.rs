// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Zone and DNS record endpoints.

use super::error::CloudflareError;
use super::types::{DnsRecord, DnsRecordUpsert, ZoneInfo};
use super::CloudflareApi;
use tracing::{debug, info};

impl CloudflareApi {
    /// Resolve a zone name to its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails. A zone that simply does not
    /// exist (or the token cannot see) yields `Ok(None)`.
    pub async fn find_zone_id(&self, zone_name: &str) -> Result<Option<String>, CloudflareError> {
        let zones: Vec<ZoneInfo> = self
            .get_paginated("zones", &[("name", zone_name.to_string())])
            .await?;
        Ok(zones.into_iter().find(|z| z.name == zone_name).map(|z| z.id))
    }

    /// List records in a zone, optionally filtered by exact name and type.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn list_records(
        &self,
        zone_id: &str,
        name: Option<&str>,
        record_type: Option<&str>,
    ) -> Result<Vec<DnsRecord>, CloudflareError> {
        let mut query = Vec::new();
        if let Some(name) = name {
            query.push(("name", name.to_string()));
        }
        if let Some(record_type) = record_type {
            query.push(("type", record_type.to_string()));
        }
        self.get_paginated(&format!("zones/{zone_id}/dns_records"), &query)
            .await
    }

    /// Look up a single record by `(name, type)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn find_record(
        &self,
        zone_id: &str,
        name: &str,
        record_type: &str,
    ) -> Result<Option<DnsRecord>, CloudflareError> {
        let records = self
            .list_records(zone_id, Some(name), Some(record_type))
            .await?;
        Ok(records.into_iter().next())
    }

    /// Create a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn create_record(
        &self,
        zone_id: &str,
        record: &DnsRecordUpsert,
    ) -> Result<DnsRecord, CloudflareError> {
        info!(zone = zone_id, name = %record.name, r#type = %record.r#type, "Creating DNS record");
        self.post(&format!("zones/{zone_id}/dns_records"), record)
            .await
    }

    /// Replace a record's content in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        record: &DnsRecordUpsert,
    ) -> Result<DnsRecord, CloudflareError> {
        info!(zone = zone_id, name = %record.name, record_id = record_id, "Updating DNS record");
        self.put(&format!("zones/{zone_id}/dns_records/{record_id}"), record)
            .await
    }

    /// Delete a record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn delete_record(
        &self,
        zone_id: &str,
        record_id: &str,
    ) -> Result<(), CloudflareError> {
        debug!(zone = zone_id, record_id = record_id, "Deleting DNS record");
        self.delete(&format!("zones/{zone_id}/dns_records/{record_id}"))
            .await
    }
}

#[cfg(test)]
#[path = "dns_tests.rs"]
mod dns_tests;
