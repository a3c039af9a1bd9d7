// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `metrics.rs`

#[cfg(test)]
mod tests {
    use crate::metrics::{
        gather_metrics, record_cloudflare_write, record_error, record_reconciliation_error,
        record_reconciliation_success,
    };
    use std::time::Duration;

    #[test]
    fn test_metrics_record_and_gather() {
        record_reconciliation_success("CloudflareTunnel", Duration::from_millis(42));
        record_reconciliation_error("CloudflareDNSSync", Duration::from_millis(7));
        record_error("CloudflareDNSSync", "rate_limited");
        record_cloudflare_write("dns_record", "create");

        let rendered = gather_metrics().unwrap();

        assert!(rendered.contains("cfgate_io_reconciliations_total"));
        assert!(rendered.contains("cfgate_io_reconciliation_duration_seconds"));
        assert!(rendered.contains("cfgate_io_errors_total"));
        assert!(rendered.contains("cfgate_io_cloudflare_writes_total"));
        assert!(rendered.contains("CloudflareTunnel"));
    }

    #[test]
    fn test_gather_is_valid_exposition_format() {
        record_reconciliation_success("CloudflareAccessPolicy", Duration::from_millis(1));
        let rendered = gather_metrics().unwrap();

        // Every metric family carries HELP and TYPE lines
        assert!(rendered.contains("# HELP"));
        assert!(rendered.contains("# TYPE"));
    }
}
