// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the DNS sync config merge.

#[cfg(test)]
mod tests {
    use crate::crd::{
        CleanupPolicy, CloudflareDNSSync, CloudflareDNSSyncSpec, DnsConfig, OwnershipConfig,
        RecordDefaults, TunnelReference, ZoneSpec,
    };
    use crate::reconcilers::dnssync::{effective_dns_config, effective_zones};

    fn sync(spec_mutator: impl FnOnce(&mut CloudflareDNSSyncSpec)) -> CloudflareDNSSync {
        let mut spec = CloudflareDNSSyncSpec {
            tunnel_ref: TunnelReference {
                name: "edge".to_string(),
                namespace: None,
            },
            zones: vec![ZoneSpec {
                name: "example.com".to_string(),
                id: None,
            }],
            gateway_routes: None,
            hostnames: None,
            record_defaults: None,
            ownership: None,
            cleanup: None,
            fallback_credentials_ref: None,
        };
        spec_mutator(&mut spec);
        CloudflareDNSSync::new("app-dns", spec)
    }

    #[test]
    fn test_defaults_without_any_config() {
        let config = effective_dns_config(&sync(|_| {}), None);

        assert!(config.proxied);
        assert_eq!(config.ttl, 1);
        assert!(config.txt_enabled);
        assert_eq!(config.txt_prefix, "_cfgate");
        assert!(config.comment_enabled);
        assert!(config.cleanup_on_route_removal);
        assert!(config.cleanup_on_delete);
        assert!(config.only_managed);
    }

    #[test]
    fn test_sync_spec_overrides_tunnel_defaults() {
        let tunnel_dns = DnsConfig {
            zones: None,
            record_defaults: Some(RecordDefaults {
                proxied: Some(true),
                ttl: Some(300),
            }),
            ownership: Some(OwnershipConfig {
                txt_record: Some(true),
                txt_prefix: Some("_tunnel-owner".to_string()),
                comment: Some(true),
            }),
            cleanup: None,
        };

        let sync = sync(|spec| {
            spec.record_defaults = Some(RecordDefaults {
                proxied: Some(false),
                ttl: None,
            });
        });

        let config = effective_dns_config(&sync, Some(&tunnel_dns));

        // The sync's recordDefaults block wins wholesale
        assert!(!config.proxied);
        assert_eq!(config.ttl, 1);
        // Ownership falls through to the tunnel's block
        assert_eq!(config.txt_prefix, "_tunnel-owner");
    }

    #[test]
    fn test_tunnel_defaults_used_when_sync_silent() {
        let tunnel_dns = DnsConfig {
            zones: None,
            record_defaults: Some(RecordDefaults {
                proxied: Some(false),
                ttl: Some(120),
            }),
            ownership: None,
            cleanup: Some(CleanupPolicy {
                on_route_removal: Some(false),
                on_delete: Some(false),
                only_managed: None,
            }),
        };

        let config = effective_dns_config(&sync(|_| {}), Some(&tunnel_dns));
        assert!(!config.proxied);
        assert_eq!(config.ttl, 120);
        assert!(!config.cleanup_on_route_removal);
        assert!(!config.cleanup_on_delete);
        assert!(config.only_managed);
    }

    #[test]
    fn test_effective_zones_prefers_sync_list() {
        let tunnel_dns = DnsConfig {
            zones: Some(vec![ZoneSpec {
                name: "tunnel-zone.com".to_string(),
                id: None,
            }]),
            ..Default::default()
        };

        let zones = effective_zones(&sync(|_| {}), Some(&tunnel_dns));
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].name, "example.com");
    }

    #[test]
    fn test_effective_zones_falls_back_to_tunnel() {
        let tunnel_dns = DnsConfig {
            zones: Some(vec![ZoneSpec {
                name: "tunnel-zone.com".to_string(),
                id: Some("z9".to_string()),
            }]),
            ..Default::default()
        };

        let sync = sync(|spec| spec.zones = Vec::new());
        let zones = effective_zones(&sync, Some(&tunnel_dns));
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].name, "tunnel-zone.com");
        assert_eq!(zones[0].id.as_deref(), Some("z9"));
    }
}
