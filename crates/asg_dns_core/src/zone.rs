use serde::{Deserialize, Serialize};

use crate::tag_spec::{RecordType, ZoneRecordSpec};

const HOSTED_ZONE_PATH_PREFIX: &str = "/hostedzone/";

/// Hosted zone metadata needed to finish a record specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedZone {
    pub id: String,
    /// Canonical zone name as reported by the zone service, e.g. `example.com.`.
    pub name: String,
    pub is_private: bool,
}

/// A record specification bound to its zone. The record name is final.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedZoneRecord {
    pub zone_id: String,
    pub zone_name: String,
    pub record_type: RecordType,
    pub record_name: String,
    pub ttl: u32,
    pub is_private: bool,
}

impl ResolvedZoneRecord {
    pub fn uses_dns_names(&self) -> bool {
        self.record_type == RecordType::Cname
    }
}

impl ZoneRecordSpec {
    /// Binds the specification to its zone, completing a prefix with the
    /// zone's canonical name.
    pub fn resolve(self, zone: &HostedZone) -> ResolvedZoneRecord {
        let record_name = if self.needs_prefix_fixup {
            format!("{}{}", self.record_name, zone.name)
        } else {
            self.record_name
        };

        ResolvedZoneRecord {
            zone_id: normalize_zone_id(&self.zone_id).to_string(),
            zone_name: zone.name.clone(),
            record_type: self.record_type,
            record_name,
            ttl: self.ttl,
            is_private: zone.is_private,
        }
    }
}

/// Accepts both `Z123` and `/hostedzone/Z123`.
pub fn normalize_zone_id(zone_id: &str) -> &str {
    zone_id
        .strip_prefix(HOSTED_ZONE_PATH_PREFIX)
        .unwrap_or(zone_id)
}
