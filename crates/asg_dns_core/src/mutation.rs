use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::LifecycleKind;
use crate::tag_spec::RecordType;
use crate::zone::ResolvedZoneRecord;

/// Weight given to every instance record, so that all instances of a group
/// share one logical name with equal probability.
pub const DEFAULT_RECORD_WEIGHT: u8 = 1;

/// What a lifecycle event asks of each zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordIntent {
    /// Point the record at the live instance.
    Launch,
    /// Remove whatever record currently exists for the instance.
    Terminate,
}

impl From<LifecycleKind> for RecordIntent {
    fn from(kind: LifecycleKind) -> Self {
        match kind {
            LifecycleKind::Launch => Self::Launch,
            LifecycleKind::Terminate => Self::Terminate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeAction {
    Upsert,
    Delete,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upsert => f.write_str("UPSERT"),
            Self::Delete => f.write_str("DELETE"),
        }
    }
}

/// A single weighted, instance-identified record change for one zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationBatch {
    pub zone_id: String,
    pub action: ChangeAction,
    pub record_name: String,
    pub record_type: RecordType,
    pub set_identifier: String,
    pub weight: i64,
    pub ttl: i64,
    pub value: String,
}

/// Network identity of an instance as reported by the inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceAddresses {
    pub private_ip: Option<String>,
    pub public_ip: Option<String>,
    pub private_dns_name: Option<String>,
    pub public_dns_name: Option<String>,
}

/// A record set already present in a zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingRecordSet {
    pub name: String,
    pub record_type: RecordType,
    pub set_identifier: Option<String>,
    pub weight: Option<i64>,
    pub ttl: Option<i64>,
    pub values: Vec<String>,
}

/// Picks the address a record should point at: the private or public family
/// by zone privacy, then the DNS name or the raw IP by record type.
pub fn select_address(
    addresses: &InstanceAddresses,
    is_private: bool,
    uses_dns_names: bool,
) -> Option<&str> {
    let selected = match (is_private, uses_dns_names) {
        (true, true) => &addresses.private_dns_name,
        (true, false) => &addresses.private_ip,
        (false, true) => &addresses.public_dns_name,
        (false, false) => &addresses.public_ip,
    };

    selected.as_deref().filter(|value| !value.is_empty())
}

/// Human-readable name of the address field [`select_address`] reads.
pub fn address_field_name(is_private: bool, uses_dns_names: bool) -> &'static str {
    match (is_private, uses_dns_names) {
        (true, true) => "private DNS name",
        (true, false) => "private IP address",
        (false, true) => "public DNS name",
        (false, false) => "public IP address",
    }
}

pub fn build_upsert(
    record: &ResolvedZoneRecord,
    instance_id: &str,
    value: &str,
    weight: u8,
) -> MutationBatch {
    MutationBatch {
        zone_id: record.zone_id.clone(),
        action: ChangeAction::Upsert,
        record_name: record.record_name.clone(),
        record_type: record.record_type,
        set_identifier: instance_id.to_string(),
        weight: i64::from(weight),
        ttl: i64::from(record.ttl),
        value: value.to_string(),
    }
}

/// Finds the record set owned by `instance_id` under the record's name and type.
pub fn find_existing_record<'a>(
    candidates: &'a [ExistingRecordSet],
    record: &ResolvedZoneRecord,
    instance_id: &str,
) -> Option<&'a ExistingRecordSet> {
    candidates.iter().find(|candidate| {
        candidate.record_type == record.record_type
            && candidate.set_identifier.as_deref() == Some(instance_id)
            && record_names_match(&candidate.name, &record.record_name)
            && !candidate.values.is_empty()
    })
}

/// Builds a delete that matches the existing record exactly; the zone service
/// refuses deletes whose value, ttl or weight differ from what is stored.
pub fn build_delete(
    record: &ResolvedZoneRecord,
    instance_id: &str,
    existing: &ExistingRecordSet,
    weight: u8,
) -> Option<MutationBatch> {
    let value = existing.values.first()?;

    Some(MutationBatch {
        zone_id: record.zone_id.clone(),
        action: ChangeAction::Delete,
        record_name: existing.name.clone(),
        record_type: record.record_type,
        set_identifier: instance_id.to_string(),
        weight: existing.weight.unwrap_or(i64::from(weight)),
        ttl: existing.ttl.unwrap_or(i64::from(record.ttl)),
        value: value.clone(),
    })
}

/// Compares record names the way the zone service stores them: case-insensitive,
/// trailing dot optional, `\NNN` octal escapes decoded.
pub fn record_names_match(left: &str, right: &str) -> bool {
    let left = decode_octal_escapes(left);
    let right = decode_octal_escapes(right);
    left.trim_end_matches('.')
        .eq_ignore_ascii_case(right.trim_end_matches('.'))
}

/// Route 53 lists names with characters outside `a-z0-9-` as `\NNN` octal
/// escapes, e.g. `\052` for `*`.
pub fn decode_octal_escapes(name: &str) -> String {
    let bytes = name.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'\\' {
            if let Some(value) = bytes
                .get(index + 1..index + 4)
                .and_then(|digits| std::str::from_utf8(digits).ok())
                .filter(|digits| digits.bytes().all(|digit| (b'0'..=b'7').contains(&digit)))
                .and_then(|digits| u8::from_str_radix(digits, 8).ok())
            {
                decoded.push(value);
                index += 4;
                continue;
            }
        }
        decoded.push(bytes[index]);
        index += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(record_type: RecordType, is_private: bool) -> ResolvedZoneRecord {
        ResolvedZoneRecord {
            zone_id: "Z1".to_string(),
            zone_name: "example.com.".to_string(),
            record_type,
            record_name: "www.example.com.".to_string(),
            ttl: 30,
            is_private,
        }
    }

    fn addresses() -> InstanceAddresses {
        InstanceAddresses {
            private_ip: Some("10.0.0.12".to_string()),
            public_ip: Some("1.2.3.4".to_string()),
            private_dns_name: Some("ip-10-0-0-12.ec2.internal".to_string()),
            public_dns_name: Some("ec2-1-2-3-4.compute.amazonaws.com".to_string()),
        }
    }

    fn existing(name: &str, set_identifier: &str) -> ExistingRecordSet {
        ExistingRecordSet {
            name: name.to_string(),
            record_type: RecordType::Cname,
            set_identifier: Some(set_identifier.to_string()),
            weight: Some(1),
            ttl: Some(60),
            values: vec!["ec2-1-2-3-4.compute.amazonaws.com".to_string()],
        }
    }

    #[test]
    fn address_selection_covers_both_axes() {
        let addresses = addresses();

        assert_eq!(
            select_address(&addresses, true, true),
            Some("ip-10-0-0-12.ec2.internal")
        );
        assert_eq!(select_address(&addresses, true, false), Some("10.0.0.12"));
        assert_eq!(
            select_address(&addresses, false, true),
            Some("ec2-1-2-3-4.compute.amazonaws.com")
        );
        assert_eq!(select_address(&addresses, false, false), Some("1.2.3.4"));
    }

    #[test]
    fn empty_public_address_counts_as_missing() {
        let addresses = InstanceAddresses {
            public_dns_name: Some(String::new()),
            public_ip: None,
            ..addresses()
        };

        assert_eq!(select_address(&addresses, false, true), None);
        assert_eq!(select_address(&addresses, false, false), None);
        assert_eq!(address_field_name(false, true), "public DNS name");
    }

    #[test]
    fn upsert_carries_instance_identity_and_weight() {
        let batch = build_upsert(
            &record(RecordType::Cname, false),
            "i-0abc123",
            "ec2-1-2-3-4.compute.amazonaws.com",
            DEFAULT_RECORD_WEIGHT,
        );

        assert_eq!(
            batch,
            MutationBatch {
                zone_id: "Z1".to_string(),
                action: ChangeAction::Upsert,
                record_name: "www.example.com.".to_string(),
                record_type: RecordType::Cname,
                set_identifier: "i-0abc123".to_string(),
                weight: 1,
                ttl: 30,
                value: "ec2-1-2-3-4.compute.amazonaws.com".to_string(),
            }
        );
    }

    #[test]
    fn existing_record_lookup_matches_identifier_and_normalized_name() {
        let candidates = vec![
            existing("www.example.com.", "i-0other"),
            existing("WWW.Example.com", "i-0abc123"),
        ];

        let found = find_existing_record(&candidates, &record(RecordType::Cname, false), "i-0abc123")
            .expect("record should be found");
        assert_eq!(found.set_identifier.as_deref(), Some("i-0abc123"));

        let wrong_type = record(RecordType::A, false);
        assert!(find_existing_record(&candidates, &wrong_type, "i-0abc123").is_none());
    }

    #[test]
    fn escaped_wildcard_names_match_their_literal_form() {
        let candidates = vec![existing(r"\052.example.com.", "i-0abc123")];
        let wildcard = ResolvedZoneRecord {
            record_name: "*.example.com".to_string(),
            ..record(RecordType::Cname, false)
        };

        assert!(find_existing_record(&candidates, &wildcard, "i-0abc123").is_some());
        assert_eq!(decode_octal_escapes(r"\052.example.com."), "*.example.com.");
        assert_eq!(decode_octal_escapes(r"a\09b\"), r"a\09b\");
    }

    #[test]
    fn delete_reuses_the_stored_record() {
        let stored = existing("www.example.com.", "i-0abc123");

        let batch = build_delete(
            &record(RecordType::Cname, false),
            "i-0abc123",
            &stored,
            DEFAULT_RECORD_WEIGHT,
        )
        .expect("delete should build");

        assert_eq!(batch.action, ChangeAction::Delete);
        assert_eq!(batch.value, "ec2-1-2-3-4.compute.amazonaws.com");
        assert_eq!(batch.ttl, 60);
        assert_eq!(batch.weight, 1);
        assert_eq!(batch.set_identifier, "i-0abc123");
    }

    #[test]
    fn intent_follows_event_kind() {
        assert_eq!(RecordIntent::from(LifecycleKind::Launch), RecordIntent::Launch);
        assert_eq!(
            RecordIntent::from(LifecycleKind::Terminate),
            RecordIntent::Terminate
        );
    }
}
