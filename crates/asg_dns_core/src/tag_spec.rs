use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Trailing character marking a record name as a prefix to be completed with
/// the hosted zone's name.
pub const PREFIX_MARKER: char = '#';
/// Tag value that switches reconciliation off for a group.
pub const IGNORED_TAG_VALUE: &str = "none";
pub const DEFAULT_TTL: u32 = 1;
pub const DEFAULT_RECORD_TYPE: RecordType = RecordType::Cname;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Cname,
}

impl RecordType {
    /// Case-sensitive match against the literal type names accepted in tags.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "A" => Some(Self::A),
            "CNAME" => Some(Self::Cname),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::Cname => "CNAME",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies where a tag value came from, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagContext {
    pub group_name: String,
    pub tag_name: String,
}

impl TagContext {
    pub fn new(group_name: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            group_name: group_name.into(),
            tag_name: tag_name.into(),
        }
    }
}

impl fmt::Display for TagContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group '{}' tag '{}'", self.group_name, self.tag_name)
    }
}

/// One hosted zone's share of a decoded tag entry, before the zone is looked up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneRecordSpec {
    pub zone_id: String,
    pub record_type: RecordType,
    /// Literal record name, or the prefix (marker already stripped) when
    /// `needs_prefix_fixup` is set.
    pub record_name: String,
    pub ttl: u32,
    pub needs_prefix_fixup: bool,
}

impl ZoneRecordSpec {
    /// CNAME records point at instance DNS names, A records at raw addresses.
    pub fn uses_dns_names(&self) -> bool {
        self.record_type == RecordType::Cname
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTag {
    pub specs: Vec<ZoneRecordSpec>,
}

impl DecodedTag {
    pub fn zone_count(&self) -> usize {
        self.specs.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagDecode {
    /// Empty or `none` tag: the group opted out, nothing to do.
    Ignored,
    Zones(DecodedTag),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagSpecError {
    #[error("{context}: entry '{entry}' has {found} colon-delimited fields, expected 2 to 4")]
    FieldCount {
        context: TagContext,
        entry: String,
        found: usize,
    },

    #[error("{context}: entry '{entry}' does not name any hosted zone")]
    MissingZoneIds { context: TagContext, entry: String },

    #[error("{context}: entry '{entry}' contains an empty hosted zone id")]
    EmptyZoneId { context: TagContext, entry: String },

    #[error("{context}: entry '{entry}' has an empty record name")]
    MissingRecordName { context: TagContext, entry: String },

    #[error("{context}: unsupported record type '{record_type}' in entry '{entry}', expected A or CNAME")]
    UnknownRecordType {
        context: TagContext,
        entry: String,
        record_type: String,
    },

    #[error("{context}: ttl '{ttl}' in entry '{entry}' is not a non-negative integer")]
    InvalidTtl {
        context: TagContext,
        entry: String,
        ttl: String,
    },

    #[error("{context}: tag value is not a JSON array of strings: {reason}")]
    MalformedJson { context: TagContext, reason: String },

    #[error("{context}: tag value does not name any hosted zone")]
    NoZones { context: TagContext },
}

/// A record name is a prefix when it carries the trailing marker, or when one
/// entry fans out over several zones.
pub fn needs_prefix_fixup(record_name: &str, zone_id_count: usize) -> bool {
    record_name.ends_with(PREFIX_MARKER) || zone_id_count > 1
}

/// Decodes a raw tag value into per-zone record specifications.
///
/// A value starting with `[` is read as a JSON array of entry strings, each
/// decoded in order; the first bad entry fails the whole value. Anything else
/// is a single entry.
pub fn decode_tag_value(value: &str, context: &TagContext) -> Result<TagDecode, TagSpecError> {
    let value = value.trim();
    if value.is_empty() || value == IGNORED_TAG_VALUE {
        return Ok(TagDecode::Ignored);
    }

    let mut specs = Vec::new();
    if value.starts_with('[') {
        let entries: Vec<String> =
            serde_json::from_str(value).map_err(|error| TagSpecError::MalformedJson {
                context: context.clone(),
                reason: error.to_string(),
            })?;
        for entry in &entries {
            specs.extend(parse_tag_entry(entry, context)?);
        }
    } else {
        specs.extend(parse_tag_entry(value, context)?);
    }

    if specs.is_empty() {
        return Err(TagSpecError::NoZones {
            context: context.clone(),
        });
    }

    Ok(TagDecode::Zones(DecodedTag { specs }))
}

/// Decodes one `zoneIds:[type:]recordName[:ttl]` entry, yielding one spec per
/// zone id.
///
/// The three-field form is normally `zoneIds:type:recordName`; when the middle
/// field cannot be a record type token and the last one is an integer it is
/// read as `zoneIds:recordName:ttl` instead.
pub fn parse_tag_entry(
    entry: &str,
    context: &TagContext,
) -> Result<Vec<ZoneRecordSpec>, TagSpecError> {
    let fields: Vec<&str> = entry.split(':').map(str::trim).collect();

    let (zone_ids, record_type, record_name, ttl) = match fields.as_slice() {
        [zone_ids, record_name] => (*zone_ids, None, *record_name, None),
        [zone_ids, middle, last] => {
            if !looks_like_record_type(middle) && last.parse::<u32>().is_ok() {
                (*zone_ids, None, *middle, Some(*last))
            } else {
                (*zone_ids, Some(*middle), *last, None)
            }
        }
        [zone_ids, record_type, record_name, ttl] => {
            (*zone_ids, Some(*record_type), *record_name, Some(*ttl))
        }
        _ => {
            return Err(TagSpecError::FieldCount {
                context: context.clone(),
                entry: entry.to_string(),
                found: fields.len(),
            });
        }
    };

    let zone_ids = parse_zone_ids(zone_ids, entry, context)?;

    let record_type = match record_type {
        None => DEFAULT_RECORD_TYPE,
        Some(raw) => RecordType::parse(raw).ok_or_else(|| TagSpecError::UnknownRecordType {
            context: context.clone(),
            entry: entry.to_string(),
            record_type: raw.to_string(),
        })?,
    };

    if record_name.is_empty() {
        return Err(TagSpecError::MissingRecordName {
            context: context.clone(),
            entry: entry.to_string(),
        });
    }

    let ttl = match ttl {
        None => DEFAULT_TTL,
        Some(raw) => raw.parse::<u32>().map_err(|_| TagSpecError::InvalidTtl {
            context: context.clone(),
            entry: entry.to_string(),
            ttl: raw.to_string(),
        })?,
    };

    let needs_prefix_fixup = needs_prefix_fixup(record_name, zone_ids.len());
    let record_name = if needs_prefix_fixup {
        record_name.strip_suffix(PREFIX_MARKER).unwrap_or(record_name)
    } else {
        record_name
    };

    Ok(zone_ids
        .into_iter()
        .map(|zone_id| ZoneRecordSpec {
            zone_id: zone_id.to_string(),
            record_type,
            record_name: record_name.to_string(),
            ttl,
            needs_prefix_fixup,
        })
        .collect())
}

/// Upper-case alphanumeric tokens such as `AAAA` or `TXT` are record types,
/// supported or not, never record names.
fn looks_like_record_type(field: &str) -> bool {
    field.starts_with(|first: char| first.is_ascii_uppercase())
        && field
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

fn parse_zone_ids<'a>(
    raw: &'a str,
    entry: &str,
    context: &TagContext,
) -> Result<Vec<&'a str>, TagSpecError> {
    if raw.is_empty() {
        return Err(TagSpecError::MissingZoneIds {
            context: context.clone(),
            entry: entry.to_string(),
        });
    }

    let zone_ids: Vec<&str> = raw.split(',').map(str::trim).collect();
    if zone_ids.iter().any(|zone_id| zone_id.is_empty()) {
        return Err(TagSpecError::EmptyZoneId {
            context: context.clone(),
            entry: entry.to_string(),
        });
    }

    Ok(zone_ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> TagContext {
        TagContext::new("web-asg", "DomainMeta")
    }

    fn decode_zones(value: &str) -> DecodedTag {
        match decode_tag_value(value, &context()).expect("tag should decode") {
            TagDecode::Zones(decoded) => decoded,
            TagDecode::Ignored => panic!("tag value '{value}' was unexpectedly ignored"),
        }
    }

    #[test]
    fn two_field_entry_defaults_to_cname_with_ttl_one() {
        let specs = parse_tag_entry("Z1:www.example.com", &context()).expect("entry should parse");

        assert_eq!(
            specs,
            vec![ZoneRecordSpec {
                zone_id: "Z1".to_string(),
                record_type: RecordType::Cname,
                record_name: "www.example.com".to_string(),
                ttl: 1,
                needs_prefix_fixup: false,
            }]
        );
        assert!(specs[0].uses_dns_names());
    }

    #[test]
    fn three_field_entry_reads_record_type() {
        let specs =
            parse_tag_entry("Z1:A:app.example.com", &context()).expect("entry should parse");

        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].record_type, RecordType::A);
        assert_eq!(specs[0].record_name, "app.example.com");
        assert_eq!(specs[0].ttl, DEFAULT_TTL);
        assert!(!specs[0].uses_dns_names());
    }

    #[test]
    fn four_field_entry_reads_ttl() {
        let specs =
            parse_tag_entry("Z1:CNAME:app.example.com:300", &context()).expect("entry should parse");

        assert_eq!(specs[0].record_type, RecordType::Cname);
        assert_eq!(specs[0].ttl, 300);
    }

    #[test]
    fn three_field_entry_with_numeric_tail_reads_name_and_ttl() {
        let specs = parse_tag_entry("Z1,Z2:www.:30", &context()).expect("entry should parse");

        assert_eq!(specs.len(), 2);
        for spec in &specs {
            assert_eq!(spec.record_type, RecordType::Cname);
            assert_eq!(spec.record_name, "www.");
            assert_eq!(spec.ttl, 30);
            assert!(spec.needs_prefix_fixup);
        }
        assert_eq!(specs[0].zone_id, "Z1");
        assert_eq!(specs[1].zone_id, "Z2");
    }

    #[test]
    fn trailing_marker_is_stripped_and_flags_fixup() {
        let specs = parse_tag_entry("Z1:A:api.#:60", &context()).expect("entry should parse");

        assert_eq!(specs[0].record_name, "api.");
        assert!(specs[0].needs_prefix_fixup);
    }

    #[test]
    fn multiple_zones_share_the_same_prefix() {
        let specs =
            parse_tag_entry("Z1, Z2 ,Z3:CNAME:web.#", &context()).expect("entry should parse");

        let zone_ids: Vec<&str> = specs.iter().map(|spec| spec.zone_id.as_str()).collect();
        assert_eq!(zone_ids, vec!["Z1", "Z2", "Z3"]);
        assert!(specs
            .iter()
            .all(|spec| spec.record_name == "web." && spec.needs_prefix_fixup));
    }

    #[test]
    fn lone_marker_is_an_apex_prefix() {
        let specs = parse_tag_entry("Z1:#", &context()).expect("entry should parse");

        assert_eq!(specs[0].record_name, "");
        assert!(specs[0].needs_prefix_fixup);
    }

    #[test]
    fn prefix_predicate_covers_marker_and_multi_zone() {
        assert!(needs_prefix_fixup("www.#", 1));
        assert!(needs_prefix_fixup("www.", 2));
        assert!(!needs_prefix_fixup("www.example.com", 1));
    }

    #[test]
    fn rejects_wrong_field_counts() {
        for entry in ["Z1", "Z1:A:www:30:extra"] {
            let error = parse_tag_entry(entry, &context()).expect_err("entry should fail");
            assert!(
                matches!(error, TagSpecError::FieldCount { .. }),
                "unexpected error for '{entry}': {error}"
            );
        }
    }

    #[test]
    fn rejects_missing_or_empty_zone_ids() {
        let error = parse_tag_entry(":www.example.com", &context()).expect_err("should fail");
        assert!(matches!(error, TagSpecError::MissingZoneIds { .. }));

        let error = parse_tag_entry("Z1,,Z2:www.", &context()).expect_err("should fail");
        assert!(matches!(error, TagSpecError::EmptyZoneId { .. }));
    }

    #[test]
    fn record_types_are_case_sensitive() {
        let error =
            parse_tag_entry("Z1:cname:www.example.com", &context()).expect_err("should fail");

        match error {
            TagSpecError::UnknownRecordType { record_type, .. } => {
                assert_eq!(record_type, "cname");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unsupported_type_with_numeric_tail_is_not_a_record_name() {
        for (entry, record_type) in [("Z1:AAAA:60", "AAAA"), ("Z1:TXT:300", "TXT")] {
            let error = parse_tag_entry(entry, &context()).expect_err("entry should fail");
            match error {
                TagSpecError::UnknownRecordType {
                    record_type: found, ..
                } => assert_eq!(found, record_type),
                other => panic!("unexpected error for '{entry}': {other}"),
            }
        }

        let specs = parse_tag_entry("Z1:api:60", &context()).expect("entry should parse");
        assert_eq!(specs[0].record_name, "api");
        assert_eq!(specs[0].ttl, 60);
    }

    #[test]
    fn rejects_non_integer_ttl() {
        for entry in ["Z1:A:www.example.com:soon", "Z1:A:www.example.com:-5"] {
            let error = parse_tag_entry(entry, &context()).expect_err("entry should fail");
            assert!(matches!(error, TagSpecError::InvalidTtl { .. }));
        }
    }

    #[test]
    fn rejects_empty_record_name() {
        let error = parse_tag_entry("Z1:A:", &context()).expect_err("should fail");
        assert!(matches!(error, TagSpecError::MissingRecordName { .. }));
    }

    #[test]
    fn errors_name_group_and_tag() {
        let error = parse_tag_entry("Z1:MX:mail.example.com", &context()).expect_err("should fail");

        let message = error.to_string();
        assert!(message.contains("web-asg"));
        assert!(message.contains("DomainMeta"));
    }

    #[test]
    fn empty_and_none_values_are_ignored() {
        for value in ["", "   ", "none"] {
            assert_eq!(
                decode_tag_value(value, &context()).expect("should decode"),
                TagDecode::Ignored
            );
        }
    }

    #[test]
    fn scalar_value_decodes_as_single_entry() {
        let decoded = decode_zones("Z1:www.example.com");

        assert_eq!(decoded.zone_count(), 1);
        assert_eq!(decoded.specs[0].zone_id, "Z1");
    }

    #[test]
    fn json_array_preserves_entry_order() {
        let decoded = decode_zones(r#"["Z2:A:b.example.com", "Z1,Z3:a.#:15"]"#);

        let zone_ids: Vec<&str> = decoded
            .specs
            .iter()
            .map(|spec| spec.zone_id.as_str())
            .collect();
        assert_eq!(zone_ids, vec!["Z2", "Z1", "Z3"]);
        assert_eq!(decoded.zone_count(), 3);
        assert_eq!(decoded.specs[1].ttl, 15);
    }

    #[test]
    fn json_array_stops_at_first_bad_entry() {
        let error = decode_tag_value(
            r#"["Z1:www.example.com", "Z2:TXT:bad.example.com", "Z3:"]"#,
            &context(),
        )
        .expect_err("tag should fail");

        match error {
            TagSpecError::UnknownRecordType { entry, .. } => {
                assert_eq!(entry, "Z2:TXT:bad.example.com");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_json_array_has_no_zones() {
        let error = decode_tag_value("[]", &context()).expect_err("tag should fail");
        assert!(matches!(error, TagSpecError::NoZones { .. }));
    }

    #[test]
    fn malformed_json_is_rejected() {
        for value in [r#"["Z1:www.example.com""#, r#"["Z1:www.example.com", 7]"#] {
            let error = decode_tag_value(value, &context()).expect_err("tag should fail");
            assert!(matches!(error, TagSpecError::MalformedJson { .. }));
        }
    }
}
