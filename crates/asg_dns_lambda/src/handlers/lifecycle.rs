use asg_dns_core::event::{parse_notification, EventError, LifecycleEvent, LifecycleKind};
use asg_dns_core::mutation::{
    address_field_name, build_delete, build_upsert, find_existing_record, select_address,
    ChangeAction, MutationBatch, RecordIntent,
};
use asg_dns_core::tag_spec::{
    decode_tag_value, RecordType, TagContext, TagDecode, TagSpecError, ZoneRecordSpec,
};
use asg_dns_core::zone::{normalize_zone_id, ResolvedZoneRecord};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::adapters::inventory::InstanceInventory;
use crate::adapters::tag_store::TagStore;
use crate::adapters::zone_service::{RecordSetQuery, ZoneService};
use crate::adapters::AdapterError;
use crate::config::HandlerConfig;

const TAG_EXCERPT_CHARS: usize = 120;

/// External collaborators one invocation talks to.
#[derive(Clone, Copy)]
pub struct LifecycleServices<'a> {
    pub tag_store: &'a dyn TagStore,
    pub inventory: &'a dyn InstanceInventory,
    pub zones: &'a dyn ZoneService,
}

/// Failures that end the whole invocation before any zone is touched.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid lifecycle notification: {0}")]
    Event(#[from] EventError),

    #[error("failed to read tag '{tag_name}' of group '{group_name}': {source}")]
    TagFetch {
        group_name: String,
        tag_name: String,
        #[source]
        source: AdapterError,
    },

    #[error("invalid DNS tag specification: {0}")]
    Decode(#[from] TagSpecError),
}

/// Failure of a single zone's pipeline. Sibling zones are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZoneFailure {
    #[error("hosted zone lookup failed: {0}")]
    ZoneLookup(AdapterError),

    #[error("instance lookup failed: {0}")]
    InstanceLookup(AdapterError),

    #[error("instance {instance_id} has no {field} for zone {zone_id}")]
    MissingAddress {
        instance_id: String,
        zone_id: String,
        field: &'static str,
    },

    #[error("record set lookup failed: {0}")]
    RecordSetLookup(AdapterError),

    #[error("no {record_type} record '{record_name}' owned by instance {instance_id} in zone {zone_id}")]
    NoExistingRecord {
        instance_id: String,
        zone_id: String,
        record_name: String,
        record_type: RecordType,
    },

    #[error("change submission failed: {0}")]
    Submit(AdapterError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    Ignored,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneOutcome {
    pub zone_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ChangeAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ZoneOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationReport {
    pub status: InvocationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<LifecycleKind>,
    pub event_time: String,
    pub zones: Vec<ZoneOutcome>,
}

impl InvocationReport {
    fn ignored(event: Option<&LifecycleEvent>, event_time: String) -> Self {
        Self {
            status: InvocationStatus::Ignored,
            group_name: event.map(|event| event.group_name.clone()),
            instance_id: event.map(|event| event.instance_id.clone()),
            kind: event.map(|event| event.kind),
            event_time,
            zones: Vec::new(),
        }
    }
}

/// Runs one lifecycle notification through tag decoding and the per-zone
/// resolve, build and submit chain.
///
/// Zones run concurrently; one zone's failure is recorded in its
/// [`ZoneOutcome`] and never cancels or fails the others. Event, tag fetch and
/// tag decode failures end the invocation before any zone is touched.
pub async fn handle_lifecycle_notification(
    payload: &Value,
    config: &HandlerConfig,
    services: LifecycleServices<'_>,
    event_time: String,
) -> Result<InvocationReport, HandlerError> {
    let Some(event) = parse_notification(payload)? else {
        info!(event = "notification_ignored", "notification is not a launch or terminate");
        return Ok(InvocationReport::ignored(None, event_time));
    };

    let tag_value = services
        .tag_store
        .fetch_tag_value(&event.group_name, &config.tag_name)
        .await
        .map_err(|source| HandlerError::TagFetch {
            group_name: event.group_name.clone(),
            tag_name: config.tag_name.clone(),
            source,
        })?
        .unwrap_or_default();

    let context = TagContext::new(event.group_name.clone(), config.tag_name.clone());
    let tag_excerpt = excerpt(&tag_value);
    let decoded = match decode_tag_value(&tag_value, &context) {
        Ok(TagDecode::Zones(decoded)) => decoded,
        Ok(TagDecode::Ignored) => {
            info!(
                event = "tag_ignored",
                group_name = %event.group_name,
                tag_name = %config.tag_name,
                "group has no DNS tag specification"
            );
            return Ok(InvocationReport::ignored(Some(&event), event_time));
        }
        Err(decode_error) => {
            error!(
                event = "tag_decode_failed",
                group_name = %event.group_name,
                tag_name = %config.tag_name,
                tag_value = %tag_excerpt,
                error = %decode_error,
                "rejecting DNS tag specification"
            );
            return Err(decode_error.into());
        }
    };

    info!(
        event = "zones_decoded",
        group_name = %event.group_name,
        instance_id = %event.instance_id,
        kind = ?event.kind,
        zone_count = decoded.zone_count(),
        "processing lifecycle event"
    );

    let intent = RecordIntent::from(event.kind);
    let zones = join_all(decoded.specs.into_iter().map(|spec| {
        run_zone_pipeline(spec, &event, intent, config, services, &tag_excerpt)
    }))
    .await;

    let failed = zones.iter().filter(|zone| !zone.succeeded()).count();
    info!(
        event = "invocation_completed",
        group_name = %event.group_name,
        instance_id = %event.instance_id,
        zones = zones.len(),
        failed_zones = failed,
        "lifecycle event processed"
    );

    Ok(InvocationReport {
        status: InvocationStatus::Completed,
        group_name: Some(event.group_name),
        instance_id: Some(event.instance_id),
        kind: Some(event.kind),
        event_time,
        zones,
    })
}

async fn run_zone_pipeline(
    spec: ZoneRecordSpec,
    event: &LifecycleEvent,
    intent: RecordIntent,
    config: &HandlerConfig,
    services: LifecycleServices<'_>,
    tag_excerpt: &str,
) -> ZoneOutcome {
    let zone_id = normalize_zone_id(&spec.zone_id).to_string();

    match execute_zone_pipeline(spec, event, intent, config, services).await {
        Ok((record, batch, change_status)) => {
            info!(
                event = "zone_mutation_submitted",
                group_name = %event.group_name,
                instance_id = %event.instance_id,
                action = %batch.action,
                zone_id = %record.zone_id,
                zone_name = %record.zone_name,
                record_name = %batch.record_name,
                record_type = %batch.record_type,
                value = %batch.value,
                status = %change_status,
                "record change submitted"
            );
            ZoneOutcome {
                zone_id: record.zone_id,
                zone_name: Some(record.zone_name),
                record_name: Some(batch.record_name),
                action: Some(batch.action),
                change_status: Some(change_status),
                error: None,
            }
        }
        Err(failure) => {
            warn!(
                event = "zone_pipeline_failed",
                group_name = %event.group_name,
                instance_id = %event.instance_id,
                zone_id = %zone_id,
                tag_value = %tag_excerpt,
                error = %failure,
                "zone left unchanged"
            );
            ZoneOutcome {
                zone_id,
                zone_name: None,
                record_name: None,
                action: None,
                change_status: None,
                error: Some(failure.to_string()),
            }
        }
    }
}

async fn execute_zone_pipeline(
    spec: ZoneRecordSpec,
    event: &LifecycleEvent,
    intent: RecordIntent,
    config: &HandlerConfig,
    services: LifecycleServices<'_>,
) -> Result<(ResolvedZoneRecord, MutationBatch, String), ZoneFailure> {
    let record = resolve_zone(spec, services.zones).await?;

    let batch = match intent {
        RecordIntent::Launch => {
            build_launch_mutation(&record, &event.instance_id, config, services.inventory).await?
        }
        RecordIntent::Terminate => {
            build_terminate_mutation(&record, &event.instance_id, config, services.zones).await?
        }
    };

    let change_status = services
        .zones
        .submit_change(&batch)
        .await
        .map_err(ZoneFailure::Submit)?;

    Ok((record, batch, change_status))
}

/// Looks up the spec's hosted zone and binds the spec to it.
pub async fn resolve_zone(
    spec: ZoneRecordSpec,
    zones: &dyn ZoneService,
) -> Result<ResolvedZoneRecord, ZoneFailure> {
    let zone = zones
        .get_hosted_zone(normalize_zone_id(&spec.zone_id))
        .await
        .map_err(ZoneFailure::ZoneLookup)?;

    Ok(spec.resolve(&zone))
}

/// Points the record at the live instance's address.
pub async fn build_launch_mutation(
    record: &ResolvedZoneRecord,
    instance_id: &str,
    config: &HandlerConfig,
    inventory: &dyn InstanceInventory,
) -> Result<MutationBatch, ZoneFailure> {
    let addresses = inventory
        .describe_instance(instance_id)
        .await
        .map_err(ZoneFailure::InstanceLookup)?;

    let value = select_address(&addresses, record.is_private, record.uses_dns_names()).ok_or_else(
        || ZoneFailure::MissingAddress {
            instance_id: instance_id.to_string(),
            zone_id: record.zone_id.clone(),
            field: address_field_name(record.is_private, record.uses_dns_names()),
        },
    )?;

    Ok(build_upsert(record, instance_id, value, config.record_weight))
}

/// Deletes the record currently stored for the instance. The instance's
/// address may already be released, so the stored value is used as-is.
pub async fn build_terminate_mutation(
    record: &ResolvedZoneRecord,
    instance_id: &str,
    config: &HandlerConfig,
    zones: &dyn ZoneService,
) -> Result<MutationBatch, ZoneFailure> {
    let query = RecordSetQuery {
        zone_id: &record.zone_id,
        record_name: &record.record_name,
        record_type: record.record_type,
        set_identifier: instance_id,
    };
    let candidates = zones
        .list_record_sets(&query)
        .await
        .map_err(ZoneFailure::RecordSetLookup)?;

    find_existing_record(&candidates, record, instance_id)
        .and_then(|existing| build_delete(record, instance_id, existing, config.record_weight))
        .ok_or_else(|| ZoneFailure::NoExistingRecord {
            instance_id: instance_id.to_string(),
            zone_id: record.zone_id.clone(),
            record_name: record.record_name.clone(),
            record_type: record.record_type,
        })
}

fn excerpt(tag_value: &str) -> String {
    if tag_value.chars().count() <= TAG_EXCERPT_CHARS {
        return tag_value.to_string();
    }
    let mut truncated: String = tag_value.chars().take(TAG_EXCERPT_CHARS).collect();
    truncated.push_str("...");
    truncated
}
