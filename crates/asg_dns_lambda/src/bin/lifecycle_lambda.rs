use asg_dns_core::mutation::{ChangeAction, ExistingRecordSet, InstanceAddresses, MutationBatch};
use asg_dns_core::tag_spec::RecordType;
use asg_dns_core::zone::{normalize_zone_id, HostedZone};
use asg_dns_lambda::adapters::inventory::InstanceInventory;
use asg_dns_lambda::adapters::tag_store::TagStore;
use asg_dns_lambda::adapters::zone_service::{RecordSetQuery, ZoneService};
use asg_dns_lambda::adapters::AdapterError;
use asg_dns_lambda::config::HandlerConfig;
use asg_dns_lambda::handlers::lifecycle::{
    handle_lifecycle_notification, InvocationReport, LifecycleServices,
};
use asg_dns_lambda::telemetry;
use async_trait::async_trait;
use aws_sdk_autoscaling::types::Filter;
use aws_sdk_ec2::error::ProvideErrorMetadata;
use aws_sdk_route53::types::{
    Change, ChangeAction as Route53ChangeAction, ChangeBatch, ResourceRecord, ResourceRecordSet,
    RrType,
};
use chrono::Utc;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;

const NO_SUCH_INSTANCE: &str = "InvalidInstanceID.NotFound";
const NO_SUCH_HOSTED_ZONE: &str = "NoSuchHostedZone";

struct AutoScalingTagStore {
    client: aws_sdk_autoscaling::Client,
}

#[async_trait]
impl TagStore for AutoScalingTagStore {
    async fn fetch_tag_value(
        &self,
        group_name: &str,
        tag_name: &str,
    ) -> Result<Option<String>, AdapterError> {
        let output = self
            .client
            .describe_tags()
            .filters(
                Filter::builder()
                    .name("auto-scaling-group")
                    .values(group_name)
                    .build(),
            )
            .filters(Filter::builder().name("key").values(tag_name).build())
            .send()
            .await
            .map_err(|error| {
                AdapterError::Service(format!(
                    "failed to describe tags of group {group_name}: {error}"
                ))
            })?;

        Ok(output
            .tags()
            .iter()
            .find(|tag| tag.key() == Some(tag_name))
            .and_then(|tag| tag.value())
            .map(str::to_string))
    }
}

struct Ec2Inventory {
    client: aws_sdk_ec2::Client,
}

#[async_trait]
impl InstanceInventory for Ec2Inventory {
    async fn describe_instance(
        &self,
        instance_id: &str,
    ) -> Result<InstanceAddresses, AdapterError> {
        let output = self
            .client
            .describe_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|error| {
                if error.code() == Some(NO_SUCH_INSTANCE) {
                    AdapterError::NotFound(format!("instance {instance_id}"))
                } else {
                    AdapterError::Service(format!(
                        "failed to describe instance {instance_id}: {error}"
                    ))
                }
            })?;

        let instance = output
            .reservations()
            .iter()
            .flat_map(|reservation| reservation.instances())
            .find(|instance| instance.instance_id() == Some(instance_id))
            .ok_or_else(|| AdapterError::NotFound(format!("instance {instance_id}")))?;

        Ok(InstanceAddresses {
            private_ip: instance.private_ip_address().map(str::to_string),
            public_ip: instance.public_ip_address().map(str::to_string),
            private_dns_name: instance.private_dns_name().map(str::to_string),
            public_dns_name: instance.public_dns_name().map(str::to_string),
        })
    }
}

struct Route53ZoneService {
    client: aws_sdk_route53::Client,
}

#[async_trait]
impl ZoneService for Route53ZoneService {
    async fn get_hosted_zone(&self, zone_id: &str) -> Result<HostedZone, AdapterError> {
        let output = self
            .client
            .get_hosted_zone()
            .id(zone_id)
            .send()
            .await
            .map_err(|error| {
                if error.code() == Some(NO_SUCH_HOSTED_ZONE) {
                    AdapterError::NotFound(format!("hosted zone {zone_id}"))
                } else {
                    AdapterError::Service(format!(
                        "failed to get hosted zone {zone_id}: {error}"
                    ))
                }
            })?;

        let zone = output
            .hosted_zone()
            .ok_or_else(|| AdapterError::NotFound(format!("hosted zone {zone_id}")))?;

        Ok(HostedZone {
            id: normalize_zone_id(zone.id()).to_string(),
            name: zone.name().to_string(),
            is_private: zone
                .config()
                .map(|config| config.private_zone())
                .unwrap_or(false),
        })
    }

    async fn list_record_sets(
        &self,
        query: &RecordSetQuery<'_>,
    ) -> Result<Vec<ExistingRecordSet>, AdapterError> {
        let output = self
            .client
            .list_resource_record_sets()
            .hosted_zone_id(query.zone_id)
            .start_record_name(query.record_name)
            .start_record_type(rr_type(query.record_type))
            .start_record_identifier(query.set_identifier)
            .send()
            .await
            .map_err(|error| {
                AdapterError::Service(format!(
                    "failed to list record sets of zone {}: {error}",
                    query.zone_id
                ))
            })?;

        Ok(output
            .resource_record_sets()
            .iter()
            .filter_map(|record_set| {
                let record_type = RecordType::parse(record_set.r#type().as_str())?;
                Some(ExistingRecordSet {
                    name: record_set.name().to_string(),
                    record_type,
                    set_identifier: record_set.set_identifier().map(str::to_string),
                    weight: record_set.weight(),
                    ttl: record_set.ttl(),
                    values: record_set
                        .resource_records()
                        .iter()
                        .map(|record| record.value().to_string())
                        .collect(),
                })
            })
            .collect())
    }

    async fn submit_change(&self, batch: &MutationBatch) -> Result<String, AdapterError> {
        let invalid = |error: aws_sdk_route53::error::BuildError| {
            AdapterError::Service(format!("invalid change for zone {}: {error}", batch.zone_id))
        };

        let record_set = ResourceRecordSet::builder()
            .name(&batch.record_name)
            .r#type(rr_type(batch.record_type))
            .set_identifier(&batch.set_identifier)
            .weight(batch.weight)
            .ttl(batch.ttl)
            .resource_records(ResourceRecord::builder().value(&batch.value).build().map_err(invalid)?)
            .build()
            .map_err(invalid)?;

        let action = match batch.action {
            ChangeAction::Upsert => Route53ChangeAction::Upsert,
            ChangeAction::Delete => Route53ChangeAction::Delete,
        };
        let change = Change::builder()
            .action(action)
            .resource_record_set(record_set)
            .build()
            .map_err(invalid)?;
        let change_batch = ChangeBatch::builder()
            .comment(format!("{} for instance {}", batch.action, batch.set_identifier))
            .changes(change)
            .build()
            .map_err(invalid)?;

        let output = self
            .client
            .change_resource_record_sets()
            .hosted_zone_id(&batch.zone_id)
            .change_batch(change_batch)
            .send()
            .await
            .map_err(|error| {
                AdapterError::Service(format!(
                    "failed to change record sets of zone {}: {error}",
                    batch.zone_id
                ))
            })?;

        Ok(output
            .change_info()
            .map(|info| info.status().as_str().to_string())
            .unwrap_or_else(|| "UNKNOWN".to_string()))
    }
}

fn rr_type(record_type: RecordType) -> RrType {
    match record_type {
        RecordType::A => RrType::A,
        RecordType::Cname => RrType::Cname,
    }
}

struct RuntimeDependencies {
    config: HandlerConfig,
    tag_store: AutoScalingTagStore,
    inventory: Ec2Inventory,
    zones: Route53ZoneService,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: &RuntimeDependencies,
) -> Result<InvocationReport, Error> {
    let services = LifecycleServices {
        tag_store: &deps.tag_store,
        inventory: &deps.inventory,
        zones: &deps.zones,
    };

    handle_lifecycle_notification(
        &event.payload,
        &deps.config,
        services,
        Utc::now().to_rfc3339(),
    )
    .await
    .map_err(|error| Error::from(error.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    telemetry::init()?;

    let config = HandlerConfig::from_env()?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let deps = RuntimeDependencies {
        config,
        tag_store: AutoScalingTagStore {
            client: aws_sdk_autoscaling::Client::new(&aws_config),
        },
        inventory: Ec2Inventory {
            client: aws_sdk_ec2::Client::new(&aws_config),
        },
        zones: Route53ZoneService {
            client: aws_sdk_route53::Client::new(&aws_config),
        },
    };

    lambda_runtime::run(service_fn(|event| handle_request(event, &deps))).await
}
