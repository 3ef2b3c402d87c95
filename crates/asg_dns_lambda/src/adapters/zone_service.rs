use asg_dns_core::mutation::{ExistingRecordSet, MutationBatch};
use asg_dns_core::tag_spec::RecordType;
use asg_dns_core::zone::HostedZone;
use async_trait::async_trait;

use super::AdapterError;

/// Lookup key for record sets already stored in a zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSetQuery<'a> {
    pub zone_id: &'a str,
    pub record_name: &'a str,
    pub record_type: RecordType,
    pub set_identifier: &'a str,
}

#[async_trait]
pub trait ZoneService: Send + Sync {
    async fn get_hosted_zone(&self, zone_id: &str) -> Result<HostedZone, AdapterError>;

    /// Lists record sets starting at the query's name, type and identifier.
    /// Results may include neighbouring records; callers filter.
    async fn list_record_sets(
        &self,
        query: &RecordSetQuery<'_>,
    ) -> Result<Vec<ExistingRecordSet>, AdapterError>;

    /// Submits one change and returns the service's change status.
    async fn submit_change(&self, batch: &MutationBatch) -> Result<String, AdapterError>;
}
