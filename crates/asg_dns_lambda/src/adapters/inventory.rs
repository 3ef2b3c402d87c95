use asg_dns_core::mutation::InstanceAddresses;
use async_trait::async_trait;

use super::AdapterError;

#[async_trait]
pub trait InstanceInventory: Send + Sync {
    /// Fails with [`AdapterError::NotFound`] when the instance is unknown.
    async fn describe_instance(&self, instance_id: &str)
        -> Result<InstanceAddresses, AdapterError>;
}
