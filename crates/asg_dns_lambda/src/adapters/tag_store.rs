use async_trait::async_trait;

use super::AdapterError;

#[async_trait]
pub trait TagStore: Send + Sync {
    /// Returns the value of `tag_name` on the scaling group, or `None` when the
    /// group carries no such tag.
    async fn fetch_tag_value(
        &self,
        group_name: &str,
        tag_name: &str,
    ) -> Result<Option<String>, AdapterError>;
}
