use thiserror::Error;

pub mod inventory;
pub mod tag_store;
pub mod zone_service;

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("service call failed: {0}")]
    Service(String),
}
