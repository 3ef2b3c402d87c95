use asg_dns_core::mutation::DEFAULT_RECORD_WEIGHT;
use thiserror::Error;

pub const DEFAULT_TAG_NAME: &str = "DomainMeta";
pub const TAG_NAME_ENV: &str = "DNS_TAG_NAME";
pub const RECORD_WEIGHT_ENV: &str = "RECORD_WEIGHT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerConfig {
    /// Scaling group tag holding the record specification.
    pub tag_name: String,
    /// Weight applied to every instance record.
    pub record_weight: u8,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            tag_name: DEFAULT_TAG_NAME.to_string(),
            record_weight: DEFAULT_RECORD_WEIGHT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("RECORD_WEIGHT must be an integer between 0 and 255, got '{0}'")]
    InvalidRecordWeight(String),
}

impl HandlerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let tag_name = lookup(TAG_NAME_ENV)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_TAG_NAME.to_string());

        let record_weight = match lookup(RECORD_WEIGHT_ENV) {
            Some(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse::<u8>()
                .map_err(|_| ConfigError::InvalidRecordWeight(raw.clone()))?,
            _ => DEFAULT_RECORD_WEIGHT,
        };

        Ok(Self {
            tag_name,
            record_weight,
        })
    }
}
