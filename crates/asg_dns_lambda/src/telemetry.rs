//! Tracing setup for the Lambda binary.
//!
//! Emits one JSON object per event on stderr so CloudWatch can index the
//! structured fields. The filter comes from `RUST_LOG`, defaulting to `info`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "info";

pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_target(false)
                .with_current_span(false)
                .with_writer(std::io::stderr),
        )
        .try_init()?;

    Ok(())
}
