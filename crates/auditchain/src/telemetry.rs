//! Tracing setup for the binary.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;
use crate::error::{Result, ServiceError};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "auditchain=info,tower_http=info";

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(config.json.then(|| fmt::layer().json()))
        .with((!config.json).then(fmt::layer))
        .try_init()
        .map_err(|e| ServiceError::Config(format!("failed to install tracing subscriber: {e}")))
}
