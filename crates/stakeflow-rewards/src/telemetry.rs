//! Tracing subscriber setup for hosts embedding the pools

use crate::config::LoggingConfig;
use stakeflow_core::error::{Result, StakeflowError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global subscriber. `RUST_LOG` wins over `config.level`.
///
/// Fails if a global subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| StakeflowError::InvalidConfig(format!("logging.level: {}", e)))?;

    let json = config.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
    });
    let plain = (!config.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json)
        .with(plain)
        .try_init()
        .map_err(|e| StakeflowError::InvalidConfig(format!("tracing already initialised: {}", e)))
}
