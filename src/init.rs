use crate::config::{ConfigError, EcsConfig};
use crate::layer::EcsLayer;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info";

/// Error returned when installing the global subscriber.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("invalid ECS logging configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to install global subscriber: {0}")]
    SetGlobalDefault(#[from] SetGlobalDefaultError),
}

/// Install a global subscriber writing ECS JSON lines to stdout.
///
/// **Parameters**
/// - `config`: [`EcsConfig`] with the static service fields and output
///   options.
///
/// **Effects**
///
/// Installs a [`Registry`] with an [`EnvFilter`] (from `RUST_LOG`, falling
/// back to [`DEFAULT_FILTER`]) and an [`EcsLayer`] as the global default.
///
/// **Returns**
/// - `Err(InitError::SetGlobalDefault)` if a global subscriber was already set.
pub fn try_init(config: EcsConfig) -> Result<(), InitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let subscriber = Registry::default().with(filter).with(EcsLayer::new(config));
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Install the global subscriber with configuration read from the
/// `ECS_LOGGING_*` environment variables.
///
/// This is the recommended entrypoint for typical services.
pub fn init_from_env() -> Result<(), InitError> {
    try_init(EcsConfig::from_env()?)
}
