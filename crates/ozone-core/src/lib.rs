pub mod config;
pub mod error;

pub use config::{
    Config, LocationConfig, PreferencesConfig, ProviderConfig, RefreshConfig, Theme,
    ValidationResult,
};
pub use error::{AppError, ConfigError, SensorError};

use anyhow::Result;

/// Initialize logging for the application.
///
/// Honours `RUST_LOG`, defaulting to `info`. Safe to call more than once.
pub fn init() -> Result<()> {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Ozone core initialized");
    }
    Ok(())
}
