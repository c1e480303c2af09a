pub mod settings;

pub use settings::{CacheBackendKind, Config};

use crate::error::TrendError;
use std::sync::Arc;

/// Loads the application configuration from the environment (and `.env` if present),
/// validates it, and returns it as an `Arc<Config>`.
pub fn load_config() -> Result<Arc<Config>, TrendError> {
    dotenv::dotenv().ok(); // Load .env file if present, ignore errors

    let config = Config::from_env();
    config.validate().map_err(TrendError::ConfigError)?;
    config.validate_and_log();

    Ok(Arc::new(config))
}
