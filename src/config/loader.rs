//! Configuration Loader
//!
//! Layers sources with the `config` crate, later sources winning:
//!
//! 1. built-in defaults
//! 2. `calendar-cache.{toml,yaml,json}` in the working directory, if present
//! 3. an explicit file, if given (must exist)
//! 4. `CALENDAR_CACHE__*` environment variables (`__` separates nesting,
//!    e.g. `CALENDAR_CACHE__REDIS__URL`)

use super::CacheSettings;
use crate::error::{CacheError, Result};
use config::{Config, Environment, File};
use std::path::Path;
use tracing::debug;

const DEFAULT_CONFIG_BASENAME: &str = "calendar-cache";
const ENV_PREFIX: &str = "CALENDAR_CACHE";

/// Load settings from the default file and the environment
pub fn load() -> Result<CacheSettings> {
    load_from(None)
}

/// Load settings, adding an explicit file on top of the default one
pub fn load_from(path: Option<&Path>) -> Result<CacheSettings> {
    load_from_sources(path, ENV_PREFIX)
}

/// Load settings with a custom environment prefix, so tests do not depend on
/// (or leak into) the process-wide `CALENDAR_CACHE__*` variables.
pub fn load_from_sources(path: Option<&Path>, env_prefix: &str) -> Result<CacheSettings> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false));

    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(env_prefix)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let settings: CacheSettings = builder
        .build()
        .and_then(|config| config.try_deserialize())
        .map_err(|e| CacheError::Configuration(format!("failed to load cache settings: {e}")))?;

    settings.validate()?;

    debug!(
        enabled = settings.enabled,
        backend = %settings.backend,
        ttl_seconds = settings.ttl_seconds,
        scan_batch_size = settings.scan_batch_size,
        "Cache settings loaded"
    );

    Ok(settings)
}
