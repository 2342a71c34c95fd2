//! Flush every calendar category from the configured store.
//!
//! Usage: `cache-flush [CONFIG_FILE]`
//!
//! Settings come from `calendar-cache.toml`, the optional file argument and
//! `CALENDAR_CACHE__*` environment variables. Exits non-zero when any category
//! could not be swept completely.

use anyhow::{bail, Context};
use calendar_cache::{config, logging, CacheManager, StoreClient, StoreProvider};
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_structured_logging();

    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let settings = config::load_from(path.as_deref()).context("loading cache settings")?;

    let store = StoreProvider::from_settings_graceful(&settings).await;
    if !store.is_enabled() {
        info!("Cache store is disabled or unreachable, nothing to flush");
        return Ok(());
    }
    let provider = store.provider_name();

    let cache = CacheManager::from_settings(store, &settings)?;
    let report = cache.invalidate_namespace().await;

    for category in &report.categories {
        let status = match &category.failure {
            None => "ok".to_string(),
            Some(e) => format!("failed: {e}"),
        };
        println!("{:<24} {:>6} deleted  {}", category.pattern, category.deleted, status);
    }
    println!(
        "{} entries removed from {} store",
        report.total_deleted(),
        provider
    );

    if !report.is_complete() {
        bail!(
            "{} of {} categories were not fully invalidated",
            report.failures().count(),
            report.categories.len()
        );
    }
    Ok(())
}
