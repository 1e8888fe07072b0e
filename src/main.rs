//! File Cache Handle demo
//!
//! Opens a file-backed handle from environment configuration, writes a few
//! items with each expiration mode, reads them back and prints the handle
//! statistics. Entries stay on disk under `<base_dir>/<instance_name>`.

use std::thread::sleep;
use std::time::Duration;

use anyhow::Context;
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use file_cache_handle::{CacheHandle, CacheItem, ExpirationMode, FileCacheHandle, HandleConfig};

fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "file_cache_handle=info,file_cache_demo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = HandleConfig::from_env().context("invalid cache configuration")?;
    info!(
        "Configuration loaded: name={}, base_dir={}, serializer={:?}, housekeeping={:?}",
        config.effective_name(),
        config.base_dir.display(),
        config.serializer,
        config.housekeeping_interval
    );

    let handle = FileCacheHandle::<serde_json::Value>::open(config)
        .context("failed to open cache handle")?;

    handle.put(CacheItem::new("greeting", json!("hello")))?;
    handle.put(
        CacheItem::new("session", json!({ "user": "demo", "roles": ["reader"] }))
            .with_expiration(ExpirationMode::Sliding, Duration::from_secs(2)),
    )?;
    handle.put(
        CacheItem::in_region("token", "auth", json!("short-lived"))
            .with_expiration(ExpirationMode::Absolute, Duration::from_secs(1)),
    )?;
    info!("Stored {} items", handle.count()?);

    sleep(Duration::from_millis(1500));

    for (key, region) in [("greeting", None), ("session", None), ("token", Some("auth"))] {
        match handle.get(key, region)? {
            Some(item) => info!("{} -> {}", key, item.value()),
            None => info!("{} -> (expired or missing)", key),
        }
    }

    println!("{}", serde_json::to_string_pretty(&handle.stats())?);
    Ok(())
}
