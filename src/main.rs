use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use curriplan::backend::{BackendConfig, CatalogBackend, HttpCatalogBackend, MemoryBackend};
use curriplan::engine::CompletionEngine;
use curriplan::store::CurriculumStore;
use curriplan::watch::ChangeWatcher;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "curriplan=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let backend: Arc<dyn CatalogBackend> = match BackendConfig::new_from_env() {
        Ok(config) => Arc::new(HttpCatalogBackend::new(config)?),
        Err(e) => {
            warn!("no backend configured ({}), running offline", e);
            Arc::new(MemoryBackend::new())
        }
    };

    let cache_url = std::env::var("CACHE_DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://curriplan-cache.db?mode=rwc".to_string());
    let cache = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&cache_url)
        .await?;

    let store = CurriculumStore::new(backend.clone(), cache).await?;

    let stats = store.fetch_all().await?;
    info!(
        "catalog loaded: {} courses, {} prerequisites{}",
        stats.courses,
        stats.prerequisites,
        if stats.from_cache { " (from cache)" } else { "" }
    );
    {
        let data = store.data();
        let engine = CompletionEngine::new(&data);
        info!(
            "completion: {:.1}% of credit-hours",
            engine.completed_credit_percentage()
        );
    }

    let interval = std::env::var("WATCH_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);
    let watcher = ChangeWatcher::new(backend, store.feed(), None, interval);
    tokio::spawn(watcher.start());

    let mut subscription = store.subscribe();
    loop {
        match store.refresh_on_change(&mut subscription).await {
            Ok(Some(stats)) => info!(
                "refreshed: {} courses, {} prerequisites",
                stats.courses, stats.prerequisites
            ),
            Ok(None) => break,
            Err(e) => warn!("re-fetch failed: {}", e),
        }
    }

    Ok(())
}
