//! Scour - Entry Point
//!
//! Reads the scrape-site and target-URL lists, seeds the proxy pool from
//! durable storage, and fans out bounded-parallel fetch workers.

use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod fetch;
mod files;
mod models;
mod pool;
mod scrape;
mod services;

use config::Config;
use fetch::{FetchEngine, HttpTransport};
use pool::{persistence, PersistenceGate, PoolTuning, ProxyPool};
use scrape::{ReplenishConfig, Replenisher};
use services::{MaintenanceHandle, MaintenanceService};

#[tokio::main]
async fn main() -> error::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scour=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Scour");

    let mut args = std::env::args().skip(1);
    let (sites_path, urls_path) = match (args.next(), args.next()) {
        (Some(sites), Some(urls)) => (sites, urls),
        _ => {
            error!("Usage: scour PROXY_SITES.txt LINKS_TO_DOWNLOAD.txt");
            std::process::exit(2);
        }
    };

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded");

    let sites = files::read_url_list(Path::new(&sites_path)).await?;
    let urls = files::read_url_list(Path::new(&urls_path)).await?;
    info!(sites = sites.len(), urls = urls.len(), "Input lists read");

    tokio::fs::create_dir_all(&config.fetch.output_dir).await?;

    // Create the pool and seed it from durable storage
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let pool = Arc::new(ProxyPool::new(PoolTuning::from(&config.pool), events_tx));
    let seed = persistence::load_lines(&config.pool.proxy_file).await?;
    let seeded = pool.load(&seed);
    info!(seeded, "Proxy pool seeded from {}", config.pool.proxy_file.display());

    let transport = Arc::new(HttpTransport::new());
    let engine = Arc::new(FetchEngine::new(transport));
    let saver = Arc::new(PersistenceGate::new(&config.pool.proxy_file));
    let replenisher = Arc::new(Replenisher::new(
        pool.clone(),
        engine.clone(),
        sites,
        ReplenishConfig {
            retries: config.scrape.retries,
            base_timeout: config.fetch.base_timeout(),
            low_water: config.pool.low_water,
            critical_floor: config.pool.critical_floor,
        },
    ));

    // Initial replenishment; an empty pool past this point is fatal.
    if pool.len() < config.pool.low_water {
        replenisher.run_once().await;
    }
    if pool.is_empty() {
        error!("No proxies could be loaded or scraped, cannot proceed");
        return Err(error::ScourError::OutOfProxies);
    }
    info!(pool_size = pool.len(), "Proxy pool ready");

    // Start the maintenance dispatcher
    let (maintenance_handle, maintenance_shutdown) = MaintenanceHandle::new();
    let maintenance = MaintenanceService::new(pool.clone(), saver.clone(), replenisher.clone());
    let maintenance_task = tokio::spawn(async move {
        maintenance.run(events_rx, maintenance_shutdown).await;
    });

    // Fan out fetch workers with bounded parallelism
    let max_retries = config.fetch.max_retries;
    let base_timeout = config.fetch.base_timeout();
    let output_dir = config.fetch.output_dir.clone();

    let results: Vec<bool> = futures::stream::iter(urls)
        .map(|url| {
            let engine = engine.clone();
            let pool = pool.clone();
            let output_dir = output_dir.clone();
            async move {
                match engine
                    .fetch(&url, Some(&pool), max_retries, base_timeout)
                    .await
                {
                    Ok(body) if !body.trim().is_empty() => {
                        match files::write_artifact(&output_dir, &url, &body).await {
                            Ok(path) => {
                                info!(%url, path = %path.display(), "Saved");
                                true
                            }
                            Err(e) => {
                                warn!(%url, "Failed to save: {}", e);
                                false
                            }
                        }
                    }
                    Ok(_) => {
                        warn!(%url, "Content is empty, nothing to save");
                        false
                    }
                    Err(e) => {
                        warn!(%url, "{}", e);
                        false
                    }
                }
            }
        })
        .buffer_unordered(config.fetch.parallelism.max(1))
        .collect()
        .await;

    let saved = results.iter().filter(|&&ok| ok).count();
    info!(
        saved,
        failed = results.len() - saved,
        "All URLs processed"
    );

    // Final flush so the pool's health state survives into the next run
    if let Err(e) = saver.save_now(&pool).await {
        warn!("Final pool snapshot failed: {}", e);
    }

    maintenance_handle.shutdown();
    let _ = maintenance_task.await;

    info!("Scour complete");
    Ok(())
}
