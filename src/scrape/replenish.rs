//! Pool replenishment from proxy-listing sites
//!
//! Triggered when the pool drops below its low-water mark. At most one
//! pass runs at a time behind a non-blocking try-gate; triggers that
//! arrive while a pass is in flight are dropped, not queued.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::fetch::FetchEngine;
use crate::pool::ProxyPool;
use crate::scrape::Scraper;

/// Tuning for replenishment passes
#[derive(Debug, Clone)]
pub struct ReplenishConfig {
    /// Retry attempts per scrape site
    pub retries: u32,
    /// Base per-attempt timeout for scrape fetches
    pub base_timeout: Duration,
    /// Pool size below which a pass actually runs
    pub low_water: usize,
    /// Harvest size beyond which a pass stops early
    pub critical_floor: usize,
}

/// Coordinates scraping of proxy-listing sites into the pool
pub struct Replenisher {
    pool: Arc<ProxyPool>,
    engine: Arc<FetchEngine>,
    scraper: Scraper,
    sites: Vec<String>,
    /// Round-robin position over `sites`, shared across passes
    cursor: AtomicUsize,
    in_flight: Arc<AtomicBool>,
    config: ReplenishConfig,
}

impl Replenisher {
    pub fn new(
        pool: Arc<ProxyPool>,
        engine: Arc<FetchEngine>,
        sites: Vec<String>,
        config: ReplenishConfig,
    ) -> Self {
        Self {
            pool,
            engine,
            scraper: Scraper::new(),
            sites,
            cursor: AtomicUsize::new(0),
            in_flight: Arc::new(AtomicBool::new(false)),
            config,
        }
    }

    /// Kick off a background pass unless one is already in flight
    pub fn trigger(self: &Arc<Self>) {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("replenishment already in flight, dropping trigger");
            return;
        }
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_pass().await;
            this.in_flight.store(false, Ordering::Release);
        });
    }

    /// Run one pass inline, for startup seeding
    ///
    /// The caller decides whether an empty pool afterwards is fatal.
    pub async fn run_once(&self) {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        self.run_pass().await;
        self.in_flight.store(false, Ordering::Release);
    }

    /// One replenishment pass: scrape, accumulate, merge
    ///
    /// Visits sites round-robin from the shared cursor, fetching each
    /// directly (no proxy) with a small retry budget. Stops early once the
    /// harvest exceeds the critical floor, or after every site has been
    /// tried once.
    #[instrument(skip(self), fields(pool_size = self.pool.len()))]
    async fn run_pass(&self) {
        if self.sites.is_empty() {
            warn!("no scrape sites configured, cannot replenish");
            return;
        }
        // The pool may have recovered between the trigger and now.
        if self.pool.len() >= self.config.low_water {
            debug!("pool back above low water, skipping pass");
            return;
        }

        let mut harvest = std::collections::BTreeSet::new();
        for _ in 0..self.sites.len() {
            let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.sites.len();
            let site = self.sites[idx].as_str();

            match self
                .engine
                .fetch(site, None, self.config.retries, self.config.base_timeout)
                .await
            {
                Ok(body) => {
                    let found = self.scraper.extract(&body);
                    debug!(site, count = found.len(), "scraped candidates");
                    harvest.extend(found);
                }
                Err(e) => {
                    warn!(site, "scrape failed: {}", e);
                }
            }

            if harvest.len() > self.config.critical_floor {
                break;
            }
        }

        if harvest.is_empty() {
            warn!("replenishment pass yielded no candidates");
            return;
        }

        let added = self.pool.load(&harvest);
        info!(
            added,
            pool_size = self.pool.len(),
            "merged scraped proxies into pool"
        );
        self.pool.request_save();
    }
}
