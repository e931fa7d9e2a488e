//! Pool maintenance dispatcher
//!
//! The pool's critical sections only *decide* that background work is
//! needed and enqueue a signal; this service drains those signals and
//! performs the dispatch strictly outside any pool lock, so a worker
//! holding the lock can never end up waiting on disk or network I/O.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument};

use crate::pool::{PersistenceGate, PoolEvent, ProxyPool};
use crate::scrape::Replenisher;

/// Drains [`PoolEvent`]s into the persistence gate and the replenisher
pub struct MaintenanceService {
    pool: Arc<ProxyPool>,
    saver: Arc<PersistenceGate>,
    replenisher: Arc<Replenisher>,
}

impl MaintenanceService {
    pub fn new(
        pool: Arc<ProxyPool>,
        saver: Arc<PersistenceGate>,
        replenisher: Arc<Replenisher>,
    ) -> Self {
        Self {
            pool,
            saver,
            replenisher,
        }
    }

    /// Run the dispatcher (call in a spawned task)
    #[instrument(skip_all)]
    pub async fn run(
        &self,
        mut events: mpsc::UnboundedReceiver<PoolEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        debug!("maintenance dispatcher started");
        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(PoolEvent::SaveRequested) => self.saver.spawn_save(&self.pool),
                        Some(PoolEvent::ReplenishRequested) => self.replenisher.trigger(),
                        None => break,
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("maintenance dispatcher shutting down");
                        break;
                    }
                }
            }
        }
    }
}

/// Guard for managing the dispatcher lifecycle
pub struct MaintenanceHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl MaintenanceHandle {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { shutdown_tx: tx }, rx)
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchEngine, HttpTransport};
    use crate::pool::PoolTuning;
    use crate::scrape::ReplenishConfig;
    use std::time::Duration;

    #[tokio::test]
    async fn test_save_event_reaches_storage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxy.txt");

        let (tx, rx) = mpsc::unbounded_channel();
        let pool = Arc::new(ProxyPool::new(PoolTuning::default(), tx));
        pool.load(["1.2.3.4:80"]);

        let saver = Arc::new(PersistenceGate::new(&path));
        let engine = Arc::new(FetchEngine::new(Arc::new(HttpTransport::new())));
        let replenisher = Arc::new(Replenisher::new(
            pool.clone(),
            engine,
            Vec::new(),
            ReplenishConfig {
                retries: 1,
                base_timeout: Duration::from_secs(1),
                low_water: 0,
                critical_floor: 5,
            },
        ));

        let service = MaintenanceService::new(pool.clone(), saver, replenisher);
        let (handle, shutdown) = MaintenanceHandle::new();
        let task = tokio::spawn(async move { service.run(rx, shutdown).await });

        pool.request_save();
        for _ in 0..100 {
            if path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(path.exists());

        handle.shutdown();
        task.await.unwrap();
    }
}
