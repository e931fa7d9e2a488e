//! Debounced, non-blocking persistence of the proxy pool
//!
//! Snapshots carry the live ledger marks so health state survives a
//! restart. Writes run as detached background work behind a try-gate:
//! while one save is in flight, further triggers are dropped rather than
//! queued, and no fetch worker ever blocks on storage I/O.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, warn};

use crate::error::Result;
use crate::pool::ProxyPool;

/// Non-blocking gate in front of durable pool snapshots
pub struct PersistenceGate {
    path: PathBuf,
    in_flight: Arc<AtomicBool>,
}

impl PersistenceGate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Snapshot the pool on a detached task
    ///
    /// The snapshot itself is a brief lock acquisition on the caller; only
    /// the file write runs in the background. A trigger that arrives while
    /// a save is in flight is dropped.
    pub fn spawn_save(&self, pool: &Arc<ProxyPool>) {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("snapshot already in flight, dropping trigger");
            return;
        }
        let lines = pool.snapshot_lines();
        let path = self.path.clone();
        let in_flight = Arc::clone(&self.in_flight);
        tokio::spawn(async move {
            if let Err(e) = write_lines(&path, &lines).await {
                warn!(path = %path.display(), "failed to snapshot proxy pool: {}", e);
            }
            in_flight.store(false, Ordering::Release);
        });
    }

    /// Write a snapshot and wait for it, bypassing the gate
    ///
    /// Used for the final flush at the end of a run.
    pub async fn save_now(&self, pool: &ProxyPool) -> Result<()> {
        write_lines(&self.path, &pool.snapshot_lines()).await
    }
}

async fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    let mut contents = lines.join("\n");
    if !contents.is_empty() {
        contents.push('\n');
    }
    fs::write(path, contents).await?;
    Ok(())
}

/// Read the persisted proxy list, one entry per line
///
/// A missing file is not an error: the pool starts empty and the initial
/// replenishment pass is responsible for seeding it.
pub async fn load_lines(path: &Path) -> Result<Vec<String>> {
    match fs::read_to_string(path).await {
        Ok(contents) => Ok(contents.lines().map(str::to_string).collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no proxy file yet, starting empty");
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}
