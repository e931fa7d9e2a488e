//! Thread-safe proxy pool
//!
//! This module provides the shared pool of proxy endpoints:
//! - Round-robin acquisition under a single pool-wide lock
//! - Health scoring from signed outcome marks, with eviction
//! - A circuit breaker against target-side outages
//! - Non-blocking maintenance signaling (snapshots, replenishment)

pub mod persistence;

pub use persistence::PersistenceGate;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::PoolSettings;
use crate::error::{Result, ScourError};
use crate::models::ProxyRecord;

/// Maintenance work requested by the pool
///
/// Decided inside the pool's critical section, dispatched strictly after
/// the lock is released so no worker ever blocks on disk or network I/O
/// while holding the pool lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolEvent {
    /// Snapshot the pool to durable storage
    SaveRequested,
    /// Scrape proxy-listing sites to refill the pool
    ReplenishRequested,
}

/// Tuning knobs for pool health management
#[derive(Debug, Clone)]
pub struct PoolTuning {
    /// Acquisitions between background snapshots
    pub save_every: u64,
    /// Health score above which a record is evicted
    pub failure_threshold: u32,
    /// Pool size at or below which eviction is suppressed
    pub critical_floor: usize,
    /// Pool size below which replenishment is requested
    pub low_water: usize,
    /// Consecutive bad reports before proxy penalties are suppressed
    pub bad_report_ceiling: u32,
}

impl Default for PoolTuning {
    fn default() -> Self {
        Self {
            save_every: 10,
            failure_threshold: 5,
            critical_floor: 5,
            low_water: 10,
            bad_report_ceiling: 20,
        }
    }
}

impl From<&PoolSettings> for PoolTuning {
    fn from(settings: &PoolSettings) -> Self {
        Self {
            save_every: settings.save_every,
            failure_threshold: settings.failure_threshold,
            critical_floor: settings.critical_floor,
            low_water: settings.low_water,
            bad_report_ceiling: settings.bad_report_ceiling,
        }
    }
}

struct PoolInner {
    records: Vec<ProxyRecord>,
    cursor: usize,
    acquisitions: u64,
    consecutive_bad: u32,
}

/// Shared pool of proxy endpoints
///
/// All mutable state lives behind one mutex, so concurrent `acquire` and
/// `report` calls interleave as some sequential order: the cursor is never
/// torn and no update is lost.
pub struct ProxyPool {
    inner: Mutex<PoolInner>,
    tuning: PoolTuning,
    events: mpsc::UnboundedSender<PoolEvent>,
}

impl ProxyPool {
    pub fn new(tuning: PoolTuning, events: mpsc::UnboundedSender<PoolEvent>) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                records: Vec::new(),
                cursor: 0,
                acquisitions: 0,
                consecutive_bad: 0,
            }),
            tuning,
            events,
        }
    }

    /// Parse candidate lines and merge them into the pool
    ///
    /// Candidates may carry a persisted `+`/`-` mark suffix. Lines that do
    /// not contain an `ip:port` shape are silently dropped, and duplicates
    /// of an endpoint already present keep the first occurrence's ledger.
    /// Returns the number of records actually added.
    pub fn load<I, S>(&self, candidates: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut inner = self.inner.lock();
        let mut added = 0;
        for candidate in candidates {
            let Some(record) = ProxyRecord::parse(candidate.as_ref()) else {
                continue;
            };
            if inner.records.iter().any(|r| r.endpoint == record.endpoint) {
                continue;
            }
            inner.records.push(record);
            added += 1;
        }
        added
    }

    /// Hand out the next endpoint in round-robin order
    ///
    /// Every `save_every`-th acquisition requests a background snapshot;
    /// the request is dispatched after the lock is released so the caller
    /// never waits on storage.
    pub fn acquire(&self) -> Result<String> {
        let endpoint;
        let save_due;
        {
            let mut inner = self.inner.lock();
            if inner.records.is_empty() {
                return Err(ScourError::OutOfProxies);
            }
            if inner.cursor >= inner.records.len() {
                inner.cursor = 0;
            }
            let cursor = inner.cursor;
            endpoint = inner.records[cursor].endpoint.clone();
            inner.cursor += 1;
            inner.acquisitions += 1;
            save_due = inner.acquisitions % self.tuning.save_every.max(1) == 0;
        }
        if save_due {
            self.signal(PoolEvent::SaveRequested);
        }
        Ok(endpoint)
    }

    /// Feed one fetch outcome back into the pool
    ///
    /// A positive mark resets the consecutive-bad counter; a negative mark
    /// increments it, and once the counter reaches the configured ceiling
    /// further penalties are suppressed until a success comes through — a
    /// long unbroken run of failures across arbitrary endpoints means the
    /// target is unreachable, not that every proxy is bad.
    pub fn report(&self, endpoint: &str, mark: i8) {
        if endpoint.is_empty() || mark == 0 {
            return;
        }
        let mut signals: Vec<PoolEvent> = Vec::new();
        {
            let mut inner = self.inner.lock();
            if mark > 0 {
                inner.consecutive_bad = 0;
            } else {
                if inner.consecutive_bad >= self.tuning.bad_report_ceiling {
                    inner.consecutive_bad = inner.consecutive_bad.saturating_add(1);
                    debug!(endpoint, "penalty suppressed, target looks unreachable");
                    return;
                }
                inner.consecutive_bad += 1;
            }

            // The record may have been evicted by a concurrent reporter.
            let Some(idx) = inner.records.iter().position(|r| r.endpoint == endpoint) else {
                return;
            };
            inner.records[idx].ledger.record(mark);

            let score = inner.records[idx].ledger.score();
            let size = inner.records.len();
            if score > self.tuning.failure_threshold as i32 && size > self.tuning.critical_floor {
                let record = inner.records.remove(idx);
                if idx < inner.cursor {
                    inner.cursor -= 1;
                }
                debug!(endpoint = %record.endpoint, score, "evicted failing proxy");
                signals.push(PoolEvent::SaveRequested);
                if inner.records.len() < self.tuning.low_water {
                    signals.push(PoolEvent::ReplenishRequested);
                }
            } else {
                let bound = 2 * self.tuning.failure_threshold as usize;
                if inner.records[idx].ledger.len() > bound {
                    inner.records[idx].ledger.compact(mark);
                }
                if size < self.tuning.low_water {
                    signals.push(PoolEvent::ReplenishRequested);
                }
            }
        }
        for event in signals {
            self.signal(event);
        }
    }

    /// Number of records currently in the pool
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().records.is_empty()
    }

    /// Storage lines for every record, ledgers included
    pub fn snapshot_lines(&self) -> Vec<String> {
        self.inner
            .lock()
            .records
            .iter()
            .map(ProxyRecord::storage_line)
            .collect()
    }

    /// Request a background snapshot outside any critical section
    pub fn request_save(&self) {
        self.signal(PoolEvent::SaveRequested);
    }

    fn signal(&self, event: PoolEvent) {
        // The receiver may be gone during shutdown or in tests; maintenance
        // is best-effort either way.
        let _ = self.events.send(event);
    }
}
