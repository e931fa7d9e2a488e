//! Retrying fetch engine
//!
//! Performs one logical fetch of a URL through the proxy pool, with an
//! adaptive per-attempt timeout, outcome classification, and health marks
//! reported back to the pool.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{Result, ScourError};
use crate::fetch::transport::{Transport, TransportError, TransportResponse};
use crate::pool::ProxyPool;

/// Classified result of a single fetch attempt
///
/// Only the first two variants are attributable to the proxy used; an
/// unclassified failure is never reported against it.
#[derive(Debug)]
pub enum AttemptOutcome {
    Success { body: String, elapsed: Duration },
    TransientError { elapsed: Duration },
    Unclassified,
}

/// Adaptive-timeout retry loop over a [`Transport`]
pub struct FetchEngine {
    transport: Arc<dyn Transport>,
}

impl FetchEngine {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Fetch `url`, retrying up to `max_attempts` times
    ///
    /// When a pool is supplied, each attempt acquires the next proxy in
    /// rotation and reports the outcome back; an exhausted pool consumes
    /// the attempt. Returns the body of the first successful attempt, or
    /// [`ScourError::FetchFailed`] once the budget is spent.
    pub async fn fetch(
        &self,
        url: &str,
        pool: Option<&Arc<ProxyPool>>,
        max_attempts: u32,
        base_timeout: Duration,
    ) -> Result<String> {
        for attempt in 0..max_attempts {
            let timeout = adaptive_timeout(base_timeout, max_attempts, attempt);

            let proxy = match pool {
                Some(pool) => match pool.acquire() {
                    Ok(endpoint) => Some(endpoint),
                    Err(e) => {
                        debug!(url, attempt, "no proxy for attempt: {}", e);
                        continue;
                    }
                },
                None => None,
            };

            let started = Instant::now();
            let result = self
                .transport
                .get(url, proxy.as_deref(), timeout)
                .await;
            let elapsed = started.elapsed();

            match classify(url, result, elapsed) {
                AttemptOutcome::Success { body, elapsed } => {
                    if let (Some(pool), Some(endpoint)) = (pool, &proxy) {
                        pool.report(endpoint, success_mark(elapsed, base_timeout));
                    }
                    debug!(url, attempt, ?elapsed, "fetched");
                    return Ok(body);
                }
                AttemptOutcome::TransientError { elapsed } => {
                    if let (Some(pool), Some(endpoint)) = (pool, &proxy) {
                        pool.report(endpoint, failure_mark(elapsed, base_timeout));
                    }
                }
                AttemptOutcome::Unclassified => {}
            }
        }

        Err(ScourError::FetchFailed {
            url: url.to_string(),
            attempts: max_attempts,
        })
    }
}

/// Per-attempt timeout, decaying roughly every two attempts
///
/// `base × (max − attempt/2) / max`, integer division, floor near base/2:
/// early retries tolerate slow-but-working proxies, later retries shed slow
/// proxies faster to conserve the attempt budget.
pub fn adaptive_timeout(base: Duration, max_attempts: u32, attempt: u32) -> Duration {
    let max = u64::from(max_attempts.max(1));
    let step = u64::from(attempt / 2);
    Duration::from_millis(base.as_millis() as u64 * (max - step.min(max)) / max)
}

fn classify(
    url: &str,
    result: std::result::Result<TransportResponse, TransportError>,
    elapsed: Duration,
) -> AttemptOutcome {
    match result {
        Ok(response) if response.status == 200 => AttemptOutcome::Success {
            body: response.body,
            elapsed,
        },
        Ok(response) => {
            debug!(url, status = response.status, "non-200 response");
            AttemptOutcome::TransientError { elapsed }
        }
        Err(TransportError::Network(e)) => {
            debug!(url, "network failure: {}", e);
            AttemptOutcome::TransientError { elapsed }
        }
        Err(TransportError::Other(e)) => {
            // Ambiguous attribution: do not punish the proxy for this.
            warn!(url, "unclassified fetch failure: {}", e);
            AttemptOutcome::Unclassified
        }
    }
}

/// Success grade: +2 for fast, +1 for slow but working
fn success_mark(elapsed: Duration, base: Duration) -> i8 {
    if elapsed < base {
        2
    } else {
        1
    }
}

/// Failure grade: −2 for hanging far past budget, −1 otherwise
fn failure_mark(elapsed: Duration, base: Duration) -> i8 {
    if elapsed > base * 4 {
        -2
    } else {
        -1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{PoolTuning, ProxyPool};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::sync::mpsc;

    /// Scripted transport: pops one canned result per call
    struct MockTransport {
        script: Mutex<VecDeque<std::result::Result<TransportResponse, TransportError>>>,
        calls: Mutex<Vec<Option<String>>>,
    }

    impl MockTransport {
        fn new(
            script: Vec<std::result::Result<TransportResponse, TransportError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn get(
            &self,
            _url: &str,
            proxy: Option<&str>,
            _timeout: Duration,
        ) -> std::result::Result<TransportResponse, TransportError> {
            self.calls.lock().push(proxy.map(str::to_string));
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Network("script exhausted".into())))
        }
    }

    fn pool_with(endpoints: &[&str]) -> Arc<ProxyPool> {
        let (tx, _rx) = mpsc::unbounded_channel();
        let pool = ProxyPool::new(
            PoolTuning {
                low_water: 0,
                ..Default::default()
            },
            tx,
        );
        pool.load(endpoints.iter().copied());
        Arc::new(pool)
    }

    fn ok(status: u16, body: &str) -> std::result::Result<TransportResponse, TransportError> {
        Ok(TransportResponse {
            status,
            body: body.to_string(),
        })
    }

    #[test]
    fn test_adaptive_timeout_decay() {
        let base = Duration::from_secs(10);
        assert_eq!(adaptive_timeout(base, 10, 0), Duration::from_secs(10));
        assert_eq!(adaptive_timeout(base, 10, 1), Duration::from_secs(10));
        assert_eq!(adaptive_timeout(base, 10, 2), Duration::from_secs(9));
        assert_eq!(adaptive_timeout(base, 10, 9), Duration::from_secs(6));
    }

    #[test]
    fn test_mark_grading() {
        let base = Duration::from_secs(10);
        assert_eq!(success_mark(Duration::from_secs(3), base), 2);
        assert_eq!(success_mark(Duration::from_secs(12), base), 1);
        assert_eq!(failure_mark(Duration::from_secs(12), base), -1);
        assert_eq!(failure_mark(Duration::from_secs(41), base), -2);
    }

    #[tokio::test]
    async fn test_fetch_success_returns_body_and_rewards_proxy() {
        let transport = MockTransport::new(vec![ok(200, "hello")]);
        let engine = FetchEngine::new(transport.clone());
        let pool = pool_with(&["1.2.3.4:8080"]);

        let body = engine
            .fetch("http://example.com", Some(&pool), 3, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(body, "hello");

        // One attempt, fast success: +2.
        assert_eq!(pool.snapshot_lines(), vec!["1.2.3.4:8080++"]);
        assert_eq!(
            transport.calls.lock().as_slice(),
            &[Some("1.2.3.4:8080".to_string())]
        );
    }

    #[tokio::test]
    async fn test_fetch_exhausts_attempts_against_failing_proxy() {
        let transport = MockTransport::new(vec![
            Err(TransportError::Network("refused".into())),
            Err(TransportError::Network("refused".into())),
            Err(TransportError::Network("refused".into())),
        ]);
        let engine = FetchEngine::new(transport.clone());
        let pool = pool_with(&["1.2.3.4:8080"]);

        let err = engine
            .fetch("http://example.com", Some(&pool), 3, Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScourError::FetchFailed { attempts: 3, .. }
        ));

        // Exactly three attempts, each one a negative mark on the endpoint.
        assert_eq!(transport.calls.lock().len(), 3);
        assert_eq!(pool.snapshot_lines(), vec!["1.2.3.4:8080---"]);
    }

    #[tokio::test]
    async fn test_non_200_counts_as_transient_failure() {
        let transport = MockTransport::new(vec![ok(502, "bad gateway"), ok(200, "fine")]);
        let engine = FetchEngine::new(transport);
        let pool = pool_with(&["1.2.3.4:8080"]);

        let body = engine
            .fetch("http://example.com", Some(&pool), 3, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(body, "fine");
        assert_eq!(pool.snapshot_lines(), vec!["1.2.3.4:8080-++"]);
    }

    #[tokio::test]
    async fn test_unclassified_failure_is_not_held_against_proxy() {
        let transport = MockTransport::new(vec![
            Err(TransportError::Other("builder broke".into())),
            ok(200, "fine"),
        ]);
        let engine = FetchEngine::new(transport);
        let pool = pool_with(&["1.2.3.4:8080"]);

        engine
            .fetch("http://example.com", Some(&pool), 3, Duration::from_secs(10))
            .await
            .unwrap();

        // Only the success left a mark.
        assert_eq!(pool.snapshot_lines(), vec!["1.2.3.4:8080++"]);
    }

    #[tokio::test]
    async fn test_fetch_without_pool_goes_direct() {
        let transport = MockTransport::new(vec![ok(200, "direct")]);
        let engine = FetchEngine::new(transport.clone());

        let body = engine
            .fetch("http://example.com", None, 2, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(body, "direct");
        assert_eq!(transport.calls.lock().as_slice(), &[None]);
    }

    #[tokio::test]
    async fn test_empty_pool_consumes_attempts() {
        let transport = MockTransport::new(vec![]);
        let engine = FetchEngine::new(transport.clone());
        let pool = pool_with(&[]);

        let err = engine
            .fetch("http://example.com", Some(&pool), 2, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ScourError::FetchFailed { attempts: 2, .. }));
        assert!(transport.calls.lock().is_empty());
    }
}
