//! Outbound HTTP transport
//!
//! The fetch engine only needs one capability from the network: issue a
//! GET, optionally through a forward proxy, under a hard deadline, and
//! surface network failures distinguishably from everything else.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// A completed HTTP exchange
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Transport failure, split by attribution
///
/// `Network` failures happened on the wire (connect refused/reset, timeout,
/// truncated body) and are attributable to the proxy in use; `Other` covers
/// everything else (client construction, malformed endpoint) and must never
/// be held against a proxy.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("transport error: {0}")]
    Other(String),
}

/// Outbound request capability consumed by the fetch engine
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a GET for `url`, optionally through `proxy` (`host:port`,
    /// pass-through credentials allowed as `user:pass@host:port`), with
    /// `timeout` bounding connect and full body read together.
    async fn get(
        &self,
        url: &str,
        proxy: Option<&str>,
        timeout: Duration,
    ) -> std::result::Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport
///
/// Builds a one-off client per request: proxied requests to unreliable
/// endpoints gain nothing from connection pooling, and a fresh client keeps
/// the proxy and deadline scoped to exactly one exchange.
pub struct HttpTransport;

impl HttpTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(
        &self,
        url: &str,
        proxy: Option<&str>,
        timeout: Duration,
    ) -> std::result::Result<TransportResponse, TransportError> {
        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(0);

        if let Some(endpoint) = proxy {
            let proxy_url = format!("http://{}", endpoint);
            let upstream = reqwest::Proxy::all(&proxy_url)
                .map_err(|e| TransportError::Other(format!("bad proxy {}: {}", endpoint, e)))?;
            builder = builder.proxy(upstream);
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Other(format!("client build failed: {}", e)))?;

        debug!(url, ?proxy, ?timeout, "issuing GET");
        let response = client.get(url).send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify)?;

        Ok(TransportResponse { status, body })
    }
}

/// Map a reqwest error onto the network/other split
///
/// Anything surfaced by the actual exchange — connect, timeout, body read —
/// is a network failure; only builder-stage errors are `Other`.
fn classify(e: reqwest::Error) -> TransportError {
    if e.is_builder() {
        TransportError::Other(e.to_string())
    } else {
        TransportError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        assert_eq!(
            TransportError::Network("connection refused".to_string()).to_string(),
            "network error: connection refused"
        );
        assert_eq!(
            TransportError::Other("bad endpoint".to_string()).to_string(),
            "transport error: bad endpoint"
        );
    }

    #[tokio::test]
    async fn test_bad_proxy_endpoint_is_not_a_network_error() {
        let transport = HttpTransport::new();
        let err = transport
            .get(
                "http://example.com",
                Some("not a proxy endpoint"),
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Other(_)));
    }
}
