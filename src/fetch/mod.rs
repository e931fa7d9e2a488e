//! Fetch engine and its transport seam
//!
//! This module performs the actual page retrieval:
//! - A [`Transport`] capability abstracting the outbound HTTP GET
//! - The retry loop with adaptive timeouts and outcome classification

pub mod engine;
pub mod transport;

pub use engine::{adaptive_timeout, AttemptOutcome, FetchEngine};
pub use transport::{HttpTransport, Transport, TransportError, TransportResponse};
