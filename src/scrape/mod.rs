//! Proxy-list scraping and pool replenishment
//!
//! This module keeps the pool fed:
//! - Pattern extractors that pull `ip:port` candidates out of listing pages
//! - The replenishment coordinator that scrapes sites when the pool is low

pub mod extract;
pub mod replenish;

pub use extract::Scraper;
pub use replenish::{ReplenishConfig, Replenisher};
