use crate::error::{Result, ScourError};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Proxy pool configuration
    pub pool: PoolSettings,
    /// Fetch engine configuration
    pub fetch: FetchSettings,
    /// Replenishment scraping configuration
    pub scrape: ScrapeSettings,
    /// Logging configuration
    pub log: LogSettings,
}

#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Durable storage for the proxy list (default: proxy.txt)
    pub proxy_file: PathBuf,
    /// Acquisitions between background snapshots
    pub save_every: u64,
    /// Health score above which a record is evicted
    pub failure_threshold: u32,
    /// Pool size at or below which eviction is suppressed
    pub critical_floor: usize,
    /// Pool size below which replenishment is triggered
    pub low_water: usize,
    /// Consecutive bad reports before proxy penalties are suppressed
    pub bad_report_ceiling: u32,
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Maximum retry attempts per target URL
    pub max_retries: u32,
    /// Base per-attempt timeout in seconds
    pub base_timeout_secs: u64,
    /// Concurrent fetch workers
    pub parallelism: usize,
    /// Directory for fetched page bodies (default: out)
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    /// Retry attempts per scrape site
    pub retries: u32,
}

#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Log level (debug, info, warn, error)
    pub level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            pool: PoolSettings {
                proxy_file: PathBuf::from(get_env_or("SCOUR_PROXY_FILE", "proxy.txt")),
                save_every: parse_env("SCOUR_SAVE_EVERY", "10")?,
                failure_threshold: parse_env("SCOUR_FAILURE_THRESHOLD", "5")?,
                critical_floor: parse_env("SCOUR_CRITICAL_FLOOR", "5")?,
                low_water: parse_env("SCOUR_LOW_WATER", "10")?,
                bad_report_ceiling: parse_env("SCOUR_BAD_REPORT_CEILING", "20")?,
            },
            fetch: FetchSettings {
                max_retries: parse_env("SCOUR_MAX_RETRIES", "25")?,
                base_timeout_secs: parse_env("SCOUR_BASE_TIMEOUT_SECS", "10")?,
                parallelism: parse_env("SCOUR_PARALLELISM", "50")?,
                output_dir: PathBuf::from(get_env_or("SCOUR_OUTPUT_DIR", "out")),
            },
            scrape: ScrapeSettings {
                retries: parse_env("SCOUR_SCRAPE_RETRIES", "3")?,
            },
            log: LogSettings {
                level: get_env_or("LOG_LEVEL", "info"),
            },
        })
    }
}

impl FetchSettings {
    /// Base per-attempt timeout as a [`Duration`]
    pub fn base_timeout(&self) -> Duration {
        Duration::from_secs(self.base_timeout_secs)
    }
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a numeric environment variable, falling back to `default` when unset
fn parse_env<T: std::str::FromStr>(key: &str, default: &str) -> Result<T> {
    get_env_or(key, default)
        .parse()
        .map_err(|_| ScourError::InvalidConfig(format!("{} must be a valid number", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const CONFIG_ENV_KEYS: &[&str] = &[
        "SCOUR_PROXY_FILE",
        "SCOUR_SAVE_EVERY",
        "SCOUR_FAILURE_THRESHOLD",
        "SCOUR_CRITICAL_FLOOR",
        "SCOUR_LOW_WATER",
        "SCOUR_BAD_REPORT_CEILING",
        "SCOUR_MAX_RETRIES",
        "SCOUR_BASE_TIMEOUT_SECS",
        "SCOUR_PARALLELISM",
        "SCOUR_OUTPUT_DIR",
        "SCOUR_SCRAPE_RETRIES",
        "LOG_LEVEL",
    ];

    struct EnvGuard {
        saved: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(keys: &[&str]) -> Self {
            let saved = keys
                .iter()
                .map(|&key| {
                    let old = env::var(key).ok();
                    env::remove_var(key);
                    (key.to_string(), old)
                })
                .collect();

            Self { saved }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.saved.drain(..) {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
    }

    #[test]
    fn test_config_from_env_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        let config = Config::from_env().unwrap();

        assert_eq!(config.pool.proxy_file, PathBuf::from("proxy.txt"));
        assert_eq!(config.pool.save_every, 10);
        assert_eq!(config.pool.failure_threshold, 5);
        assert_eq!(config.pool.critical_floor, 5);
        assert_eq!(config.pool.low_water, 10);
        assert_eq!(config.pool.bad_report_ceiling, 20);

        assert_eq!(config.fetch.max_retries, 25);
        assert_eq!(config.fetch.base_timeout(), Duration::from_secs(10));
        assert_eq!(config.fetch.parallelism, 50);
        assert_eq!(config.fetch.output_dir, PathBuf::from("out"));

        assert_eq!(config.scrape.retries, 3);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_config_from_env_overrides() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("SCOUR_PROXY_FILE", "/var/lib/scour/pool.txt");
        env::set_var("SCOUR_MAX_RETRIES", "5");
        env::set_var("SCOUR_BASE_TIMEOUT_SECS", "3");
        env::set_var("SCOUR_LOW_WATER", "25");

        let config = Config::from_env().unwrap();

        assert_eq!(
            config.pool.proxy_file,
            PathBuf::from("/var/lib/scour/pool.txt")
        );
        assert_eq!(config.fetch.max_retries, 5);
        assert_eq!(config.fetch.base_timeout(), Duration::from_secs(3));
        assert_eq!(config.pool.low_water, 25);
    }

    #[test]
    fn test_config_from_env_invalid_number() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("SCOUR_MAX_RETRIES", "not-a-number");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ScourError::InvalidConfig(_)));
    }
}
