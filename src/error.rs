use thiserror::Error;

/// Unified error type for the Scour application
#[derive(Error, Debug)]
pub enum ScourError {
    // Pool errors
    #[error("No proxies available")]
    OutOfProxies,

    // Fetch errors
    #[error("Fetch of {url} failed after {attempts} attempts")]
    FetchFailed { url: String, attempts: u32 },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Scour operations
pub type Result<T> = std::result::Result<T, ScourError>;

impl ScourError {
    /// Check if this error aborts the whole run
    ///
    /// Only an empty pool at startup is fatal; everything else fails the
    /// current unit of work and the run continues.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(self, ScourError::OutOfProxies)
    }
}
