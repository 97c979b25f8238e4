//! Error types for the Solstice web host.

use thiserror::Error;

/// Result type alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Main error type for the web host.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// I/O errors (bind, listen)
    #[error("I/O error: {0}")]
    IoError(String),

    /// Plugin engine errors surfaced during startup
    #[error("Plugin host error: {0}")]
    Host(#[from] solstice_host::HostError),
}
