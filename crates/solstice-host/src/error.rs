//! Error types for the plugin host.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for host operations.
pub type HostResult<T> = Result<T, HostError>;

/// Error types for the plugin lifecycle engine.
///
/// Per-artifact errors are logged with the artifact's file name and never
/// stop the host; only [`HostError::ResourceUnavailable`] and watcher
/// construction failures propagate out of `start`.
#[derive(Debug, Error)]
pub enum HostError {
    /// File or directory not readable.
    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The plugin directory could not be created.
    #[error("plugin directory {} is unavailable: {source}", path.display())]
    ResourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File watcher failure.
    #[error("file watcher failure: {source}")]
    Watch {
        #[from]
        source: notify::Error,
    },

    /// The artifact stayed locked by another process for the whole retry
    /// budget.
    #[error("{} is still held by another process after {attempts} attempts", path.display())]
    FileBusy { path: PathBuf, attempts: u32 },

    /// The file exists but the loader rejected it.
    #[error("failed to load module {}: {reason}", path.display())]
    CorruptModule { path: PathBuf, reason: String },

    /// Symbol resolution failed; `reasons` carries the deduplicated
    /// loader messages.
    #[error("symbol resolution failed in {}: {}", path.display(), reasons.join("; "))]
    SymbolResolution {
        path: PathBuf,
        reasons: Vec<String>,
    },

    /// The module loaded but exposes no plugin entry point.
    #[error("{} does not expose a compatible plugin entry point", path.display())]
    NoCompatibleType { path: PathBuf },

    /// The module was built against a different contracts revision.
    #[error("{} was built against contracts ABI v{found}, host speaks v{expected}", path.display())]
    AbiMismatch {
        path: PathBuf,
        expected: u32,
        found: u32,
    },

    /// The plugin's constructor, `start` or `register` failed.
    #[error("plugin '{plugin}' failed during {stage}: {reason}")]
    Construction {
        plugin: String,
        stage: &'static str,
        reason: String,
    },

    /// Operation on a host after `dispose`.
    #[error("plugin host has been disposed")]
    AlreadyDisposed,
}

impl HostError {
    /// Io error keyed by the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
