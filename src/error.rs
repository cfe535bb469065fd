//! Error types for the host-utility layer.
//!
//! Recoverable failures (path resolution, shortcut resolution, I/O) are
//! reported through [`HostError`]. Allocator exhaustion is deliberately not
//! represented here: the arena terminates the process instead of returning.

use thiserror::Error;

/// Main error type for host-utility operations.
#[derive(Debug, Error)]
pub enum HostError {
    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A handle or process could not be mapped back to a filesystem path
    #[error("path resolution failed: {0}")]
    PathResolution(String),

    /// A shortcut file could not be loaded or resolved to its target
    #[error("shortcut resolution failed: {0}")]
    ShortcutResolution(String),

    /// The operation has no implementation on the current platform
    #[error("not supported on this platform: {0}")]
    Unsupported(&'static str),
}

/// Result type alias for host-utility operations
pub type Result<T> = std::result::Result<T, HostError>;
