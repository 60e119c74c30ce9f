//! Error types for finder.
//!
//! Two families of failure live here and never share a channel:
//!
//! 1. **Engine-level errors** reject a request (`Validation`, `InvalidPattern`,
//!    `Busy`) or fault a running scan (`RootNotFound`, `RootNotADirectory`,
//!    `RootInaccessible`, `WorkerPool`).
//! 2. **Per-file errors** (`FileNotFound`, `PermissionDenied`, `Encoding`,
//!    `Io`) never escape a worker. They are rendered into a
//!    [`FileError`](crate::results::FileError) and delivered as data.
//!
//! ```rust,ignore
//! match engine.start_scan(request) {
//!     Ok(handle) => { /* consume events, then handle.wait() */ }
//!     Err(FinderError::Busy) => { /* a scan is already running */ }
//!     Err(e) => { /* malformed request */ }
//! }
//! ```

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for finder operations
pub type FinderResult<T> = Result<T, FinderError>;

/// Errors that can occur while validating, enumerating or scanning
#[derive(Error, Debug)]
pub enum FinderError {
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Invalid name pattern: {0}")]
    InvalidPattern(String),
    #[error("A scan is already running")]
    Busy,
    #[error("Root directory not found: {0}")]
    RootNotFound(PathBuf),
    #[error("Root path is not a directory: {0}")]
    RootNotADirectory(PathBuf),
    #[error("Cannot read root directory {path}: {source}")]
    RootInaccessible {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Invalid UTF-8 in file {path}: {source}")]
    Encoding {
        path: PathBuf,
        source: std::string::FromUtf8Error,
    },
    #[error("Worker pool error: {0}")]
    WorkerPool(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Canonicalize the path and strip UNC prefixes so that
/// comparisons on Windows are consistent.
pub fn unify_path(original: &Path) -> PathBuf {
    let canonical = original
        .canonicalize()
        .unwrap_or_else(|_| original.to_path_buf());
    strip_unc_prefix(&canonical)
}

/// Strips the Windows UNC prefix (\\?\) from a path if present
fn strip_unc_prefix(p: &Path) -> PathBuf {
    let s = p.display().to_string();
    if let Some(stripped) = s.strip_prefix(r"\\?\") {
        PathBuf::from(stripped)
    } else {
        p.to_path_buf()
    }
}

impl FinderError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_pattern(pattern: impl Into<String>) -> Self {
        Self::InvalidPattern(pattern.into())
    }

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn worker_pool(msg: impl Into<String>) -> Self {
        Self::WorkerPool(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn encoding_error(path: impl Into<PathBuf>, source: std::string::FromUtf8Error) -> Self {
        Self::Encoding {
            path: path.into(),
            source,
        }
    }

    /// Maps an I/O failure on `path` to the most specific variant.
    pub fn from_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::file_not_found(path),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::Io(err),
        }
    }

    /// True for errors raised by request checks, before any scan work.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::InvalidPattern(_) | Self::Busy
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::Path;

    #[test]
    fn test_error_creation() {
        let path = Path::new("test.txt");
        let err = FinderError::file_not_found(path);
        assert!(matches!(err, FinderError::FileNotFound(_)));

        let err = FinderError::permission_denied(path);
        assert!(matches!(err, FinderError::PermissionDenied(_)));

        let err = FinderError::invalid_pattern("[");
        assert!(matches!(err, FinderError::InvalidPattern(_)));

        let err = FinderError::validation("needle must not be empty");
        assert!(matches!(err, FinderError::Validation(_)));
        assert!(err.is_rejection());
        assert!(FinderError::Busy.is_rejection());
        assert!(!FinderError::RootNotFound(PathBuf::from("x")).is_rejection());
    }

    #[test]
    fn test_from_io_classification() {
        let path = Path::new("gone.txt");
        let err = FinderError::from_io(path, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, FinderError::FileNotFound(p) if p == path));

        let err = FinderError::from_io(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, FinderError::PermissionDenied(_)));

        let err = FinderError::from_io(path, io::Error::other("disk on fire"));
        assert!(matches!(err, FinderError::Io(_)));
    }

    #[test]
    fn test_error_messages() {
        let err = FinderError::validation("needle must not be empty");
        assert_eq!(err.to_string(), "Invalid request: needle must not be empty");

        let err = FinderError::Busy;
        assert_eq!(err.to_string(), "A scan is already running");

        let err = FinderError::file_not_found("test.txt");
        assert_eq!(err.to_string(), "File not found: test.txt");

        let err = FinderError::RootNotFound(PathBuf::from("missing"));
        assert_eq!(err.to_string(), "Root directory not found: missing");
    }
}
