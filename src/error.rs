//! Error types for sync runs and the object-store collaborator.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by an object-store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or configured.
    #[error("failed to connect to object store: {0}")]
    Connection(String),

    /// Looking up a bucket failed for a reason other than absence.
    #[error("failed to look up bucket {bucket}: {reason}")]
    BucketLookup { bucket: String, reason: String },

    /// Creating a missing bucket failed.
    #[error("failed to create bucket {bucket}: {reason}")]
    BucketCreate { bucket: String, reason: String },

    /// Reading or writing a single object failed.
    #[error("object {key}: {reason}")]
    Object { key: String, reason: String },

    /// The backend cannot perform the requested operation.
    #[error("operation not supported by {backend} store: {operation}")]
    Unsupported { backend: &'static str, operation: String },
}

impl StoreError {
    pub(crate) fn object(key: &str, err: impl std::fmt::Display) -> Self {
        StoreError::Object {
            key: key.to_string(),
            reason: err.to_string(),
        }
    }
}

/// A single file that could not be published.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UploadFailure {
    pub key: String,
    pub reason: String,
}

/// Errors raised by a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The external minifier exited with a non-zero status.
    #[error("minifier exited with status {status} for {}: {command}", .input.display())]
    Minification {
        command: String,
        input: PathBuf,
        status: i32,
    },

    /// The external minifier could not be started.
    #[error("failed to run minifier `{command}`: {source}")]
    MinifierSpawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// A path cannot be passed safely through the shell.
    #[error("cannot quote {} for the shell", .path.display())]
    UnquotablePath { path: PathBuf },

    /// Two minification jobs resolved to the same output path.
    #[error("multiple sources minify to {}", .output.display())]
    OutputCollision { output: PathBuf },

    /// An ignore or metadata pattern is not a valid regular expression.
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The sync configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Directory traversal failed.
    #[error("failed to walk {}: {source}", .root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: jwalk::Error,
    },

    /// Local filesystem I/O failed.
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A blocking stage panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The object store failed outside of a per-file upload.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// One or more files failed to upload.
    #[error("{} file(s) failed to upload", .failures.len())]
    Upload { failures: Vec<UploadFailure> },
}

impl SyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
