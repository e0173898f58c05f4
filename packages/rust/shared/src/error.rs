//! Error types for catalogloader.
//!
//! Library crates use [`CatalogError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all catalogloader operations.
///
/// Every failure that happens while processing a single work item ends up as
/// one of these inside the pipeline output; only configuration errors raised
/// while assembling the pipeline are returned to the caller directly.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// A location target does not have the shape a connector expects.
    #[error("Incorrect url: {target}, {reason}")]
    InvalidLocation { target: String, reason: String },

    /// The remote (or local) resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A remote read completed with a non-2xx, non-404 status.
    #[error("{target} could not be read as {url}, {status}")]
    Fetch {
        target: String,
        url: String,
        status: u16,
    },

    /// Transport-level failure (connection refused, TLS, body read...).
    #[error("network error: {0}")]
    Network(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A connector failed in a preparatory step (e.g. repository id lookup).
    #[error("connector error: {message}")]
    Connector { message: String },

    /// No processor claimed a location item.
    #[error("{0}")]
    UnhandledLocation(String),

    /// No processor claimed a data item.
    #[error("{0}")]
    UnparseableData(String),

    /// The round bound was reached before the work queue drained.
    #[error("Max recursion depth {max_depth} reached for {location_type} {target}")]
    DepthExceeded {
        max_depth: usize,
        location_type: String,
        target: String,
    },

    /// The access policy rejected an entity for its location.
    #[error("Entity of kind {kind} is not allowed from location {target}:{location_type}")]
    NotAllowed {
        kind: String,
        location_type: String,
        target: String,
    },

    /// A processor failed; the message names the processor and the item.
    #[error("{0}")]
    Processor(String),

    /// Structured data could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Entity or data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Directory-service (LDAP) failure.
    #[error("directory error: {0}")]
    Directory(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CatalogError>;

impl CatalogError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an invalid-location error for `target`.
    pub fn invalid_location(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidLocation {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Create a connector error from any displayable message.
    pub fn connector(msg: impl Into<String>) -> Self {
        Self::Connector {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error means the resource is absent (as opposed to broken).
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
