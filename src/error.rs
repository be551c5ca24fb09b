//! Error types for qobuz-dl
//!
//! This module provides the error taxonomy for the whole pipeline:
//! - Domain-specific error types (resolution, template, catalog, tagging, archive)
//! - Classification into [`FailureKind`] for per-task reporting in a [`RunSummary`](crate::types::RunSummary)
//! - Fatal-vs-task-level distinction for startup errors

use crate::types::{FailureKind, ItemId, UrlKind};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for qobuz-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for qobuz-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "output_template")
        key: Option<String>,
    },

    /// Archive database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// The archive store could not be read or failed its integrity check
    #[error("archive is unreadable or corrupt: {0}")]
    ArchiveCorruption(String),

    /// Destructive archive operation attempted without confirmation
    #[error("clearing {records} archive records requires confirmation")]
    ConfirmationRequired {
        /// Number of records that would be removed
        records: u64,
    },

    /// URL could not be resolved into items
    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// Output template is malformed
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// Catalog service reported a failure
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Tagging the written file failed
    #[error("tagging error: {0}")]
    Tag(#[from] TagError),

    /// Writing the output file failed
    #[error("failed to write {path}: {source}")]
    Write {
        /// Destination (or temporary) path being written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A written file does not look like audio of the delivered format
    #[error("integrity check failed for {path}: {reason}")]
    Integrity {
        /// File that was checked
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// Two items rendered to the same output path
    #[error("output path {path} is already claimed by item {other}")]
    PathCollision {
        /// The colliding path
        path: PathBuf,
        /// The item that claimed the path first
        other: ItemId,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Insufficient disk space
    #[error("insufficient disk space: need {required} bytes, have {available} bytes")]
    InsufficientSpace {
        /// Number of bytes required for the operation
        required: u64,
        /// Number of bytes currently available on disk
        available: u64,
    },

    /// Failed to check disk space
    #[error("failed to check disk space: {0}")]
    DiskSpaceCheckFailed(String),

    /// Run was cancelled
    #[error("run cancelled")]
    Cancelled,

    /// Operation not supported (tagger missing, feature unavailable)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Errors raised while turning a catalog URL into item descriptors
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// URL does not match any supported catalog URL shape
    #[error("unsupported URL: {0}")]
    UnsupportedUrl(String),

    /// Catalog reports the entity does not exist
    #[error("{kind} {id} not found")]
    NotFound {
        /// Entity kind
        kind: UrlKind,
        /// Entity ID
        id: String,
    },

    /// Catalog refused access to the entity
    #[error("not authorized to access {kind} {id}")]
    Unauthorized {
        /// Entity kind
        kind: UrlKind,
        /// Entity ID
        id: String,
    },

    /// Catalog returned an entity of a different kind than requested
    #[error("expected {expected} for {id}, catalog returned {actual}")]
    UnexpectedEntity {
        /// Kind requested
        expected: UrlKind,
        /// Kind returned
        actual: UrlKind,
        /// Entity ID
        id: String,
    },

    /// Any other catalog failure (after retries)
    #[error("failed to resolve {kind} {id}: {source}")]
    Catalog {
        /// Entity kind
        kind: UrlKind,
        /// Entity ID
        id: String,
        /// Underlying catalog error
        #[source]
        source: CatalogError,
    },
}

impl ResolutionError {
    /// Build a resolution error from a catalog failure for a given entity
    pub fn from_catalog(kind: UrlKind, id: &str, err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(_) => ResolutionError::NotFound {
                kind,
                id: id.to_string(),
            },
            CatalogError::Unauthorized(_) => ResolutionError::Unauthorized {
                kind,
                id: id.to_string(),
            },
            other => ResolutionError::Catalog {
                kind,
                id: id.to_string(),
                source: other,
            },
        }
    }
}

/// Output template parse errors
///
/// Positions are byte offsets into the template string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// `{` without a matching `}`
    #[error("unclosed placeholder starting at {position}")]
    UnclosedPlaceholder {
        /// Offset of the opening brace
        position: usize,
    },

    /// `{}` with no field name
    #[error("empty placeholder at {position}")]
    EmptyPlaceholder {
        /// Offset of the opening brace
        position: usize,
    },

    /// `%{?` without the closing `}`
    #[error("unclosed conditional starting at {position}")]
    UnclosedConditional {
        /// Offset of the `%`
        position: usize,
    },

    /// Conditional is missing the `,` after its condition
    #[error("conditional at {position} is missing ',' after the condition")]
    MissingConditionSeparator {
        /// Offset of the `%`
        position: usize,
    },

    /// Conditional is missing the `|` between its branches
    #[error("conditional at {position} is missing '|' between branches")]
    MissingBranchSeparator {
        /// Offset of the `%`
        position: usize,
    },

    /// Conditional has no condition name
    #[error("conditional at {position} has an empty condition")]
    EmptyCondition {
        /// Offset of the `%`
        position: usize,
    },

    /// Conditional names neither a flag nor a known placeholder field
    #[error("unknown conditional field '{name}' at {position}")]
    UnknownCondition {
        /// The field name used
        name: String,
        /// Offset of the `%`
        position: usize,
    },
}

/// Failures reported by the catalog service
///
/// The scheduler's retry policy keys off this taxonomy.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// Credentials rejected or entity not available to this account
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Entity or stream does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Catalog asked us to slow down
    #[error("rate limited{}", retry_after.map(|d| format!(" (retry after {}s)", d.as_secs())).unwrap_or_default())]
    RateLimited {
        /// Server-provided wait hint
        retry_after: Option<Duration>,
    },

    /// Timeouts, resets and 5xx-class responses
    #[error("transient failure: {0}")]
    Transient(String),
}

/// Tagger failures
#[derive(Debug, Error)]
pub enum TagError {
    /// The file could not be tagged
    #[error("failed to tag {path}: {reason}")]
    Failed {
        /// File being tagged
        path: PathBuf,
        /// Reason reported by the tagger
        reason: String,
    },

    /// The tagger does not handle this file type
    #[error("unsupported format for tagging: {path}")]
    UnsupportedFormat {
        /// File being tagged
        path: PathBuf,
    },
}

impl Error {
    /// Classify this error for per-task reporting
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Error::Catalog(CatalogError::Unauthorized(_))
            | Error::Resolution(ResolutionError::Unauthorized { .. }) => FailureKind::Unauthorized,
            Error::Catalog(CatalogError::NotFound(_))
            | Error::Resolution(ResolutionError::NotFound { .. }) => FailureKind::NotFound,
            Error::Catalog(CatalogError::RateLimited { .. }) => FailureKind::RateLimited,
            Error::Catalog(CatalogError::Transient(_)) | Error::Network(_) => FailureKind::Transient,
            Error::Tag(_) => FailureKind::Tag,
            Error::Write { .. } | Error::Io(_) => FailureKind::Write,
            Error::Integrity { .. } => FailureKind::Integrity,
            Error::PathCollision { .. } => FailureKind::PathCollision,
            Error::Database(_) | Error::Sqlx(_) | Error::ArchiveCorruption(_) => {
                FailureKind::Archive
            }
            Error::Cancelled => FailureKind::Cancelled,
            _ => FailureKind::Other,
        }
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) | Error::Sqlx(_) => "database_error",
            Error::ArchiveCorruption(_) => "archive_corruption",
            Error::ConfirmationRequired { .. } => "confirmation_required",
            Error::Resolution(e) => match e {
                ResolutionError::UnsupportedUrl(_) => "unsupported_url",
                ResolutionError::NotFound { .. } => "not_found",
                ResolutionError::Unauthorized { .. } => "unauthorized",
                ResolutionError::UnexpectedEntity { .. } => "unexpected_entity",
                ResolutionError::Catalog { .. } => "resolution_failed",
            },
            Error::Template(_) => "template_error",
            Error::Catalog(e) => match e {
                CatalogError::Unauthorized(_) => "unauthorized",
                CatalogError::NotFound(_) => "not_found",
                CatalogError::RateLimited { .. } => "rate_limited",
                CatalogError::Transient(_) => "transient",
            },
            Error::Tag(_) => "tag_error",
            Error::Write { .. } => "write_error",
            Error::Integrity { .. } => "integrity_error",
            Error::PathCollision { .. } => "path_collision",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::InsufficientSpace { .. } => "insufficient_space",
            Error::DiskSpaceCheckFailed(_) => "disk_space_check_failed",
            Error::Cancelled => "cancelled",
            Error::NotSupported(_) => "not_supported",
            Error::Other(_) => "internal_error",
        }
    }

    /// Whether this error must abort a run before any network activity
    ///
    /// Fatal errors are returned from `download` as `Err`; everything else is
    /// recorded against a single task in the run summary.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config { .. }
                | Error::Template(_)
                | Error::ArchiveCorruption(_)
                | Error::InsufficientSpace { .. }
                | Error::DiskSpaceCheckFailed(_)
        )
    }

    /// Shorthand for a configuration error on a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}
