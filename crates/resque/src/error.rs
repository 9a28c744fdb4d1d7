//! Error types for resque.
//!
//! This module defines the error types used throughout the crate. Resolver
//! failures live in [`crate::geo::GeoError`] since they are recovered locally
//! and never escape as a crate-level failure.

use std::path::PathBuf;
use thiserror::Error;

use crate::validate::ValidationReport;

/// The main error type for resque operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// The persisted registry could not be decoded.
    #[error("registry under key '{key}' is corrupt: {message}")]
    StorageCorrupt {
        /// Storage key holding the registry.
        key: String,
        /// Decoder message.
        message: String,
    },

    /// Writing the registry back to the store failed.
    #[error("failed to write registry under key '{key}': {message}")]
    StorageWrite {
        /// Storage key holding the registry.
        key: String,
        /// Description of what went wrong.
        message: String,
    },

    // === Registry Errors ===
    /// A donor with this id is already registered.
    #[error("donor id already registered: {id}")]
    DuplicateDonorId {
        /// The colliding id.
        id: String,
    },

    /// Submitted fields failed validation.
    #[error("validation failed for {} field(s)", .0.len())]
    Validation(ValidationReport),

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for resque operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a storage write error for the given key.
    #[must_use]
    pub fn storage_write(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StorageWrite {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Check if the failed operation can be retried by the user as-is.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StorageWrite { .. }
                | Self::DatabaseQuery(_)
                | Self::DuplicateDonorId { .. }
                | Self::Io(_)
        )
    }

    /// Get the validation report if this is a validation failure.
    #[must_use]
    pub fn validation_report(&self) -> Option<&ValidationReport> {
        match self {
            Self::Validation(report) => Some(report),
            _ => None,
        }
    }
}
