//! Unified error types for the ringrule core library.
//!
//! This module provides a unified error type [`RingruleError`] that covers all
//! failure modes across the engine. Each module also has its own specific error
//! types (ValidationError, StoreError, StaleInputError, ConfigError,
//! StorageError) for internal use; they all convert into [`RingruleError`].
//!
//! # Example
//!
//! ```rust
//! use ringrule_core::error::{Result, RingruleError};
//! use ringrule_core::types::RuleId;
//!
//! fn require(found: bool, id: RuleId) -> Result<()> {
//!     if !found {
//!         return Err(RingruleError::RuleNotFound(id));
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::types::RuleId;

/// The unified error type for all ringrule operations.
#[derive(Debug, Error)]
pub enum RingruleError {
    /// A rule field failed validation. The rule list is unchanged.
    #[error("Invalid {field}: {message}")]
    InvalidRule {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// No rule with this id exists.
    #[error("Rule not found: {0}")]
    RuleNotFound(RuleId),

    /// A location sample was ignored (too old, out of order or malformed).
    #[error("Location sample ignored: {0}")]
    StaleLocation(#[from] crate::geofence::StaleInputError),

    /// The configuration could not be parsed or serialized.
    #[error("Unreadable configuration: {0}")]
    ConfigParseError(String),

    /// The configuration holds invalid values.
    #[error("Invalid configuration: {0}")]
    ConfigValidationError(String),

    /// Persisted data could not be read or written.
    #[error("Could not persist state: {0}")]
    PersistenceError(String),

    /// Persisted data is malformed or from an unknown format version.
    #[error("Corrupt data: {0}")]
    CorruptData(String),

    /// Raw I/O failure outside the storage layer.
    #[error("I/O failure: {0}")]
    IoError(#[from] std::io::Error),
}

/// A specialized [`Result`] type for ringrule operations.
pub type Result<T> = std::result::Result<T, RingruleError>;

impl RingruleError {
    /// Returns `true` if this error is caused by invalid user input.
    #[inline]
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Self::InvalidRule { .. } | Self::ConfigValidationError(_))
    }

    /// Config file could not be parsed or holds bad values.
    #[inline]
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigParseError(_) | Self::ConfigValidationError(_))
    }

    /// Something went wrong reading or writing the data directory.
    #[inline]
    #[must_use]
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            Self::PersistenceError(_) | Self::CorruptData(_) | Self::IoError(_)
        )
    }

    /// Not a failure: the input was dropped on purpose.
    ///
    /// Stale location samples are routine (tunnels, buffered reports) and are
    /// dropped rather than treated as failures.
    #[inline]
    #[must_use]
    pub fn is_expected_state(&self) -> bool {
        matches!(self, Self::StaleLocation(_))
    }

    /// Status the server answers with.
    #[inline]
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidRule { .. } => 400,
            Self::RuleNotFound(_) => 404,
            Self::StaleLocation(_) | Self::ConfigParseError(_) | Self::ConfigValidationError(_) => {
                422
            }
            Self::PersistenceError(_) | Self::CorruptData(_) | Self::IoError(_) => 500,
        }
    }

    /// Stable upper-case code; the server sends it lowercased.
    #[inline]
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRule { .. } => "INVALID_RULE",
            Self::RuleNotFound(_) => "RULE_NOT_FOUND",
            Self::StaleLocation(_) => "STALE_LOCATION",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::PersistenceError(_) => "PERSISTENCE_ERROR",
            Self::CorruptData(_) => "CORRUPT_DATA",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}


impl From<crate::rules::ValidationError> for RingruleError {
    fn from(err: crate::rules::ValidationError) -> Self {
        Self::InvalidRule {
            field: err.field,
            message: err.message,
        }
    }
}

impl From<crate::store::StoreError> for RingruleError {
    fn from(err: crate::store::StoreError) -> Self {
        use crate::store::StoreError;
        match err {
            StoreError::Validation(e) => e.into(),
            StoreError::NotFound(id) => Self::RuleNotFound(id),
        }
    }
}

impl From<crate::config::ConfigError> for RingruleError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::WriteError { path, source } => {
                Self::PersistenceError(format!("Failed to write {path}: {source}"))
            }
            ConfigError::ParseError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::SerializeError(e) => Self::ConfigParseError(e.to_string()),
            e @ ConfigError::ValidationError { .. } => Self::ConfigValidationError(e.to_string()),
            ConfigError::MultipleValidationErrors(errors) => {
                let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
                Self::ConfigValidationError(messages.join("; "))
            }
        }
    }
}

impl From<crate::storage::StorageError> for RingruleError {
    fn from(err: crate::storage::StorageError) -> Self {
        use crate::storage::StorageError;
        match err {
            e @ (StorageError::ParseError { .. } | StorageError::UnsupportedVersion { .. }) => {
                Self::CorruptData(e.to_string())
            }
            e => Self::PersistenceError(e.to_string()),
        }
    }
}
