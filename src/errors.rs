//! Unified error types and the closed set of action statuses reported to clients.

use sea_orm::{DbErr, RuntimeErr, SqlErr};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every error the service can produce.
#[derive(Debug, Error)]
pub enum Error {
    /// A submitted field failed validation
    #[error("Invalid value for '{field}': {message}")]
    Validation {
        /// Name of the offending form field
        field: String,
        /// Human-readable reason
        message: String,
    },

    /// No session, or the session has expired
    #[error("Authentication required")]
    Unauthorized,

    /// Authenticated, but not allowed to perform the action
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Human-readable reason
        message: String,
    },

    /// The requested row does not exist within the caller's organization
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (e.g. "client")
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// The action would violate a uniqueness or consistency rule
    #[error("Conflict: {message}")]
    Conflict {
        /// Human-readable reason
        message: String,
    },

    /// A status change not present in the allow-list
    #[error("Cannot move {entity} from {from} to {to}")]
    InvalidTransition {
        /// Entity kind (e.g. "fiscal year")
        entity: &'static str,
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable reason
        message: String,
    },

    /// Any database failure not mapped to a more specific variant
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// A response payload could not be converted to JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O failure (config file, socket binding)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// Shorthand for a validation failure on `field`.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a forbidden action.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Shorthand for a conflicting action.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Shorthand for a missing row.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Maps the error onto the status reported back to the client.
    #[must_use]
    pub fn status(&self) -> ActionStatus {
        match self {
            Self::Validation { .. } | Self::InvalidTransition { .. } => {
                ActionStatus::ValidationError
            }
            Self::Unauthorized => ActionStatus::Unauthorized,
            Self::Forbidden { .. } => ActionStatus::Forbidden,
            Self::NotFound { .. } => ActionStatus::NotFound,
            Self::Conflict { .. } => ActionStatus::Conflict,
            Self::Database(e) if is_unique_violation(e) => ActionStatus::Conflict,
            Self::Database(_)
            | Self::Serialization(_)
            | Self::Config { .. }
            | Self::Io(_)
            | Self::EnvVar(_) => ActionStatus::Error,
        }
    }
}

/// Returns true when the database rejected a row because of a UNIQUE index.
#[must_use]
pub fn is_unique_violation(err: &DbErr) -> bool {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return true;
    }
    // SQLite surfaces some constraint failures only through the message
    match err {
        DbErr::Exec(RuntimeErr::SqlxError(e)) | DbErr::Query(RuntimeErr::SqlxError(e)) => {
            e.to_string().contains("UNIQUE")
        }
        _ => false,
    }
}

/// Closed set of outcomes returned by every action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// The action completed
    Success,
    /// Input failed validation or an illegal status change was requested
    ValidationError,
    /// No valid session
    Unauthorized,
    /// Session valid but not allowed
    Forbidden,
    /// Target row missing
    NotFound,
    /// Uniqueness or consistency conflict
    Conflict,
    /// Unexpected failure
    Error,
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
