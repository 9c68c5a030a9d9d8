//! Database Error Types
//!
//! Error types for storage operations: connection, schema initialization,
//! statement execution and row decoding. Constraint violations and
//! missing rows get their own variants because the service layer reacts
//! to them (slug retry, not-found mapping) and must not string-match.

use std::path::PathBuf;
use thiserror::Error;

/// Storage operation errors
///
/// Covers connection, initialization, and statement failures. Hierarchy
/// rules (cycles, child counts, parent existence) are deliberately not
/// represented here; the store stays invariant-agnostic and the service
/// layer owns those checks.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish database connection
    #[error("Failed to connect to database at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        source: libsql::Error,
    },

    /// Failed to initialize database schema
    #[error("Failed to initialize database schema: {0}")]
    InitializationFailed(String),

    /// Failed to create parent directory
    #[error("Failed to create parent directory for database: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    /// libsql operation error
    #[error("Database operation failed: {0}")]
    LibsqlError(#[from] libsql::Error),

    /// SQL execution error with context
    #[error("SQL execution failed: {context}")]
    SqlExecutionError { context: String },

    /// A UNIQUE constraint rejected the write (slug already taken)
    #[error("Unique constraint violated: {context}")]
    UniqueViolation { context: String },

    /// The targeted row does not exist
    #[error("No row found for node: {id}")]
    RowNotFound { id: String },

    /// A fetched row could not be decoded into a node
    #[error("Failed to decode row: {context}")]
    RowDecode { context: String },
}

impl DatabaseError {
    /// Create a connection failed error
    pub fn connection_failed(path: PathBuf, source: libsql::Error) -> Self {
        Self::ConnectionFailed { path, source }
    }

    /// Create an initialization failed error
    pub fn initialization_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    /// Create a SQL execution error with context
    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::SqlExecutionError {
            context: context.into(),
        }
    }

    /// Create a row-not-found error
    pub fn row_not_found(id: impl Into<String>) -> Self {
        Self::RowNotFound { id: id.into() }
    }

    /// Create a row decoding error
    pub fn row_decode(context: impl Into<String>) -> Self {
        Self::RowDecode {
            context: context.into(),
        }
    }

    /// Wrap a write-statement error, surfacing unique-constraint
    /// rejections as `UniqueViolation`.
    ///
    /// libsql does not expose constraint classes as typed variants, so
    /// the SQLite message text is the only discriminator available.
    pub fn statement(context: impl Into<String>, err: libsql::Error) -> Self {
        let detail = err.to_string();
        let context = format!("{}: {}", context.into(), detail);
        if detail.contains("UNIQUE constraint failed") {
            Self::UniqueViolation { context }
        } else {
            Self::SqlExecutionError { context }
        }
    }

    /// Whether this error is a unique-constraint rejection
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }

    /// Whether this error is a missing-row signal
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RowNotFound { .. })
    }
}
