//! Error types for psql operations.
//!
//! Errors are categorized from psql's stderr so that transient connection
//! problems can be retried and everything else reported as-is.

use thiserror::Error;

/// Categories of psql errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Server unreachable or not accepting connections (transient, retryable)
    Connection,
    /// Credentials rejected
    Authentication,
    /// Connected role lacks a privilege
    Permission,
    /// Referenced object does not exist
    NotFound,
    /// Generated statement was rejected by the parser
    Syntax,
    /// psql not installed or not found
    PsqlNotFound,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection)
    }
}

/// Errors that can occur while talking to PostgreSQL through psql.
#[derive(Debug, Error)]
pub enum Error {
    /// Could not reach the server
    #[error("connection error: {message}")]
    Connection {
        /// psql's error output
        message: String,
    },

    /// Server rejected the credentials
    #[error("authentication failed: {message}")]
    Authentication {
        /// psql's error output
        message: String,
    },

    /// Connected role lacks a privilege
    #[error("permission denied: {message}")]
    Permission {
        /// psql's error output
        message: String,
    },

    /// Referenced object does not exist
    #[error("not found: {message}")]
    NotFound {
        /// psql's error output
        message: String,
    },

    /// Statement rejected by the parser
    #[error("syntax error: {message}")]
    Syntax {
        /// psql's error output
        message: String,
    },

    /// psql is not installed or not found in PATH
    #[error("psql not found. Install the PostgreSQL client tools")]
    PsqlNotFound,

    /// Command execution failed
    #[error("{message}: {stderr}")]
    CommandFailed {
        /// Description of what command failed
        message: String,
        /// Standard error output from the failed command
        stderr: String,
    },

    /// psql could not be started
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Connection { .. } => ErrorCategory::Connection,
            Error::Authentication { .. } => ErrorCategory::Authentication,
            Error::Permission { .. } => ErrorCategory::Permission,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Syntax { .. } => ErrorCategory::Syntax,
            Error::PsqlNotFound => ErrorCategory::PsqlNotFound,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Create an error from psql's stderr.
    pub fn from_psql_output(stderr: &str) -> Self {
        let message = stderr.trim().to_string();
        let lower = message.to_lowercase();

        if lower.contains("could not connect")
            || lower.contains("connection refused")
            || lower.contains("could not translate host name")
            || lower.contains("timeout expired")
            || lower.contains("the database system is starting up")
            || lower.contains("the database system is shutting down")
            || lower.contains("server closed the connection unexpectedly")
        {
            return Error::Connection { message };
        }

        if lower.contains("password authentication failed")
            || lower.contains("no password supplied")
            || lower.contains("peer authentication failed")
            || lower.contains("no pg_hba.conf entry")
        {
            return Error::Authentication { message };
        }

        if lower.contains("permission denied")
            || lower.contains("must be superuser")
            || lower.contains("must have createrole")
            || lower.contains("insufficient privilege")
        {
            return Error::Permission { message };
        }

        if lower.contains("does not exist") {
            return Error::NotFound { message };
        }

        if lower.contains("syntax error") {
            return Error::Syntax { message };
        }

        Error::CommandFailed {
            message: "psql command failed".to_string(),
            stderr: message,
        }
    }
}

/// Result type for psql operations.
pub type Result<T> = std::result::Result<T, Error>;
