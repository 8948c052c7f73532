//! Error types for role convergence
//!
//! Only configuration problems are modelled here. Failures reported by a
//! [`RoleStore`](crate::RoleStore) travel as `anyhow::Error` so that the
//! store's own error type survives untouched.

use thiserror::Error;

/// Errors raised before any store operation is attempted.
#[derive(Debug, Error)]
pub enum Error {
    /// Credential encoding is neither `plain` nor `hashed`
    #[error("unknown credential encoding: {0:?} (expected \"plain\" or \"hashed\")")]
    UnknownEncoding(String),

    /// The same role name appears more than once in a batch
    #[error("role {0:?} is declared more than once")]
    DuplicateRole(String),

    /// Role name is empty
    #[error("role name must not be empty")]
    EmptyName,
}

/// Result type for configuration checks.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_encoding_message() {
        let err = Error::UnknownEncoding("sha1".to_string());
        assert_eq!(
            err.to_string(),
            "unknown credential encoding: \"sha1\" (expected \"plain\" or \"hashed\")"
        );
    }

    #[test]
    fn test_duplicate_role_message() {
        let err = Error::DuplicateRole("admins".to_string());
        assert!(err.to_string().contains("\"admins\""));
    }
}
