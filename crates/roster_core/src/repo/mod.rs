//! Aggregate persistence engine and its supporting components.
//!
//! # Responsibility
//! - Define the generic engine that reads and writes an aggregate root
//!   together with its child collections.
//! - Keep SQL assembly, identifier quoting, and transaction scoping inside
//!   this boundary.
//!
//! # Invariants
//! - Scalar values always travel as bound parameters; only identifiers are
//!   interpolated into SQL text, and only after escaping.
//! - Every write operation is a single transaction: it fully commits or
//!   leaves no trace.

use rusqlite::types::Value;
use rusqlite::ToSql;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod account_repo;
pub mod engine;
pub mod group_repo;
pub mod metadata;
pub mod shape;
pub mod sync;
pub mod tables;
pub mod txn;

use crate::db::DbError;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors produced by aggregate repositories and their components.
#[derive(Debug)]
pub enum StoreError {
    /// A required argument was empty or whitespace-only.
    InvalidArgument {
        param: &'static str,
        reason: &'static str,
    },
    /// A child shape has no usable table binding.
    Configuration {
        shape: &'static str,
        reason: String,
    },
    /// The store returned a non-positive surrogate key after an insert.
    Integrity { key: i64 },
    /// Persisted data cannot be converted to a valid in-memory value.
    InvalidData(String),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument { param, reason } => {
                write!(f, "invalid argument `{param}`: {reason}")
            }
            Self::Configuration { shape, reason } => {
                write!(f, "configuration error for shape `{shape}`: {reason}")
            }
            Self::Integrity { key } => {
                write!(f, "store returned invalid surrogate key after insert: {key}")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidArgument { .. } => None,
            Self::Configuration { .. } => None,
            Self::Integrity { .. } => None,
            Self::InvalidData(_) => None,
            Self::Db(err) => Some(err),
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Rejects empty or whitespace-only required string arguments.
///
/// Runs before any store access so a bad argument never opens a statement.
pub(crate) fn ensure_arg(param: &'static str, value: &str) -> StoreResult<()> {
    if value.trim().is_empty() {
        return Err(StoreError::InvalidArgument {
            param,
            reason: "must not be empty or whitespace",
        });
    }
    Ok(())
}

/// Adapts owned `(name, value)` parameter pairs to the slice form rusqlite
/// binds named parameters from.
pub(crate) fn named_refs(params: &[(String, Value)]) -> Vec<(&str, &dyn ToSql)> {
    params
        .iter()
        .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{ensure_arg, StoreError};

    #[test]
    fn ensure_arg_rejects_blank_values() {
        let err = ensure_arg("username", "   ").unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidArgument {
                param: "username",
                ..
            }
        ));
    }

    #[test]
    fn ensure_arg_accepts_content() {
        assert!(ensure_arg("username", "alice").is_ok());
    }

    #[test]
    fn invalid_argument_display_names_parameter() {
        let err = StoreError::InvalidArgument {
            param: "tenant",
            reason: "must not be empty or whitespace",
        };
        assert!(err.to_string().contains("tenant"));
    }
}
