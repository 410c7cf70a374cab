//! Aggregate domain models.
//!
//! # Responsibility
//! - Define the concrete account and group aggregates with their child
//!   collections, plus the schema declarations the engine consumes.
//!
//! # Invariants
//! - Surrogate keys are `0` until first persisted and immutable afterward.
//! - A child's `parent_key` is written by the engine, never by callers.

use crate::repo::{StoreError, StoreResult};
use uuid::Uuid;

pub mod account;
pub mod group;

pub(crate) fn parse_uuid(value: &str, column: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| StoreError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn flag_from_int(value: i64, column: &str) -> StoreResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StoreError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn optional_text(value: Option<String>) -> rusqlite::types::Value {
    match value {
        Some(text) => rusqlite::types::Value::Text(text),
        None => rusqlite::types::Value::Null,
    }
}
