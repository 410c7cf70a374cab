//! Identifier quoting and table-name resolution.
//!
//! # Responsibility
//! - Own the delimited-identifier rule for every statement the engine builds.
//! - Map child shapes to their (escaped) table names.
//!
//! # Invariants
//! - Escaping doubles embedded delimiter characters and is applied exactly
//!   once, at binding time; statement builders only quote, never re-escape.
//! - An unbound shape is a configuration error that names the shape.

use crate::repo::metadata::ShapeToken;
use crate::repo::{StoreError, StoreResult};
use std::any::TypeId;
use std::collections::HashMap;

/// Wraps an identifier in SQLite delimited-identifier quotes.
///
/// The input is expected to be already escaped (or a compile-time constant
/// that contains no delimiter characters); this function never doubles.
pub fn quote(identifier: &str) -> String {
    format!("\"{identifier}\"")
}

/// Escapes a caller-supplied identifier by doubling embedded quote
/// characters. Not idempotent: apply once, when the name is bound.
pub fn escape_identifier(name: &str) -> String {
    name.replace('"', "\"\"")
}

/// Registry of child shape -> escaped table name.
pub struct TableBindings {
    tables: HashMap<TypeId, String>,
}

impl TableBindings {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    /// Binds (or overrides) the table name for a child shape.
    ///
    /// The name is validated and escaped here, once; later lookups return
    /// the stored escaped form verbatim.
    pub fn bind(&mut self, shape: ShapeToken, table: &str) -> StoreResult<()> {
        if table.trim().is_empty() {
            return Err(StoreError::InvalidArgument {
                param: "table",
                reason: "must not be empty or whitespace",
            });
        }
        self.tables.insert(shape.id(), escape_identifier(table));
        Ok(())
    }

    /// Binds a default table name only when no binding exists for the shape.
    pub fn bind_default(&mut self, shape: ShapeToken, table: &str) -> StoreResult<()> {
        if self.tables.contains_key(&shape.id()) {
            return Ok(());
        }
        self.bind(shape, table)
    }

    /// Returns the escaped table name bound to the shape.
    pub fn table_for(&self, shape: ShapeToken) -> StoreResult<&str> {
        self.tables
            .get(&shape.id())
            .map(String::as_str)
            .ok_or_else(|| StoreError::Configuration {
                shape: shape.short_name(),
                reason: "no table name bound for shape".to_string(),
            })
    }
}

impl Default for TableBindings {
    fn default() -> Self {
        Self::new()
    }
}
