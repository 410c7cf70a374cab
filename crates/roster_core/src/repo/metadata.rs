//! Entity shape metadata and cached SQL fragments.
//!
//! # Responsibility
//! - Derive, once per entity shape, the ordered persisted-column list and
//!   the SQL fragments every statement builder reuses verbatim.
//! - Key the memo by a stable per-shape token so same-named but distinct
//!   shapes never collide.
//!
//! # Invariants
//! - A descriptor is computed at most once per shape per cache.
//! - Fragments never include the surrogate key or parent key columns; the
//!   engine prepends those explicitly where a statement needs them.
//! - An empty shape degrades to empty fragments; this component does not
//!   fail.

use crate::repo::shape::Record;
use crate::repo::tables;
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, PoisonError, RwLock};

/// Stable identity of an entity shape.
///
/// Keyed on `TypeId`, with the type name carried only for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeToken {
    id: TypeId,
    name: &'static str,
}

impl ShapeToken {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path, for error messages.
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }
}

impl Display for ShapeToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// Derived, cached metadata for one entity shape.
#[derive(Debug)]
pub struct ShapeDescriptor {
    token: ShapeToken,
    columns: &'static [&'static str],
    identifiers: String,
    parameters: String,
    assignments: String,
    upsert_assignments: String,
}

impl ShapeDescriptor {
    fn derive(token: ShapeToken, columns: &'static [&'static str]) -> Self {
        let identifiers = columns
            .iter()
            .map(|column| tables::quote(column))
            .collect::<Vec<_>>()
            .join(", ");
        let parameters = columns
            .iter()
            .map(|column| format!(":{column}"))
            .collect::<Vec<_>>()
            .join(", ");
        let assignments = columns
            .iter()
            .map(|column| format!("{} = :{column}", tables::quote(column)))
            .collect::<Vec<_>>()
            .join(", ");
        let upsert_assignments = columns
            .iter()
            .map(|column| {
                let quoted = tables::quote(column);
                format!("{quoted} = excluded.{quoted}")
            })
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            token,
            columns,
            identifiers,
            parameters,
            assignments,
            upsert_assignments,
        }
    }

    pub fn token(&self) -> ShapeToken {
        self.token
    }

    /// Ordered persisted scalar columns, excluding key and parent key.
    pub fn columns(&self) -> &'static [&'static str] {
        self.columns
    }

    /// `"col_a", "col_b"` -- quoted column identifiers.
    pub fn identifiers(&self) -> &str {
        &self.identifiers
    }

    /// `:col_a, :col_b` -- named placeholders in column order.
    pub fn parameters(&self) -> &str {
        &self.parameters
    }

    /// `"col_a" = :col_a, "col_b" = :col_b` -- UPDATE SET list.
    pub fn assignments(&self) -> &str {
        &self.assignments
    }

    /// `"col_a" = excluded."col_a", ...` -- ON CONFLICT update list.
    pub fn upsert_assignments(&self) -> &str {
        &self.upsert_assignments
    }
}

/// Write-once-per-shape registry of `ShapeDescriptor`s.
///
/// Constructed with its owning repository and shared by reference;
/// concurrent reads after first computation are lock-cheap.
pub struct MetadataCache {
    shapes: RwLock<HashMap<TypeId, Arc<ShapeDescriptor>>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self {
            shapes: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the descriptor for `T`, deriving it on first use.
    pub fn descriptor<T: Record>(&self) -> Arc<ShapeDescriptor> {
        let token = ShapeToken::of::<T>();
        {
            let shapes = self.shapes.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(descriptor) = shapes.get(&token.id) {
                return Arc::clone(descriptor);
            }
        }

        let mut shapes = self.shapes.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            shapes
                .entry(token.id)
                .or_insert_with(|| Arc::new(ShapeDescriptor::derive(token, T::COLUMNS))),
        )
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new()
    }
}
