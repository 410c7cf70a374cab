//! Declared entity shapes and child-field descriptors.
//!
//! # Responsibility
//! - Define the compile-time schema contracts entities implement instead of
//!   being reflected over: persisted columns, key access, row
//!   materialization, and the declared list of child-collection fields.
//!
//! # Invariants
//! - `COLUMNS` excludes the surrogate key and parent key; those columns are
//!   handled explicitly by the statement builders.
//! - A root's child fields are declared in a fixed order; the engine reads
//!   and writes child result sets in exactly that order.

use crate::repo::metadata::{MetadataCache, ShapeToken};
use crate::repo::sync;
use crate::repo::tables::TableBindings;
use crate::repo::StoreResult;
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use uuid::Uuid;

/// A persisted entity shape: ordered scalar columns plus key identity.
pub trait Record: Sized + 'static {
    /// Ordered persisted scalar column names, excluding the surrogate key
    /// and (for children) the parent key.
    const COLUMNS: &'static [&'static str];

    /// Store-assigned surrogate key; `0` until first persisted.
    fn key(&self) -> i64;

    fn set_key(&mut self, key: i64);

    /// The bound-parameter value for one declared column.
    fn column_value(&self, column: &str) -> Value;

    /// Materializes one row produced by a statement whose select list was
    /// built from this shape's descriptor.
    fn from_row(row: &Row<'_>) -> StoreResult<Self>;
}

/// A child entity owned by exactly one root.
pub trait ChildRecord: Record {
    /// Table the shape binds to when no override is configured.
    const DEFAULT_TABLE: &'static str;

    /// Owning root's surrogate key; written by the engine, never by the
    /// caller.
    fn parent_key(&self) -> i64;

    fn set_parent_key(&mut self, parent_key: i64);
}

/// An aggregate root: a record with an external identifier and declared
/// child-collection fields.
pub trait AggregateRoot: Record + Default {
    /// Root table the aggregate binds to when no override is configured.
    const DEFAULT_ROOT_TABLE: &'static str;

    /// Caller-visible stable identifier, distinct from the surrogate key.
    fn external_id(&self) -> Uuid;

    /// Declared child-collection fields, in declaration order.
    fn child_fields() -> &'static [&'static dyn ChildFieldAccess<Self>];
}

/// Everything a child-field statement needs from its surroundings.
pub struct StatementCtx<'a> {
    pub(crate) conn: &'a Connection,
    pub(crate) tables: &'a TableBindings,
    pub(crate) cache: &'a MetadataCache,
}

/// Object-safe access to one declared child-collection field of a root.
///
/// Implementations are monomorphized per (root, child) pair so the engine
/// can iterate heterogeneous child shapes through one vtable.
pub trait ChildFieldAccess<R>: Sync {
    /// Field name, for diagnostics.
    fn name(&self) -> &'static str;

    /// Shape token of the child element type.
    fn shape(&self) -> ShapeToken;

    /// Default table name of the child element type.
    fn default_table(&self) -> &'static str;

    /// Pre-computes the child shape's descriptor.
    fn warm(&self, cache: &MetadataCache);

    /// Resets the field to an empty collection.
    fn init_empty(&self, root: &mut R);

    /// Loads all children of one parent into the field.
    fn load(&self, ctx: &StatementCtx<'_>, root: &mut R, parent_key: i64) -> StoreResult<()>;

    /// Loads children for a set of parents and assigns each root exactly
    /// its own, leaving an empty collection where no rows matched.
    fn load_partitioned(
        &self,
        ctx: &StatementCtx<'_>,
        roots: &mut [R],
        parent_keys: &[i64],
    ) -> StoreResult<()>;

    /// Writes the parent key onto every member, keeping the in-memory
    /// aggregate consistent with what the store will hold.
    fn stamp_parent(&self, root: &mut R, parent_key: i64);

    /// Bulk-inserts the field's members under the given parent key.
    fn insert_all(&self, ctx: &StatementCtx<'_>, root: &R, parent_key: i64) -> StoreResult<()>;

    /// Reconciles the persisted rows with the field's members.
    fn sync(&self, ctx: &StatementCtx<'_>, root: &R, parent_key: i64) -> StoreResult<()>;

    /// Deletes every persisted row belonging to the parent.
    fn delete_all(&self, ctx: &StatementCtx<'_>, parent_key: i64) -> StoreResult<()>;
}

/// Declared binding of one `Vec<C>` field on root `R`.
pub struct ChildBinding<R, C> {
    pub field: &'static str,
    pub get: fn(&R) -> &Vec<C>,
    pub get_mut: fn(&mut R) -> &mut Vec<C>,
}

impl<R: Record, C: ChildRecord> ChildFieldAccess<R> for ChildBinding<R, C> {
    fn name(&self) -> &'static str {
        self.field
    }

    fn shape(&self) -> ShapeToken {
        ShapeToken::of::<C>()
    }

    fn default_table(&self) -> &'static str {
        C::DEFAULT_TABLE
    }

    fn warm(&self, cache: &MetadataCache) {
        let _ = cache.descriptor::<C>();
    }

    fn init_empty(&self, root: &mut R) {
        (self.get_mut)(root).clear();
    }

    fn load(&self, ctx: &StatementCtx<'_>, root: &mut R, parent_key: i64) -> StoreResult<()> {
        *(self.get_mut)(root) = sync::select_children::<C>(ctx, parent_key)?;
        Ok(())
    }

    fn load_partitioned(
        &self,
        ctx: &StatementCtx<'_>,
        roots: &mut [R],
        parent_keys: &[i64],
    ) -> StoreResult<()> {
        let mut by_parent = sync::select_children_by_parent::<C>(ctx, parent_keys)?;
        for root in roots.iter_mut() {
            let children = by_parent.remove(&root.key()).unwrap_or_default();
            *(self.get_mut)(root) = children;
        }
        Ok(())
    }

    fn stamp_parent(&self, root: &mut R, parent_key: i64) {
        for child in (self.get_mut)(root) {
            child.set_parent_key(parent_key);
        }
    }

    fn insert_all(&self, ctx: &StatementCtx<'_>, root: &R, parent_key: i64) -> StoreResult<()> {
        sync::insert_children::<C>(ctx, (self.get)(root), parent_key)
    }

    fn sync(&self, ctx: &StatementCtx<'_>, root: &R, parent_key: i64) -> StoreResult<()> {
        sync::sync_children::<C>(ctx, (self.get)(root), parent_key)
    }

    fn delete_all(&self, ctx: &StatementCtx<'_>, parent_key: i64) -> StoreResult<()> {
        sync::delete_children_of::<C>(ctx, parent_key)
    }
}
