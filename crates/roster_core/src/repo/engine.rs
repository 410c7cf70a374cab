//! Generic aggregate repository engine.
//!
//! # Responsibility
//! - Orchestrate create/read/update/delete of one root plus its declared
//!   child collections over a single SQLite connection.
//! - Assemble every statement from the cached shape fragments and the
//!   bound (escaped) table names.
//!
//! # Invariants
//! - Reads follow one fixed statement sequence: resolve key(s) by
//!   predicate, fetch root row(s), fetch one child result set per declared
//!   field in declaration order.
//! - Writes run inside one `TxnGuard`: they fully commit or leave no
//!   trace, the root row included.
//! - A returned root always has every child-collection field populated
//!   with a (possibly empty) collection.

use crate::repo::metadata::{MetadataCache, ShapeDescriptor, ShapeToken};
use crate::repo::shape::{AggregateRoot, ChildRecord, StatementCtx};
use crate::repo::tables::{self, TableBindings};
use crate::repo::txn::TxnGuard;
use crate::repo::{ensure_arg, named_refs, StoreError, StoreResult};
use log::{debug, info};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use std::any::TypeId;
use std::marker::PhantomData;
use std::time::Instant;
use uuid::Uuid;

/// Table-name overrides applied when a repository is constructed.
///
/// Names are validated and escaped once, at construction; anything not
/// overridden falls back to the shape's declared default.
#[derive(Debug, Default)]
pub struct RepositoryConfig {
    root_table: Option<String>,
    child_tables: Vec<(TypeId, String)>,
}

impl RepositoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the root table name.
    pub fn root_table(mut self, name: impl Into<String>) -> Self {
        self.root_table = Some(name.into());
        self
    }

    /// Overrides the table name for one child shape.
    pub fn child_table<C: ChildRecord>(mut self, name: impl Into<String>) -> Self {
        self.child_tables.push((TypeId::of::<C>(), name.into()));
        self
    }
}

/// Repository engine for one aggregate root shape.
///
/// Bound to exactly one connection for its lifetime; callers serialize
/// concurrent use.
pub struct AggregateRepository<'conn, R: AggregateRoot> {
    conn: &'conn mut Connection,
    tables: TableBindings,
    cache: MetadataCache,
    root_table: String,
    _root: PhantomData<R>,
}

impl<'conn, R: AggregateRoot> AggregateRepository<'conn, R> {
    /// Constructs a repository with default table bindings.
    pub fn new(conn: &'conn mut Connection) -> StoreResult<Self> {
        Self::with_config(conn, RepositoryConfig::new())
    }

    /// Constructs a repository, applying table-name overrides.
    ///
    /// Shape descriptors for the root and every declared child shape are
    /// derived here, once, so statement assembly never recomputes them.
    pub fn with_config(conn: &'conn mut Connection, config: RepositoryConfig) -> StoreResult<Self> {
        let root_table_raw = config
            .root_table
            .unwrap_or_else(|| R::DEFAULT_ROOT_TABLE.to_string());
        ensure_arg("root_table", &root_table_raw)?;
        let root_table = tables::escape_identifier(&root_table_raw);

        let mut bindings = TableBindings::new();
        let cache = MetadataCache::new();
        let _ = cache.descriptor::<R>();

        for field in R::child_fields() {
            field.warm(&cache);
            let override_name = config
                .child_tables
                .iter()
                .find(|(shape_id, _)| *shape_id == field.shape().id())
                .map(|(_, table)| table.as_str());
            match override_name {
                Some(table) => bindings.bind(field.shape(), table)?,
                None => bindings.bind_default(field.shape(), field.default_table())?,
            }
        }

        Ok(Self {
            conn,
            tables: bindings,
            cache,
            root_table,
            _root: PhantomData,
        })
    }

    /// Allocates a new root with every child collection empty. No store
    /// access.
    pub fn create(&self) -> R {
        let mut root = R::default();
        for field in R::child_fields() {
            field.init_empty(&mut root);
        }
        root
    }

    /// Quoted, escaped table name bound to a child shape, for predicate
    /// clauses that correlate against a child table.
    pub fn child_table<C: ChildRecord>(&self) -> StoreResult<String> {
        Ok(tables::quote(self.tables.table_for(ShapeToken::of::<C>())?))
    }

    fn ctx(&self) -> StatementCtx<'_> {
        StatementCtx {
            conn: &*self.conn,
            tables: &self.tables,
            cache: &self.cache,
        }
    }

    fn quoted_root_table(&self) -> String {
        tables::quote(&self.root_table)
    }

    /// Gets a root by its external identifier.
    pub fn get_by_id(&self, id: Uuid) -> StoreResult<Option<R>> {
        let clause = format!(
            "{root}.{id} = :id",
            root = tables::quote("root"),
            id = tables::quote("id"),
        );
        let params = [(":id".to_string(), Value::Text(id.to_string()))];
        self.find_one(&clause, &params)
    }

    /// Gets every root whose external identifier is in the set.
    pub fn get_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<R>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut params = Vec::with_capacity(ids.len());
        let mut placeholders = Vec::with_capacity(ids.len());
        for (position, id) in ids.iter().enumerate() {
            let name = format!(":id{position}");
            placeholders.push(name.clone());
            params.push((name, Value::Text(id.to_string())));
        }
        let clause = format!(
            "{root}.{id} IN ({list})",
            root = tables::quote("root"),
            id = tables::quote("id"),
            list = placeholders.join(", "),
        );
        self.find_many(&clause, &params)
    }

    /// Resolves one root by a predicate over the root table (aliased
    /// `"root"`) and loads it with all of its children.
    ///
    /// The clause is repository-authored SQL text; every scalar it compares
    /// against must arrive through `params`.
    pub fn find_one(&self, where_clause: &str, params: &[(String, Value)]) -> StoreResult<Option<R>> {
        ensure_arg("where_clause", where_clause)?;
        let ctx = self.ctx();

        let Some(key) = self.resolve_key(&ctx, where_clause, params)? else {
            return Ok(None);
        };
        let Some(mut root) = self.load_root(&ctx, key)? else {
            return Ok(None);
        };
        for field in R::child_fields() {
            field.load(&ctx, &mut root, key)?;
        }
        Ok(Some(root))
    }

    /// Resolves every root matching a predicate and loads each with exactly
    /// its own children.
    pub fn find_many(&self, where_clause: &str, params: &[(String, Value)]) -> StoreResult<Vec<R>> {
        ensure_arg("where_clause", where_clause)?;
        let ctx = self.ctx();

        let keys = self.resolve_keys(&ctx, where_clause, params)?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut roots = self.load_roots(&ctx, &keys)?;
        for field in R::child_fields() {
            field.load_partitioned(&ctx, &mut roots, &keys)?;
        }
        Ok(roots)
    }

    /// Inserts the root and all of its children atomically.
    ///
    /// The store-assigned surrogate key is written back onto the item and
    /// stamped onto every child's parent key.
    pub fn add(&mut self, item: &mut R) -> StoreResult<()> {
        let started_at = Instant::now();
        let descriptor = self.cache.descriptor::<R>();
        let table = tables::quote(&self.root_table);

        let mut guard = TxnGuard::begin(&mut *self.conn)?;
        let key;
        {
            let ctx = StatementCtx {
                conn: &*guard,
                tables: &self.tables,
                cache: &self.cache,
            };
            let sql = format!(
                "INSERT INTO {table} ({columns}) VALUES ({values});",
                columns = descriptor.identifiers(),
                values = descriptor.parameters(),
            );
            let params = root_params(&*descriptor, item, None);
            ctx.conn.execute(&sql, &named_refs(&params)[..])?;

            key = ctx.conn.last_insert_rowid();
            if key <= 0 {
                return Err(StoreError::Integrity { key });
            }
            item.set_key(key);

            for field in R::child_fields() {
                field.stamp_parent(item, key);
                field.insert_all(&ctx, item, key)?;
            }
        }
        guard.mark_commit();
        guard.finish()?;

        info!(
            "event=aggregate_add module=repo status=ok table={} id={} key={} duration_ms={}",
            self.root_table,
            item.external_id(),
            key,
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Updates the root row and reconciles every child collection, all
    /// inside one transaction.
    pub fn update(&mut self, item: &R) -> StoreResult<()> {
        let started_at = Instant::now();
        let descriptor = self.cache.descriptor::<R>();
        let table = tables::quote(&self.root_table);

        let mut guard = TxnGuard::begin(&mut *self.conn)?;
        {
            let ctx = StatementCtx {
                conn: &*guard,
                tables: &self.tables,
                cache: &self.cache,
            };
            let sql = format!(
                "UPDATE {table} SET {assignments} WHERE {key} = :key;",
                assignments = descriptor.assignments(),
                key = tables::quote("key"),
            );
            let params = root_params(&*descriptor, item, Some(item.key()));
            ctx.conn.execute(&sql, &named_refs(&params)[..])?;

            for field in R::child_fields() {
                debug!(
                    "event=children_sync module=repo field={} parent_key={}",
                    field.name(),
                    item.key()
                );
                field.sync(&ctx, item, item.key())?;
            }
        }
        guard.mark_commit();
        guard.finish()?;

        info!(
            "event=aggregate_update module=repo status=ok table={} id={} key={} duration_ms={}",
            self.root_table,
            item.external_id(),
            item.key(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Deletes the root row and every child row belonging to it.
    ///
    /// Children go first so the statement order holds even without
    /// foreign-key enforcement at the schema level.
    pub fn remove(&mut self, item: &R) -> StoreResult<()> {
        let started_at = Instant::now();
        let table = tables::quote(&self.root_table);

        let mut guard = TxnGuard::begin(&mut *self.conn)?;
        {
            let ctx = StatementCtx {
                conn: &*guard,
                tables: &self.tables,
                cache: &self.cache,
            };
            for field in R::child_fields() {
                field.delete_all(&ctx, item.key())?;
            }
            let sql = format!(
                "DELETE FROM {table} WHERE {key} = :key;",
                key = tables::quote("key"),
            );
            let params = [(":key".to_string(), Value::Integer(item.key()))];
            ctx.conn.execute(&sql, &named_refs(&params)[..])?;
        }
        guard.mark_commit();
        guard.finish()?;

        info!(
            "event=aggregate_remove module=repo status=ok table={} key={} duration_ms={}",
            self.root_table,
            item.key(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    fn resolve_key(
        &self,
        ctx: &StatementCtx<'_>,
        where_clause: &str,
        params: &[(String, Value)],
    ) -> StoreResult<Option<i64>> {
        let sql = format!(
            "SELECT {root}.{key} FROM {table} AS {root} WHERE {where_clause};",
            root = tables::quote("root"),
            key = tables::quote("key"),
            table = self.quoted_root_table(),
        );
        let mut stmt = ctx.conn.prepare(&sql)?;
        let key = stmt
            .query_row(&named_refs(params)[..], |row| row.get::<_, i64>(0))
            .optional()?;
        Ok(key)
    }

    fn resolve_keys(
        &self,
        ctx: &StatementCtx<'_>,
        where_clause: &str,
        params: &[(String, Value)],
    ) -> StoreResult<Vec<i64>> {
        let sql = format!(
            "SELECT {root}.{key} FROM {table} AS {root} WHERE {where_clause};",
            root = tables::quote("root"),
            key = tables::quote("key"),
            table = self.quoted_root_table(),
        );
        let mut stmt = ctx.conn.prepare(&sql)?;
        let mut rows = stmt.query(&named_refs(params)[..])?;
        let mut keys = Vec::new();
        while let Some(row) = rows.next()? {
            keys.push(row.get::<_, i64>(0)?);
        }
        Ok(keys)
    }

    fn load_root(&self, ctx: &StatementCtx<'_>, key: i64) -> StoreResult<Option<R>> {
        let descriptor = self.cache.descriptor::<R>();
        let sql = format!(
            "SELECT {key_col}, {columns} FROM {table} WHERE {key_col} = :key;",
            key_col = tables::quote("key"),
            columns = descriptor.identifiers(),
            table = self.quoted_root_table(),
        );
        let params = [(":key".to_string(), Value::Integer(key))];
        let mut stmt = ctx.conn.prepare(&sql)?;
        let mut rows = stmt.query(&named_refs(&params)[..])?;
        match rows.next()? {
            Some(row) => Ok(Some(R::from_row(row)?)),
            None => Ok(None),
        }
    }

    fn load_roots(&self, ctx: &StatementCtx<'_>, keys: &[i64]) -> StoreResult<Vec<R>> {
        let descriptor = self.cache.descriptor::<R>();
        let placeholders = (1..=keys.len())
            .map(|position| format!("?{position}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {key_col}, {columns} FROM {table} WHERE {key_col} IN ({placeholders}) \
             ORDER BY {key_col} ASC;",
            key_col = tables::quote("key"),
            columns = descriptor.identifiers(),
            table = self.quoted_root_table(),
        );
        let mut stmt = ctx.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(keys.iter().copied()))?;
        let mut roots = Vec::new();
        while let Some(row) = rows.next()? {
            roots.push(R::from_row(row)?);
        }
        Ok(roots)
    }
}

/// Named parameters for the root row: the declared columns in descriptor
/// order, plus `:key` when the statement filters by it.
fn root_params<R: AggregateRoot>(
    descriptor: &ShapeDescriptor,
    item: &R,
    key: Option<i64>,
) -> Vec<(String, Value)> {
    let mut params = Vec::with_capacity(descriptor.columns().len() + 1);
    for column in descriptor.columns() {
        params.push((format!(":{column}"), item.column_value(column)));
    }
    if let Some(key) = key {
        params.push((":key".to_string(), Value::Integer(key)));
    }
    params
}
