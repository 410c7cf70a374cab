//! Child-collection statements, including the diff-based synchronizer.
//!
//! # Responsibility
//! - Build and execute every statement that touches a child table: select
//!   by parent, bulk insert, delete, and the reconciliation plan.
//!
//! # Invariants
//! - Reconciliation never reads existing rows back into memory: one
//!   delete-not-in statement drops removed members, one conditional upsert
//!   per member inserts or updates the rest.
//! - The delete executes strictly before the upsert.
//! - Identity is surrogate-key identity; content equality is never
//!   consulted.

use crate::repo::metadata::{ShapeDescriptor, ShapeToken};
use crate::repo::shape::{ChildRecord, StatementCtx};
use crate::repo::tables;
use crate::repo::{named_refs, StoreResult};
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use std::collections::HashMap;

/// Joins fixed lead fragments with a shape's cached fragment, skipping the
/// shape fragment when the shape has no scalar columns.
fn join_fragments(lead: &[&str], shape_fragment: &str) -> String {
    let mut parts: Vec<String> = lead.iter().map(|part| (*part).to_string()).collect();
    if !shape_fragment.is_empty() {
        parts.push(shape_fragment.to_string());
    }
    parts.join(", ")
}

fn quoted_table<C: ChildRecord>(ctx: &StatementCtx<'_>) -> StoreResult<String> {
    Ok(tables::quote(ctx.tables.table_for(ShapeToken::of::<C>())?))
}

/// Named parameters for one child row: optional `:key`, then `:parent_key`,
/// then the declared columns in descriptor order.
fn child_params<C: ChildRecord>(
    descriptor: &ShapeDescriptor,
    child: &C,
    parent_key: i64,
    include_key: bool,
) -> Vec<(String, Value)> {
    let mut params = Vec::with_capacity(descriptor.columns().len() + 2);
    if include_key {
        params.push((":key".to_string(), Value::Integer(child.key())));
    }
    params.push((":parent_key".to_string(), Value::Integer(parent_key)));
    for column in descriptor.columns() {
        params.push((format!(":{column}"), child.column_value(column)));
    }
    params
}

/// Selects all children of one parent, ordered by surrogate key.
pub(crate) fn select_children<C: ChildRecord>(
    ctx: &StatementCtx<'_>,
    parent_key: i64,
) -> StoreResult<Vec<C>> {
    let descriptor = ctx.cache.descriptor::<C>();
    let table = quoted_table::<C>(ctx)?;
    let key_col = tables::quote("key");
    let parent_col = tables::quote("parent_key");
    let select_list = join_fragments(
        &[key_col.as_str(), parent_col.as_str()],
        descriptor.identifiers(),
    );
    let sql = format!(
        "SELECT {select_list} FROM {table} WHERE {parent_col} = :parent_key ORDER BY {key_col} ASC;",
    );

    let mut stmt = ctx.conn.prepare(&sql)?;
    let params = [(":parent_key".to_string(), Value::Integer(parent_key))];
    let mut rows = stmt.query(&named_refs(&params)[..])?;
    let mut children = Vec::new();
    while let Some(row) = rows.next()? {
        children.push(C::from_row(row)?);
    }
    Ok(children)
}

/// Selects children for a set of parents in one statement and partitions
/// the rows by parent key.
pub(crate) fn select_children_by_parent<C: ChildRecord>(
    ctx: &StatementCtx<'_>,
    parent_keys: &[i64],
) -> StoreResult<HashMap<i64, Vec<C>>> {
    let mut by_parent: HashMap<i64, Vec<C>> = HashMap::new();
    if parent_keys.is_empty() {
        return Ok(by_parent);
    }

    let descriptor = ctx.cache.descriptor::<C>();
    let table = quoted_table::<C>(ctx)?;
    let key_col = tables::quote("key");
    let parent_col = tables::quote("parent_key");
    let select_list = join_fragments(
        &[key_col.as_str(), parent_col.as_str()],
        descriptor.identifiers(),
    );
    let placeholders = (1..=parent_keys.len())
        .map(|position| format!("?{position}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT {select_list} FROM {table} WHERE {parent_col} IN ({placeholders}) ORDER BY {key_col} ASC;",
    );

    let mut stmt = ctx.conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(parent_keys.iter().copied()))?;
    while let Some(row) = rows.next()? {
        let child = C::from_row(row)?;
        by_parent.entry(child.parent_key()).or_default().push(child);
    }
    Ok(by_parent)
}

/// Bulk-inserts children under the given parent key. Surrogate keys are
/// store-assigned; any key already on a member is ignored.
pub(crate) fn insert_children<C: ChildRecord>(
    ctx: &StatementCtx<'_>,
    children: &[C],
    parent_key: i64,
) -> StoreResult<()> {
    if children.is_empty() {
        return Ok(());
    }

    let descriptor = ctx.cache.descriptor::<C>();
    let table = quoted_table::<C>(ctx)?;
    let parent_col = tables::quote("parent_key");
    let columns = join_fragments(&[parent_col.as_str()], descriptor.identifiers());
    let values = join_fragments(&[":parent_key"], descriptor.parameters());
    let sql = format!("INSERT INTO {table} ({columns}) VALUES ({values});");

    let mut stmt = ctx.conn.prepare(&sql)?;
    for child in children {
        let params = child_params(&descriptor, child, parent_key, false);
        stmt.execute(&named_refs(&params)[..])?;
    }
    Ok(())
}

/// Deletes every row belonging to the parent.
pub(crate) fn delete_children_of<C: ChildRecord>(
    ctx: &StatementCtx<'_>,
    parent_key: i64,
) -> StoreResult<()> {
    let table = quoted_table::<C>(ctx)?;
    let sql = format!(
        "DELETE FROM {table} WHERE {parent} = :parent_key;",
        parent = tables::quote("parent_key"),
    );
    let params = [(":parent_key".to_string(), Value::Integer(parent_key))];
    ctx.conn.execute(&sql, &named_refs(&params)[..])?;
    Ok(())
}

/// Reconciles the persisted rows of one parent with the in-memory
/// collection.
///
/// Empty collection: delete everything for the parent. Otherwise: delete
/// rows whose key is outside the retained set, then upsert every member --
/// a member without a key (0) takes the insert branch and receives a
/// store-assigned key, a member with a key takes the update branch, keeps
/// its identity, and has its parent key reasserted.
pub(crate) fn sync_children<C: ChildRecord>(
    ctx: &StatementCtx<'_>,
    children: &[C],
    parent_key: i64,
) -> StoreResult<()> {
    if children.is_empty() {
        return delete_children_of::<C>(ctx, parent_key);
    }

    let descriptor = ctx.cache.descriptor::<C>();
    let table = quoted_table::<C>(ctx)?;
    let key_col = tables::quote("key");
    let parent_col = tables::quote("parent_key");

    // Members the caller kept; everything else for this parent goes away.
    let retained: Vec<i64> = children
        .iter()
        .map(C::key)
        .filter(|key| *key != 0)
        .collect();

    if retained.is_empty() {
        let sql = format!("DELETE FROM {table} WHERE {parent_col} = ?1;");
        ctx.conn
            .execute(&sql, params_from_iter(std::iter::once(parent_key)))?;
    } else {
        let placeholders = (2..=retained.len() + 1)
            .map(|position| format!("?{position}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "DELETE FROM {table} WHERE {parent_col} = ?1 AND {key_col} NOT IN ({placeholders});",
        );
        ctx.conn.execute(
            &sql,
            params_from_iter(std::iter::once(parent_key).chain(retained.iter().copied())),
        )?;
    }

    // nullif turns the unset key into NULL so the store assigns one; a
    // retained key hits the conflict branch and updates in place.
    let columns = join_fragments(
        &[key_col.as_str(), parent_col.as_str()],
        descriptor.identifiers(),
    );
    let values = join_fragments(&["nullif(:key, 0)", ":parent_key"], descriptor.parameters());
    let reassert_parent = format!("{parent_col} = excluded.{parent_col}");
    let conflict_set = join_fragments(
        &[reassert_parent.as_str()],
        descriptor.upsert_assignments(),
    );
    let sql = format!(
        "INSERT INTO {table} ({columns}) VALUES ({values}) \
         ON CONFLICT({key_col}) DO UPDATE SET {conflict_set};",
    );

    let mut stmt = ctx.conn.prepare(&sql)?;
    for child in children {
        let params = child_params(&descriptor, child, parent_key, true);
        stmt.execute(&named_refs(&params)[..])?;
    }
    Ok(())
}
