//! Group repository: lookups and persistence for the group aggregate.
//!
//! # Responsibility
//! - Expose group-shaped entry points over the generic engine.
//!
//! # Invariants
//! - Every required string argument is validated before any store access.

use crate::model::group::{Group, GroupChild};
use crate::repo::engine::{AggregateRepository, RepositoryConfig};
use crate::repo::tables::quote;
use crate::repo::{ensure_arg, StoreResult};
use rusqlite::types::Value;
use rusqlite::Connection;
use uuid::Uuid;

/// SQLite-backed repository for [`Group`] aggregates.
pub struct GroupRepository<'conn> {
    engine: AggregateRepository<'conn, Group>,
}

impl<'conn> GroupRepository<'conn> {
    /// Constructs a repository with default table bindings.
    pub fn new(conn: &'conn mut Connection) -> StoreResult<Self> {
        Ok(Self {
            engine: AggregateRepository::new(conn)?,
        })
    }

    /// Constructs a repository, applying table-name overrides.
    pub fn with_config(conn: &'conn mut Connection, config: RepositoryConfig) -> StoreResult<Self> {
        Ok(Self {
            engine: AggregateRepository::with_config(conn, config)?,
        })
    }

    /// Allocates a new, unpersisted group with an empty child collection.
    pub fn create(&self) -> Group {
        self.engine.create()
    }

    /// Gets a group by its external id.
    pub fn get_by_id(&self, id: Uuid) -> StoreResult<Option<Group>> {
        self.engine.get_by_id(id)
    }

    /// Gets every group whose external id is in the set. Order of the
    /// result is unrelated to the order of `ids`.
    pub fn get_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Group>> {
        self.engine.get_by_ids(ids)
    }

    /// Gets a group by tenant and name.
    pub fn get_by_name(&self, tenant: &str, name: &str) -> StoreResult<Option<Group>> {
        ensure_arg("tenant", tenant)?;
        ensure_arg("name", name)?;
        let clause = format!(
            "{root}.{tenant} = :tenant AND {root}.{name} = :name",
            root = quote("root"),
            tenant = quote("tenant"),
            name = quote("name"),
        );
        let params = [
            (":tenant".to_string(), Value::Text(tenant.to_string())),
            (":name".to_string(), Value::Text(name.to_string())),
        ];
        self.engine.find_one(&clause, &params)
    }

    /// Gets every group holding a membership reference to the given group.
    pub fn get_by_child_id(&self, child_group_id: Uuid) -> StoreResult<Vec<Group>> {
        let children = self.engine.child_table::<GroupChild>()?;
        let clause = format!(
            "EXISTS (\
             SELECT 1 FROM {children} AS {child} \
             WHERE {child}.{parent_key} = {root}.{key} \
               AND {child}.{child_group_id} = :child_group_id)",
            root = quote("root"),
            child = quote("child"),
            parent_key = quote("parent_key"),
            key = quote("key"),
            child_group_id = quote("child_group_id"),
        );
        let params = [(
            ":child_group_id".to_string(),
            Value::Text(child_group_id.to_string()),
        )];
        self.engine.find_many(&clause, &params)
    }

    /// Inserts the group and its children atomically; assigns the key.
    pub fn add(&mut self, group: &mut Group) -> StoreResult<()> {
        self.engine.add(group)
    }

    /// Updates the group row and reconciles the child collection.
    pub fn update(&mut self, group: &Group) -> StoreResult<()> {
        self.engine.update(group)
    }

    /// Deletes the group and all of its children.
    pub fn remove(&mut self, group: &Group) -> StoreResult<()> {
        self.engine.remove(group)
    }
}
