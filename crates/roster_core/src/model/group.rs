//! Group aggregate model.

use crate::model::parse_uuid;
use crate::repo::shape::{AggregateRoot, ChildBinding, ChildFieldAccess, ChildRecord, Record};
use crate::repo::StoreResult;
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Group aggregate root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Store-assigned surrogate key; `0` until persisted.
    #[serde(default)]
    pub key: i64,
    /// Stable external identifier.
    pub id: Uuid,
    pub tenant: String,
    pub name: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub last_updated_at: i64,
    pub children: Vec<GroupChild>,
}

impl Group {
    /// Creates an unpersisted group with a generated external id.
    pub fn new(tenant: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant: tenant.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Record for Group {
    const COLUMNS: &'static [&'static str] =
        &["id", "tenant", "name", "created_at", "last_updated_at"];

    fn key(&self) -> i64 {
        self.key
    }

    fn set_key(&mut self, key: i64) {
        self.key = key;
    }

    fn column_value(&self, column: &str) -> Value {
        match column {
            "id" => Value::Text(self.id.to_string()),
            "tenant" => Value::Text(self.tenant.clone()),
            "name" => Value::Text(self.name.clone()),
            "created_at" => Value::Integer(self.created_at),
            "last_updated_at" => Value::Integer(self.last_updated_at),
            _ => Value::Null,
        }
    }

    fn from_row(row: &Row<'_>) -> StoreResult<Self> {
        let id_text: String = row.get("id")?;
        Ok(Self {
            key: row.get("key")?,
            id: parse_uuid(&id_text, "groups.id")?,
            tenant: row.get("tenant")?,
            name: row.get("name")?,
            created_at: row.get("created_at")?,
            last_updated_at: row.get("last_updated_at")?,
            children: Vec::new(),
        })
    }
}

impl AggregateRoot for Group {
    const DEFAULT_ROOT_TABLE: &'static str = "groups";

    fn external_id(&self) -> Uuid {
        self.id
    }

    fn child_fields() -> &'static [&'static dyn ChildFieldAccess<Self>] {
        static CHILDREN: ChildBinding<Group, GroupChild> = ChildBinding {
            field: "children",
            get: |group: &Group| &group.children,
            get_mut: |group: &mut Group| &mut group.children,
        };
        static FIELDS: [&'static dyn ChildFieldAccess<Group>; 1] = [&CHILDREN];
        &FIELDS
    }
}

/// Reference to a member group owned by a parent group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupChild {
    #[serde(default)]
    pub key: i64,
    #[serde(default)]
    pub parent_key: i64,
    /// External id of the referenced group.
    pub child_group_id: Uuid,
}

impl GroupChild {
    pub fn new(child_group_id: Uuid) -> Self {
        Self {
            child_group_id,
            ..Self::default()
        }
    }
}

impl Record for GroupChild {
    const COLUMNS: &'static [&'static str] = &["child_group_id"];

    fn key(&self) -> i64 {
        self.key
    }

    fn set_key(&mut self, key: i64) {
        self.key = key;
    }

    fn column_value(&self, column: &str) -> Value {
        match column {
            "child_group_id" => Value::Text(self.child_group_id.to_string()),
            _ => Value::Null,
        }
    }

    fn from_row(row: &Row<'_>) -> StoreResult<Self> {
        let child_id_text: String = row.get("child_group_id")?;
        Ok(Self {
            key: row.get("key")?,
            parent_key: row.get("parent_key")?,
            child_group_id: parse_uuid(&child_id_text, "group_children.child_group_id")?,
        })
    }
}

impl ChildRecord for GroupChild {
    const DEFAULT_TABLE: &'static str = "group_children";

    fn parent_key(&self) -> i64 {
        self.parent_key
    }

    fn set_parent_key(&mut self, parent_key: i64) {
        self.parent_key = parent_key;
    }
}
