//! Shared fixtures for repository integration tests.
//!
//! Schema provisioning is a deployment concern, so the tests own their
//! default DDL here.

#![allow(dead_code)]

use roster_core::db::open_db_in_memory;
use rusqlite::Connection;

/// Opens an in-memory store with the default account/group schema applied.
pub fn open_store() -> Connection {
    let conn = open_db_in_memory().expect("in-memory database should open");
    conn.execute_batch(include_str!("schema.sql"))
        .expect("default schema should apply");
    conn
}

/// Counts child rows belonging to one parent key.
pub fn count_children(conn: &Connection, table: &str, parent_key: i64) -> i64 {
    conn.query_row(
        &format!("SELECT COUNT(*) FROM \"{table}\" WHERE \"parent_key\" = ?1;"),
        [parent_key],
        |row| row.get(0),
    )
    .expect("count query should succeed")
}

/// Counts root rows with one surrogate key.
pub fn count_roots(conn: &Connection, table: &str, key: i64) -> i64 {
    conn.query_row(
        &format!("SELECT COUNT(*) FROM \"{table}\" WHERE \"key\" = ?1;"),
        [key],
        |row| row.get(0),
    )
    .expect("count query should succeed")
}
