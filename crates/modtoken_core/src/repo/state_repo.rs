//! Per-extension key/value state (`ext_state`).
//!
//! # Invariants
//! - Rows are keyed by `(extension, key)`; one extension can never read or
//!   write another extension's rows through this API.
//! - State is not removed on uninstall.

use crate::model::address::Address;
use crate::repo::RepoResult;
use rusqlite::{params, Connection, OptionalExtension};

/// SQLite-backed extension state store.
pub struct SqliteStateRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStateRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, extension: &Address, key: &[u8]) -> RepoResult<Option<Vec<u8>>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM ext_state WHERE extension = ?1 AND key = ?2;",
                params![extension.to_string(), key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn put(&self, extension: &Address, key: &[u8], value: &[u8]) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO ext_state (extension, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT (extension, key) DO UPDATE SET value = excluded.value;",
            params![extension.to_string(), key, value],
        )?;
        Ok(())
    }

    pub fn remove(&self, extension: &Address, key: &[u8]) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM ext_state WHERE extension = ?1 AND key = ?2;",
            params![extension.to_string(), key],
        )?;
        Ok(changed > 0)
    }
}
