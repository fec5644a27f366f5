//! Core identity metadata (`core_metadata`).

use crate::repo::RepoResult;
use rusqlite::{params, Connection, OptionalExtension};

pub const KEY_VARIANT: &str = "variant";
pub const KEY_NAME: &str = "name";
pub const KEY_SYMBOL: &str = "symbol";
pub const KEY_ADDRESS: &str = "address";
pub const KEY_OWNER: &str = "owner";

/// SQLite-backed key/value metadata of one core.
pub struct SqliteMetadataRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMetadataRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, key: &str) -> RepoResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM core_metadata WHERE key = ?1;",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO core_metadata (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value;",
            params![key, value],
        )?;
        Ok(())
    }
}
