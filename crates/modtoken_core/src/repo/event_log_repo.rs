//! Append-only notification log (`core_event_log`).

use crate::model::record::CoreEvent;
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection};

/// SQLite-backed core event log.
pub struct SqliteEventLogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEventLogRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn append(&self, event: &CoreEvent) -> RepoResult<()> {
        let payload = serde_json::to_string(event)
            .map_err(|err| RepoError::InvalidData(format!("unencodable core event: {err}")))?;
        self.conn.execute(
            "INSERT INTO core_event_log (kind, payload) VALUES (?1, ?2);",
            params![event.kind(), payload],
        )?;
        Ok(())
    }

    /// Lists every notification in emission order.
    pub fn list(&self) -> RepoResult<Vec<CoreEvent>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM core_event_log ORDER BY seq ASC;")?;
        let mut rows = stmt.query([])?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            let payload: String = row.get(0)?;
            let event = serde_json::from_str(&payload).map_err(|err| {
                RepoError::InvalidData(format!("invalid payload in core_event_log.payload: {err}"))
            })?;
            events.push(event);
        }
        Ok(events)
    }

    pub fn count(&self) -> RepoResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM core_event_log;", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}
