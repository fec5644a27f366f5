//! Invocation envelopes over SQLite savepoints.
//!
//! # Responsibility
//! - Make every external entry point all-or-nothing across registry,
//!   accounting, extension state, native value and the event log.
//!
//! # Invariants
//! - An envelope is released only after its body returned `Ok`.
//! - Errors and panics roll the savepoint back before it is released.
//! - Envelopes nest; an inner release folds into the outer savepoint.

use log::{debug, error};
use rusqlite::Connection;
use uuid::Uuid;

/// One open savepoint.
pub(crate) struct Envelope<'conn> {
    conn: &'conn Connection,
    id: Uuid,
    name: String,
    open: bool,
}

impl<'conn> Envelope<'conn> {
    pub(crate) fn open(conn: &'conn Connection) -> rusqlite::Result<Self> {
        let id = Uuid::new_v4();
        let name = format!("inv_{}", id.simple());
        conn.execute_batch(&format!("SAVEPOINT {name};"))?;
        Ok(Self {
            conn,
            id,
            name,
            open: true,
        })
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn release(mut self) -> rusqlite::Result<()> {
        self.open = false;
        self.conn
            .execute_batch(&format!("RELEASE SAVEPOINT {};", self.name))
    }

    pub(crate) fn rollback(mut self) -> rusqlite::Result<()> {
        self.open = false;
        self.rollback_inner()
    }

    fn rollback_inner(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(&format!(
            "ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name};",
            name = self.name
        ))
    }
}

impl Drop for Envelope<'_> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        if let Err(err) = self.rollback_inner() {
            error!(
                "event=envelope_unwind module=core status=error invocation={} error={err}",
                self.id
            );
        }
    }
}

/// Runs `body` inside an envelope that commits on `Ok` and rolls back on `Err`.
pub(crate) fn run_atomic<T, E>(
    conn: &Connection,
    operation: &str,
    body: impl FnOnce() -> Result<T, E>,
) -> Result<T, E>
where
    E: From<rusqlite::Error>,
{
    let envelope = Envelope::open(conn)?;
    debug!(
        "event=envelope_open module=core status=start op={operation} invocation={}",
        envelope.id()
    );
    match body() {
        Ok(value) => {
            envelope.release()?;
            Ok(value)
        }
        Err(err) => {
            let id = envelope.id();
            envelope.rollback()?;
            debug!("event=envelope_rollback module=core status=ok op={operation} invocation={id}");
            Err(err)
        }
    }
}

/// Runs `body` inside an envelope that is always rolled back.
pub(crate) fn run_discarding<T, E>(
    conn: &Connection,
    body: impl FnOnce() -> Result<T, E>,
) -> Result<T, E>
where
    E: From<rusqlite::Error>,
{
    let envelope = Envelope::open(conn)?;
    let outcome = body();
    envelope.rollback()?;
    outcome
}
