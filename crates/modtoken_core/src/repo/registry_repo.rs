//! Extension registry tables (`registry_*`).
//!
//! # Responsibility
//! - Persist installed extensions in install order.
//! - Persist event and entrypoint slot bindings.
//!
//! # Invariants
//! - Slot rows reference an installed extension row and cascade with it.
//! - This repository never decides conflicts; callers check slots first and
//!   the primary keys reject anything they miss.

use crate::model::address::Address;
use crate::model::event::{EventSet, HandlerMode, LifecycleEvent, Selector};
use crate::model::record::{EntrypointEntry, InstalledExtension, RegistryEntry};
use crate::repo::{
    bool_to_int, parse_address, parse_bool, parse_selector, RepoError, RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;

/// SQLite-backed registry storage.
pub struct SqliteRegistryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRegistryRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn is_installed(&self, address: &Address) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM registry_extensions WHERE address = ?1);",
            [address.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    /// Appends one extension row at the end of install order.
    pub fn insert_extension(&self, address: &Address, name: &str, version: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO registry_extensions (address, name, version) VALUES (?1, ?2, ?3);",
            params![address.to_string(), name, version],
        )?;
        Ok(())
    }

    pub fn bind_event(
        &self,
        event: LifecycleEvent,
        handler: &Address,
        declared_mode: HandlerMode,
    ) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO registry_events (event, handler, declared_mode) VALUES (?1, ?2, ?3);",
            params![event.to_string(), handler.to_string(), declared_mode.as_str()],
        )?;
        Ok(())
    }

    pub fn bind_entrypoint(
        &self,
        selector: Selector,
        handler: &Address,
        name: &str,
        restricted: bool,
    ) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO registry_entrypoints (selector, handler, name, restricted)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                selector.to_string(),
                handler.to_string(),
                name,
                bool_to_int(restricted)
            ],
        )?;
        Ok(())
    }

    /// Removes one extension row; its slot rows cascade.
    ///
    /// Returns `false` when no row matched.
    pub fn remove_extension(&self, address: &Address) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM registry_extensions WHERE address = ?1;",
            [address.to_string()],
        )?;
        Ok(changed > 0)
    }

    pub fn event_entry(&self, event: LifecycleEvent) -> RepoResult<Option<RegistryEntry>> {
        let row = self
            .conn
            .query_row(
                "SELECT handler, declared_mode FROM registry_events WHERE event = ?1;",
                [event.to_string()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((handler, mode)) = row else {
            return Ok(None);
        };
        let declared_mode = HandlerMode::parse(&mode).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid handler mode `{mode}` in registry_events.declared_mode"
            ))
        })?;
        Ok(Some(RegistryEntry {
            event,
            handler: parse_address(&handler, "registry_events.handler")?,
            declared_mode,
        }))
    }

    pub fn entrypoint_entry(&self, selector: Selector) -> RepoResult<Option<EntrypointEntry>> {
        let row = self
            .conn
            .query_row(
                "SELECT handler, name, restricted FROM registry_entrypoints WHERE selector = ?1;",
                [selector.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((handler, name, restricted)) = row else {
            return Ok(None);
        };
        Ok(Some(EntrypointEntry {
            selector,
            handler: parse_address(&handler, "registry_entrypoints.handler")?,
            name,
            restricted: parse_bool(restricted, "registry_entrypoints.restricted")?,
        }))
    }

    pub fn events_of(&self, address: &Address) -> RepoResult<EventSet> {
        let mut stmt = self
            .conn
            .prepare("SELECT event FROM registry_events WHERE handler = ?1;")?;
        let mut rows = stmt.query([address.to_string()])?;
        let mut events = EventSet::new();
        while let Some(row) = rows.next()? {
            let raw: String = row.get(0)?;
            events.insert(parse_selector(&raw, "registry_events.event")?);
        }
        Ok(events)
    }

    pub fn entrypoints_of(&self, address: &Address) -> RepoResult<BTreeSet<Selector>> {
        let mut stmt = self
            .conn
            .prepare("SELECT selector FROM registry_entrypoints WHERE handler = ?1;")?;
        let mut rows = stmt.query([address.to_string()])?;
        let mut selectors = BTreeSet::new();
        while let Some(row) = rows.next()? {
            let raw: String = row.get(0)?;
            selectors.insert(parse_selector(&raw, "registry_entrypoints.selector")?);
        }
        Ok(selectors)
    }

    pub fn get_installed(&self, address: &Address) -> RepoResult<Option<InstalledExtension>> {
        let row = self
            .conn
            .query_row(
                "SELECT name, version FROM registry_extensions WHERE address = ?1;",
                [address.to_string()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        match row {
            Some((name, version)) => Ok(Some(self.snapshot(*address, name, version)?)),
            None => Ok(None),
        }
    }

    /// Lists installed extensions in install order.
    pub fn list_installed(&self) -> RepoResult<Vec<InstalledExtension>> {
        let mut stmt = self
            .conn
            .prepare("SELECT address, name, version FROM registry_extensions ORDER BY seq ASC;")?;
        let mut rows = stmt.query([])?;
        let mut headers = Vec::new();
        while let Some(row) = rows.next()? {
            let raw: String = row.get(0)?;
            headers.push((
                parse_address(&raw, "registry_extensions.address")?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ));
        }

        headers
            .into_iter()
            .map(|(address, name, version)| self.snapshot(address, name, version))
            .collect()
    }

    fn snapshot(
        &self,
        address: Address,
        name: String,
        version: String,
    ) -> RepoResult<InstalledExtension> {
        Ok(InstalledExtension {
            address,
            name,
            version,
            events: self.events_of(&address)?,
            entrypoints: self.entrypoints_of(&address)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteRegistryRepository;
    use crate::db::open_db_in_memory;
    use crate::model::address::Address;
    use crate::model::event::{HandlerMode, Selector};

    #[test]
    fn lists_extensions_in_install_order() {
        let conn = open_db_in_memory().expect("open db");
        let repo = SqliteRegistryRepository::new(&conn);
        let names = ["zeta", "alpha", "mid"];
        for name in names {
            repo.insert_extension(&Address::derive(name), name, "1.0.0")
                .expect("insert extension");
        }

        let listed: Vec<String> = repo
            .list_installed()
            .expect("list")
            .into_iter()
            .map(|ext| ext.name)
            .collect();
        assert_eq!(listed, names);
    }

    #[test]
    fn primary_key_rejects_second_handler_for_event() {
        let conn = open_db_in_memory().expect("open db");
        let repo = SqliteRegistryRepository::new(&conn);
        let first = Address::derive("first");
        let second = Address::derive("second");
        let event = Selector::from_signature("beforeThing()");
        repo.insert_extension(&first, "first", "1.0.0").expect("insert first");
        repo.insert_extension(&second, "second", "1.0.0").expect("insert second");

        repo.bind_event(event, &first, HandlerMode::Optional)
            .expect("first binding");
        assert!(repo.bind_event(event, &second, HandlerMode::Optional).is_err());
        let entry = repo.event_entry(event).expect("lookup").expect("bound");
        assert_eq!(entry.handler, first);
    }

    #[test]
    fn removing_extension_cascades_slot_rows() {
        let conn = open_db_in_memory().expect("open db");
        let repo = SqliteRegistryRepository::new(&conn);
        let ext = Address::derive("ext");
        let event = Selector::from_signature("beforeThing()");
        let entrypoint = Selector::from_signature("setThing(uint256)");
        repo.insert_extension(&ext, "ext", "1.0.0").expect("insert");
        repo.bind_event(event, &ext, HandlerMode::Required).expect("bind event");
        repo.bind_entrypoint(entrypoint, &ext, "setThing", true)
            .expect("bind entrypoint");

        assert!(repo.remove_extension(&ext).expect("remove"));
        assert!(repo.event_entry(event).expect("lookup").is_none());
        assert!(repo.entrypoint_entry(entrypoint).expect("lookup").is_none());
        assert!(!repo.remove_extension(&ext).expect("second remove"));
    }
}
