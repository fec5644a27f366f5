//! Extension registry over the `registry_*` tables.
//!
//! # Responsibility
//! - Own the event → handler table, the selector → handler table and the
//!   install-ordered list of installed extensions.
//! - Decide whether a descriptor may be bound, then bind or unbind it as a
//!   whole.
//!
//! # Invariants
//! - At most one handler per event and per entrypoint selector.
//! - Slots are never displaced; a taken slot needs an explicit uninstall.
//! - An extension is bound for its whole declaration or not at all; callers
//!   run `bind`/`unbind` inside an invocation envelope.

use crate::extension::descriptor::ExtensionDescriptor;
use crate::extension::error::{CoreError, CoreResult};
use crate::model::address::Address;
use crate::model::event::{EventCatalog, EventSet, LifecycleEvent, Selector};
use crate::model::record::{EntrypointEntry, InstalledExtension, RegistryEntry};
use crate::repo::registry_repo::SqliteRegistryRepository;
use rusqlite::Connection;

/// Registry view bound to one core's catalog.
pub struct ExtensionRegistry<'conn> {
    repo: SqliteRegistryRepository<'conn>,
    catalog: &'static EventCatalog,
}

impl<'conn> ExtensionRegistry<'conn> {
    pub fn new(conn: &'conn Connection, catalog: &'static EventCatalog) -> Self {
        Self {
            repo: SqliteRegistryRepository::new(conn),
            catalog,
        }
    }

    pub fn catalog(&self) -> &'static EventCatalog {
        self.catalog
    }

    pub fn is_installed(&self, address: &Address) -> CoreResult<bool> {
        Ok(self.repo.is_installed(address)?)
    }

    /// Checks that `descriptor` can be bound to `address` without touching
    /// any existing slot.
    pub fn admit(&self, address: &Address, descriptor: &ExtensionDescriptor) -> CoreResult<()> {
        if self.repo.is_installed(address)? {
            return Err(CoreError::AlreadyInstalled(*address));
        }
        descriptor
            .validate(self.catalog)
            .map_err(|source| CoreError::InvalidDescriptor {
                extension: *address,
                source,
            })?;

        for decl in &descriptor.events {
            if let Some(entry) = self.repo.event_entry(decl.event)? {
                return Err(CoreError::EventSlotOccupied {
                    event: decl.event,
                    handler: entry.handler,
                });
            }
        }
        for decl in &descriptor.entrypoints {
            if let Some(entry) = self.repo.entrypoint_entry(decl.selector)? {
                return Err(CoreError::EntrypointOccupied {
                    selector: decl.selector,
                    handler: entry.handler,
                });
            }
        }
        Ok(())
    }

    /// Writes the extension row and every slot it declares.
    pub fn bind(&self, address: &Address, descriptor: &ExtensionDescriptor) -> CoreResult<EventSet> {
        self.admit(address, descriptor)?;
        self.repo.insert_extension(
            address,
            descriptor.name.trim(),
            descriptor.version.trim(),
        )?;
        for decl in &descriptor.events {
            self.repo.bind_event(decl.event, address, decl.mode)?;
        }
        for decl in &descriptor.entrypoints {
            self.repo.bind_entrypoint(
                decl.selector,
                address,
                decl.name.trim(),
                decl.restricted,
            )?;
        }
        Ok(descriptor.event_set())
    }

    /// Removes the extension row and every slot bound to it.
    pub fn unbind(&self, address: &Address) -> CoreResult<InstalledExtension> {
        let Some(installed) = self.repo.get_installed(address)? else {
            return Err(CoreError::NotInstalled(*address));
        };
        self.repo.remove_extension(address)?;
        Ok(installed)
    }

    pub fn handler_of(&self, event: LifecycleEvent) -> CoreResult<Option<RegistryEntry>> {
        Ok(self.repo.event_entry(event)?)
    }

    pub fn entrypoint_of(&self, selector: Selector) -> CoreResult<Option<EntrypointEntry>> {
        Ok(self.repo.entrypoint_entry(selector)?)
    }

    pub fn installed(&self, address: &Address) -> CoreResult<Option<InstalledExtension>> {
        Ok(self.repo.get_installed(address)?)
    }

    /// Lists installed extensions in install order.
    pub fn enumerate(&self) -> CoreResult<Vec<InstalledExtension>> {
        Ok(self.repo.list_installed()?)
    }
}
