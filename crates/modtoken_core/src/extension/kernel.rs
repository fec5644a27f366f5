//! Modular token core: the kernel every token variant runs on.
//!
//! # Responsibility
//! - Run the install/uninstall protocol: gate, descriptor, slot checks,
//!   binding, `on_install`, notification.
//! - Route entrypoint calls and expose the dispatcher to token operations.
//! - Hold core identity (variant, name, symbol, address, owner).
//!
//! # Invariants
//! - Every mutating entry point runs inside one invocation envelope.
//! - Only `install`/`uninstall` write the registry tables.
//! - The core is `!Sync`; invocations are serialized by the host.

use crate::extension::descriptor::ExtensionDescriptor;
use crate::extension::dispatch::CallbackDispatcher;
use crate::extension::envelope::run_atomic;
use crate::extension::error::{CoreError, CoreResult};
use crate::extension::host::{CallContext, ExtensionHost};
use crate::extension::permission::{CoreRole, PermissionGate, RoleGate};
use crate::extension::registry::ExtensionRegistry;
use crate::model::address::Address;
use crate::model::event::{
    CoreVariant, EventCatalog, EventKind, EventSet, EventSpec, LifecycleEvent, Selector,
};
use crate::model::hook::{Amount, CallEnv};
use crate::model::record::{CoreEvent, EntrypointEntry, InstalledExtension, RegistryEntry};
use crate::repo::event_log_repo::SqliteEventLogRepository;
use crate::repo::metadata_repo::{
    SqliteMetadataRepository, KEY_ADDRESS, KEY_NAME, KEY_SYMBOL, KEY_VARIANT,
};
use crate::repo::native_repo::{NativeTransfer, SqliteNativeLedger};
use crate::repo::role_repo::SqliteRoleRepository;
use crate::repo::state_repo::SqliteStateRepository;
use crate::repo::{parse_address, RepoError};
use log::{error, info};
use rusqlite::Connection;
use std::time::Instant;

const DEFAULT_NAME: &str = "Modular Token";
const DEFAULT_SYMBOL: &str = "MOD";
const DEFAULT_ADDRESS_LABEL: &str = "modtoken.core";
const REMOVED_DURING_INSTALL: &str = "extension removed during install";

/// Identity of one core, written on first open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub variant: CoreVariant,
    pub name: String,
    pub symbol: String,
    /// Account that receives value sent to the core.
    pub address: Address,
    pub owner: Address,
}

impl CoreConfig {
    pub fn new(variant: CoreVariant, owner: Address) -> Self {
        Self {
            variant,
            name: DEFAULT_NAME.to_string(),
            symbol: DEFAULT_SYMBOL.to_string(),
            address: Address::derive(DEFAULT_ADDRESS_LABEL),
            owner,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }
}

/// Modular token core bound to one database connection and one code table.
pub struct ModularCore<'conn> {
    conn: &'conn Connection,
    host: &'conn ExtensionHost,
    gate: Box<dyn PermissionGate + 'conn>,
    variant: CoreVariant,
    address: Address,
    name: String,
    symbol: String,
}

impl<'conn> ModularCore<'conn> {
    /// Opens the core stored in `conn`, initializing it from `config` when
    /// the database holds no core yet.
    ///
    /// Stored identity wins over `config` on reopen, except that a different
    /// variant is rejected.
    ///
    /// # Errors
    /// - `VariantMismatch` when the stored core has another variant.
    /// - `ZeroAddress` when `config` names the zero address as core or owner.
    pub fn open(
        conn: &'conn Connection,
        host: &'conn ExtensionHost,
        gate: Box<dyn PermissionGate + 'conn>,
        config: &CoreConfig,
    ) -> CoreResult<Self> {
        if config.address.is_zero() || config.owner.is_zero() {
            return Err(CoreError::ZeroAddress);
        }
        let (address, name, symbol) = run_atomic(conn, "core_open", || load_identity(conn, config))?;
        info!(
            "event=core_open module=core status=ok variant={} address={}",
            config.variant.as_str(),
            address
        );
        Ok(Self {
            conn,
            host,
            gate,
            variant: config.variant,
            address,
            name,
            symbol,
        })
    }

    /// Opens the core with the owner/role store as permission gate.
    pub fn with_role_gate(
        conn: &'conn Connection,
        host: &'conn ExtensionHost,
        config: &CoreConfig,
    ) -> CoreResult<Self> {
        Self::open(conn, host, Box::new(RoleGate::new(conn)), config)
    }

    pub fn variant(&self) -> CoreVariant {
        self.variant
    }

    pub fn catalog(&self) -> &'static EventCatalog {
        self.variant.catalog()
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn owner(&self) -> CoreResult<Option<Address>> {
        Ok(SqliteRoleRepository::new(self.conn).owner()?)
    }

    /// Installs the extension deployed at `extension`.
    ///
    /// Returns the set of events now routed to it.
    ///
    /// # Errors
    /// - `Unauthorized`, `NoExtensionCode`, `AlreadyInstalled`,
    ///   `InvalidDescriptor`, `EventSlotOccupied`, `EntrypointOccupied`,
    ///   `InitCallFailed`. Nothing is kept on failure.
    pub fn install(&self, env: CallEnv, extension: Address, init_data: &[u8]) -> CoreResult<EventSet> {
        let started_at = Instant::now();
        info!(
            "event=extension_install module=registry status=start caller={} extension={}",
            env.caller, extension
        );
        let result: CoreResult<EventSet> = run_atomic(self.conn, "install", || {
            self.install_inner(env, extension, init_data)
        });
        match &result {
            Ok(events) => info!(
                "event=extension_install module=registry status=ok extension={} events={} duration_ms={}",
                extension,
                events.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=extension_install module=registry status=error extension={} duration_ms={} error_code={}",
                extension,
                started_at.elapsed().as_millis(),
                err.code()
            ),
        }
        result
    }

    fn install_inner(&self, env: CallEnv, extension: Address, init_data: &[u8]) -> CoreResult<EventSet> {
        self.authorize(&env.caller)?;
        let code = self
            .host
            .code_at(&extension)
            .ok_or(CoreError::NoExtensionCode(extension))?;
        let registry = self.registry();
        if registry.is_installed(&extension)? {
            return Err(CoreError::AlreadyInstalled(extension));
        }

        let descriptor = code.describe();
        let events = registry.bind(&extension, &descriptor)?;

        let ctx = CallContext::new(self, extension, env.caller, 0, false);
        code.on_install(&ctx, init_data)
            .map_err(|revert| CoreError::InitCallFailed {
                extension,
                reason: revert.reason,
            })?;
        self.ensure_still_bound(&extension, &descriptor)?;

        self.emit(&CoreEvent::ExtensionInstalled {
            extension,
            events: events.clone(),
            entrypoints: descriptor.entrypoint_set(),
        })?;
        Ok(events)
    }

    /// Fails when `on_install` unbound the extension through a reentrant call.
    fn ensure_still_bound(&self, extension: &Address, descriptor: &ExtensionDescriptor) -> CoreResult<()> {
        let registry = self.registry();
        let removed = || CoreError::InitCallFailed {
            extension: *extension,
            reason: REMOVED_DURING_INSTALL.to_string(),
        };
        if !registry.is_installed(extension)? {
            return Err(removed());
        }
        for decl in &descriptor.events {
            if registry.handler_of(decl.event)?.map(|entry| entry.handler) != Some(*extension) {
                return Err(removed());
            }
        }
        for decl in &descriptor.entrypoints {
            if registry.entrypoint_of(decl.selector)?.map(|entry| entry.handler) != Some(*extension) {
                return Err(removed());
            }
        }
        Ok(())
    }

    /// Uninstalls `extension`, clearing every slot bound to it.
    ///
    /// Never calls into the extension. Its stored state is kept.
    pub fn uninstall(&self, env: CallEnv, extension: Address) -> CoreResult<EventSet> {
        let started_at = Instant::now();
        info!(
            "event=extension_uninstall module=registry status=start caller={} extension={}",
            env.caller, extension
        );
        let result: CoreResult<EventSet> = run_atomic(self.conn, "uninstall", || {
            self.authorize(&env.caller)?;
            let removed = self.registry().unbind(&extension)?;
            self.emit(&CoreEvent::ExtensionUninstalled {
                extension,
                events: removed.events.clone(),
            })?;
            Ok(removed.events)
        });
        match &result {
            Ok(events) => info!(
                "event=extension_uninstall module=registry status=ok extension={} events={} duration_ms={}",
                extension,
                events.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=extension_uninstall module=registry status=error extension={} duration_ms={} error_code={}",
                extension,
                started_at.elapsed().as_millis(),
                err.code()
            ),
        }
        result
    }

    /// Lists installed extensions in install order.
    pub fn enumerate_installed(&self) -> CoreResult<Vec<InstalledExtension>> {
        self.registry().enumerate()
    }

    pub fn installed(&self, extension: &Address) -> CoreResult<Option<InstalledExtension>> {
        self.registry().installed(extension)
    }

    pub fn handler_of(&self, event: LifecycleEvent) -> CoreResult<Option<RegistryEntry>> {
        self.registry().handler_of(event)
    }

    pub fn entrypoint_of(&self, selector: Selector) -> CoreResult<Option<EntrypointEntry>> {
        self.registry().entrypoint_of(selector)
    }

    /// Calls an entrypoint bound through the registry.
    ///
    /// Restricted entrypoints require the permission gate. Attached value
    /// moves from the caller to the handling extension.
    pub fn call_entrypoint(&self, env: CallEnv, selector: Selector, data: &[u8]) -> CoreResult<Vec<u8>> {
        run_atomic(self.conn, "call_entrypoint", || {
            let entry = self
                .registry()
                .entrypoint_of(selector)?
                .ok_or(CoreError::EntrypointNotFound(selector))?;
            if entry.restricted {
                self.authorize(&env.caller)?;
            }
            let code = self
                .host
                .code_at(&entry.handler)
                .ok_or(CoreError::NoExtensionCode(entry.handler))?;
            self.move_native(&env.caller, &entry.handler, env.value)?;

            let ctx = CallContext::new(self, entry.handler, env.caller, env.value, false);
            code.call_entrypoint(&ctx, selector, data)
                .map_err(|revert| CoreError::HandlerCallFailed {
                    handler: entry.handler,
                    reason: revert.reason,
                })
        })
    }

    /// Grants a role; only the owner may do this.
    pub fn grant_role(&self, env: CallEnv, account: Address, role: CoreRole) -> CoreResult<()> {
        run_atomic(self.conn, "grant_role", || {
            self.require_owner(&env.caller)?;
            Ok(SqliteRoleRepository::new(self.conn).grant(&account, role)?)
        })
    }

    /// Revokes a role; only the owner may do this.
    pub fn revoke_role(&self, env: CallEnv, account: Address, role: CoreRole) -> CoreResult<bool> {
        run_atomic(self.conn, "revoke_role", || {
            self.require_owner(&env.caller)?;
            Ok(SqliteRoleRepository::new(self.conn).revoke(&account, role)?)
        })
    }

    /// Notifications emitted so far, oldest first.
    pub fn events(&self) -> CoreResult<Vec<CoreEvent>> {
        Ok(SqliteEventLogRepository::new(self.conn).list()?)
    }

    pub fn native_balance_of(&self, account: &Address) -> CoreResult<Amount> {
        Ok(SqliteNativeLedger::new(self.conn).balance_of(account)?)
    }

    /// Funds an account on the host's native ledger.
    pub fn credit_native(&self, account: &Address, amount: Amount) -> CoreResult<()> {
        run_atomic(self.conn, "credit_native", || {
            Ok(SqliteNativeLedger::new(self.conn).credit(account, amount)?)
        })
    }

    /// Reads one key of an extension's stored state.
    pub fn extension_state(&self, extension: &Address, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        Ok(SqliteStateRepository::new(self.conn).get(extension, key)?)
    }

    pub(crate) fn conn(&self) -> &'conn Connection {
        self.conn
    }

    pub(crate) fn host(&self) -> &'conn ExtensionHost {
        self.host
    }

    pub(crate) fn registry(&self) -> ExtensionRegistry<'conn> {
        ExtensionRegistry::new(self.conn, self.catalog())
    }

    pub(crate) fn dispatcher(&self) -> CallbackDispatcher<'_, 'conn> {
        CallbackDispatcher::new(self)
    }

    pub(crate) fn spec_for(&self, kind: EventKind) -> CoreResult<&'static EventSpec> {
        self.catalog()
            .spec_for(kind)
            .ok_or(CoreError::EventNotInCatalog {
                variant: self.variant,
                kind,
            })
    }

    pub(crate) fn emit(&self, event: &CoreEvent) -> CoreResult<()> {
        Ok(SqliteEventLogRepository::new(self.conn).append(event)?)
    }

    pub(crate) fn move_native(&self, from: &Address, to: &Address, amount: Amount) -> CoreResult<()> {
        match SqliteNativeLedger::new(self.conn).transfer(from, to, amount)? {
            NativeTransfer::Done => Ok(()),
            NativeTransfer::Insufficient { available } => {
                Err(CoreError::InsufficientNativeBalance {
                    account: *from,
                    needed: amount,
                    available,
                })
            }
        }
    }

    fn authorize(&self, caller: &Address) -> CoreResult<()> {
        if self.gate.is_authorized(caller) {
            Ok(())
        } else {
            Err(CoreError::Unauthorized { caller: *caller })
        }
    }

    fn require_owner(&self, caller: &Address) -> CoreResult<()> {
        match self.owner()? {
            Some(owner) if owner == *caller => Ok(()),
            _ => Err(CoreError::Unauthorized { caller: *caller }),
        }
    }
}

fn load_identity(conn: &Connection, config: &CoreConfig) -> CoreResult<(Address, String, String)> {
    let metadata = SqliteMetadataRepository::new(conn);
    match metadata.get(KEY_VARIANT)? {
        Some(raw) => {
            let found = CoreVariant::parse(&raw).ok_or_else(|| {
                RepoError::InvalidData(format!("invalid variant `{raw}` in core_metadata.variant"))
            })?;
            if found != config.variant {
                return Err(CoreError::VariantMismatch {
                    expected: config.variant,
                    found,
                });
            }
        }
        None => {
            metadata.set(KEY_VARIANT, config.variant.as_str())?;
            metadata.set(KEY_NAME, config.name.trim())?;
            metadata.set(KEY_SYMBOL, config.symbol.trim())?;
            metadata.set(KEY_ADDRESS, &config.address.to_string())?;
        }
    }

    let roles = SqliteRoleRepository::new(conn);
    if roles.owner()?.is_none() {
        roles.set_owner(&config.owner)?;
    }

    let address = match metadata.get(KEY_ADDRESS)? {
        Some(raw) => parse_address(&raw, "core_metadata.address")?,
        None => config.address,
    };
    let name = metadata.get(KEY_NAME)?.unwrap_or_else(|| config.name.clone());
    let symbol = metadata
        .get(KEY_SYMBOL)?
        .unwrap_or_else(|| config.symbol.clone());
    Ok((address, name, symbol))
}

#[cfg(test)]
mod tests {
    use super::{CoreConfig, ModularCore};
    use crate::db::open_db_in_memory;
    use crate::extension::error::CoreError;
    use crate::extension::host::ExtensionHost;
    use crate::extension::permission::CoreRole;
    use crate::model::address::Address;
    use crate::model::event::CoreVariant;
    use crate::model::hook::CallEnv;

    #[test]
    fn first_open_persists_identity_and_owner() {
        let conn = open_db_in_memory().expect("open db");
        let host = ExtensionHost::new();
        let owner = Address::derive("owner");
        let config = CoreConfig::new(CoreVariant::Fungible, owner)
            .with_name("Test Token")
            .with_symbol("TST");

        let core = ModularCore::with_role_gate(&conn, &host, &config).expect("open core");
        assert_eq!(core.name(), "Test Token");
        assert_eq!(core.symbol(), "TST");
        assert_eq!(core.owner().expect("owner"), Some(owner));
        drop(core);

        let other = CoreConfig::new(CoreVariant::Fungible, Address::derive("other"))
            .with_name("Renamed");
        let reopened = ModularCore::with_role_gate(&conn, &host, &other).expect("reopen core");
        assert_eq!(reopened.name(), "Test Token");
        assert_eq!(reopened.owner().expect("owner"), Some(owner));
    }

    #[test]
    fn reopen_with_other_variant_fails() {
        let conn = open_db_in_memory().expect("open db");
        let host = ExtensionHost::new();
        let owner = Address::derive("owner");
        ModularCore::with_role_gate(&conn, &host, &CoreConfig::new(CoreVariant::Fungible, owner))
            .expect("open core");

        let err = ModularCore::with_role_gate(
            &conn,
            &host,
            &CoreConfig::new(CoreVariant::NonFungible, owner),
        )
        .err()
        .expect("variant mismatch");
        assert!(matches!(
            err,
            CoreError::VariantMismatch {
                expected: CoreVariant::NonFungible,
                found: CoreVariant::Fungible
            }
        ));
    }

    #[test]
    fn only_owner_manages_roles() {
        let conn = open_db_in_memory().expect("open db");
        let host = ExtensionHost::new();
        let owner = Address::derive("owner");
        let admin = Address::derive("admin");
        let core = ModularCore::with_role_gate(
            &conn,
            &host,
            &CoreConfig::new(CoreVariant::Fungible, owner),
        )
        .expect("open core");

        assert!(matches!(
            core.grant_role(CallEnv::new(admin), admin, CoreRole::Installer),
            Err(CoreError::Unauthorized { .. })
        ));
        core.grant_role(CallEnv::new(owner), admin, CoreRole::Installer)
            .expect("owner grants");
        assert!(core
            .revoke_role(CallEnv::new(owner), admin, CoreRole::Installer)
            .expect("owner revokes"));
    }

    #[test]
    fn rejects_zero_owner() {
        let conn = open_db_in_memory().expect("open db");
        let host = ExtensionHost::new();
        let err = ModularCore::with_role_gate(
            &conn,
            &host,
            &CoreConfig::new(CoreVariant::Fungible, Address::ZERO),
        )
        .err()
        .expect("zero owner");
        assert!(matches!(err, CoreError::ZeroAddress));
    }
}
