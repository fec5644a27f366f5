//! Extension host: the code table and the call surface extensions see.
//!
//! # Responsibility
//! - Map deployed addresses to extension implementations.
//! - Define the `Extension` contract and the per-call `CallContext`.
//!
//! # Invariants
//! - Deployed code is immutable; an address never changes implementation.
//! - `code_at` hands out a cloned `Arc` and never keeps the table borrowed
//!   across a call into an extension.

use crate::extension::descriptor::ExtensionDescriptor;
use crate::extension::kernel::ModularCore;
use crate::model::address::Address;
use crate::model::event::{LifecycleEvent, Selector};
use crate::model::hook::{Amount, CallEnv, HookArgs, HookOutput};
use crate::repo::state_repo::SqliteStateRepository;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Extension-side failure. The reason reaches the caller unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revert {
    pub reason: String,
}

impl Revert {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Display for Revert {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}

impl Error for Revert {}

/// Behavior module installable into a modular core.
///
/// Implementations are shared as `Arc<dyn Extension>` and must be thread-safe
/// even though one core serializes its invocations.
pub trait Extension: Send + Sync {
    /// Static metadata read once at install time.
    fn describe(&self) -> ExtensionDescriptor;

    /// Called once after the registry rows are written; failure aborts install.
    fn on_install(&self, _ctx: &CallContext<'_, '_>, _data: &[u8]) -> Result<(), Revert> {
        Ok(())
    }

    /// Handles one lifecycle event this extension declared.
    fn handle_hook(
        &self,
        ctx: &CallContext<'_, '_>,
        event: LifecycleEvent,
        args: &HookArgs,
    ) -> Result<HookOutput, Revert>;

    /// Handles one entrypoint this extension declared.
    fn call_entrypoint(
        &self,
        _ctx: &CallContext<'_, '_>,
        selector: Selector,
        _data: &[u8],
    ) -> Result<Vec<u8>, Revert> {
        Err(Revert::new(format!("entrypoint not implemented: {selector}")))
    }
}

/// What an extension sees during one call from the core.
pub struct CallContext<'a, 'conn> {
    core: &'a ModularCore<'conn>,
    extension: Address,
    caller: Address,
    value: Amount,
    read_only: bool,
}

impl<'a, 'conn> CallContext<'a, 'conn> {
    pub(crate) fn new(
        core: &'a ModularCore<'conn>,
        extension: Address,
        caller: Address,
        value: Amount,
        read_only: bool,
    ) -> Self {
        Self {
            core,
            extension,
            caller,
            value,
            read_only,
        }
    }

    /// The calling core; reentrant calls go through it.
    pub fn core(&self) -> &'a ModularCore<'conn> {
        self.core
    }

    /// Address of the extension being called.
    pub fn extension(&self) -> Address {
        self.extension
    }

    /// Account that invoked the enclosing core entry point.
    pub fn caller(&self) -> Address {
        self.caller
    }

    /// Native value forwarded with this call.
    pub fn value(&self) -> Amount {
        self.value
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Call environment for reentrant core calls made by this extension.
    pub fn reentry_env(&self) -> CallEnv {
        CallEnv::new(self.extension)
    }

    /// Key/value storage owned by this extension.
    pub fn state(&self) -> ExtensionState<'a> {
        ExtensionState {
            repo: SqliteStateRepository::new(self.core.conn()),
            extension: self.extension,
            read_only: self.read_only,
        }
    }
}

/// Per-extension key/value store. Writes join the enclosing invocation.
pub struct ExtensionState<'a> {
    repo: SqliteStateRepository<'a>,
    extension: Address,
    read_only: bool,
}

impl ExtensionState<'_> {
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Revert> {
        self.repo
            .get(&self.extension, key)
            .map_err(|err| Revert::new(format!("state read failed: {err}")))
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), Revert> {
        self.ensure_writable()?;
        self.repo
            .put(&self.extension, key, value)
            .map_err(|err| Revert::new(format!("state write failed: {err}")))
    }

    pub fn remove(&self, key: &[u8]) -> Result<bool, Revert> {
        self.ensure_writable()?;
        self.repo
            .remove(&self.extension, key)
            .map_err(|err| Revert::new(format!("state write failed: {err}")))
    }

    /// Reads a big-endian `u128`, treating a missing key as zero.
    pub fn get_amount(&self, key: &[u8]) -> Result<Amount, Revert> {
        match self.get(key)? {
            None => Ok(0),
            Some(bytes) => {
                let raw: [u8; 16] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| Revert::new("state value is not an amount"))?;
                Ok(Amount::from_be_bytes(raw))
            }
        }
    }

    pub fn put_amount(&self, key: &[u8], value: Amount) -> Result<(), Revert> {
        self.put(key, &value.to_be_bytes())
    }

    fn ensure_writable(&self) -> Result<(), Revert> {
        if self.read_only {
            return Err(Revert::new("state is read-only in view calls"));
        }
        Ok(())
    }
}

/// Code table errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    ZeroAddress,
    AddressInUse(Address),
}

impl Display for HostError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroAddress => write!(f, "cannot deploy code at the zero address"),
            Self::AddressInUse(address) => write!(f, "address already has code: {address}"),
        }
    }
}

impl Error for HostError {}

/// In-process code table of deployed extensions.
#[derive(Default)]
pub struct ExtensionHost {
    code: RefCell<BTreeMap<Address, Arc<dyn Extension>>>,
}

impl ExtensionHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploys one extension implementation at `address`.
    pub fn deploy(&self, address: Address, code: Arc<dyn Extension>) -> Result<(), HostError> {
        if address.is_zero() {
            return Err(HostError::ZeroAddress);
        }
        let mut table = self.code.borrow_mut();
        if table.contains_key(&address) {
            return Err(HostError::AddressInUse(address));
        }
        table.insert(address, code);
        Ok(())
    }

    pub fn code_at(&self, address: &Address) -> Option<Arc<dyn Extension>> {
        self.code.borrow().get(address).cloned()
    }

    pub fn has_code(&self, address: &Address) -> bool {
        self.code.borrow().contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.code.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.borrow().is_empty()
    }
}
