#![allow(dead_code)]

use modtoken_core::{
    Address, Amount, CallContext, CallEnv, CoreConfig, CoreRole, CoreVariant, Extension,
    ExtensionDescriptor, ExtensionHost, HandlerMode, HookArgs, HookOutput, LifecycleEvent,
    ModularCore, Revert, Selector,
};
use rusqlite::Connection;
use std::sync::Arc;

pub const CALLS_KEY: &[u8] = b"calls";
pub const VALUE_KEY: &[u8] = b"value";
pub const INIT_KEY: &[u8] = b"init";

pub fn owner() -> Address {
    Address::derive("owner")
}

pub fn alice() -> Address {
    Address::derive("alice")
}

pub fn bob() -> Address {
    Address::derive("bob")
}

pub fn as_owner() -> CallEnv {
    CallEnv::new(owner())
}

pub fn open_core<'conn>(
    conn: &'conn Connection,
    host: &'conn ExtensionHost,
    variant: CoreVariant,
) -> ModularCore<'conn> {
    ModularCore::with_role_gate(conn, host, &CoreConfig::new(variant, owner()))
        .expect("open core")
}

/// Deploys `extension` at an address derived from `label`.
pub fn deploy(host: &ExtensionHost, label: &str, extension: Scripted) -> Address {
    let address = Address::derive(label);
    host.deploy(address, Arc::new(extension)).expect("deploy extension");
    address
}

pub fn grant_installer(core: &ModularCore<'_>, account: Address) {
    core.grant_role(as_owner(), account, CoreRole::Installer)
        .expect("grant installer");
}

/// Number of hook calls recorded by a `Scripted` extension.
pub fn calls(core: &ModularCore<'_>, extension: Address) -> Amount {
    read_amount(core, extension, CALLS_KEY)
}

/// Total value a `Scripted` extension saw forwarded.
pub fn value_seen(core: &ModularCore<'_>, extension: Address) -> Amount {
    read_amount(core, extension, VALUE_KEY)
}

fn read_amount(core: &ModularCore<'_>, extension: Address, key: &[u8]) -> Amount {
    match core
        .extension_state(&extension, key)
        .expect("read extension state")
    {
        None => 0,
        Some(bytes) => Amount::from_be_bytes(bytes.try_into().expect("16-byte amount")),
    }
}

/// Configurable test extension.
///
/// Every hook call bumps `calls` and adds the forwarded value to `value`
/// in its own state (skipped for view calls), then applies the script.
#[derive(Clone)]
pub struct Scripted {
    descriptor: ExtensionDescriptor,
    output: HookOutput,
    revert: Option<String>,
    install_revert: Option<String>,
    uninstall_self: bool,
    uninstall_on_install: bool,
    view_write: bool,
}

impl Scripted {
    pub fn new(name: &str) -> Self {
        Self {
            descriptor: ExtensionDescriptor::new(name, "1.0.0"),
            output: HookOutput::None,
            revert: None,
            install_revert: None,
            uninstall_self: false,
            uninstall_on_install: false,
            view_write: false,
        }
    }

    pub fn handles(mut self, signature: &str, mode: HandlerMode) -> Self {
        self.descriptor = self.descriptor.with_event(signature, mode);
        self
    }

    pub fn exposes(mut self, signature: &str, restricted: bool) -> Self {
        self.descriptor = self.descriptor.with_entrypoint(signature, restricted);
        self
    }

    pub fn for_variants(mut self, variants: &[CoreVariant]) -> Self {
        self.descriptor = self.descriptor.for_variants(variants);
        self
    }

    pub fn returning(mut self, output: HookOutput) -> Self {
        self.output = output;
        self
    }

    pub fn reverting(mut self, reason: &str) -> Self {
        self.revert = Some(reason.to_string());
        self
    }

    pub fn failing_install(mut self, reason: &str) -> Self {
        self.install_revert = Some(reason.to_string());
        self
    }

    pub fn uninstalling_self(mut self) -> Self {
        self.uninstall_self = true;
        self
    }

    /// Uninstalls itself from inside `on_install`.
    pub fn uninstalling_on_install(mut self) -> Self {
        self.uninstall_on_install = true;
        self
    }

    /// Attempts a state write during view calls.
    pub fn writing_in_views(mut self) -> Self {
        self.view_write = true;
        self
    }

    fn record(&self, ctx: &CallContext<'_, '_>) -> Result<(), Revert> {
        let state = ctx.state();
        if ctx.is_read_only() {
            if self.view_write {
                state.put(b"scratch", b"1")?;
            }
            return Ok(());
        }
        state.put_amount(CALLS_KEY, state.get_amount(CALLS_KEY)? + 1)?;
        state.put_amount(VALUE_KEY, state.get_amount(VALUE_KEY)? + ctx.value())
    }
}

impl Extension for Scripted {
    fn describe(&self) -> ExtensionDescriptor {
        self.descriptor.clone()
    }

    fn on_install(&self, ctx: &CallContext<'_, '_>, data: &[u8]) -> Result<(), Revert> {
        ctx.state().put(INIT_KEY, data)?;
        if self.uninstall_on_install {
            ctx.core()
                .uninstall(ctx.reentry_env(), ctx.extension())
                .map_err(|err| Revert::new(format!("self uninstall failed: {err}")))?;
        }
        match &self.install_revert {
            Some(reason) => Err(Revert::new(reason.clone())),
            None => Ok(()),
        }
    }

    fn handle_hook(
        &self,
        ctx: &CallContext<'_, '_>,
        _event: LifecycleEvent,
        _args: &HookArgs,
    ) -> Result<HookOutput, Revert> {
        self.record(ctx)?;
        if self.uninstall_self {
            ctx.core()
                .uninstall(ctx.reentry_env(), ctx.extension())
                .map_err(|err| Revert::new(format!("self uninstall failed: {err}")))?;
        }
        if let Some(reason) = &self.revert {
            return Err(Revert::new(reason.clone()));
        }
        Ok(self.output.clone())
    }

    fn call_entrypoint(
        &self,
        ctx: &CallContext<'_, '_>,
        selector: Selector,
        data: &[u8],
    ) -> Result<Vec<u8>, Revert> {
        self.record(ctx)?;
        if let Some(reason) = &self.revert {
            return Err(Revert::new(reason.clone()));
        }
        if selector == Selector::from_signature("echo(bytes)") {
            return Ok(data.to_vec());
        }
        Ok(ctx.caller().as_bytes().to_vec())
    }
}
