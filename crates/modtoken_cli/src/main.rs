//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `modtoken_core` linkage with a deterministic kernel round:
//!   install a mint extension, mint, uninstall it, mint again.
//!
//! Environment:
//! - `MODTOKEN_DB_PATH`: database file (in-memory when unset).
//! - `MODTOKEN_LOG_DIR` / `MODTOKEN_LOG_LEVEL`: enable file logging.

use log::info;
use modtoken_core::{
    core_version, init_logging, open_db, open_db_in_memory, Address, CallContext, CallEnv,
    CoreConfig, CoreVariant, Extension, ExtensionDescriptor, ExtensionHost, FungibleToken,
    HandlerMode, HookArgs, HookOutput, LifecycleEvent, LoggingConfig, ModularCore, Revert,
};
use std::error::Error;
use std::sync::Arc;

const MINT_CAP: u128 = 1_000;

/// Open mint with a per-call cap.
struct CappedMint;

impl Extension for CappedMint {
    fn describe(&self) -> ExtensionDescriptor {
        ExtensionDescriptor::new("demo.capped-mint", "0.1.0").with_event(
            modtoken_core::model::event::BEFORE_MINT_ERC20,
            HandlerMode::Required,
        )
    }

    fn handle_hook(
        &self,
        _ctx: &CallContext<'_, '_>,
        _event: LifecycleEvent,
        args: &HookArgs,
    ) -> Result<HookOutput, Revert> {
        match args {
            HookArgs::Mint { quantity, .. } if *quantity > MINT_CAP => {
                Err(Revert::new("mint exceeds per-call cap"))
            }
            _ => Ok(HookOutput::None),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    if let Ok(log_dir) = std::env::var("MODTOKEN_LOG_DIR") {
        let mut config = LoggingConfig::new(log_dir);
        if let Ok(level) = std::env::var("MODTOKEN_LOG_LEVEL") {
            config = config.with_level(level);
        }
        init_logging(&config)?;
    }

    println!("modtoken_core version={}", core_version());

    let conn = match std::env::var("MODTOKEN_DB_PATH") {
        Ok(path) => open_db(path)?,
        Err(_) => open_db_in_memory()?,
    };
    let host = ExtensionHost::new();
    let owner = Address::derive("demo.owner");
    let holder = Address::derive("demo.holder");
    let minter = Address::derive("demo.capped-mint");
    host.deploy(minter, Arc::new(CappedMint))?;

    let config = CoreConfig::new(CoreVariant::Fungible, owner)
        .with_name("Demo Token")
        .with_symbol("DEMO");
    let token = FungibleToken::new(ModularCore::with_role_gate(&conn, &host, &config)?)?;
    let admin = CallEnv::new(owner);

    report("mint before install", token.mint(admin, holder, 10, &[]));
    if token.core().installed(&minter)?.is_none() {
        report("install", token.core().install(admin, minter, &[]).map(|events| events.len()));
    }
    report("mint", token.mint(admin, holder, 10, &[]));
    report("mint above cap", token.mint(admin, holder, MINT_CAP + 1, &[]));
    report("uninstall", token.core().uninstall(admin, minter).map(|events| events.len()));
    report("mint after uninstall", token.mint(admin, holder, 10, &[]));

    println!(
        "balance holder={} amount={} supply={}",
        holder,
        token.balance_of(&holder)?,
        token.total_supply()?
    );
    info!("event=cli_demo module=core status=ok");
    Ok(())
}

fn report<T: std::fmt::Debug>(step: &str, result: Result<T, modtoken_core::CoreError>) {
    match result {
        Ok(value) => println!("{step}: ok {value:?}"),
        Err(err) => println!("{step}: error {} ({err})", err.code()),
    }
}
