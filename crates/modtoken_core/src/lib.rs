//! Modular token core.
//!
//! A token core whose mint/transfer/burn/approve behavior is delegated to
//! installable extensions, routed through a permissioned registry and a
//! callback dispatcher. This crate is the single source of truth for the
//! registry invariants.

pub mod db;
pub mod extension;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError};
pub use extension::descriptor::{
    DescriptorValidationError, EntrypointDeclaration, EventDeclaration, ExtensionDescriptor,
};
pub use extension::dispatch::{CallbackDispatcher, DispatchOutcome};
pub use extension::error::{CoreError, CoreResult};
pub use extension::host::{CallContext, Extension, ExtensionHost, ExtensionState, HostError, Revert};
pub use extension::kernel::{CoreConfig, ModularCore};
pub use extension::permission::{CoreRole, PermissionGate, RoleGate};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::address::Address;
pub use model::event::{CoreVariant, EventKind, EventSet, HandlerMode, LifecycleEvent, Selector};
pub use model::hook::{Amount, CallEnv, HookArgs, HookOutput, MintDirective, TokenId};
pub use model::record::{CoreEvent, EntrypointEntry, InstalledExtension, RegistryEntry};
pub use service::fungible_service::FungibleToken;
pub use service::multi_token_service::MultiToken;
pub use service::nft_service::NonFungibleToken;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
