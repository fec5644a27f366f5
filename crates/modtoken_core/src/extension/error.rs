//! Kernel error taxonomy.

use crate::extension::descriptor::DescriptorValidationError;
use crate::extension::host::HostError;
use crate::model::address::Address;
use crate::model::event::{CoreVariant, EventKind, LifecycleEvent, Selector};
use crate::model::hook::{Amount, TokenId};
use crate::repo::ledger::LedgerError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CoreResult<T> = Result<T, CoreError>;

/// Failure of one core invocation. Any error leaves state as it was before
/// the invocation started.
#[derive(Debug)]
pub enum CoreError {
    Unauthorized {
        caller: Address,
    },
    AlreadyInstalled(Address),
    NotInstalled(Address),
    NoExtensionCode(Address),
    InvalidDescriptor {
        extension: Address,
        source: DescriptorValidationError,
    },
    EventSlotOccupied {
        event: LifecycleEvent,
        handler: Address,
    },
    EntrypointOccupied {
        selector: Selector,
        handler: Address,
    },
    RequiredHookMissing(LifecycleEvent),
    /// Extension reverted; `reason` is its text, unmodified.
    HandlerCallFailed {
        handler: Address,
        reason: String,
    },
    /// `on_install` reverted; `reason` is its text, unmodified.
    InitCallFailed {
        extension: Address,
        reason: String,
    },
    MalformedHandlerResult {
        handler: Address,
        event: LifecycleEvent,
    },
    NonPayableEvent(LifecycleEvent),
    EntrypointNotFound(Selector),
    VariantMismatch {
        expected: CoreVariant,
        found: CoreVariant,
    },
    EventNotInCatalog {
        variant: CoreVariant,
        kind: EventKind,
    },
    ZeroAddress,
    ZeroAmount,
    NotOwnerOrApproved {
        operator: Address,
        token_id: Option<TokenId>,
    },
    InsufficientNativeBalance {
        account: Address,
        needed: Amount,
        available: Amount,
    },
    Host(HostError),
    Ledger(LedgerError),
    Repo(RepoError),
}

impl CoreError {
    /// Stable snake_case code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "unauthorized",
            Self::AlreadyInstalled(_) => "already_installed",
            Self::NotInstalled(_) => "not_installed",
            Self::NoExtensionCode(_) => "no_extension_code",
            Self::InvalidDescriptor { .. } => "invalid_descriptor",
            Self::EventSlotOccupied { .. } => "event_slot_occupied",
            Self::EntrypointOccupied { .. } => "entrypoint_occupied",
            Self::RequiredHookMissing(_) => "required_hook_missing",
            Self::HandlerCallFailed { .. } => "handler_call_failed",
            Self::InitCallFailed { .. } => "init_call_failed",
            Self::MalformedHandlerResult { .. } => "malformed_handler_result",
            Self::NonPayableEvent(_) => "non_payable_event",
            Self::EntrypointNotFound(_) => "entrypoint_not_found",
            Self::VariantMismatch { .. } => "variant_mismatch",
            Self::EventNotInCatalog { .. } => "event_not_in_catalog",
            Self::ZeroAddress => "zero_address",
            Self::ZeroAmount => "zero_amount",
            Self::NotOwnerOrApproved { .. } => "not_owner_or_approved",
            Self::InsufficientNativeBalance { .. } => "insufficient_native_balance",
            Self::Host(_) => "host",
            Self::Ledger(_) => "ledger",
            Self::Repo(_) => "repo",
        }
    }

    /// Returns the extension-supplied reason for handler and init failures.
    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            Self::HandlerCallFailed { reason, .. } | Self::InitCallFailed { reason, .. } => {
                Some(reason.as_str())
            }
            _ => None,
        }
    }
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized { caller } => write!(f, "caller is not authorized: {caller}"),
            Self::AlreadyInstalled(address) => {
                write!(f, "extension already installed: {address}")
            }
            Self::NotInstalled(address) => write!(f, "extension not installed: {address}"),
            Self::NoExtensionCode(address) => {
                write!(f, "no extension code at address: {address}")
            }
            Self::InvalidDescriptor { extension, source } => {
                write!(f, "invalid descriptor for {extension}: {source}")
            }
            Self::EventSlotOccupied { event, handler } => {
                write!(f, "event {event} is already handled by {handler}")
            }
            Self::EntrypointOccupied { selector, handler } => {
                write!(f, "entrypoint {selector} is already bound to {handler}")
            }
            Self::RequiredHookMissing(event) => {
                write!(f, "required hook has no handler: {event}")
            }
            Self::HandlerCallFailed { reason, .. } => f.write_str(reason),
            Self::InitCallFailed { reason, .. } => f.write_str(reason),
            Self::MalformedHandlerResult { handler, event } => {
                write!(f, "handler {handler} returned a malformed result for {event}")
            }
            Self::NonPayableEvent(event) => {
                write!(f, "value sent to non-payable event: {event}")
            }
            Self::EntrypointNotFound(selector) => write!(f, "entrypoint not found: {selector}"),
            Self::VariantMismatch { expected, found } => {
                write!(f, "core variant mismatch: expected {expected}, found {found}")
            }
            Self::EventNotInCatalog { variant, kind } => {
                write!(f, "{variant} cores have no {} event", kind.as_str())
            }
            Self::ZeroAddress => write!(f, "zero address is not a valid target"),
            Self::ZeroAmount => write!(f, "amount must be greater than zero"),
            Self::NotOwnerOrApproved { operator, token_id } => match token_id {
                Some(token_id) => {
                    write!(f, "{operator} is not owner or approved for token {token_id}")
                }
                None => write!(f, "{operator} is not owner or approved"),
            },
            Self::InsufficientNativeBalance {
                account,
                needed,
                available,
            } => write!(
                f,
                "insufficient native balance for {account}: needed {needed}, available {available}"
            ),
            Self::Host(err) => write!(f, "{err}"),
            Self::Ledger(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidDescriptor { source, .. } => Some(source),
            Self::Host(err) => Some(err),
            Self::Ledger(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<HostError> for CoreError {
    fn from(value: HostError) -> Self {
        Self::Host(value)
    }
}

impl From<LedgerError> for CoreError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}

impl From<RepoError> for CoreError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}
