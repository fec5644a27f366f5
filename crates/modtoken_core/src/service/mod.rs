//! Token core services built on the extension kernel.
//!
//! # Responsibility
//! - Expose mint/transfer/burn/approve entry points per core variant.
//! - Dispatch each operation's lifecycle event before touching accounting.
//!
//! # Invariants
//! - Exactly one dispatch per state-changing operation, before any
//!   accounting write; notifications are emitted after.
//! - Every state-changing operation runs in one invocation envelope.

use crate::extension::dispatch::DispatchOutcome;
use crate::extension::envelope::run_atomic;
use crate::extension::error::{CoreError, CoreResult};
use crate::extension::kernel::ModularCore;
use crate::model::address::Address;
use crate::model::event::EventKind;
use crate::model::hook::{Amount, HookOutput, TokenId};
use log::{debug, warn};

pub mod fungible_service;
pub mod multi_token_service;
pub mod nft_service;

/// Runs one token operation in an invocation envelope and logs its outcome.
pub(crate) fn run_token_op<T>(
    core: &ModularCore<'_>,
    operation: &str,
    body: impl FnOnce() -> CoreResult<T>,
) -> CoreResult<T> {
    let result = run_atomic(core.conn(), operation, body);
    match &result {
        Ok(_) => debug!(
            "event=token_op module=token status=ok op={operation} variant={}",
            core.variant().as_str()
        ),
        Err(err) => warn!(
            "event=token_op module=token status=error op={operation} variant={} error_code={}",
            core.variant().as_str(),
            err.code()
        ),
    }
    result
}

/// Applies a mint handler's overrides to the requested id and quantity.
pub(crate) fn apply_mint_directive(
    outcome: &DispatchOutcome,
    token_id: Option<TokenId>,
    quantity: Amount,
) -> CoreResult<(Option<TokenId>, Amount)> {
    let (token_id, quantity) = match outcome.output() {
        Some(HookOutput::Mint(directive)) => (
            directive.token_id.or(token_id),
            directive.quantity.unwrap_or(quantity),
        ),
        _ => (token_id, quantity),
    };
    if quantity == 0 {
        return Err(CoreError::ZeroAmount);
    }
    Ok((token_id, quantity))
}

/// Extracts the URI answered by a `TokenUri` handler.
pub(crate) fn uri_from(core: &ModularCore<'_>, outcome: DispatchOutcome) -> CoreResult<String> {
    match outcome {
        DispatchOutcome::Handled {
            output: HookOutput::TokenUri { uri },
            ..
        } => Ok(uri),
        other => Err(malformed(core, &other, EventKind::TokenUri)?),
    }
}

/// Extracts the royalty answered by a `RoyaltyInfo` handler; no handler
/// means no royalty.
pub(crate) fn royalty_from(
    core: &ModularCore<'_>,
    outcome: DispatchOutcome,
) -> CoreResult<(Address, Amount)> {
    match outcome {
        DispatchOutcome::Skipped => Ok((Address::ZERO, 0)),
        DispatchOutcome::Handled {
            output: HookOutput::Royalty { receiver, amount },
            ..
        } => Ok((receiver, amount)),
        other => Err(malformed(core, &other, EventKind::RoyaltyInfo)?),
    }
}

fn malformed(
    core: &ModularCore<'_>,
    outcome: &DispatchOutcome,
    kind: EventKind,
) -> CoreResult<CoreError> {
    Ok(CoreError::MalformedHandlerResult {
        handler: outcome.handler().unwrap_or(Address::ZERO),
        event: core.spec_for(kind)?.event,
    })
}

pub(crate) fn require_nonzero(address: &Address) -> CoreResult<()> {
    if address.is_zero() {
        return Err(CoreError::ZeroAddress);
    }
    Ok(())
}
