//! Invocation inputs and hook call encoding.
//!
//! # Responsibility
//! - Carry caller identity and attached value into every entry point.
//! - Fix the argument payload and result shape per `EventKind`.
//!
//! # Invariants
//! - A `HookArgs` value always belongs to exactly one `EventKind`.
//! - `HookOutput::fits` is the only accepted-result rule used by dispatch.

use crate::model::address::Address;
use crate::model::event::EventKind;

/// Token quantity. Stored as decimal text to keep the full range.
pub type Amount = u128;

/// Token identifier for non-fungible and multi-token cores.
pub type TokenId = u128;

/// Caller context of one entry point invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallEnv {
    pub caller: Address,
    /// Native value attached by the caller.
    pub value: Amount,
}

impl CallEnv {
    pub fn new(caller: Address) -> Self {
        Self { caller, value: 0 }
    }

    pub fn with_value(mut self, value: Amount) -> Self {
        self.value = value;
        self
    }
}

impl From<Address> for CallEnv {
    fn from(value: Address) -> Self {
        Self::new(value)
    }
}

/// Argument payload handed to a hook handler.
///
/// `token_id` is `None` for fungible cores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookArgs {
    Mint {
        to: Address,
        token_id: Option<TokenId>,
        quantity: Amount,
        data: Vec<u8>,
    },
    Transfer {
        from: Address,
        to: Address,
        token_id: Option<TokenId>,
        quantity: Amount,
    },
    Burn {
        from: Address,
        token_id: Option<TokenId>,
        quantity: Amount,
        data: Vec<u8>,
    },
    Approve {
        owner: Address,
        spender: Address,
        token_id: Option<TokenId>,
        amount: Amount,
    },
    ApproveForAll {
        owner: Address,
        operator: Address,
        approved: bool,
    },
    TokenUri {
        token_id: TokenId,
    },
    RoyaltyInfo {
        token_id: TokenId,
        sale_price: Amount,
    },
}

impl HookArgs {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Mint { .. } => EventKind::Mint,
            Self::Transfer { .. } => EventKind::Transfer,
            Self::Burn { .. } => EventKind::Burn,
            Self::Approve { .. } => EventKind::Approve,
            Self::ApproveForAll { .. } => EventKind::ApproveForAll,
            Self::TokenUri { .. } => EventKind::TokenUri,
            Self::RoyaltyInfo { .. } => EventKind::RoyaltyInfo,
        }
    }
}

/// Overrides a mint handler may return to the enclosing mint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MintDirective {
    pub token_id: Option<TokenId>,
    pub quantity: Option<Amount>,
}

/// Result produced by a hook handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutput {
    None,
    Mint(MintDirective),
    TokenUri { uri: String },
    Royalty { receiver: Address, amount: Amount },
}

impl HookOutput {
    /// Returns whether this result is a valid answer for `kind`.
    pub fn fits(&self, kind: EventKind) -> bool {
        match (kind, self) {
            (EventKind::Mint, Self::None | Self::Mint(_)) => true,
            (EventKind::TokenUri, Self::TokenUri { .. }) => true,
            (EventKind::RoyaltyInfo, Self::Royalty { .. }) => true,
            (
                EventKind::Transfer
                | EventKind::Burn
                | EventKind::Approve
                | EventKind::ApproveForAll,
                Self::None,
            ) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CallEnv, HookArgs, HookOutput, MintDirective};
    use crate::model::address::Address;
    use crate::model::event::EventKind;

    #[test]
    fn args_report_their_kind() {
        let args = HookArgs::Burn {
            from: Address::derive("alice"),
            token_id: None,
            quantity: 3,
            data: vec![],
        };
        assert_eq!(args.kind(), EventKind::Burn);
        assert_eq!(
            HookArgs::TokenUri { token_id: 7 }.kind(),
            EventKind::TokenUri
        );
    }

    #[test]
    fn mint_accepts_empty_or_directive_results() {
        assert!(HookOutput::None.fits(EventKind::Mint));
        assert!(HookOutput::Mint(MintDirective::default()).fits(EventKind::Mint));
        assert!(!HookOutput::Mint(MintDirective::default()).fits(EventKind::Transfer));
    }

    #[test]
    fn view_events_require_their_own_result_shape() {
        assert!(!HookOutput::None.fits(EventKind::TokenUri));
        assert!(HookOutput::TokenUri {
            uri: "ipfs://x/1".to_string()
        }
        .fits(EventKind::TokenUri));
        assert!(!HookOutput::TokenUri {
            uri: "ipfs://x/1".to_string()
        }
        .fits(EventKind::RoyaltyInfo));
        assert!(HookOutput::Royalty {
            receiver: Address::derive("artist"),
            amount: 5
        }
        .fits(EventKind::RoyaltyInfo));
    }

    #[test]
    fn call_env_defaults_to_zero_value() {
        let env = CallEnv::from(Address::derive("bob"));
        assert_eq!(env.value, 0);
        assert_eq!(env.with_value(9).value, 9);
    }
}
