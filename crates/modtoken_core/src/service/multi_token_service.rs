//! Multi-token core.
//!
//! # Invariants
//! - The mint handler may redirect the mint to another id and quantity.
//! - Transfers and burns need the holder or one of its operators.

use crate::extension::error::{CoreError, CoreResult};
use crate::extension::kernel::ModularCore;
use crate::model::address::Address;
use crate::model::event::CoreVariant;
use crate::model::hook::{Amount, CallEnv, HookArgs, TokenId};
use crate::model::record::CoreEvent;
use crate::repo::ledger::MultiTokenLedger;
use crate::repo::multi_ledger::SqliteMultiTokenLedger;
use crate::service::{
    apply_mint_directive, require_nonzero, royalty_from, run_token_op, uri_from,
};

/// Multi-token backed by a modular core.
pub struct MultiToken<'conn> {
    core: ModularCore<'conn>,
}

impl<'conn> MultiToken<'conn> {
    pub fn new(core: ModularCore<'conn>) -> CoreResult<Self> {
        if core.variant() != CoreVariant::MultiToken {
            return Err(CoreError::VariantMismatch {
                expected: CoreVariant::MultiToken,
                found: core.variant(),
            });
        }
        Ok(Self { core })
    }

    pub fn core(&self) -> &ModularCore<'conn> {
        &self.core
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }

    pub fn symbol(&self) -> &str {
        self.core.symbol()
    }

    /// Mints `amount` of `token_id`; returns the id and amount actually minted.
    pub fn mint(
        &self,
        env: CallEnv,
        to: Address,
        token_id: TokenId,
        amount: Amount,
        data: &[u8],
    ) -> CoreResult<(TokenId, Amount)> {
        run_token_op(&self.core, "mint", || {
            require_nonzero(&to)?;
            if amount == 0 {
                return Err(CoreError::ZeroAmount);
            }
            let outcome = self.core.dispatcher().dispatch(
                env,
                HookArgs::Mint {
                    to,
                    token_id: Some(token_id),
                    quantity: amount,
                    data: data.to_vec(),
                },
            )?;
            let (minted_id, quantity) = apply_mint_directive(&outcome, Some(token_id), amount)?;
            let minted_id = minted_id.unwrap_or(token_id);

            self.ledger().mint(&to, minted_id, quantity)?;
            self.core.emit(&CoreEvent::Transfer {
                operator: env.caller,
                from: Address::ZERO,
                to,
                token_id: Some(minted_id),
                amount: quantity,
            })?;
            Ok((minted_id, quantity))
        })
    }

    pub fn safe_transfer_from(
        &self,
        env: CallEnv,
        from: Address,
        to: Address,
        token_id: TokenId,
        amount: Amount,
    ) -> CoreResult<()> {
        run_token_op(&self.core, "safe_transfer_from", || {
            require_nonzero(&from)?;
            require_nonzero(&to)?;
            self.require_holder_or_operator(&env.caller, &from, token_id)?;

            self.core.dispatcher().dispatch(
                env,
                HookArgs::Transfer {
                    from,
                    to,
                    token_id: Some(token_id),
                    quantity: amount,
                },
            )?;
            self.ledger().transfer(&from, &to, token_id, amount)?;
            self.core.emit(&CoreEvent::Transfer {
                operator: env.caller,
                from,
                to,
                token_id: Some(token_id),
                amount,
            })
        })
    }

    pub fn set_approval_for_all(&self, env: CallEnv, operator: Address, approved: bool) -> CoreResult<()> {
        run_token_op(&self.core, "set_approval_for_all", || {
            require_nonzero(&operator)?;
            self.core.dispatcher().dispatch(
                env,
                HookArgs::ApproveForAll {
                    owner: env.caller,
                    operator,
                    approved,
                },
            )?;
            self.ledger()
                .set_operator(&env.caller, &operator, approved)?;
            self.core.emit(&CoreEvent::ApprovalForAll {
                owner: env.caller,
                operator,
                approved,
            })
        })
    }

    pub fn burn(
        &self,
        env: CallEnv,
        from: Address,
        token_id: TokenId,
        amount: Amount,
        data: &[u8],
    ) -> CoreResult<()> {
        run_token_op(&self.core, "burn", || {
            require_nonzero(&from)?;
            self.require_holder_or_operator(&env.caller, &from, token_id)?;

            self.core.dispatcher().dispatch(
                env,
                HookArgs::Burn {
                    from,
                    token_id: Some(token_id),
                    quantity: amount,
                    data: data.to_vec(),
                },
            )?;
            self.ledger().burn(&from, token_id, amount)?;
            self.core.emit(&CoreEvent::Transfer {
                operator: env.caller,
                from,
                to: Address::ZERO,
                token_id: Some(token_id),
                amount,
            })
        })
    }

    pub fn balance_of(&self, account: &Address, token_id: TokenId) -> CoreResult<Amount> {
        Ok(self.ledger().balance_of(account, token_id)?)
    }

    pub fn total_supply(&self, token_id: TokenId) -> CoreResult<Amount> {
        Ok(self.ledger().total_supply(token_id)?)
    }

    pub fn is_approved_for_all(&self, owner: &Address, operator: &Address) -> CoreResult<bool> {
        Ok(self.ledger().is_operator(owner, operator)?)
    }

    /// Resolves the metadata URI through the required `onTokenURI` handler.
    pub fn uri(&self, token_id: TokenId) -> CoreResult<String> {
        let outcome = self
            .core
            .dispatcher()
            .dispatch_view(HookArgs::TokenUri { token_id })?;
        uri_from(&self.core, outcome)
    }

    pub fn royalty_info(&self, token_id: TokenId, sale_price: Amount) -> CoreResult<(Address, Amount)> {
        let outcome = self.core.dispatcher().dispatch_view(HookArgs::RoyaltyInfo {
            token_id,
            sale_price,
        })?;
        royalty_from(&self.core, outcome)
    }

    fn require_holder_or_operator(&self, caller: &Address, holder: &Address, token_id: TokenId) -> CoreResult<()> {
        if caller == holder || self.ledger().is_operator(holder, caller)? {
            return Ok(());
        }
        Err(CoreError::NotOwnerOrApproved {
            operator: *caller,
            token_id: Some(token_id),
        })
    }

    fn ledger(&self) -> SqliteMultiTokenLedger<'conn> {
        SqliteMultiTokenLedger::new(self.core.conn())
    }
}
