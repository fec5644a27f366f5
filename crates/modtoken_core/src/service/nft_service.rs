//! Non-fungible token core.
//!
//! # Invariants
//! - Token ids are assigned sequentially from zero and never reused.
//! - Transfers and burns need the owner, the token's approved account or an
//!   operator of the owner.

use crate::extension::error::{CoreError, CoreResult};
use crate::extension::kernel::ModularCore;
use crate::model::address::Address;
use crate::model::event::CoreVariant;
use crate::model::hook::{Amount, CallEnv, HookArgs, TokenId};
use crate::model::record::CoreEvent;
use crate::repo::ledger::{LedgerError, NonFungibleLedger};
use crate::repo::nft_ledger::SqliteNonFungibleLedger;
use crate::service::{
    apply_mint_directive, require_nonzero, royalty_from, run_token_op, uri_from,
};

/// Non-fungible token backed by a modular core.
pub struct NonFungibleToken<'conn> {
    core: ModularCore<'conn>,
}

impl<'conn> NonFungibleToken<'conn> {
    pub fn new(core: ModularCore<'conn>) -> CoreResult<Self> {
        if core.variant() != CoreVariant::NonFungible {
            return Err(CoreError::VariantMismatch {
                expected: CoreVariant::NonFungible,
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

    /// Mints `quantity` sequential tokens to `to`.
    ///
    /// The handler sees the first id that will be assigned and may change
    /// the quantity.
    pub fn mint(&self, env: CallEnv, to: Address, quantity: Amount, data: &[u8]) -> CoreResult<Vec<TokenId>> {
        run_token_op(&self.core, "mint", || {
            require_nonzero(&to)?;
            if quantity == 0 {
                return Err(CoreError::ZeroAmount);
            }
            let ledger = self.ledger();
            let start_id = ledger.next_token_id()?;
            let outcome = self.core.dispatcher().dispatch(
                env,
                HookArgs::Mint {
                    to,
                    token_id: Some(start_id),
                    quantity,
                    data: data.to_vec(),
                },
            )?;
            let (_, quantity) = apply_mint_directive(&outcome, None, quantity)?;

            let minted = ledger.mint_sequence(&to, quantity)?;
            for token_id in &minted {
                self.core.emit(&CoreEvent::Transfer {
                    operator: env.caller,
                    from: Address::ZERO,
                    to,
                    token_id: Some(*token_id),
                    amount: 1,
                })?;
            }
            Ok(minted)
        })
    }

    pub fn transfer_from(&self, env: CallEnv, from: Address, to: Address, token_id: TokenId) -> CoreResult<()> {
        run_token_op(&self.core, "transfer_from", || {
            require_nonzero(&to)?;
            let ledger = self.ledger();
            let owner = self.existing_owner(token_id)?;
            if owner != from {
                return Err(LedgerError::NotTokenOwner {
                    account: from,
                    token_id,
                }
                .into());
            }
            self.require_spender(&env.caller, &owner, token_id)?;

            self.core.dispatcher().dispatch(
                env,
                HookArgs::Transfer {
                    from,
                    to,
                    token_id: Some(token_id),
                    quantity: 1,
                },
            )?;
            ledger.transfer(&from, &to, token_id)?;
            self.core.emit(&CoreEvent::Transfer {
                operator: env.caller,
                from,
                to,
                token_id: Some(token_id),
                amount: 1,
            })
        })
    }

    /// Approves `spender` for one token; the zero address clears approval.
    pub fn approve(&self, env: CallEnv, spender: Address, token_id: TokenId) -> CoreResult<()> {
        run_token_op(&self.core, "approve", || {
            let ledger = self.ledger();
            let owner = self.existing_owner(token_id)?;
            if env.caller != owner && !ledger.is_operator(&owner, &env.caller)? {
                return Err(CoreError::NotOwnerOrApproved {
                    operator: env.caller,
                    token_id: Some(token_id),
                });
            }
            let amount = if spender.is_zero() { 0 } else { 1 };

            self.core.dispatcher().dispatch(
                env,
                HookArgs::Approve {
                    owner,
                    spender,
                    token_id: Some(token_id),
                    amount,
                },
            )?;
            let approved = (!spender.is_zero()).then_some(&spender);
            ledger.set_approved(token_id, approved)?;
            self.core.emit(&CoreEvent::Approval {
                owner,
                spender,
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

    pub fn burn(&self, env: CallEnv, token_id: TokenId, data: &[u8]) -> CoreResult<()> {
        run_token_op(&self.core, "burn", || {
            let owner = self.existing_owner(token_id)?;
            self.require_spender(&env.caller, &owner, token_id)?;

            self.core.dispatcher().dispatch(
                env,
                HookArgs::Burn {
                    from: owner,
                    token_id: Some(token_id),
                    quantity: 1,
                    data: data.to_vec(),
                },
            )?;
            self.ledger().burn(token_id)?;
            self.core.emit(&CoreEvent::Transfer {
                operator: env.caller,
                from: owner,
                to: Address::ZERO,
                token_id: Some(token_id),
                amount: 1,
            })
        })
    }

    pub fn owner_of(&self, token_id: TokenId) -> CoreResult<Address> {
        self.existing_owner(token_id)
    }

    pub fn balance_of(&self, account: &Address) -> CoreResult<Amount> {
        Ok(self.ledger().balance_of(account)?)
    }

    pub fn total_supply(&self) -> CoreResult<Amount> {
        Ok(self.ledger().total_supply()?)
    }

    pub fn get_approved(&self, token_id: TokenId) -> CoreResult<Option<Address>> {
        self.existing_owner(token_id)?;
        Ok(self.ledger().approved(token_id)?)
    }

    pub fn is_approved_for_all(&self, owner: &Address, operator: &Address) -> CoreResult<bool> {
        Ok(self.ledger().is_operator(owner, operator)?)
    }

    /// Resolves the token URI through the required `onTokenURI` handler.
    pub fn token_uri(&self, token_id: TokenId) -> CoreResult<String> {
        self.existing_owner(token_id)?;
        let outcome = self
            .core
            .dispatcher()
            .dispatch_view(HookArgs::TokenUri { token_id })?;
        uri_from(&self.core, outcome)
    }

    /// Royalty receiver and amount for a sale; `(ZERO, 0)` without handler.
    pub fn royalty_info(&self, token_id: TokenId, sale_price: Amount) -> CoreResult<(Address, Amount)> {
        let outcome = self.core.dispatcher().dispatch_view(HookArgs::RoyaltyInfo {
            token_id,
            sale_price,
        })?;
        royalty_from(&self.core, outcome)
    }

    fn existing_owner(&self, token_id: TokenId) -> CoreResult<Address> {
        self.ledger()
            .owner_of(token_id)?
            .ok_or_else(|| LedgerError::TokenNotFound(token_id).into())
    }

    fn require_spender(&self, spender: &Address, owner: &Address, token_id: TokenId) -> CoreResult<()> {
        let ledger = self.ledger();
        if spender == owner
            || ledger.approved(token_id)?.as_ref() == Some(spender)
            || ledger.is_operator(owner, spender)?
        {
            return Ok(());
        }
        Err(CoreError::NotOwnerOrApproved {
            operator: *spender,
            token_id: Some(token_id),
        })
    }

    fn ledger(&self) -> SqliteNonFungibleLedger<'conn> {
        SqliteNonFungibleLedger::new(self.core.conn())
    }
}
