//! Fungible token core.
//!
//! # Invariants
//! - `mint` fails unless a `beforeMintERC20` handler is installed.
//! - Allowance is spent only after the lifecycle event was dispatched.

use crate::extension::error::{CoreError, CoreResult};
use crate::extension::kernel::ModularCore;
use crate::model::address::Address;
use crate::model::event::CoreVariant;
use crate::model::hook::{Amount, CallEnv, HookArgs};
use crate::model::record::CoreEvent;
use crate::repo::fungible_ledger::SqliteFungibleLedger;
use crate::repo::ledger::FungibleLedger;
use crate::service::{apply_mint_directive, require_nonzero, run_token_op};

/// Fungible token backed by a modular core.
pub struct FungibleToken<'conn> {
    core: ModularCore<'conn>,
}

impl<'conn> FungibleToken<'conn> {
    pub fn new(core: ModularCore<'conn>) -> CoreResult<Self> {
        if core.variant() != CoreVariant::Fungible {
            return Err(CoreError::VariantMismatch {
                expected: CoreVariant::Fungible,
                found: core.variant(),
            });
        }
        Ok(Self { core })
    }

    /// Kernel surface: install, uninstall, entrypoints, event log.
    pub fn core(&self) -> &ModularCore<'conn> {
        &self.core
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }

    pub fn symbol(&self) -> &str {
        self.core.symbol()
    }

    /// Mints through the installed mint handler; returns the minted amount.
    ///
    /// Payable: `env.value` is forwarded to the handler. The handler may
    /// override the quantity.
    pub fn mint(&self, env: CallEnv, to: Address, amount: Amount, data: &[u8]) -> CoreResult<Amount> {
        run_token_op(&self.core, "mint", || {
            require_nonzero(&to)?;
            if amount == 0 {
                return Err(CoreError::ZeroAmount);
            }
            let outcome = self.core.dispatcher().dispatch(
                env,
                HookArgs::Mint {
                    to,
                    token_id: None,
                    quantity: amount,
                    data: data.to_vec(),
                },
            )?;
            let (_, quantity) = apply_mint_directive(&outcome, None, amount)?;

            self.ledger().mint(&to, quantity)?;
            self.core.emit(&CoreEvent::Transfer {
                operator: env.caller,
                from: Address::ZERO,
                to,
                token_id: None,
                amount: quantity,
            })?;
            Ok(quantity)
        })
    }

    /// Moves the caller's own tokens.
    pub fn transfer(&self, env: CallEnv, to: Address, amount: Amount) -> CoreResult<()> {
        self.move_tokens(env, env.caller, to, amount, "transfer")
    }

    /// Moves tokens of `from`, spending the caller's allowance unless the
    /// caller is `from`.
    pub fn transfer_from(&self, env: CallEnv, from: Address, to: Address, amount: Amount) -> CoreResult<()> {
        self.move_tokens(env, from, to, amount, "transfer_from")
    }

    pub fn approve(&self, env: CallEnv, spender: Address, amount: Amount) -> CoreResult<()> {
        run_token_op(&self.core, "approve", || {
            require_nonzero(&spender)?;
            self.core.dispatcher().dispatch(
                env,
                HookArgs::Approve {
                    owner: env.caller,
                    spender,
                    token_id: None,
                    amount,
                },
            )?;
            self.ledger().set_allowance(&env.caller, &spender, amount)?;
            self.core.emit(&CoreEvent::Approval {
                owner: env.caller,
                spender,
                token_id: None,
                amount,
            })
        })
    }

    /// Burns tokens of `from`; a caller other than `from` spends allowance.
    pub fn burn(&self, env: CallEnv, from: Address, amount: Amount, data: &[u8]) -> CoreResult<()> {
        run_token_op(&self.core, "burn", || {
            require_nonzero(&from)?;
            self.core.dispatcher().dispatch(
                env,
                HookArgs::Burn {
                    from,
                    token_id: None,
                    quantity: amount,
                    data: data.to_vec(),
                },
            )?;
            let ledger = self.ledger();
            if env.caller != from {
                ledger.spend_allowance(&from, &env.caller, amount)?;
            }
            ledger.burn(&from, amount)?;
            self.core.emit(&CoreEvent::Transfer {
                operator: env.caller,
                from,
                to: Address::ZERO,
                token_id: None,
                amount,
            })
        })
    }

    pub fn balance_of(&self, account: &Address) -> CoreResult<Amount> {
        Ok(self.ledger().balance_of(account)?)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> CoreResult<Amount> {
        Ok(self.ledger().allowance(owner, spender)?)
    }

    pub fn total_supply(&self) -> CoreResult<Amount> {
        Ok(self.ledger().total_supply()?)
    }

    fn move_tokens(
        &self,
        env: CallEnv,
        from: Address,
        to: Address,
        amount: Amount,
        operation: &str,
    ) -> CoreResult<()> {
        run_token_op(&self.core, operation, || {
            require_nonzero(&from)?;
            require_nonzero(&to)?;
            self.core.dispatcher().dispatch(
                env,
                HookArgs::Transfer {
                    from,
                    to,
                    token_id: None,
                    quantity: amount,
                },
            )?;
            let ledger = self.ledger();
            if env.caller != from {
                ledger.spend_allowance(&from, &env.caller, amount)?;
            }
            ledger.transfer(&from, &to, amount)?;
            self.core.emit(&CoreEvent::Transfer {
                operator: env.caller,
                from,
                to,
                token_id: None,
                amount,
            })
        })
    }

    fn ledger(&self) -> SqliteFungibleLedger<'conn> {
        SqliteFungibleLedger::new(self.core.conn())
    }
}
