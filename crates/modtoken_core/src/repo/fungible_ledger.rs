//! Fungible accounting tables (`acct_fungible_*`, supply counter).

use crate::model::address::Address;
use crate::model::hook::Amount;
use crate::repo::ledger::{read_counter, write_counter, FungibleLedger, LedgerError, LedgerResult};
use crate::repo::{amount_to_db, parse_amount};
use rusqlite::{params, Connection, OptionalExtension};

const SUPPLY_COUNTER: &str = "fungible.supply";

/// SQLite-backed fungible ledger.
pub struct SqliteFungibleLedger<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteFungibleLedger<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn write_balance(&self, account: &Address, amount: Amount) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO acct_fungible_balances (account, amount) VALUES (?1, ?2)
             ON CONFLICT (account) DO UPDATE SET amount = excluded.amount;",
            params![account.to_string(), amount_to_db(amount)],
        )?;
        Ok(())
    }

    fn debit(&self, account: &Address, amount: Amount) -> LedgerResult<()> {
        let available = self.balance_of(account)?;
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                account: *account,
                needed: amount,
                available,
            });
        }
        self.write_balance(account, available - amount)
    }

    fn credit(&self, account: &Address, amount: Amount) -> LedgerResult<()> {
        let next = self
            .balance_of(account)?
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.write_balance(account, next)
    }
}

impl FungibleLedger for SqliteFungibleLedger<'_> {
    fn balance_of(&self, account: &Address) -> LedgerResult<Amount> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT amount FROM acct_fungible_balances WHERE account = ?1;",
                [account.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(value) => Ok(parse_amount(&value, "acct_fungible_balances.amount")?),
            None => Ok(0),
        }
    }

    fn total_supply(&self) -> LedgerResult<Amount> {
        read_counter(self.conn, SUPPLY_COUNTER)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> LedgerResult<Amount> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT amount FROM acct_fungible_allowances WHERE owner = ?1 AND spender = ?2;",
                params![owner.to_string(), spender.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(value) => Ok(parse_amount(&value, "acct_fungible_allowances.amount")?),
            None => Ok(0),
        }
    }

    fn mint(&self, to: &Address, amount: Amount) -> LedgerResult<()> {
        let supply = self
            .total_supply()?
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.credit(to, amount)?;
        write_counter(self.conn, SUPPLY_COUNTER, supply)
    }

    fn burn(&self, from: &Address, amount: Amount) -> LedgerResult<()> {
        self.debit(from, amount)?;
        let supply = self.total_supply()?.saturating_sub(amount);
        write_counter(self.conn, SUPPLY_COUNTER, supply)
    }

    fn transfer(&self, from: &Address, to: &Address, amount: Amount) -> LedgerResult<()> {
        self.debit(from, amount)?;
        self.credit(to, amount)
    }

    fn set_allowance(
        &self,
        owner: &Address,
        spender: &Address,
        amount: Amount,
    ) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO acct_fungible_allowances (owner, spender, amount) VALUES (?1, ?2, ?3)
             ON CONFLICT (owner, spender) DO UPDATE SET amount = excluded.amount;",
            params![owner.to_string(), spender.to_string(), amount_to_db(amount)],
        )?;
        Ok(())
    }

    fn spend_allowance(
        &self,
        owner: &Address,
        spender: &Address,
        amount: Amount,
    ) -> LedgerResult<()> {
        let available = self.allowance(owner, spender)?;
        if available == Amount::MAX {
            return Ok(());
        }
        if available < amount {
            return Err(LedgerError::InsufficientAllowance {
                owner: *owner,
                spender: *spender,
                needed: amount,
                available,
            });
        }
        self.set_allowance(owner, spender, available - amount)
    }
}
