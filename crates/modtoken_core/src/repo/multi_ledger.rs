//! Multi-token accounting tables (`acct_multi_*`, operator approvals).

use crate::model::address::Address;
use crate::model::hook::{Amount, TokenId};
use crate::repo::ledger::{
    operator_approved, set_operator_approval, LedgerError, LedgerResult, MultiTokenLedger,
};
use crate::repo::{amount_to_db, parse_amount};
use rusqlite::{params, Connection, OptionalExtension};

/// SQLite-backed multi-token ledger.
pub struct SqliteMultiTokenLedger<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMultiTokenLedger<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn write_balance(&self, account: &Address, token_id: TokenId, amount: Amount) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO acct_multi_balances (token_id, account, amount) VALUES (?1, ?2, ?3)
             ON CONFLICT (token_id, account) DO UPDATE SET amount = excluded.amount;",
            params![amount_to_db(token_id), account.to_string(), amount_to_db(amount)],
        )?;
        Ok(())
    }

    fn write_supply(&self, token_id: TokenId, amount: Amount) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO acct_multi_supply (token_id, amount) VALUES (?1, ?2)
             ON CONFLICT (token_id) DO UPDATE SET amount = excluded.amount;",
            params![amount_to_db(token_id), amount_to_db(amount)],
        )?;
        Ok(())
    }

    fn debit(&self, account: &Address, token_id: TokenId, amount: Amount) -> LedgerResult<()> {
        let available = self.balance_of(account, token_id)?;
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                account: *account,
                needed: amount,
                available,
            });
        }
        self.write_balance(account, token_id, available - amount)
    }

    fn credit(&self, account: &Address, token_id: TokenId, amount: Amount) -> LedgerResult<()> {
        let next = self
            .balance_of(account, token_id)?
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.write_balance(account, token_id, next)
    }
}

impl MultiTokenLedger for SqliteMultiTokenLedger<'_> {
    fn balance_of(&self, account: &Address, token_id: TokenId) -> LedgerResult<Amount> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT amount FROM acct_multi_balances WHERE token_id = ?1 AND account = ?2;",
                params![amount_to_db(token_id), account.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(value) => Ok(parse_amount(&value, "acct_multi_balances.amount")?),
            None => Ok(0),
        }
    }

    fn total_supply(&self, token_id: TokenId) -> LedgerResult<Amount> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT amount FROM acct_multi_supply WHERE token_id = ?1;",
                [amount_to_db(token_id)],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(value) => Ok(parse_amount(&value, "acct_multi_supply.amount")?),
            None => Ok(0),
        }
    }

    fn mint(&self, to: &Address, token_id: TokenId, amount: Amount) -> LedgerResult<()> {
        let supply = self
            .total_supply(token_id)?
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.credit(to, token_id, amount)?;
        self.write_supply(token_id, supply)
    }

    fn burn(&self, from: &Address, token_id: TokenId, amount: Amount) -> LedgerResult<()> {
        self.debit(from, token_id, amount)?;
        let supply = self.total_supply(token_id)?.saturating_sub(amount);
        self.write_supply(token_id, supply)
    }

    fn transfer(
        &self,
        from: &Address,
        to: &Address,
        token_id: TokenId,
        amount: Amount,
    ) -> LedgerResult<()> {
        self.debit(from, token_id, amount)?;
        self.credit(to, token_id, amount)
    }

    fn is_operator(&self, owner: &Address, operator: &Address) -> LedgerResult<bool> {
        operator_approved(self.conn, owner, operator)
    }

    fn set_operator(
        &self,
        owner: &Address,
        operator: &Address,
        approved: bool,
    ) -> LedgerResult<()> {
        set_operator_approval(self.conn, owner, operator, approved)
    }
}
