//! Host-side native value ledger (`host_native_balances`).
//!
//! # Responsibility
//! - Hold the native value that payable entry points receive and forward.
//!
//! # Invariants
//! - Balances never go negative; a short transfer changes nothing.

use crate::model::address::Address;
use crate::model::hook::Amount;
use crate::repo::{amount_to_db, parse_amount, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};

/// Outcome of a native value transfer attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeTransfer {
    Done,
    Insufficient { available: Amount },
}

/// SQLite-backed native value ledger.
pub struct SqliteNativeLedger<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNativeLedger<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn balance_of(&self, account: &Address) -> RepoResult<Amount> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT amount FROM host_native_balances WHERE account = ?1;",
                [account.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(value) => parse_amount(&value, "host_native_balances.amount"),
            None => Ok(0),
        }
    }

    /// Adds value to an account, e.g. when a host funds a test account.
    pub fn credit(&self, account: &Address, amount: Amount) -> RepoResult<()> {
        let current = self.balance_of(account)?;
        let next = current.checked_add(amount).ok_or_else(|| {
            RepoError::InvalidData(format!("native balance overflow for {account}"))
        })?;
        self.write(account, next)
    }

    pub fn transfer(&self, from: &Address, to: &Address, amount: Amount) -> RepoResult<NativeTransfer> {
        if amount == 0 || from == to {
            return Ok(NativeTransfer::Done);
        }
        let available = self.balance_of(from)?;
        if available < amount {
            return Ok(NativeTransfer::Insufficient { available });
        }
        self.write(from, available - amount)?;
        self.credit(to, amount)?;
        Ok(NativeTransfer::Done)
    }

    fn write(&self, account: &Address, amount: Amount) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO host_native_balances (account, amount) VALUES (?1, ?2)
             ON CONFLICT (account) DO UPDATE SET amount = excluded.amount;",
            params![account.to_string(), amount_to_db(amount)],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{NativeTransfer, SqliteNativeLedger};
    use crate::db::open_db_in_memory;
    use crate::model::address::Address;

    #[test]
    fn transfer_moves_value_or_reports_shortfall() {
        let conn = open_db_in_memory().expect("open db");
        let ledger = SqliteNativeLedger::new(&conn);
        let alice = Address::derive("alice");
        let bob = Address::derive("bob");

        ledger.credit(&alice, 10).expect("credit");
        assert_eq!(
            ledger.transfer(&alice, &bob, 4).expect("transfer"),
            NativeTransfer::Done
        );
        assert_eq!(ledger.balance_of(&alice).expect("balance"), 6);
        assert_eq!(ledger.balance_of(&bob).expect("balance"), 4);

        assert_eq!(
            ledger.transfer(&alice, &bob, 7).expect("transfer"),
            NativeTransfer::Insufficient { available: 6 }
        );
        assert_eq!(ledger.balance_of(&alice).expect("balance"), 6);
    }
}
