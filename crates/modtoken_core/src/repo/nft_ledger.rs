//! Non-fungible accounting tables (`acct_nft_*`, operator approvals).

use crate::model::address::Address;
use crate::model::hook::{Amount, TokenId};
use crate::repo::ledger::{
    operator_approved, read_counter, set_operator_approval, write_counter, LedgerError,
    LedgerResult, NonFungibleLedger,
};
use crate::repo::{amount_to_db, parse_address};
use rusqlite::{params, Connection, OptionalExtension};

const NEXT_ID_COUNTER: &str = "nft.next_token_id";
const SUPPLY_COUNTER: &str = "nft.supply";

/// Most tokens one `mint_sequence` call may create.
pub const MAX_MINT_BATCH: Amount = 1_000;

/// SQLite-backed non-fungible ledger.
pub struct SqliteNonFungibleLedger<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNonFungibleLedger<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl NonFungibleLedger for SqliteNonFungibleLedger<'_> {
    fn owner_of(&self, token_id: TokenId) -> LedgerResult<Option<Address>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT owner FROM acct_nft_owners WHERE token_id = ?1;",
                [amount_to_db(token_id)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw
            .map(|value| parse_address(&value, "acct_nft_owners.owner"))
            .transpose()?)
    }

    fn balance_of(&self, account: &Address) -> LedgerResult<Amount> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM acct_nft_owners WHERE owner = ?1;",
            [account.to_string()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as Amount)
    }

    fn total_supply(&self) -> LedgerResult<Amount> {
        read_counter(self.conn, SUPPLY_COUNTER)
    }

    fn next_token_id(&self) -> LedgerResult<TokenId> {
        read_counter(self.conn, NEXT_ID_COUNTER)
    }

    fn mint_sequence(&self, to: &Address, quantity: Amount) -> LedgerResult<Vec<TokenId>> {
        if quantity > MAX_MINT_BATCH {
            return Err(LedgerError::MintBatchTooLarge {
                requested: quantity,
                limit: MAX_MINT_BATCH,
            });
        }
        let start = self.next_token_id()?;
        let end = start.checked_add(quantity).ok_or(LedgerError::Overflow)?;
        let supply = self
            .total_supply()?
            .checked_add(quantity)
            .ok_or(LedgerError::Overflow)?;

        let mut minted = Vec::with_capacity(quantity as usize);
        for token_id in start..end {
            if self.owner_of(token_id)?.is_some() {
                return Err(LedgerError::TokenAlreadyExists(token_id));
            }
            self.conn.execute(
                "INSERT INTO acct_nft_owners (token_id, owner) VALUES (?1, ?2);",
                params![amount_to_db(token_id), to.to_string()],
            )?;
            minted.push(token_id);
        }

        write_counter(self.conn, NEXT_ID_COUNTER, end)?;
        write_counter(self.conn, SUPPLY_COUNTER, supply)?;
        Ok(minted)
    }

    fn burn(&self, token_id: TokenId) -> LedgerResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM acct_nft_owners WHERE token_id = ?1;",
            [amount_to_db(token_id)],
        )?;
        if changed == 0 {
            return Err(LedgerError::TokenNotFound(token_id));
        }
        let supply = self.total_supply()?.saturating_sub(1);
        write_counter(self.conn, SUPPLY_COUNTER, supply)
    }

    fn transfer(&self, from: &Address, to: &Address, token_id: TokenId) -> LedgerResult<()> {
        match self.owner_of(token_id)? {
            None => return Err(LedgerError::TokenNotFound(token_id)),
            Some(owner) if owner != *from => {
                return Err(LedgerError::NotTokenOwner {
                    account: *from,
                    token_id,
                })
            }
            Some(_) => {}
        }
        self.set_approved(token_id, None)?;
        self.conn.execute(
            "UPDATE acct_nft_owners SET owner = ?1 WHERE token_id = ?2;",
            params![to.to_string(), amount_to_db(token_id)],
        )?;
        Ok(())
    }

    fn approved(&self, token_id: TokenId) -> LedgerResult<Option<Address>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT spender FROM acct_nft_approvals WHERE token_id = ?1;",
                [amount_to_db(token_id)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw
            .map(|value| parse_address(&value, "acct_nft_approvals.spender"))
            .transpose()?)
    }

    fn set_approved(&self, token_id: TokenId, spender: Option<&Address>) -> LedgerResult<()> {
        match spender {
            Some(spender) => {
                self.conn.execute(
                    "INSERT INTO acct_nft_approvals (token_id, spender) VALUES (?1, ?2)
                     ON CONFLICT (token_id) DO UPDATE SET spender = excluded.spender;",
                    params![amount_to_db(token_id), spender.to_string()],
                )?;
            }
            None => {
                self.conn.execute(
                    "DELETE FROM acct_nft_approvals WHERE token_id = ?1;",
                    [amount_to_db(token_id)],
                )?;
            }
        }
        Ok(())
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

#[cfg(test)]
mod tests {
    use super::{SqliteNonFungibleLedger, MAX_MINT_BATCH};
    use crate::db::open_db_in_memory;
    use crate::model::address::Address;
    use crate::repo::ledger::{LedgerError, NonFungibleLedger};

    #[test]
    fn mints_sequential_ids_and_tracks_supply() {
        let conn = open_db_in_memory().expect("open db");
        let ledger = SqliteNonFungibleLedger::new(&conn);
        let alice = Address::derive("alice");

        assert_eq!(ledger.mint_sequence(&alice, 3).expect("mint"), vec![0, 1, 2]);
        assert_eq!(ledger.mint_sequence(&alice, 1).expect("mint"), vec![3]);
        assert_eq!(ledger.next_token_id().expect("next id"), 4);
        assert_eq!(ledger.balance_of(&alice).expect("balance"), 4);

        ledger.burn(2).expect("burn");
        assert_eq!(ledger.total_supply().expect("supply"), 3);
        assert_eq!(ledger.owner_of(2).expect("owner"), None);
        // Burned ids are never reassigned.
        assert_eq!(ledger.next_token_id().expect("next id"), 4);
    }

    #[test]
    fn transfer_clears_token_approval() {
        let conn = open_db_in_memory().expect("open db");
        let ledger = SqliteNonFungibleLedger::new(&conn);
        let alice = Address::derive("alice");
        let bob = Address::derive("bob");
        let spender = Address::derive("spender");
        ledger.mint_sequence(&alice, 1).expect("mint");
        ledger.set_approved(0, Some(&spender)).expect("approve");

        ledger.transfer(&alice, &bob, 0).expect("transfer");
        assert_eq!(ledger.owner_of(0).expect("owner"), Some(bob));
        assert_eq!(ledger.approved(0).expect("approved"), None);
    }

    #[test]
    fn transfer_from_non_owner_fails() {
        let conn = open_db_in_memory().expect("open db");
        let ledger = SqliteNonFungibleLedger::new(&conn);
        let alice = Address::derive("alice");
        let bob = Address::derive("bob");
        ledger.mint_sequence(&alice, 1).expect("mint");

        assert!(matches!(
            ledger.transfer(&bob, &alice, 0),
            Err(LedgerError::NotTokenOwner { token_id: 0, .. })
        ));
        assert!(matches!(
            ledger.transfer(&alice, &bob, 9),
            Err(LedgerError::TokenNotFound(9))
        ));
    }

    #[test]
    fn oversized_batch_is_rejected_without_writes() {
        let conn = open_db_in_memory().expect("open db");
        let ledger = SqliteNonFungibleLedger::new(&conn);
        let alice = Address::derive("alice");

        assert!(matches!(
            ledger.mint_sequence(&alice, MAX_MINT_BATCH + 1),
            Err(LedgerError::MintBatchTooLarge { limit: MAX_MINT_BATCH, .. })
        ));
        assert!(matches!(
            ledger.mint_sequence(&alice, u128::MAX),
            Err(LedgerError::MintBatchTooLarge { .. })
        ));
        assert_eq!(ledger.next_token_id().expect("next id"), 0);
        assert_eq!(ledger.total_supply().expect("supply"), 0);
    }
}
