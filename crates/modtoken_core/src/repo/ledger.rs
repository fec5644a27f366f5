//! Token accounting boundary.
//!
//! # Responsibility
//! - Define the accounting contracts token cores mutate after dispatch.
//! - Report accounting failures as semantic errors.
//!
//! # Invariants
//! - Ledger methods never call extensions and never touch registry state.
//! - A failing ledger call leaves its own tables unchanged.
//! - Authorization (owner, approval, operator) is decided by the token core,
//!   not by the ledger.

use crate::model::address::Address;
use crate::model::hook::{Amount, TokenId};
use crate::repo::{amount_to_db, parse_amount, RepoError};
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Accounting failures.
#[derive(Debug)]
pub enum LedgerError {
    InsufficientBalance {
        account: Address,
        needed: Amount,
        available: Amount,
    },
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        needed: Amount,
        available: Amount,
    },
    TokenNotFound(TokenId),
    TokenAlreadyExists(TokenId),
    NotTokenOwner {
        account: Address,
        token_id: TokenId,
    },
    Overflow,
    /// One mint asked for more sequential tokens than a single call may create.
    MintBatchTooLarge {
        requested: Amount,
        limit: Amount,
    },
    Repo(RepoError),
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientBalance {
                account,
                needed,
                available,
            } => write!(
                f,
                "insufficient balance for {account}: needed {needed}, available {available}"
            ),
            Self::InsufficientAllowance {
                owner,
                spender,
                needed,
                available,
            } => write!(
                f,
                "insufficient allowance from {owner} to {spender}: needed {needed}, available {available}"
            ),
            Self::TokenNotFound(id) => write!(f, "token not found: {id}"),
            Self::TokenAlreadyExists(id) => write!(f, "token already exists: {id}"),
            Self::NotTokenOwner { account, token_id } => {
                write!(f, "{account} does not own token {token_id}")
            }
            Self::Overflow => write!(f, "arithmetic overflow in ledger"),
            Self::MintBatchTooLarge { requested, limit } => {
                write!(f, "mint batch of {requested} tokens exceeds limit {limit}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LedgerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for LedgerError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

/// Fungible balances, allowances and supply.
pub trait FungibleLedger {
    fn balance_of(&self, account: &Address) -> LedgerResult<Amount>;
    fn total_supply(&self) -> LedgerResult<Amount>;
    fn allowance(&self, owner: &Address, spender: &Address) -> LedgerResult<Amount>;
    fn mint(&self, to: &Address, amount: Amount) -> LedgerResult<()>;
    fn burn(&self, from: &Address, amount: Amount) -> LedgerResult<()>;
    fn transfer(&self, from: &Address, to: &Address, amount: Amount) -> LedgerResult<()>;
    fn set_allowance(&self, owner: &Address, spender: &Address, amount: Amount)
        -> LedgerResult<()>;
    /// Decreases an allowance; `Amount::MAX` allowances are never spent.
    fn spend_allowance(
        &self,
        owner: &Address,
        spender: &Address,
        amount: Amount,
    ) -> LedgerResult<()>;
}

/// Unique token ownership with per-token and per-operator approvals.
pub trait NonFungibleLedger {
    fn owner_of(&self, token_id: TokenId) -> LedgerResult<Option<Address>>;
    fn balance_of(&self, account: &Address) -> LedgerResult<Amount>;
    fn total_supply(&self) -> LedgerResult<Amount>;
    /// Next id `mint_sequence` will assign.
    fn next_token_id(&self) -> LedgerResult<TokenId>;
    /// Mints `quantity` sequential ids starting at `next_token_id`.
    ///
    /// Implementations may bound `quantity` per call.
    fn mint_sequence(&self, to: &Address, quantity: Amount) -> LedgerResult<Vec<TokenId>>;
    fn burn(&self, token_id: TokenId) -> LedgerResult<()>;
    /// Moves ownership and clears the per-token approval.
    fn transfer(&self, from: &Address, to: &Address, token_id: TokenId) -> LedgerResult<()>;
    fn approved(&self, token_id: TokenId) -> LedgerResult<Option<Address>>;
    fn set_approved(&self, token_id: TokenId, spender: Option<&Address>) -> LedgerResult<()>;
    fn is_operator(&self, owner: &Address, operator: &Address) -> LedgerResult<bool>;
    fn set_operator(&self, owner: &Address, operator: &Address, approved: bool)
        -> LedgerResult<()>;
}

/// Per-id balances and supply with per-operator approvals.
pub trait MultiTokenLedger {
    fn balance_of(&self, account: &Address, token_id: TokenId) -> LedgerResult<Amount>;
    fn total_supply(&self, token_id: TokenId) -> LedgerResult<Amount>;
    fn mint(&self, to: &Address, token_id: TokenId, amount: Amount) -> LedgerResult<()>;
    fn burn(&self, from: &Address, token_id: TokenId, amount: Amount) -> LedgerResult<()>;
    fn transfer(
        &self,
        from: &Address,
        to: &Address,
        token_id: TokenId,
        amount: Amount,
    ) -> LedgerResult<()>;
    fn is_operator(&self, owner: &Address, operator: &Address) -> LedgerResult<bool>;
    fn set_operator(&self, owner: &Address, operator: &Address, approved: bool)
        -> LedgerResult<()>;
}

pub(crate) fn read_counter(conn: &Connection, name: &str) -> LedgerResult<u128> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM acct_counters WHERE name = ?1;",
            [name],
            |row| row.get(0),
        )
        .optional()?;
    match raw {
        Some(value) => Ok(parse_amount(&value, "acct_counters.value")?),
        None => Ok(0),
    }
}

pub(crate) fn write_counter(conn: &Connection, name: &str, value: u128) -> LedgerResult<()> {
    conn.execute(
        "INSERT INTO acct_counters (name, value) VALUES (?1, ?2)
         ON CONFLICT (name) DO UPDATE SET value = excluded.value;",
        params![name, amount_to_db(value)],
    )?;
    Ok(())
}

pub(crate) fn operator_approved(
    conn: &Connection,
    owner: &Address,
    operator: &Address,
) -> LedgerResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM acct_operator_approvals WHERE owner = ?1 AND operator = ?2
        );",
        params![owner.to_string(), operator.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn set_operator_approval(
    conn: &Connection,
    owner: &Address,
    operator: &Address,
    approved: bool,
) -> LedgerResult<()> {
    let sql = if approved {
        "INSERT OR IGNORE INTO acct_operator_approvals (owner, operator) VALUES (?1, ?2);"
    } else {
        "DELETE FROM acct_operator_approvals WHERE owner = ?1 AND operator = ?2;"
    };
    conn.execute(sql, params![owner.to_string(), operator.to_string()])?;
    Ok(())
}
