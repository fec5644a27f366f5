//! Repository layer over the namespaced SQLite tables.
//!
//! # Responsibility
//! - Isolate SQL details from registry, dispatch and token orchestration.
//! - Convert persisted text (addresses, selectors, amounts) back into typed
//!   values, rejecting malformed rows instead of masking them.
//!
//! # Invariants
//! - Each repository only touches its own table namespace.
//! - Amounts and token ids are stored as canonical decimal text.

use crate::db::DbError;
use crate::model::address::Address;
use crate::model::event::Selector;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod event_log_repo;
pub mod fungible_ledger;
pub mod ledger;
pub mod metadata_repo;
pub mod multi_ledger;
pub mod native_repo;
pub mod nft_ledger;
pub mod registry_repo;
pub mod role_repo;
pub mod state_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Storage-level failure shared by all repositories.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

pub(crate) fn amount_to_db(value: u128) -> String {
    value.to_string()
}

pub(crate) fn parse_amount(value: &str, column: &str) -> RepoResult<u128> {
    value
        .parse::<u128>()
        .map_err(|_| RepoError::InvalidData(format!("invalid amount `{value}` in {column}")))
}

pub(crate) fn parse_address(value: &str, column: &str) -> RepoResult<Address> {
    Address::parse(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid address `{value}` in {column}")))
}

pub(crate) fn parse_selector(value: &str, column: &str) -> RepoResult<Selector> {
    Selector::parse(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid selector `{value}` in {column}")))
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn parse_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}
