//! Permission gate for registry mutation and restricted entrypoints.
//!
//! # Responsibility
//! - Answer "may this caller mutate the registry?" as a plain boolean.
//! - Define the role vocabulary stored in `core_roles`.
//!
//! # Invariants
//! - A gate that cannot read its backing store denies.
//! - Token operations never consult the gate.

use crate::model::address::Address;
use crate::repo::role_repo::SqliteRoleRepository;
use log::error;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Role stored value for extension installers.
pub const ROLE_INSTALLER: &str = "installer";

/// Role grantable on top of core ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CoreRole {
    /// May install and uninstall extensions and call restricted entrypoints.
    Installer,
}

impl CoreRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Installer => ROLE_INSTALLER,
        }
    }
}

/// Parses one role from its stored string value.
pub fn parse_core_role(value: &str) -> Result<CoreRole, CoreRoleError> {
    let normalized = value.trim();
    if normalized.is_empty() {
        return Err(CoreRoleError::EmptyRole);
    }
    match normalized {
        ROLE_INSTALLER => Ok(CoreRole::Installer),
        other => Err(CoreRoleError::UnsupportedRole(other.to_string())),
    }
}

/// Role parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreRoleError {
    EmptyRole,
    UnsupportedRole(String),
}

impl Display for CoreRoleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyRole => write!(f, "role value must not be empty"),
            Self::UnsupportedRole(value) => write!(f, "role is unsupported: {value}"),
        }
    }
}

impl Error for CoreRoleError {}

/// Admission check consumed by the registry and entrypoint router.
pub trait PermissionGate {
    fn is_authorized(&self, caller: &Address) -> bool;
}

/// Gate backed by the owner/role store: admits the owner and installers.
pub struct RoleGate<'conn> {
    roles: SqliteRoleRepository<'conn>,
}

impl<'conn> RoleGate<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            roles: SqliteRoleRepository::new(conn),
        }
    }
}

impl PermissionGate for RoleGate<'_> {
    fn is_authorized(&self, caller: &Address) -> bool {
        match self.roles.owner() {
            Ok(Some(owner)) if owner == *caller => return true,
            Ok(_) => {}
            Err(err) => {
                error!("event=gate_check module=registry status=error stage=owner error={err}");
                return false;
            }
        }
        match self.roles.has_role(caller, CoreRole::Installer) {
            Ok(granted) => granted,
            Err(err) => {
                error!("event=gate_check module=registry status=error stage=role error={err}");
                false
            }
        }
    }
}
