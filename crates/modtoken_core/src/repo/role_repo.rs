//! Owner and role store (`core_roles`, owner in `core_metadata`).
//!
//! # Responsibility
//! - Persist the single owner and per-account role grants.
//! - Serve as the external store behind `RoleGate`.
//!
//! # Invariants
//! - Role rows only hold values accepted by `parse_core_role`.

use crate::extension::permission::{parse_core_role, CoreRole};
use crate::model::address::Address;
use crate::repo::metadata_repo::{SqliteMetadataRepository, KEY_OWNER};
use crate::repo::{parse_address, RepoError, RepoResult};
use rusqlite::{params, Connection};
use std::collections::BTreeSet;

/// SQLite-backed owner/role store.
pub struct SqliteRoleRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRoleRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn owner(&self) -> RepoResult<Option<Address>> {
        SqliteMetadataRepository::new(self.conn)
            .get(KEY_OWNER)?
            .map(|raw| parse_address(&raw, "core_metadata.owner"))
            .transpose()
    }

    pub fn set_owner(&self, owner: &Address) -> RepoResult<()> {
        SqliteMetadataRepository::new(self.conn).set(KEY_OWNER, &owner.to_string())
    }

    pub fn grant(&self, account: &Address, role: CoreRole) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO core_roles (account, role) VALUES (?1, ?2);",
            params![account.to_string(), role.as_str()],
        )?;
        Ok(())
    }

    /// Returns `false` when the account did not hold the role.
    pub fn revoke(&self, account: &Address, role: CoreRole) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM core_roles WHERE account = ?1 AND role = ?2;",
            params![account.to_string(), role.as_str()],
        )?;
        Ok(changed > 0)
    }

    pub fn has_role(&self, account: &Address, role: CoreRole) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM core_roles WHERE account = ?1 AND role = ?2);",
            params![account.to_string(), role.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    pub fn roles_of(&self, account: &Address) -> RepoResult<BTreeSet<CoreRole>> {
        let mut stmt = self
            .conn
            .prepare("SELECT role FROM core_roles WHERE account = ?1;")?;
        let mut rows = stmt.query([account.to_string()])?;
        let mut roles = BTreeSet::new();
        while let Some(row) = rows.next()? {
            let raw: String = row.get(0)?;
            let role = parse_core_role(&raw).map_err(|err| {
                RepoError::InvalidData(format!("{err} in core_roles.role"))
            })?;
            roles.insert(role);
        }
        Ok(roles)
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteRoleRepository;
    use crate::db::open_db_in_memory;
    use crate::extension::permission::CoreRole;
    use crate::model::address::Address;

    #[test]
    fn grant_is_idempotent_and_revoke_reports_change() {
        let conn = open_db_in_memory().expect("open db");
        let repo = SqliteRoleRepository::new(&conn);
        let admin = Address::derive("admin");

        repo.grant(&admin, CoreRole::Installer).expect("grant");
        repo.grant(&admin, CoreRole::Installer).expect("repeat grant");
        assert!(repo.has_role(&admin, CoreRole::Installer).expect("has role"));
        assert_eq!(repo.roles_of(&admin).expect("roles").len(), 1);

        assert!(repo.revoke(&admin, CoreRole::Installer).expect("revoke"));
        assert!(!repo.revoke(&admin, CoreRole::Installer).expect("second revoke"));
        assert!(!repo.has_role(&admin, CoreRole::Installer).expect("has role"));
    }

    #[test]
    fn owner_round_trips_through_metadata() {
        let conn = open_db_in_memory().expect("open db");
        let repo = SqliteRoleRepository::new(&conn);
        assert_eq!(repo.owner().expect("owner"), None);

        let owner = Address::derive("owner");
        repo.set_owner(&owner).expect("set owner");
        assert_eq!(repo.owner().expect("owner"), Some(owner));
    }
}
