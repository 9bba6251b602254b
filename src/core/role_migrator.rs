//! Role rename by copy: create the new role, copy every grant, then delete
//! the old role.
//!
//! The store has no rename primitive. The old role is only deleted once the
//! new one carries every grant, so a failure partway leaves the old role
//! intact and reports exactly which grants were copied.

use crate::core::store::{StoreClient, StoreOp};
use crate::error::{Error, Migrated, Result};
use crate::models::role::Role;
use tracing::{debug, info, warn};

pub struct RoleMigrator<'a, S: StoreClient + ?Sized> {
    store: &'a S,
}

impl<'a, S: StoreClient + ?Sized> RoleMigrator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Rename `old` to `new`, returning the new role.
    ///
    /// Errors:
    /// - `NotFound` when `old` does not exist.
    /// - `AlreadyExists` when `new` exists, including when another caller
    ///   creates it between the check and the create.
    /// - `PartialMigration` when a grant fails; `old` is kept.
    /// - `CleanupFailed` when every grant landed but `old` could not be deleted.
    pub fn rename(&self, old: &str, new: &str) -> Result<Role> {
        if old.is_empty() || new.is_empty() {
            return Err(Error::invalid("role names must not be empty"));
        }
        if old == new {
            return Err(Error::invalid(format!(
                "role '{}' cannot be renamed to itself",
                old
            )));
        }

        let source = self
            .store
            .get_role(old)?
            .ok_or_else(|| Error::NotFound {
                op: StoreOp::GetRole,
                target: old.to_string(),
            })?;
        if self.store.get_role(new)?.is_some() {
            return Err(Error::AlreadyExists {
                op: StoreOp::GetRole,
                target: new.to_string(),
            });
        }

        self.store.create_role(new)?;
        debug!(role = %new, "created rename target");

        let mut granted = Vec::with_capacity(source.permissions.len());
        for (i, perm) in source.permissions.iter().enumerate() {
            if let Err(e) = self.store.grant_permission(new, perm) {
                warn!(from = %old, to = %new, copied = i, error = %e, "role rename stopped partway");
                return Err(Error::PartialMigration {
                    items: "permissions",
                    from: old.to_string(),
                    to: new.to_string(),
                    granted: granted.into_iter().map(Migrated::Permission).collect(),
                    remaining: source.permissions[i..]
                        .iter()
                        .cloned()
                        .map(Migrated::Permission)
                        .collect(),
                    source: Box::new(e),
                });
            }
            granted.push(perm.clone());
        }

        if let Err(e) = self.store.delete_role(old) {
            return Err(Error::CleanupFailed {
                from: old.to_string(),
                to: new.to_string(),
                source: Box::new(e),
            });
        }
        info!(from = %old, to = %new, permissions = granted.len(), "role renamed");

        let local = Role {
            name: new.to_string(),
            permissions: granted,
        };
        match self.store.get_role(new) {
            Ok(Some(role)) => Ok(role),
            Ok(None) => {
                warn!(role = %new, "renamed role not visible on re-read");
                Ok(local)
            }
            Err(e) => {
                warn!(role = %new, error = %e, "re-read after rename failed");
                Ok(local)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory::MemoryStore;
    use crate::error::ErrorKind;
    use crate::models::permission::{AccessLevel, Permission};

    fn seeded(perms: &[Permission]) -> MemoryStore {
        let store = MemoryStore::new();
        store.create_role("admin").unwrap();
        for p in perms {
            store.grant_permission("admin", p).unwrap();
        }
        store
    }

    #[test]
    fn test_rename_to_itself_is_invalid() {
        let store = seeded(&[]);
        let err = RoleMigrator::new(&store).rename("admin", "admin").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(store.calls(StoreOp::GetRole), 0);
    }

    #[test]
    fn test_rename_empty_role() {
        let store = seeded(&[]);
        let role = RoleMigrator::new(&store).rename("admin", "ops").unwrap();
        assert_eq!(role.name, "ops");
        assert!(role.permissions.is_empty());
        assert!(store.get_role("admin").unwrap().is_none());
    }

    #[test]
    fn test_enrichment_read_failure_is_swallowed() {
        let store = seeded(&[Permission::new("/a", "", AccessLevel::Read)]);
        // calls 1 and 2 are the precondition reads; 3 is the re-read
        store.fail_call(StoreOp::GetRole, 3, ErrorKind::Timeout);
        let role = RoleMigrator::new(&store).rename("admin", "ops").unwrap();
        assert_eq!(role.name, "ops");
        assert_eq!(role.permissions, vec![Permission::new("/a", "", AccessLevel::Read)]);
    }

    #[test]
    fn test_create_race_surfaces_already_exists() {
        let store = seeded(&[]);
        store.fail_call(StoreOp::CreateRole, 2, ErrorKind::AlreadyExists);
        let err = RoleMigrator::new(&store).rename("admin", "ops").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert!(store.get_role("admin").unwrap().is_some());
        assert_eq!(store.calls(StoreOp::DeleteRole), 0);
    }

    #[test]
    fn test_timeout_on_lookup_aborts_before_mutation() {
        let store = seeded(&[]);
        store.fail_call(StoreOp::GetRole, 1, ErrorKind::Timeout);
        let err = RoleMigrator::new(&store).rename("admin", "ops").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        // only the seeding create
        assert_eq!(store.calls(StoreOp::CreateRole), 1);
    }
}
