//! Role lifecycle: create, read, rename, delete.

use crate::core::role_migrator::RoleMigrator;
use crate::core::store::{StoreClient, StoreOp};
use crate::error::{Error, Result};
use crate::models::role::Role;
use tracing::info;

/// Create an empty role. An existing role is not adopted.
pub fn create<S: StoreClient + ?Sized>(store: &S, name: &str) -> Result<Role> {
    validate_name(name)?;
    if store.get_role(name)?.is_some() {
        return Err(Error::AlreadyExists {
            op: StoreOp::GetRole,
            target: name.to_string(),
        });
    }
    store.create_role(name)?;
    info!(role = %name, "role created");
    read(store, name)
}

pub fn read<S: StoreClient + ?Sized>(store: &S, name: &str) -> Result<Role> {
    validate_name(name)?;
    store.get_role(name)?.ok_or_else(|| Error::NotFound {
        op: StoreOp::GetRole,
        target: name.to_string(),
    })
}

pub fn rename<S: StoreClient + ?Sized>(store: &S, old: &str, new: &str) -> Result<Role> {
    RoleMigrator::new(store).rename(old, new)
}

pub fn delete<S: StoreClient + ?Sized>(store: &S, name: &str) -> Result<()> {
    read(store, name)?;
    store.delete_role(name)?;
    info!(role = %name, "role deleted");
    Ok(())
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid("role name must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory::MemoryStore;
    use crate::error::ErrorKind;

    #[test]
    fn test_create_then_read() {
        let store = MemoryStore::new();
        let role = create(&store, "reader").unwrap();
        assert_eq!(role, Role::new("reader"));
        assert_eq!(read(&store, "reader").unwrap().name, "reader");
    }

    #[test]
    fn test_create_refuses_existing() {
        let store = MemoryStore::new();
        store.create_role("reader").unwrap();
        let err = create(&store, "reader").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(store.calls(StoreOp::CreateRole), 1);
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = delete(&store, "ghost").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(store.calls(StoreOp::DeleteRole), 0);
    }

    #[test]
    fn test_empty_name_rejected() {
        let store = MemoryStore::new();
        assert_eq!(
            read(&store, "").unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }
}
