//! Role bindings: which users hold which roles.

use crate::core::store::{StoreClient, StoreOp};
use crate::error::{Error, Result};
use tracing::info;

/// Grant `role` to `user`; both must already exist.
pub fn grant<S: StoreClient + ?Sized>(store: &S, user: &str, role: &str) -> Result<()> {
    ensure_user(store, user)?;
    ensure_role(store, role)?;
    store.grant_role_to_user(user, role)?;
    info!(user = %user, role = %role, "role granted");
    Ok(())
}

/// Succeeds when `user` currently holds `role`.
pub fn read<S: StoreClient + ?Sized>(store: &S, user: &str, role: &str) -> Result<()> {
    ensure_role(store, role)?;
    let holder = store.get_user(user)?.ok_or_else(|| Error::NotFound {
        op: StoreOp::GetUser,
        target: user.to_string(),
    })?;
    if !holder.has_role(role) {
        return Err(Error::NotFound {
            op: StoreOp::GetUser,
            target: format!("{} role {}", user, role),
        });
    }
    Ok(())
}

pub fn revoke<S: StoreClient + ?Sized>(store: &S, user: &str, role: &str) -> Result<()> {
    store.revoke_role_from_user(user, role)?;
    info!(user = %user, role = %role, "role revoked");
    Ok(())
}

fn ensure_user<S: StoreClient + ?Sized>(store: &S, user: &str) -> Result<()> {
    match store.get_user(user)? {
        Some(_) => Ok(()),
        None => Err(Error::NotFound {
            op: StoreOp::GetUser,
            target: user.to_string(),
        }),
    }
}

fn ensure_role<S: StoreClient + ?Sized>(store: &S, role: &str) -> Result<()> {
    match store.get_role(role)? {
        Some(_) => Ok(()),
        None => Err(Error::NotFound {
            op: StoreOp::GetRole,
            target: role.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory::MemoryStore;
    use crate::error::ErrorKind;

    #[test]
    fn test_grant_requires_user_first() {
        let store = MemoryStore::new();
        store.create_role("r").unwrap();
        let err = grant(&store, "ghost", "r").unwrap_err();
        assert!(matches!(err, Error::NotFound { op: StoreOp::GetUser, .. }));
        assert_eq!(store.calls(StoreOp::GrantRole), 0);
    }

    #[test]
    fn test_grant_requires_role_first() {
        let store = MemoryStore::new();
        store.create_user("u", "pw").unwrap();
        let err = grant(&store, "u", "ghost").unwrap_err();
        assert!(matches!(err, Error::NotFound { op: StoreOp::GetRole, .. }));
    }

    #[test]
    fn test_grant_read_revoke() {
        let store = MemoryStore::new();
        store.create_user("u", "pw").unwrap();
        store.create_role("r").unwrap();
        grant(&store, "u", "r").unwrap();
        read(&store, "u", "r").unwrap();
        revoke(&store, "u", "r").unwrap();
        assert_eq!(read(&store, "u", "r").unwrap_err().kind(), ErrorKind::NotFound);
    }
}
