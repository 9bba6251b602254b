//! Permission grants on roles.

use crate::core::store::{StoreClient, StoreOp};
use crate::error::{Error, Result};
use crate::models::permission::{AccessLevel, KeyRange, Permission};
use tracing::info;

/// Grant `access` on `key`/`range` to `role`. Re-granting the same range
/// replaces its access level.
pub fn grant<S: StoreClient + ?Sized>(
    store: &S,
    role: &str,
    key: &str,
    range: &KeyRange,
    access: AccessLevel,
) -> Result<Permission> {
    validate(key, range)?;
    let perm = Permission::new(key, range.range_end(key), access);
    store.grant_permission(role, &perm)?;
    info!(role = %role, permission = %perm, "permission granted");
    read(store, role, key, range)
}

/// The grant on `key`/`range` held by `role`.
pub fn read<S: StoreClient + ?Sized>(
    store: &S,
    role: &str,
    key: &str,
    range: &KeyRange,
) -> Result<Permission> {
    validate(key, range)?;
    let range_end = range.range_end(key);
    let found = store
        .get_role(role)?
        .ok_or_else(|| Error::NotFound {
            op: StoreOp::GetRole,
            target: role.to_string(),
        })?
        .find_permission(key.as_bytes(), &range_end)
        .cloned();
    found.ok_or_else(|| Error::NotFound {
        op: StoreOp::GetRole,
        target: format!("{} permission on {}", role, key),
    })
}

pub fn revoke<S: StoreClient + ?Sized>(
    store: &S,
    role: &str,
    key: &str,
    range: &KeyRange,
) -> Result<()> {
    let perm = read(store, role, key, range)?;
    store.revoke_permission(role, &perm.key, &perm.range_end)?;
    info!(role = %role, permission = %perm, "permission revoked");
    Ok(())
}

fn validate(key: &str, range: &KeyRange) -> Result<()> {
    if key.is_empty() {
        return Err(Error::invalid("permission key must not be empty"));
    }
    if let KeyRange::Until(end) = range {
        if end.is_empty() {
            return Err(Error::invalid(
                "range end must not be empty; omit it to grant a single key",
            ));
        }
        if end.as_str() <= key {
            return Err(Error::invalid(format!(
                "range end '{}' must sort after key '{}'",
                end, key
            )));
        }
    }
    Ok(())
}
