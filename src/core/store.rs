//! The store collaborator: every remote operation the adapter performs.
//!
//! Implementations bound each call by their own request timeout and report
//! failures as [`Error`] values naming the operation and its target.

use crate::error::Result;
use crate::models::kv::KeyValue;
use crate::models::permission::Permission;
use crate::models::role::Role;
use crate::models::user::User;
use serde::Serialize;
use std::fmt;

/// Remote operation identifiers, used in errors, logs, and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOp {
    Get,
    GetPrefix,
    Put,
    Delete,
    GetRole,
    CreateRole,
    DeleteRole,
    GrantPermission,
    RevokePermission,
    GetUser,
    CreateUser,
    DeleteUser,
    ChangePassword,
    GrantRole,
    RevokeRole,
    EndpointHealth,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StoreOp::Get => "get key",
            StoreOp::GetPrefix => "get prefix",
            StoreOp::Put => "put key",
            StoreOp::Delete => "delete key",
            StoreOp::GetRole => "get role",
            StoreOp::CreateRole => "create role",
            StoreOp::DeleteRole => "delete role",
            StoreOp::GrantPermission => "grant permission",
            StoreOp::RevokePermission => "revoke permission",
            StoreOp::GetUser => "get user",
            StoreOp::CreateUser => "create user",
            StoreOp::DeleteUser => "delete user",
            StoreOp::ChangePassword => "change password",
            StoreOp::GrantRole => "grant role",
            StoreOp::RevokeRole => "revoke role",
            StoreOp::EndpointHealth => "endpoint health",
        };
        f.write_str(s)
    }
}

pub trait StoreClient {
    /// Read one key; `None` when absent.
    fn get(&self, key: &str) -> Result<Option<KeyValue>>;

    /// Read every key starting with `prefix`.
    fn get_prefix(&self, prefix: &str) -> Result<Vec<KeyValue>>;

    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Delete one key, returning how many keys were removed.
    fn delete(&self, key: &str) -> Result<u64>;

    /// Read a role and its grants; `None` when absent.
    fn get_role(&self, name: &str) -> Result<Option<Role>>;

    fn create_role(&self, name: &str) -> Result<()>;

    fn delete_role(&self, name: &str) -> Result<()>;

    /// Grant `perm` to `role`, replacing any grant on the same key range.
    fn grant_permission(&self, role: &str, perm: &Permission) -> Result<()>;

    fn revoke_permission(&self, role: &str, key: &[u8], range_end: &[u8]) -> Result<()>;

    /// Read a user and its roles; `None` when absent.
    fn get_user(&self, name: &str) -> Result<Option<User>>;

    fn create_user(&self, name: &str, password: &str) -> Result<()>;

    fn delete_user(&self, name: &str) -> Result<()>;

    fn change_password(&self, name: &str, password: &str) -> Result<()>;

    fn grant_role_to_user(&self, user: &str, role: &str) -> Result<()>;

    fn revoke_role_from_user(&self, user: &str, role: &str) -> Result<()>;
}
