//! Adapter logic, independent of the CLI.

pub mod audit_log;
pub mod keys;
pub mod memory;
pub mod password;
pub mod permissions;
pub mod role_migrator;
pub mod role_users;
pub mod roles;
pub mod settings;
pub mod store;
pub mod users;
