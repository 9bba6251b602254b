//! Data structures shared by the store clients, operations, and CLI.

pub mod kv;
pub mod permission;
pub mod role;
pub mod settings;
pub mod user;
