//! etcd key, user, role, and permission management.
//!
//! Drives an etcd v3 cluster through `etcdctl` and keeps multi-step
//! operations (role and user renames) recoverable when they fail halfway.
//!
//! ## Modules
//! - `cli`: Command-line handlers
//! - `core`: Resource operations, password generation, role migration
//! - `models`: Data structures
//! - `util`: etcdctl process wrapper and filesystem helpers

pub mod cli;
pub mod constants;
pub mod core;
pub mod error;
pub mod models;
pub mod util;

pub use error::{Error, ErrorKind, Result};
