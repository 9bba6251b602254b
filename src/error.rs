//! Library error taxonomy.
//!
//! Store failures always carry the operation and the target that produced
//! them. Migration failures carry enough detail for a caller to resume or
//! clean up by hand.

use crate::core::store::StoreOp;
use crate::models::permission::Permission;
use std::fmt;
use thiserror::Error;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidArgument,
    Timeout,
    PartialMigration,
    CleanupFailed,
    /// Transport-level failure: the store could not be reached.
    Unavailable,
    PermissionDenied,
    /// Any other refusal by the store.
    Rejected,
    /// Collaborator output could not be understood.
    Malformed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::Timeout => "timeout",
            ErrorKind::PartialMigration => "partial migration",
            ErrorKind::CleanupFailed => "cleanup failed",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::Rejected => "rejected",
            ErrorKind::Malformed => "malformed response",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{op} '{target}': not found")]
    NotFound { op: StoreOp, target: String },

    #[error("{op} '{target}': already exists")]
    AlreadyExists { op: StoreOp, target: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{op} '{target}': timed out")]
    Timeout { op: StoreOp, target: String },

    #[error("{op} '{target}': store unavailable: {message}")]
    Unavailable {
        op: StoreOp,
        target: String,
        message: String,
    },

    #[error("{op} '{target}': permission denied: {message}")]
    PermissionDenied {
        op: StoreOp,
        target: String,
        message: String,
    },

    #[error("{op} '{target}': rejected: {message}")]
    Rejected {
        op: StoreOp,
        target: String,
        message: String,
    },

    #[error("{op} '{target}': unexpected output: {message}")]
    Malformed {
        op: StoreOp,
        target: String,
        message: String,
    },

    #[error(
        "moved {} of {} {items} from '{from}' to '{to}'; '{from}' was kept: {source}",
        .granted.len(),
        .granted.len() + .remaining.len()
    )]
    PartialMigration {
        items: &'static str,
        from: String,
        to: String,
        granted: Vec<Migrated>,
        remaining: Vec<Migrated>,
        #[source]
        source: Box<Error>,
    },

    #[error("'{to}' is complete but '{from}' could not be deleted: {source}")]
    CleanupFailed {
        from: String,
        to: String,
        #[source]
        source: Box<Error>,
    },
}

/// One unit of work moved by a rename: a permission grant for roles, a role
/// binding for users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Migrated {
    Permission(Permission),
    Role(String),
}

impl fmt::Display for Migrated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Migrated::Permission(p) => write!(f, "{}", p),
            Migrated::Role(r) => write!(f, "role {}", r),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Build a store error of the given kind for `op` on `target`.
    ///
    /// Kinds that only the migration routines produce fall back to `Rejected`.
    pub fn store(
        op: StoreOp,
        target: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        let target = target.into();
        let message = message.into();
        match kind {
            ErrorKind::NotFound => Error::NotFound { op, target },
            ErrorKind::AlreadyExists => Error::AlreadyExists { op, target },
            ErrorKind::Timeout => Error::Timeout { op, target },
            ErrorKind::Unavailable => Error::Unavailable {
                op,
                target,
                message,
            },
            ErrorKind::PermissionDenied => Error::PermissionDenied {
                op,
                target,
                message,
            },
            ErrorKind::Malformed => Error::Malformed {
                op,
                target,
                message,
            },
            ErrorKind::InvalidArgument
            | ErrorKind::PartialMigration
            | ErrorKind::CleanupFailed
            | ErrorKind::Rejected => Error::Rejected {
                op,
                target,
                message,
            },
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Unavailable { .. } => ErrorKind::Unavailable,
            Error::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Error::Rejected { .. } => ErrorKind::Rejected,
            Error::Malformed { .. } => ErrorKind::Malformed,
            Error::PartialMigration { .. } => ErrorKind::PartialMigration,
            Error::CleanupFailed { .. } => ErrorKind::CleanupFailed,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_maps_kind() {
        let err = Error::store(StoreOp::GetRole, "admin", ErrorKind::NotFound, "");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "get role 'admin': not found");

        let err = Error::store(StoreOp::Put, "/a", ErrorKind::Unavailable, "connection refused");
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_store_migration_kinds_fall_back_to_rejected() {
        let err = Error::store(StoreOp::CreateRole, "r", ErrorKind::CleanupFailed, "x");
        assert_eq!(err.kind(), ErrorKind::Rejected);
    }

    #[test]
    fn test_partial_migration_message_counts() {
        let err = Error::PartialMigration {
            items: "permissions",
            from: "admin".into(),
            to: "superadmin".into(),
            granted: vec![Migrated::Role("a".into())],
            remaining: vec![Migrated::Role("b".into()), Migrated::Role("c".into())],
            source: Box::new(Error::store(
                StoreOp::GrantPermission,
                "superadmin",
                ErrorKind::Timeout,
                "",
            )),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("moved 1 of 3 permissions from 'admin' to 'superadmin'"));
        assert!(msg.contains("timed out"));
    }
}
