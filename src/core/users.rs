//! User lifecycle. Passwords are write-only: the store never returns them.

use crate::core::password::PasswordGenerator;
use crate::core::store::{StoreClient, StoreOp};
use crate::error::{Error, Migrated, Result};
use crate::models::settings::PasswordPolicy;
use crate::models::user::User;
use rand::Rng;
use std::fmt;
use tracing::{info, warn};
use zeroize::Zeroizing;

/// A freshly created user and the password it was created with.
pub struct CreatedUser {
    pub user: User,
    pub password: Zeroizing<String>,
    /// Whether `password` was generated rather than supplied.
    pub generated: bool,
}

impl fmt::Debug for CreatedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatedUser")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("generated", &self.generated)
            .finish()
    }
}

/// Create `name` with `password`, or with a generated one when `None`.
pub fn create<S, R>(
    store: &S,
    name: &str,
    password: Option<Zeroizing<String>>,
    generator: &mut PasswordGenerator<R>,
    policy: &PasswordPolicy,
) -> Result<CreatedUser>
where
    S: StoreClient + ?Sized,
    R: Rng,
{
    validate_name(name)?;
    let (password, generated) = match password {
        Some(p) => (p, false),
        None => (generator.generate(policy)?, true),
    };
    validate_password(&password)?;

    store.create_user(name, &password)?;
    info!(user = %name, generated, "user created");
    let user = read(store, name)?;
    Ok(CreatedUser {
        user,
        password,
        generated,
    })
}

pub fn read<S: StoreClient + ?Sized>(store: &S, name: &str) -> Result<User> {
    validate_name(name)?;
    store.get_user(name)?.ok_or_else(|| Error::NotFound {
        op: StoreOp::GetUser,
        target: name.to_string(),
    })
}

pub fn change_password<S: StoreClient + ?Sized>(store: &S, name: &str, password: &str) -> Result<()> {
    validate_password(password)?;
    read(store, name)?;
    store.change_password(name, password)?;
    info!(user = %name, "password changed");
    Ok(())
}

/// Move `old` to `new`: create `new` with `password`, grant it every role of
/// `old`, then delete `old`. `old` is kept on any failure before the delete.
pub fn rename<S: StoreClient + ?Sized>(
    store: &S,
    old: &str,
    new: &str,
    password: &str,
) -> Result<User> {
    validate_name(old)?;
    validate_name(new)?;
    validate_password(password)?;
    if old == new {
        return Err(Error::invalid(format!(
            "user '{}' cannot be renamed to itself",
            old
        )));
    }

    let source = read(store, old)?;
    if store.get_user(new)?.is_some() {
        return Err(Error::AlreadyExists {
            op: StoreOp::GetUser,
            target: new.to_string(),
        });
    }

    store.create_user(new, password)?;
    for (i, role) in source.roles.iter().enumerate() {
        if let Err(e) = store.grant_role_to_user(new, role) {
            warn!(from = %old, to = %new, copied = i, error = %e, "user rename stopped partway");
            return Err(Error::PartialMigration {
                items: "roles",
                from: old.to_string(),
                to: new.to_string(),
                granted: source.roles[..i].iter().cloned().map(Migrated::Role).collect(),
                remaining: source.roles[i..].iter().cloned().map(Migrated::Role).collect(),
                source: Box::new(e),
            });
        }
    }

    if let Err(e) = store.delete_user(old) {
        return Err(Error::CleanupFailed {
            from: old.to_string(),
            to: new.to_string(),
            source: Box::new(e),
        });
    }
    info!(from = %old, to = %new, roles = source.roles.len(), "user renamed");

    match store.get_user(new) {
        Ok(Some(user)) => Ok(user),
        Ok(None) => {
            warn!(user = %new, "renamed user not visible on re-read");
            Ok(User {
                name: new.to_string(),
                roles: source.roles,
            })
        }
        Err(e) => {
            warn!(user = %new, error = %e, "re-read after rename failed");
            Ok(User {
                name: new.to_string(),
                roles: source.roles,
            })
        }
    }
}

pub fn delete<S: StoreClient + ?Sized>(store: &S, name: &str) -> Result<()> {
    validate_name(name)?;
    store.delete_user(name)?;
    info!(user = %name, "user deleted");
    Ok(())
}

/// etcdctl splits `user:password` arguments, so names cannot contain `:`.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid("user name must not be empty"));
    }
    if name.contains(':') {
        return Err(Error::invalid(format!(
            "user name '{}' must not contain ':'",
            name
        )));
    }
    Ok(())
}

/// etcdctl reads a single whitespace-delimited token as the password.
pub fn validate_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(Error::invalid("password must not be empty"));
    }
    if password.chars().any(char::is_whitespace) {
        return Err(Error::invalid("password must not contain whitespace"));
    }
    Ok(())
}
