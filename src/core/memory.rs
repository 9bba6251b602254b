//! In-process store with the same observable semantics as etcd's auth and
//! KV APIs, plus per-operation fault injection.

use crate::core::store::{StoreClient, StoreOp};
use crate::error::{Error, ErrorKind, Result};
use crate::models::kv::KeyValue;
use crate::models::permission::Permission;
use crate::models::role::Role;
use crate::models::user::User;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug)]
struct Fault {
    op: StoreOp,
    /// 1-based call number of `op` that fails.
    nth: usize,
    kind: ErrorKind,
}

#[derive(Debug)]
struct UserRecord {
    password: String,
    roles: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct State {
    revision: i64,
    kvs: BTreeMap<String, KeyValue>,
    roles: BTreeMap<String, Vec<Permission>>,
    users: BTreeMap<String, UserRecord>,
    calls: HashMap<StoreOp, usize>,
    faults: Vec<Fault>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `nth` call (1-based) of `op` fail with `kind`.
    pub fn fail_call(&self, op: StoreOp, nth: usize, kind: ErrorKind) {
        self.state.lock().faults.push(Fault { op, nth, kind });
    }

    /// Number of times `op` has been invoked, including failed calls.
    pub fn calls(&self, op: StoreOp) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Password currently stored for `user`.
    pub fn password_of(&self, user: &str) -> Option<String> {
        self.state
            .lock()
            .users
            .get(user)
            .map(|u| u.password.clone())
    }

    fn enter<'a>(
        &'a self,
        op: StoreOp,
        target: &str,
    ) -> Result<parking_lot::MutexGuard<'a, State>> {
        let mut state = self.state.lock();
        let count = {
            let c = state.calls.entry(op).or_insert(0);
            *c += 1;
            *c
        };
        if let Some(fault) = state.faults.iter().find(|f| f.op == op && f.nth == count) {
            return Err(Error::store(op, target, fault.kind, "injected failure"));
        }
        Ok(state)
    }
}

impl StoreClient for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<KeyValue>> {
        let state = self.enter(StoreOp::Get, key)?;
        Ok(state.kvs.get(key).cloned())
    }

    fn get_prefix(&self, prefix: &str) -> Result<Vec<KeyValue>> {
        let state = self.enter(StoreOp::GetPrefix, prefix)?;
        Ok(state
            .kvs
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(_, kv)| kv.clone())
            .collect())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.enter(StoreOp::Put, key)?;
        state.revision += 1;
        let revision = state.revision;
        let entry = state.kvs.entry(key.to_string()).or_insert_with(|| KeyValue {
            key: key.to_string(),
            create_revision: revision,
            ..Default::default()
        });
        entry.value = value.to_string();
        entry.mod_revision = revision;
        entry.version += 1;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<u64> {
        let mut state = self.enter(StoreOp::Delete, key)?;
        match state.kvs.remove(key) {
            Some(_) => {
                state.revision += 1;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn get_role(&self, name: &str) -> Result<Option<Role>> {
        let state = self.enter(StoreOp::GetRole, name)?;
        Ok(state.roles.get(name).map(|perms| Role {
            name: name.to_string(),
            permissions: perms.clone(),
        }))
    }

    fn create_role(&self, name: &str) -> Result<()> {
        let mut state = self.enter(StoreOp::CreateRole, name)?;
        if state.roles.contains_key(name) {
            return Err(Error::store(StoreOp::CreateRole, name, ErrorKind::AlreadyExists, ""));
        }
        state.roles.insert(name.to_string(), Vec::new());
        Ok(())
    }

    fn delete_role(&self, name: &str) -> Result<()> {
        let mut state = self.enter(StoreOp::DeleteRole, name)?;
        if state.roles.remove(name).is_none() {
            return Err(Error::store(StoreOp::DeleteRole, name, ErrorKind::NotFound, ""));
        }
        for user in state.users.values_mut() {
            user.roles.remove(name);
        }
        Ok(())
    }

    fn grant_permission(&self, role: &str, perm: &Permission) -> Result<()> {
        let mut state = self.enter(StoreOp::GrantPermission, role)?;
        let perms = state
            .roles
            .get_mut(role)
            .ok_or_else(|| Error::store(StoreOp::GrantPermission, role, ErrorKind::NotFound, ""))?;
        match perms.iter_mut().find(|p| p.covers(&perm.key, &perm.range_end)) {
            Some(existing) => existing.access = perm.access,
            None => perms.push(perm.clone()),
        }
        Ok(())
    }

    fn revoke_permission(&self, role: &str, key: &[u8], range_end: &[u8]) -> Result<()> {
        let mut state = self.enter(StoreOp::RevokePermission, role)?;
        let perms = state.roles.get_mut(role).ok_or_else(|| {
            Error::store(StoreOp::RevokePermission, role, ErrorKind::NotFound, "")
        })?;
        let before = perms.len();
        perms.retain(|p| !p.covers(key, range_end));
        if perms.len() == before {
            return Err(Error::store(
                StoreOp::RevokePermission,
                role,
                ErrorKind::NotFound,
                "permission is not granted to the role",
            ));
        }
        Ok(())
    }

    fn get_user(&self, name: &str) -> Result<Option<User>> {
        let state = self.enter(StoreOp::GetUser, name)?;
        Ok(state.users.get(name).map(|u| User {
            name: name.to_string(),
            roles: u.roles.iter().cloned().collect(),
        }))
    }

    fn create_user(&self, name: &str, password: &str) -> Result<()> {
        let mut state = self.enter(StoreOp::CreateUser, name)?;
        if state.users.contains_key(name) {
            return Err(Error::store(StoreOp::CreateUser, name, ErrorKind::AlreadyExists, ""));
        }
        state.users.insert(
            name.to_string(),
            UserRecord {
                password: password.to_string(),
                roles: BTreeSet::new(),
            },
        );
        Ok(())
    }

    fn delete_user(&self, name: &str) -> Result<()> {
        let mut state = self.enter(StoreOp::DeleteUser, name)?;
        if state.users.remove(name).is_none() {
            return Err(Error::store(StoreOp::DeleteUser, name, ErrorKind::NotFound, ""));
        }
        Ok(())
    }

    fn change_password(&self, name: &str, password: &str) -> Result<()> {
        let mut state = self.enter(StoreOp::ChangePassword, name)?;
        let user = state.users.get_mut(name).ok_or_else(|| {
            Error::store(StoreOp::ChangePassword, name, ErrorKind::NotFound, "")
        })?;
        user.password = password.to_string();
        Ok(())
    }

    fn grant_role_to_user(&self, user: &str, role: &str) -> Result<()> {
        let mut state = self.enter(StoreOp::GrantRole, user)?;
        if !state.roles.contains_key(role) {
            return Err(Error::store(StoreOp::GrantRole, role, ErrorKind::NotFound, ""));
        }
        let record = state
            .users
            .get_mut(user)
            .ok_or_else(|| Error::store(StoreOp::GrantRole, user, ErrorKind::NotFound, ""))?;
        record.roles.insert(role.to_string());
        Ok(())
    }

    fn revoke_role_from_user(&self, user: &str, role: &str) -> Result<()> {
        let mut state = self.enter(StoreOp::RevokeRole, user)?;
        let record = state
            .users
            .get_mut(user)
            .ok_or_else(|| Error::store(StoreOp::RevokeRole, user, ErrorKind::NotFound, ""))?;
        if !record.roles.remove(role) {
            return Err(Error::store(
                StoreOp::RevokeRole,
                user,
                ErrorKind::NotFound,
                "role is not granted to the user",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::permission::AccessLevel;

    #[test]
    fn test_put_tracks_revisions() {
        let store = MemoryStore::new();
        store.put("/a", "1").unwrap();
        store.put("/a", "2").unwrap();
        let kv = store.get("/a").unwrap().unwrap();
        assert_eq!(kv.value, "2");
        assert_eq!(kv.create_revision, 1);
        assert_eq!(kv.mod_revision, 2);
        assert_eq!(kv.version, 2);
    }

    #[test]
    fn test_get_prefix_only_matching_keys() {
        let store = MemoryStore::new();
        store.put("/app/a", "1").unwrap();
        store.put("/app/b", "2").unwrap();
        store.put("/apq", "3").unwrap();
        let keys: Vec<_> = store
            .get_prefix("/app/")
            .unwrap()
            .into_iter()
            .map(|kv| kv.key)
            .collect();
        assert_eq!(keys, vec!["/app/a", "/app/b"]);
    }

    #[test]
    fn test_grant_same_range_overwrites_access() {
        let store = MemoryStore::new();
        store.create_role("r").unwrap();
        store
            .grant_permission("r", &Permission::new("/k", "", AccessLevel::Read))
            .unwrap();
        store
            .grant_permission("r", &Permission::new("/k", "", AccessLevel::ReadWrite))
            .unwrap();
        let role = store.get_role("r").unwrap().unwrap();
        assert_eq!(role.permissions.len(), 1);
        assert_eq!(role.permissions[0].access, AccessLevel::ReadWrite);
    }

    #[test]
    fn test_delete_role_detaches_from_users() {
        let store = MemoryStore::new();
        store.create_role("r").unwrap();
        store.create_user("u", "pw").unwrap();
        store.grant_role_to_user("u", "r").unwrap();
        store.delete_role("r").unwrap();
        assert!(store.get_user("u").unwrap().unwrap().roles.is_empty());
    }

    #[test]
    fn test_fault_fires_on_nth_call_only() {
        let store = MemoryStore::new();
        store.fail_call(StoreOp::Put, 2, ErrorKind::Timeout);
        store.put("/a", "1").unwrap();
        let err = store.put("/b", "2").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        store.put("/c", "3").unwrap();
        assert_eq!(store.calls(StoreOp::Put), 3);
        assert!(store.get("/b").unwrap().is_none());
    }

    #[test]
    fn test_create_existing_user_conflicts() {
        let store = MemoryStore::new();
        store.create_user("u", "pw").unwrap();
        let err = store.create_user("u", "pw2").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(store.password_of("u").as_deref(), Some("pw"));
    }
}
