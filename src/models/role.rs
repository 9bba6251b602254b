use crate::models::permission::Permission;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Role {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permissions: Vec::new(),
        }
    }

    /// Grant matching `key`/`range_end`, whatever its access level.
    pub fn find_permission(&self, key: &[u8], range_end: &[u8]) -> Option<&Permission> {
        self.permissions.iter().find(|p| p.covers(key, range_end))
    }

    /// Compare permission sets ignoring order.
    pub fn same_permissions(&self, other: &Role) -> bool {
        self.permissions.len() == other.permissions.len()
            && self
                .permissions
                .iter()
                .all(|p| other.permissions.contains(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::permission::AccessLevel;

    #[test]
    fn test_same_permissions_ignores_order() {
        let a = Role {
            name: "a".into(),
            permissions: vec![
                Permission::new("/x", "", AccessLevel::Read),
                Permission::new("/y", "/z", AccessLevel::ReadWrite),
            ],
        };
        let mut b = a.clone();
        b.name = "b".into();
        b.permissions.reverse();
        assert!(a.same_permissions(&b));
    }

    #[test]
    fn test_same_permissions_detects_access_change() {
        let a = Role {
            name: "a".into(),
            permissions: vec![Permission::new("/x", "", AccessLevel::Read)],
        };
        let b = Role {
            name: "b".into(),
            permissions: vec![Permission::new("/x", "", AccessLevel::ReadWrite)],
        };
        assert!(!a.same_permissions(&b));
    }

    #[test]
    fn test_find_permission_matches_range() {
        let role = Role {
            name: "a".into(),
            permissions: vec![Permission::new("/x", "/y", AccessLevel::Read)],
        };
        assert!(role.find_permission(b"/x", b"/y").is_some());
        assert!(role.find_permission(b"/x", b"").is_none());
    }
}
