use etcd_steward::core::memory::MemoryStore;
use etcd_steward::core::permissions;
use etcd_steward::core::role_migrator::RoleMigrator;
use etcd_steward::core::roles;
use etcd_steward::core::store::{StoreClient, StoreOp};
use etcd_steward::error::{Error, ErrorKind, Migrated};
use etcd_steward::models::permission::{AccessLevel, KeyRange, Permission};
use etcd_steward::models::role::Role;

fn perms() -> Vec<Permission> {
    vec![
        Permission::new("/app/", "/app0", AccessLevel::ReadWrite),
        Permission::new("/cfg", "", AccessLevel::Read),
        Permission::new("/logs/", "\0", AccessLevel::Write),
    ]
}

fn seeded(name: &str, perms: &[Permission]) -> MemoryStore {
    let store = MemoryStore::new();
    store.create_role(name).unwrap();
    for p in perms {
        store.grant_permission(name, p).unwrap();
    }
    store
}

#[test]
fn test_rename_moves_prefix_grant() {
    let perm = Permission::new("/app/", "/app0", AccessLevel::ReadWrite);
    let store = seeded("admin", std::slice::from_ref(&perm));

    let role = RoleMigrator::new(&store).rename("admin", "superadmin").unwrap();

    assert_eq!(role.name, "superadmin");
    assert_eq!(role.permissions, vec![perm]);
    assert!(store.get_role("admin").unwrap().is_none());
}

#[test]
fn test_rename_keeps_non_ascii_prefix_bytes() {
    let store = MemoryStore::new();
    store.create_role("old").unwrap();
    let granted =
        permissions::grant(&store, "old", "/\u{bf}", &KeyRange::Prefix, AccessLevel::Read).unwrap();
    assert_eq!(granted.range_end, b"/\xc2\xc0");
    // a range end that is not UTF-8 at all
    let raw = Permission::new("/raw", b"/ra\xff".to_vec(), AccessLevel::Write);
    store.grant_permission("old", &raw).unwrap();

    let role = RoleMigrator::new(&store).rename("old", "new").unwrap();

    let stored = store.get_role("new").unwrap().unwrap();
    assert!(stored.same_permissions(&Role {
        name: "new".into(),
        permissions: vec![granted.clone(), raw.clone()],
    }));
    assert!(role.find_permission("/\u{bf}".as_bytes(), b"/\xc2\xc0").is_some());
    assert!(role.find_permission(b"/raw", b"/ra\xff").is_some());
}

#[test]
fn test_rename_preserves_permission_set() {
    let store = seeded("admin", &perms());
    let before = store.get_role("admin").unwrap().unwrap();

    let after = roles::rename(&store, "admin", "ops").unwrap();

    let renamed_before = Role {
        name: "ops".into(),
        ..before
    };
    assert!(after.same_permissions(&renamed_before));
    assert_eq!(store.calls(StoreOp::DeleteRole), 1);
}

#[test]
fn test_missing_source_creates_nothing() {
    let store = MemoryStore::new();
    let err = RoleMigrator::new(&store).rename("ghost", "new").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(store.get_role("new").unwrap().is_none());
    assert_eq!(store.calls(StoreOp::CreateRole), 0);
}

#[test]
fn test_existing_target_leaves_source_untouched() {
    let store = seeded("admin", &perms());
    store.create_role("existing").unwrap();

    let err = RoleMigrator::new(&store).rename("admin", "existing").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    let admin = store.get_role("admin").unwrap().unwrap();
    assert_eq!(admin.permissions.len(), 3);
    assert!(store.get_role("existing").unwrap().unwrap().permissions.is_empty());
}

#[test]
fn test_failed_grant_reports_partial_migration() {
    let store = seeded("admin", &perms());
    // three seeding grants, then the second grant of the rename
    store.fail_call(StoreOp::GrantPermission, 5, ErrorKind::Timeout);

    let err = RoleMigrator::new(&store).rename("admin", "ops").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PartialMigration);
    match &err {
        Error::PartialMigration {
            granted,
            remaining,
            source,
            ..
        } => {
            assert_eq!(granted, &vec![Migrated::Permission(perms()[0].clone())]);
            assert_eq!(remaining.len(), 2);
            assert_eq!(remaining[0], Migrated::Permission(perms()[1].clone()));
            assert_eq!(source.kind(), ErrorKind::Timeout);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(err.to_string().contains("moved 1 of 3 permissions"));

    assert_eq!(store.get_role("admin").unwrap().unwrap().permissions.len(), 3);
    assert_eq!(store.get_role("ops").unwrap().unwrap().permissions.len(), 1);
    assert_eq!(store.calls(StoreOp::DeleteRole), 0);
}

#[test]
fn test_failed_delete_reports_cleanup() {
    let store = seeded("admin", &perms());
    store.fail_call(StoreOp::DeleteRole, 1, ErrorKind::Unavailable);

    let err = RoleMigrator::new(&store).rename("admin", "ops").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CleanupFailed);
    assert!(store.get_role("admin").unwrap().is_some());
    let ops = store.get_role("ops").unwrap().unwrap();
    assert_eq!(ops.permissions.len(), 3);
}

#[test]
fn test_retry_after_partial_failure_requires_cleanup() {
    let store = seeded("admin", &perms());
    store.fail_call(StoreOp::GrantPermission, 4, ErrorKind::Rejected);
    RoleMigrator::new(&store).rename("admin", "ops").unwrap_err();

    // the half-built target blocks a naive retry
    let err = RoleMigrator::new(&store).rename("admin", "ops").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    roles::delete(&store, "ops").unwrap();
    let role = RoleMigrator::new(&store).rename("admin", "ops").unwrap();
    assert_eq!(role.permissions.len(), 3);
}
