//! Plain key/value entries.

use crate::core::store::{StoreClient, StoreOp};
use crate::error::{Error, Result};
use crate::models::kv::KeyValue;
use tracing::{debug, info};

/// Write `value` under `key` and return what the store now holds.
///
/// The key is read first; a failing read aborts before anything is written.
pub fn create<S: StoreClient + ?Sized>(store: &S, key: &str, value: &str) -> Result<KeyValue> {
    validate_key(key)?;
    let existing = store.get(key)?;
    debug!(key = %key, existed = existing.is_some(), "writing key");
    store.put(key, value)?;
    info!(key = %key, "key written");
    read(store, key)
}

pub fn read<S: StoreClient + ?Sized>(store: &S, key: &str) -> Result<KeyValue> {
    validate_key(key)?;
    store.get(key)?.ok_or_else(|| Error::NotFound {
        op: StoreOp::Get,
        target: key.to_string(),
    })
}

/// Overwrite an existing key.
pub fn update<S: StoreClient + ?Sized>(store: &S, key: &str, value: &str) -> Result<KeyValue> {
    read(store, key)?;
    store.put(key, value)?;
    info!(key = %key, "key updated");
    read(store, key)
}

pub fn delete<S: StoreClient + ?Sized>(store: &S, key: &str) -> Result<()> {
    validate_key(key)?;
    if store.delete(key)? == 0 {
        return Err(Error::NotFound {
            op: StoreOp::Delete,
            target: key.to_string(),
        });
    }
    info!(key = %key, "key deleted");
    Ok(())
}

/// Every key under `prefix`, in key order.
pub fn list_prefix<S: StoreClient + ?Sized>(store: &S, prefix: &str) -> Result<Vec<KeyValue>> {
    validate_key(prefix)?;
    store.get_prefix(prefix)
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::invalid("key must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory::MemoryStore;
    use crate::error::ErrorKind;

    #[test]
    fn test_create_overwrites_and_returns_stored_value() {
        let store = MemoryStore::new();
        create(&store, "/cfg/a", "1").unwrap();
        let kv = create(&store, "/cfg/a", "2").unwrap();
        assert_eq!(kv.value, "2");
        assert_eq!(kv.version, 2);
    }

    #[test]
    fn test_create_aborts_when_read_fails() {
        let store = MemoryStore::new();
        store.fail_call(StoreOp::Get, 1, ErrorKind::Unavailable);
        let err = create(&store, "/cfg/a", "1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(store.calls(StoreOp::Put), 0);
    }

    #[test]
    fn test_update_requires_existing_key() {
        let store = MemoryStore::new();
        let err = update(&store, "/cfg/missing", "x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(store.calls(StoreOp::Put), 0);
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let store = MemoryStore::new();
        assert_eq!(delete(&store, "/nope").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_list_prefix() {
        let store = MemoryStore::new();
        store.put("/svc/a", "1").unwrap();
        store.put("/svc/b", "2").unwrap();
        store.put("/other", "3").unwrap();
        let kvs = list_prefix(&store, "/svc/").unwrap();
        assert_eq!(kvs.len(), 2);
    }

    #[test]
    fn test_empty_key_rejected() {
        let store = MemoryStore::new();
        assert_eq!(
            create(&store, "", "v").unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }
}
