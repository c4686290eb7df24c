//! In-memory `KeyStore`: a name-to-record map behind one reader-writer lock.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::StoreError;
use crate::store::{EncryptedKey, KeyStore};
use crate::validation::validate_name;

struct State {
    entries: HashMap<String, EncryptedKey>,
    closed: bool,
}

/// Keeps no state on disk or in any external service; useful for tests and
/// for callers that only need process-lifetime keys.
pub struct MemoryKeyStore {
    state: RwLock<State>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                entries: HashMap::new(),
                closed: false,
            }),
        }
    }
}

impl Default for MemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore for MemoryKeyStore {
    fn store(&self, name: &str, key: EncryptedKey) -> Result<(), StoreError> {
        validate_name(name)?;
        if key.name != name {
            return Err(StoreError::KeyNameMismatch);
        }
        let mut state = self.state.write();
        if state.closed {
            return Err(StoreError::Closed);
        }
        if state.entries.contains_key(name) {
            return Err(StoreError::Exists);
        }
        // Deep copy: EncryptedKey owns its Vec<u8> buffers, so inserting the
        // owned `key` already gives the map an independent copy.
        state.entries.insert(name.to_string(), key);
        Ok(())
    }

    fn load(&self, name: &str) -> Result<EncryptedKey, StoreError> {
        validate_name(name)?;
        let state = self.state.read();
        if state.closed {
            return Err(StoreError::Closed);
        }
        state.entries.get(name).cloned().ok_or(StoreError::NotFound)
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        validate_name(name)?;
        let mut state = self.state.write();
        if state.closed {
            return Err(StoreError::Closed);
        }
        state.entries.remove(name).map(|_| ()).ok_or(StoreError::NotFound)
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let state = self.state.read();
        if state.closed {
            return Err(StoreError::Closed);
        }
        Ok(state.entries.keys().cloned().collect())
    }

    fn close(&self) -> Result<(), StoreError> {
        let mut state = self.state.write();
        state.closed = true;
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Algorithm;

    fn entry(name: &str) -> EncryptedKey {
        EncryptedKey::new(name, Algorithm::Ed25519, vec![1, 2, 3], vec![4, 5, 6])
    }

    #[test]
    fn store_then_load_round_trips() {
        let store = MemoryKeyStore::new();
        store.store("alice", entry("alice")).unwrap();
        let loaded = store.load("alice").unwrap();
        assert_eq!(loaded.pub_key, vec![1, 2, 3]);
    }

    #[test]
    fn store_rejects_duplicate_name() {
        let store = MemoryKeyStore::new();
        store.store("alice", entry("alice")).unwrap();
        assert!(matches!(store.store("alice", entry("alice")), Err(StoreError::Exists)));
    }

    #[test]
    fn load_missing_is_not_found() {
        let store = MemoryKeyStore::new();
        assert!(matches!(store.load("missing"), Err(StoreError::NotFound)));
    }

    #[test]
    fn delete_then_list_reflects_removal() {
        let store = MemoryKeyStore::new();
        store.store("alice", entry("alice")).unwrap();
        store.store("bob", entry("bob")).unwrap();
        store.delete("alice").unwrap();
        let names = store.list().unwrap();
        assert_eq!(names, vec!["bob".to_string()]);
    }

    #[test]
    fn operations_after_close_return_closed() {
        let store = MemoryKeyStore::new();
        store.close().unwrap();
        assert!(matches!(store.store("alice", entry("alice")), Err(StoreError::Closed)));
        assert!(matches!(store.load("alice"), Err(StoreError::Closed)));
        assert!(matches!(store.list(), Err(StoreError::Closed)));
    }

    #[test]
    fn close_is_idempotent() {
        let store = MemoryKeyStore::new();
        store.close().unwrap();
        store.close().unwrap();
    }

    #[test]
    fn store_rejects_name_mismatch() {
        let store = MemoryKeyStore::new();
        assert!(matches!(
            store.store("alice", entry("bob")),
            Err(StoreError::KeyNameMismatch)
        ));
    }

    #[test]
    fn concurrent_store_has_exactly_one_winner() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let store = std::sync::Arc::new(MemoryKeyStore::new());
        let successes = std::sync::Arc::new(AtomicUsize::new(0));

        std::thread::scope(|scope| {
            for _ in 0..100 {
                let store = store.clone();
                let successes = successes.clone();
                scope.spawn(move || {
                    if store.store("alice", entry("alice")).is_ok() {
                        successes.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(store.list().unwrap(), vec!["alice".to_string()]);
    }
}
