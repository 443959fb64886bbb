//! sled-backed [`KeyValueStore`].
//!
//! All Satchel keys live in one named tree. Every write is flushed before it
//! returns, so a crash after `set` can't lose the value. The journal depends on
//! that: a pending record that never reached disk protects nothing.

use sled::{Db, Tree};
use std::path::Path;
use tracing::debug;

use super::store::{KeyValueStore, StoreError, StoreResult};
use crate::config::SLED_TREE_NAME;

/// Durable store on top of a sled database.
///
/// sled is internally synchronized; share a `SledStore` through `Arc`.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    tree: Tree,
}

impl SledStore {
    /// Open or create a database directory.
    ///
    /// The background flusher is disabled: writes already flush themselves,
    /// and the flusher thread would hold the directory lock past `drop`, so an
    /// immediate reopen in the same process would fail.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::Config::new()
            .path(path.as_ref())
            .flush_every_ms(None)
            .open()?;
        debug!(path = %path.as_ref().display(), "opened sled store");
        Self::from_db(db)
    }

    /// A database that is deleted when dropped. For tests.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let tree = db.open_tree(SLED_TREE_NAME)?;
        Ok(Self { db, tree })
    }

    /// Every key in the store, in byte order.
    pub fn keys(&self) -> StoreResult<Vec<String>> {
        self.tree
            .iter()
            .keys()
            .map(|key| {
                let key = key?;
                String::from_utf8(key.to_vec()).map_err(|_| StoreError::InvalidUtf8 {
                    key: String::from_utf8_lossy(&key).into_owned(),
                })
            })
            .collect()
    }

    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match self.tree.get(key.as_bytes())? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|_| StoreError::InvalidUtf8 {
                    key: key.to_string(),
                }),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.tree.insert(key.as_bytes(), value.as_bytes())?;
        self.tree.flush()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.tree.remove(key.as_bytes())?;
        self.tree.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temporary_store_roundtrip() {
        let store = SledStore::open_temporary().unwrap();
        store.set("a", "{\"x\":1}").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("{\"x\":1}"));
        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SledStore::open(dir.path()).unwrap();
            store.set("k", "persisted").unwrap();
        }
        let store = SledStore::open(dir.path()).unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("persisted"));
        assert_eq!(store.keys().unwrap(), vec!["k".to_string()]);
    }

    #[test]
    fn back_to_back_reopens_see_every_write() {
        let dir = tempfile::tempdir().unwrap();
        for round in 0..10 {
            let store = SledStore::open(dir.path()).unwrap();
            if round > 0 {
                let previous = (round - 1).to_string();
                assert_eq!(store.get("round").unwrap().as_deref(), Some(previous.as_str()));
            }
            store.set("round", &round.to_string()).unwrap();
        }
    }

    #[test]
    fn non_utf8_value_is_reported() {
        let store = SledStore::open_temporary().unwrap();
        store.tree.insert(b"bad", vec![0xFF, 0xFE]).unwrap();
        assert!(matches!(
            store.get("bad"),
            Err(StoreError::InvalidUtf8 { key }) if key == "bad"
        ));
    }
}
