use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::grid::TileCoord;

pub const LOCK_KEY_PREFIX: &str = "tile-lock-";

/// One claim on a tile. `ts` is milliseconds since the epoch, supplied by
/// the caller so the engine stays clock-free.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub user: String,
    pub ts: i64,
}

pub fn lock_key(tile: TileCoord) -> String {
    format!("{LOCK_KEY_PREFIX}{},{}", tile.x, tile.y)
}

pub fn parse_lock_key(key: &str) -> Option<TileCoord> {
    let rest = key.strip_prefix(LOCK_KEY_PREFIX)?;
    let (x, y) = rest.split_once(',')?;
    Some(TileCoord::new(x.parse().ok()?, y.parse().ok()?))
}

/// Durable key-value text store the lock set is mirrored into. The browser
/// backend is origin localStorage; tests use [`MemoryLockBackend`].
pub trait LockBackend {
    fn set(&self, key: &str, value: &str) -> Result<(), Error>;
    fn remove(&self, key: &str) -> Result<(), Error>;
    fn entries(&self, prefix: &str) -> Result<Vec<(String, String)>, Error>;
}

#[derive(Clone, Default)]
pub struct MemoryLockBackend {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryLockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }
}

impl LockBackend for MemoryLockBackend {
    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }

    fn entries(&self, prefix: &str) -> Result<Vec<(String, String)>, Error> {
        Ok(self
            .entries
            .borrow()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}

/// Authoritative in-memory lock map, mirrored write-through into the backend.
/// Backend failures degrade to memory-only operation; they never abort a
/// lock mutation.
pub struct TileLockStore {
    locks: HashMap<TileCoord, LockRecord>,
    backend: Option<Box<dyn LockBackend>>,
}

impl TileLockStore {
    pub fn new() -> Self {
        Self {
            locks: HashMap::new(),
            backend: None,
        }
    }

    /// Loads existing lock entries from the backend. Keys outside the lock
    /// scheme and values that fail to decode are skipped; an unreadable
    /// backend yields an empty, memory-only store.
    pub fn with_backend(backend: Box<dyn LockBackend>) -> Self {
        let mut locks = HashMap::new();
        if let Ok(entries) = backend.entries(LOCK_KEY_PREFIX) {
            for (key, value) in entries {
                let Some(tile) = parse_lock_key(&key) else {
                    continue;
                };
                let Ok(record) = serde_json::from_str::<LockRecord>(&value) else {
                    continue;
                };
                locks.insert(tile, record);
            }
        }
        Self {
            locks,
            backend: Some(backend),
        }
    }

    pub fn is_locked(&self, tile: TileCoord) -> Option<&LockRecord> {
        self.locks.get(&tile)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TileCoord, &LockRecord)> {
        self.locks.iter().map(|(tile, record)| (*tile, record))
    }

    pub fn lock(&mut self, tile: TileCoord, user: &str, ts: i64) {
        let record = LockRecord {
            user: user.to_string(),
            ts,
        };
        self.persist(tile, &record);
        self.locks.insert(tile, record);
    }

    pub fn unlock(&mut self, tile: TileCoord) -> bool {
        let removed = self.locks.remove(&tile).is_some();
        if let Some(backend) = &self.backend {
            let _ = backend.remove(&lock_key(tile));
        }
        removed
    }

    pub fn lock_many(&mut self, tiles: &[TileCoord], user: &str, ts: i64) {
        for tile in tiles {
            self.lock(*tile, user, ts);
        }
    }

    pub fn unlock_many(&mut self, tiles: &[TileCoord]) {
        for tile in tiles {
            self.unlock(*tile);
        }
    }

    /// Serializes every lock as `{"tile-lock-x,y": {"user": ..., "ts": ...}}`.
    /// Keys are emitted in sorted order so exports are stable.
    pub fn export_json(&self) -> String {
        let map: BTreeMap<String, &LockRecord> = self
            .locks
            .iter()
            .map(|(tile, record)| (lock_key(*tile), record))
            .collect();
        serde_json::to_string_pretty(&map).unwrap_or_else(|_| "{}".to_string())
    }

    /// Merges lock entries from an exported JSON document. Unparsable JSON
    /// rejects the whole call before any mutation; entries with foreign keys
    /// or undecodable records are skipped silently. Returns the merge count.
    pub fn import_json(&mut self, json: &str) -> Result<usize, Error> {
        let data: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(json).map_err(|err| Error::MalformedInput(err.to_string()))?;
        let mut merged = 0;
        for (key, value) in data {
            let Some(tile) = parse_lock_key(&key) else {
                continue;
            };
            let Ok(record) = serde_json::from_value::<LockRecord>(value) else {
                continue;
            };
            self.persist(tile, &record);
            self.locks.insert(tile, record);
            merged += 1;
        }
        Ok(merged)
    }

    fn persist(&self, tile: TileCoord, record: &LockRecord) {
        let Some(backend) = &self.backend else {
            return;
        };
        if let Ok(value) = serde_json::to_string(record) {
            let _ = backend.set(&lock_key(tile), &value);
        }
    }
}

impl Default for TileLockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_scheme_round_trips() {
        let tile = TileCoord::new(-12, 34);
        assert_eq!(lock_key(tile), "tile-lock--12,34");
        assert_eq!(parse_lock_key("tile-lock--12,34"), Some(tile));
        assert_eq!(parse_lock_key("note-3-4"), None);
        assert_eq!(parse_lock_key("tile-lock-a,b"), None);
    }

    #[test]
    fn lock_unlock_and_overwrite() {
        let mut store = TileLockStore::new();
        let tile = TileCoord::new(3, -7);
        store.lock(tile, "mara", 1_000);
        assert_eq!(store.is_locked(tile).unwrap().user, "mara");
        store.lock(tile, "juno", 2_000);
        assert_eq!(store.is_locked(tile).unwrap().user, "juno");
        assert!(store.unlock(tile));
        assert!(store.is_locked(tile).is_none());
        assert!(!store.unlock(tile));
    }

    #[test]
    fn export_import_round_trip() {
        let mut store = TileLockStore::new();
        store.lock_many(
            &[
                TileCoord::new(0, 0),
                TileCoord::new(-5, 12),
                TileCoord::new(84, -85),
            ],
            "mara",
            1_234_567,
        );
        let json = store.export_json();

        let mut restored = TileLockStore::new();
        assert_eq!(restored.import_json(&json).unwrap(), 3);
        assert_eq!(restored.len(), store.len());
        for (tile, record) in store.iter() {
            assert_eq!(restored.is_locked(tile), Some(record));
        }
    }

    #[test]
    fn import_rejects_malformed_json_atomically() {
        let mut store = TileLockStore::new();
        store.lock(TileCoord::new(1, 1), "mara", 1);
        let err = store.import_json("{not json").unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn import_skips_foreign_keys_and_bad_records() {
        let mut store = TileLockStore::new();
        let json = r#"{
            "tile-lock-2,3": {"user": "juno", "ts": 42},
            "annotation-2-3": "shoreline",
            "tile-lock-9,9": {"who": "nobody"}
        }"#;
        assert_eq!(store.import_json(json).unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.is_locked(TileCoord::new(2, 3)).unwrap().ts, 42);
    }

    #[test]
    fn backend_is_mirrored_and_reloaded() {
        let backend = MemoryLockBackend::new();
        let tile = TileCoord::new(7, 8);
        {
            let mut store = TileLockStore::with_backend(Box::new(backend.clone()));
            store.lock(tile, "mara", 99);
            assert_eq!(backend.len(), 1);
        }
        let reloaded = TileLockStore::with_backend(Box::new(backend.clone()));
        assert_eq!(reloaded.is_locked(tile).unwrap().user, "mara");

        let mut store = TileLockStore::with_backend(Box::new(backend.clone()));
        store.unlock(tile);
        assert!(backend.is_empty());
    }

    #[test]
    fn backend_ignores_unrelated_entries() {
        let backend = MemoryLockBackend::new();
        backend.set("tile-lock-1,2", r#"{"user":"juno","ts":5}"#).unwrap();
        backend.set("label-1-2", "harbor").unwrap();
        backend.set("tile-lock-bad", "{}").unwrap();
        let store = TileLockStore::with_backend(Box::new(backend));
        assert_eq!(store.len(), 1);
        assert!(store.is_locked(TileCoord::new(1, 2)).is_some());
    }
}
