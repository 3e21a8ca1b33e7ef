//! The persisted stash
//!
//! A [`Stash`] is an in-memory map from key to slot that rewrites its whole
//! snapshot to the backing [`BlobStore`] whenever a mutation changes it.
//! The cardinality policy `C` decides whether a key holds one value
//! ([`SingleStash`]) or an ordered, deduplicated list ([`MultiStash`]).

pub mod codec;
mod search;

use crate::model::{Cardinality, Many, One};
use crate::store::{BlobStore, LocalBlobStore};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, trace};

/// A stash with an ordered set of values per key
pub type MultiStash<S = LocalBlobStore> = Stash<Many, S>;

/// A stash with at most one value per key
pub type SingleStash<S = LocalBlobStore> = Stash<One, S>;

/// A key-value map persisted as a single asset
pub struct Stash<C: Cardinality, S: BlobStore = LocalBlobStore> {
    store: S,
    asset: String,
    entries: BTreeMap<String, C::Slot>,
}

impl<C: Cardinality> Stash<C, LocalBlobStore> {
    /// Open the stash stored as `asset` in the local store at `location`
    ///
    /// The store directory is created if it does not exist yet; a missing
    /// asset yields an empty stash.
    pub fn open(location: impl AsRef<Path>, asset: impl Into<String>) -> Result<Self> {
        let store = LocalBlobStore::open_or_create(location)?;
        Self::with_store(store, asset)
    }

    /// Get the local store's root directory
    pub fn location(&self) -> &Path {
        self.store.root()
    }
}

impl<C: Cardinality, S: BlobStore> Stash<C, S> {
    /// Load the stash stored as `asset` in `store`
    pub fn with_store(store: S, asset: impl Into<String>) -> Result<Self> {
        let asset = asset.into();
        let entries = load::<C, S>(&store, &asset)?;
        Ok(Stash {
            store,
            asset,
            entries,
        })
    }

    /// Replace in-memory state with what the backend currently holds
    pub fn reload(&mut self) -> Result<()> {
        self.entries = load::<C, S>(&self.store, &self.asset)?;
        Ok(())
    }

    /// Name of the asset this stash persists to
    pub fn asset(&self) -> &str {
        &self.asset
    }

    /// The backing blob store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Every key, in sorted order
    pub fn all(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over keys and their values
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(key, slot)| (key.as_str(), C::values(slot)))
    }

    /// Whether `key` is present, even with no values
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Whether `value` is stored under `key`
    pub fn contains_value(&self, key: &str, value: &str) -> bool {
        self.get_all(key)
            .map(|values| values.iter().any(|v| v == value))
            .unwrap_or(false)
    }

    /// All values under `key`, or `None` if the key is absent
    pub fn get_all(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(C::values)
    }

    /// The first value under `key`
    ///
    /// `None` both for an absent key and for a key with no values.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Insert one value in memory, returning whether the map changed
    fn insert(&mut self, key: &str, value: String) -> bool {
        match self.entries.get_mut(key) {
            Some(slot) => C::merge(slot, value),
            None => {
                self.entries.insert(key.to_string(), C::create(value));
                true
            }
        }
    }

    /// Insert one value, persisting only if the map changed
    fn put(&mut self, key: &str, value: String) -> Result<bool> {
        if !self.insert(key, value) {
            trace!(asset = %self.asset, key, "value already stored, skipping persist");
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    /// Insert many values with at most one persist, returning how many changed the map
    fn put_many<K, V>(&mut self, updates: impl IntoIterator<Item = (K, V)>) -> Result<usize>
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut changed = 0;
        for (key, value) in updates {
            if self.insert(key.as_ref(), value.into()) {
                changed += 1;
            }
        }

        if changed == 0 {
            trace!(asset = %self.asset, "bulk update changed nothing, skipping persist");
            return Ok(0);
        }
        self.persist()?;
        Ok(changed)
    }

    /// Write the full snapshot to the backend
    ///
    /// On failure the in-memory map is left as is and is ahead of the asset.
    fn persist(&mut self) -> Result<()> {
        let persist_err = |source: Error| Error::Persist {
            asset: self.asset.clone(),
            source: Box::new(source),
        };

        let bytes = codec::encode::<C>(&self.entries).map_err(persist_err)?;
        self.store
            .set(&self.asset, &bytes)
            .map_err(persist_err)?;

        debug!(
            asset = %self.asset,
            keys = self.entries.len(),
            bytes = bytes.len(),
            "persisted stash"
        );
        Ok(())
    }
}

impl<S: BlobStore> Stash<Many, S> {
    /// Append `value` under `key` unless it is already there
    ///
    /// Returns `Ok(false)` without touching the backend for a duplicate.
    pub fn add(&mut self, key: &str, value: impl Into<String>) -> Result<bool> {
        self.put(key, value.into())
    }

    /// Append many values with a single persist
    ///
    /// Duplicates, including repeats inside `updates`, collapse to the first
    /// occurrence. Returns how many values were actually stored; when that is
    /// zero nothing is written.
    pub fn add_many<K, I, V>(&mut self, updates: impl IntoIterator<Item = (K, I)>) -> Result<usize>
    where
        K: AsRef<str>,
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let pairs = updates.into_iter().flat_map(|(key, values)| {
            let key = key.as_ref().to_string();
            values.into_iter().map(move |value| (key.clone(), value))
        });
        self.put_many(pairs)
    }
}

impl<S: BlobStore> Stash<One, S> {
    /// Store `value` under `key`, replacing any previous value
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        self.put(key, value.into()).map(|_| ())
    }

    /// Store many key/value pairs with a single persist
    ///
    /// Returns how many pairs were written; an empty update writes nothing.
    pub fn set_many<K, V>(&mut self, updates: impl IntoIterator<Item = (K, V)>) -> Result<usize>
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        self.put_many(updates)
    }
}

fn load<C: Cardinality, S: BlobStore>(store: &S, asset: &str) -> Result<BTreeMap<String, C::Slot>> {
    let bytes = store.get(asset).map_err(|source| Error::BlobRead {
        asset: asset.to_string(),
        source: Box::new(source),
    })?;

    let Some(bytes) = bytes else {
        debug!(asset, "asset not found, starting empty");
        return Ok(BTreeMap::new());
    };

    let entries = codec::decode::<C>(&bytes).map_err(|source| Error::Decode {
        asset: asset.to_string(),
        source: Box::new(source),
    })?;

    debug!(asset, keys = entries.len(), bytes = bytes.len(), "loaded stash");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBlobStore;
    use std::collections::HashMap;

    fn memory_stash() -> (MultiStash<MemoryBlobStore>, MemoryBlobStore) {
        let store = MemoryBlobStore::new();
        let stash = MultiStash::with_store(store.clone(), "test").unwrap();
        (stash, store)
    }

    #[test]
    fn test_absent_key() {
        let (stash, store) = memory_stash();
        assert_eq!(stash.get_all("missing"), None);
        assert_eq!(stash.get("missing"), None);
        assert!(!stash.contains("missing"));
        assert!(!stash.contains_value("missing", "x"));
        assert!(stash.all().is_empty());
        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn test_add_appends_in_order() {
        let (mut stash, _) = memory_stash();
        assert!(stash.add("k", "first").unwrap());
        assert!(stash.add("k", "second").unwrap());

        assert_eq!(stash.get_all("k").unwrap(), ["first", "second"]);
        assert_eq!(stash.get("k"), Some("first"));
        assert!(stash.contains_value("k", "second"));
        assert!(!stash.contains_value("k", "Second"));
    }

    #[test]
    fn test_duplicate_add_skips_persist() {
        let (mut stash, store) = memory_stash();
        assert!(stash.add("k", "v").unwrap());
        assert_eq!(store.writes(), 1);

        assert!(!stash.add("k", "v").unwrap());
        assert_eq!(store.writes(), 1);
        assert_eq!(stash.get_all("k").unwrap(), ["v"]);
    }

    #[test]
    fn test_add_many_dedups_within_call() {
        let (mut stash, store) = memory_stash();
        let mut updates = HashMap::new();
        updates.insert("a", vec!["x", "x", "y"]);

        assert_eq!(stash.add_many(updates).unwrap(), 2);
        assert_eq!(stash.get_all("a").unwrap(), ["x", "y"]);
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn test_add_many_persists_once() {
        let (mut stash, store) = memory_stash();
        stash
            .add_many([("a", vec!["1", "2"]), ("b", vec!["3"]), ("c", vec!["4", "5"])])
            .unwrap();
        assert_eq!(store.writes(), 1);
        assert_eq!(stash.all(), ["a", "b", "c"]);
    }

    #[test]
    fn test_add_many_without_changes_skips_persist() {
        let (mut stash, store) = memory_stash();
        stash.add("a", "x").unwrap();

        assert_eq!(stash.add_many([("a", vec!["x"])]).unwrap(), 0);
        assert_eq!(stash.add_many([("b", Vec::<String>::new())]).unwrap(), 0);
        assert_eq!(store.writes(), 1);
        assert!(!stash.contains("b"));
    }

    #[test]
    fn test_state_survives_reopen() {
        let (mut stash, store) = memory_stash();
        stash.add("k", "v").unwrap();
        drop(stash);

        let stash = MultiStash::with_store(store, "test").unwrap();
        assert_eq!(stash.get_all("k").unwrap(), ["v"]);
    }

    #[test]
    fn test_persist_failure_keeps_memory_state() {
        let (mut stash, store) = memory_stash();
        store.fail_writes(true);

        let err = stash.add("k", "v").unwrap_err();
        assert!(err.is_persist());
        assert_eq!(stash.get("k"), Some("v"));
        assert_eq!(store.raw("test"), None);

        // Memory already holds the value, so a retry is a no-op.
        store.fail_writes(false);
        assert!(!stash.add("k", "v").unwrap());
        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn test_add_many_persist_failure_keeps_memory_state() {
        let (mut stash, store) = memory_stash();
        store.fail_writes(true);

        let err = stash
            .add_many([("a", vec!["x", "y"]), ("b", vec!["z"])])
            .unwrap_err();
        match err {
            Error::Persist { asset, source } => {
                assert_eq!(asset, "test");
                assert!(!source.is_persist());
            }
            other => panic!("expected persist failure, got {other:?}"),
        }
        assert_eq!(stash.get_all("a").unwrap(), ["x", "y"]);
        assert_eq!(stash.get("b"), Some("z"));
        assert_eq!(store.writes(), 0);
        assert_eq!(store.raw("test"), None);
    }

    #[test]
    fn test_single_set_persist_failure_keeps_memory_state() {
        let store = MemoryBlobStore::new();
        let mut stash = SingleStash::with_store(store.clone(), "single").unwrap();
        store.fail_writes(true);

        let err = stash.set("k", "v").unwrap_err();
        match err {
            Error::Persist { asset, source } => {
                assert_eq!(asset, "single");
                assert!(!source.is_persist());
            }
            other => panic!("expected persist failure, got {other:?}"),
        }
        assert_eq!(stash.get("k"), Some("v"));
        assert_eq!(store.writes(), 0);

        // An overwrite always persists, so the retry reaches the backend.
        store.fail_writes(false);
        stash.set("k", "v").unwrap();
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn test_read_failure_is_blob_read() {
        let store = MemoryBlobStore::new();
        store.fail_reads(true);
        let result = MultiStash::with_store(store, "test");
        assert!(matches!(result, Err(Error::BlobRead { .. })));
    }

    #[test]
    fn test_corrupt_asset_is_decode_failure() {
        let store = MemoryBlobStore::new();
        store.insert_raw("test", b"not a snapshot at all".to_vec());
        let result = MultiStash::with_store(store, "test");
        assert!(matches!(result, Err(Error::Decode { .. })));
    }

    #[test]
    fn test_layouts_do_not_mix() {
        let store = MemoryBlobStore::new();
        let mut single = SingleStash::with_store(store.clone(), "shared").unwrap();
        single.set("k", "v").unwrap();

        let result = MultiStash::with_store(store, "shared");
        match result {
            Err(Error::Decode { source, .. }) => {
                assert!(matches!(*source, Error::LayoutMismatch { .. }))
            }
            _ => panic!("expected a decode failure"),
        }
    }

    #[test]
    fn test_empty_slot_from_snapshot() {
        let store = MemoryBlobStore::new();
        let mut entries: BTreeMap<String, Vec<String>> = BTreeMap::new();
        entries.insert("empty".to_string(), Vec::new());
        store.insert_raw("test", codec::encode::<Many>(&entries).unwrap());

        let mut stash = MultiStash::with_store(store, "test").unwrap();
        assert!(stash.contains("empty"));
        assert_eq!(stash.get_all("empty"), Some(&[][..]));
        assert_eq!(stash.get("empty"), None);
        assert_eq!(stash.all(), ["empty"]);

        stash.add("empty", "now").unwrap();
        assert_eq!(stash.get("empty"), Some("now"));
    }

    #[test]
    fn test_reload_picks_up_external_writes() {
        let store = MemoryBlobStore::new();
        let mut reader = MultiStash::with_store(store.clone(), "test").unwrap();
        let mut writer = MultiStash::with_store(store, "test").unwrap();

        writer.add("k", "v").unwrap();
        assert!(!reader.contains("k"));

        reader.reload().unwrap();
        assert_eq!(reader.get("k"), Some("v"));
    }

    #[test]
    fn test_single_set_overwrites_and_always_persists() {
        let store = MemoryBlobStore::new();
        let mut stash = SingleStash::with_store(store.clone(), "single").unwrap();

        stash.set("k", "one").unwrap();
        stash.set("k", "two").unwrap();
        stash.set("k", "two").unwrap();

        assert_eq!(stash.get("k"), Some("two"));
        assert_eq!(stash.get_all("k").unwrap(), ["two"]);
        assert_eq!(store.writes(), 3);
    }

    #[test]
    fn test_single_set_many() {
        let store = MemoryBlobStore::new();
        let mut stash = SingleStash::with_store(store.clone(), "single").unwrap();

        let written = stash
            .set_many([("a", "1"), ("b", "2"), ("a", "3")])
            .unwrap();
        assert_eq!(written, 3);
        assert_eq!(store.writes(), 1);
        assert_eq!(stash.get("a"), Some("3"));
        assert_eq!(stash.get("b"), Some("2"));

        assert_eq!(stash.set_many(Vec::<(String, String)>::new()).unwrap(), 0);
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn test_iter_exposes_values() {
        let (mut stash, _) = memory_stash();
        stash.add_many([("b", vec!["2"]), ("a", vec!["1", "1b"])]).unwrap();

        let collected: Vec<(&str, usize)> = stash.iter().map(|(k, v)| (k, v.len())).collect();
        assert_eq!(collected, [("a", 2), ("b", 1)]);
        assert_eq!(stash.len(), 2);
        assert!(!stash.is_empty());
    }
}
