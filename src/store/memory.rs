//! In-process blob store
//!
//! Clones share the same underlying map, so a handle kept outside a stash can
//! observe what the stash wrote and how often.

use crate::store::BlobStore;
use crate::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Inner {
    assets: HashMap<String, Vec<u8>>,
    writes: usize,
    fail_reads: bool,
    fail_writes: bool,
}

/// A blob store kept entirely in memory
#[derive(Clone, Debug, Default)]
pub struct MemoryBlobStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set` calls across all clones
    pub fn writes(&self) -> usize {
        self.inner.read().writes
    }

    /// Raw bytes currently stored under `asset`
    pub fn raw(&self, asset: &str) -> Option<Vec<u8>> {
        self.inner.read().assets.get(asset).cloned()
    }

    /// Store bytes directly, bypassing the write counter
    pub fn insert_raw(&self, asset: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.inner.write().assets.insert(asset.into(), bytes.into());
    }

    /// Make every subsequent `get` fail
    pub fn fail_reads(&self, fail: bool) {
        self.inner.write().fail_reads = fail;
    }

    /// Make every subsequent `set` fail
    pub fn fail_writes(&self, fail: bool) {
        self.inner.write().fail_writes = fail;
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, asset: &str) -> Result<Option<Vec<u8>>> {
        let inner = self.inner.read();
        if inner.fail_reads {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::Other,
                "memory store: reads disabled",
            )));
        }
        Ok(inner.assets.get(asset).cloned())
    }

    fn set(&mut self, asset: &str, bytes: &[u8]) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.fail_writes {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::Other,
                "memory store: writes disabled",
            )));
        }
        inner.assets.insert(asset.to_string(), bytes.to_vec());
        inner.writes += 1;
        Ok(())
    }
}
