//! Directory-backed, content-addressed blob store
//!
//! Directory layout:
//! ```text
//! <location>/
//!   assets.json        asset name → object hash (hex)
//!   objects/<hh>/<rest> blob flag byte + (compressed) data
//!   tmp/               staging area for atomic writes
//! ```
//!
//! Objects are addressed by the BLAKE3 hash of their uncompressed bytes, so an
//! unchanged snapshot written twice is stored once. The index is re-read on
//! every call, which lets several stashes share one location.

use crate::model::Hash;
use crate::store::blob::Blob;
use crate::store::BlobStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

const INDEX_FILE: &str = "assets.json";
const OBJECTS_DIR: &str = "objects";
const TMP_DIR: &str = "tmp";
const INDEX_VERSION: u32 = 1;

/// Default zstd level for stored objects
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// On-disk asset index
#[derive(Debug, Default, Serialize, Deserialize)]
struct AssetIndex {
    version: u32,
    assets: BTreeMap<String, String>,
}

/// A blob store rooted at a local directory
#[derive(Debug)]
pub struct LocalBlobStore {
    root: PathBuf,
    level: i32,
}

impl LocalBlobStore {
    /// Open an existing store directory
    pub fn open(location: impl AsRef<Path>) -> Result<Self> {
        let root = location.as_ref().to_path_buf();
        if !root.join(OBJECTS_DIR).is_dir() {
            return Err(Error::BackendUnavailable {
                location: root,
                source: std::io::Error::new(ErrorKind::NotFound, "not a blob store directory"),
            });
        }
        Ok(LocalBlobStore {
            root,
            level: DEFAULT_COMPRESSION_LEVEL,
        })
    }

    /// Open the store at `location`, creating its directories if needed
    pub fn open_or_create(location: impl AsRef<Path>) -> Result<Self> {
        let root = location.as_ref().to_path_buf();
        for dir in [root.join(OBJECTS_DIR), root.join(TMP_DIR)] {
            fs::create_dir_all(&dir).map_err(|source| Error::BackendUnavailable {
                location: root.clone(),
                source,
            })?;
        }
        Ok(LocalBlobStore {
            root,
            level: DEFAULT_COMPRESSION_LEVEL,
        })
    }

    /// Set the zstd level for objects written from now on (0 = uncompressed)
    pub fn with_compression(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    /// Get the store's root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List every asset name in the index
    pub fn assets(&self) -> Result<Vec<String>> {
        Ok(self.load_index()?.assets.into_keys().collect())
    }

    /// Drop an asset from the index; its object stays until [`prune`](Self::prune)
    pub fn remove(&mut self, asset: &str) -> Result<bool> {
        let mut index = self.load_index()?;
        let removed = index.assets.remove(asset).is_some();
        if removed {
            self.save_index(&index)?;
            debug!(asset, "removed asset from index");
        }
        Ok(removed)
    }

    /// Delete every object no asset refers to, returning how many were removed
    ///
    /// Stale files in the staging directory are cleared as well.
    pub fn prune(&mut self) -> Result<usize> {
        let live: BTreeSet<String> = self.load_index()?.assets.into_values().collect();

        let mut removed = 0;
        for fan in fs::read_dir(self.root.join(OBJECTS_DIR))? {
            let fan = fan?;
            if !fan.file_type()?.is_dir() {
                continue;
            }
            let prefix = fan.file_name().to_string_lossy().to_string();
            for object in fs::read_dir(fan.path())? {
                let object = object?;
                let hex = format!("{}{}", prefix, object.file_name().to_string_lossy());
                if live.contains(&hex) {
                    continue;
                }
                match fs::remove_file(object.path()) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(object = %hex, error = %e, "failed to prune object"),
                }
            }
        }

        // Leftovers from interrupted writes.
        for entry in fs::read_dir(self.root.join(TMP_DIR))? {
            let entry = entry?;
            if let Err(e) = fs::remove_file(entry.path()) {
                warn!(path = %entry.path().display(), error = %e, "failed to remove temp file");
            }
        }

        debug!(removed, "pruned unreferenced objects");
        Ok(removed)
    }

    fn object_path(&self, hash: &Hash) -> PathBuf {
        let (dir, rest) = hash.fan_out();
        self.root.join(OBJECTS_DIR).join(dir).join(rest)
    }

    fn load_index(&self) -> Result<AssetIndex> {
        let path = self.root.join(INDEX_FILE);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(AssetIndex {
                    version: INDEX_VERSION,
                    assets: BTreeMap::new(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let index: AssetIndex = serde_json::from_slice(&content)?;
        if index.version != INDEX_VERSION {
            return Err(Error::VersionMismatch {
                expected: INDEX_VERSION,
                found: index.version,
            });
        }
        Ok(index)
    }

    fn save_index(&self, index: &AssetIndex) -> Result<()> {
        let data = serde_json::to_vec_pretty(index)?;
        atomic_write(&self.root.join(TMP_DIR), &self.root.join(INDEX_FILE), &data)
    }
}

impl BlobStore for LocalBlobStore {
    fn get(&self, asset: &str) -> Result<Option<Vec<u8>>> {
        let index = self.load_index()?;
        let Some(hex) = index.assets.get(asset) else {
            return Ok(None);
        };

        let hash = Hash::from_hex(hex)
            .map_err(|e| Error::Corruption(format!("Invalid hash for '{}': {}", asset, e)))?;

        let stored = match fs::read(self.object_path(&hash)) {
            Ok(stored) => stored,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::Corruption(format!(
                    "Asset '{}' points at missing object {}",
                    asset,
                    hash.short()
                )))
            }
            Err(e) => return Err(e.into()),
        };

        let blob = Blob::decompress(&stored)?;
        if blob.hash() != hash {
            return Err(Error::Corruption(format!(
                "Object {} does not match its content",
                hash.short()
            )));
        }

        Ok(Some(blob.data))
    }

    fn set(&mut self, asset: &str, bytes: &[u8]) -> Result<()> {
        let blob = Blob::new(bytes.to_vec());
        let hash = blob.hash();

        let path = self.object_path(&hash);
        if !object_is_intact(&path, &hash) {
            let stored = blob.compress(self.level)?;
            atomic_write(&self.root.join(TMP_DIR), &path, &stored)?;
        }

        let mut index = self.load_index()?;
        index.assets.insert(asset.to_string(), hash.to_hex());
        self.save_index(&index)?;

        debug!(asset, object = %hash.short(), size = blob.size(), "stored asset");
        Ok(())
    }
}

/// Whether the object at `path` exists and decodes to content matching `hash`
fn object_is_intact(path: &Path, hash: &Hash) -> bool {
    match fs::read(path) {
        Ok(stored) => match Blob::decompress(&stored) {
            Ok(blob) => blob.hash() == *hash,
            Err(_) => false,
        },
        Err(_) => false,
    }
}

/// Atomic write helper
///
/// Writes data to a temporary file, fsyncs it, renames it to the target path,
/// then fsyncs the parent directory so the rename itself is durable.
fn atomic_write(tmp_dir: &Path, target: &Path, data: &[u8]) -> Result<()> {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::create_dir_all(tmp_dir)?;

    let tmp = tmp_dir.join(format!(
        "{}.{}.tmp",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&tmp, target)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result?;

    sync_parent(target)
}

#[cfg(unix)]
fn sync_parent(target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

// Directories cannot be opened for syncing on this platform.
#[cfg(not(unix))]
fn sync_parent(_target: &Path) -> Result<()> {
    Ok(())
}
