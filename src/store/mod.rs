//! Blob store backends
//!
//! A stash persists its whole state as a single named asset. The backend only
//! has to fetch and overwrite assets by name; [`LocalBlobStore`] does this on
//! disk with content-addressed, zstd-compressed objects, and
//! [`MemoryBlobStore`] keeps everything in process.

mod blob;
mod file_store;
mod memory;

pub use blob::{Blob, Compression};
pub use file_store::{LocalBlobStore, DEFAULT_COMPRESSION_LEVEL};
pub use memory::MemoryBlobStore;

use crate::Result;

/// Named get/set of opaque byte blobs
pub trait BlobStore {
    /// Fetch an asset's bytes; `Ok(None)` means it was never written
    fn get(&self, asset: &str) -> Result<Option<Vec<u8>>>;

    /// Replace an asset's bytes in full
    fn set(&mut self, asset: &str, bytes: &[u8]) -> Result<()>;
}
