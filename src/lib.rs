//! # stashdb
//!
//! A small disk-backed multi-valued key-value stash.
//!
//! A stash maps string keys to ordered, deduplicated lists of string values
//! (or, in its single-valued form, to one string each). The whole map lives in
//! memory and is written back as one snapshot asset on every mutation that
//! changes it.
//!
//! ## Core Concepts
//!
//! - **Stash**: the persisted map, generic over its cardinality policy
//! - **Asset**: the named blob holding a stash's full snapshot
//! - **Blob store**: the backend that gets and sets assets by name
//!
//! ## Example
//!
//! ```no_run
//! use stashdb::MultiStash;
//!
//! let mut stash = MultiStash::open(".stash", "tags")?;
//! stash.add("report.pdf", "finance")?;
//! stash.add("report.pdf", "2024")?;
//! assert_eq!(stash.get("report.pdf"), Some("finance"));
//! # Ok::<(), stashdb::Error>(())
//! ```

pub mod config;
pub mod model;
pub mod stash;
pub mod store;

mod error;

pub use config::StashConfig;
pub use error::{Error, Result};
pub use model::{Cardinality, Hash, Layout, Many, One};
pub use stash::{MultiStash, SingleStash, Stash};
pub use store::{BlobStore, LocalBlobStore, MemoryBlobStore};

/// Snapshot format version
pub const VERSION: u32 = 1;

/// Magic bytes at the start of every snapshot
pub const MAGIC: &[u8; 8] = b"STASHMAP";
