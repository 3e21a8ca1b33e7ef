//! Value-cardinality policies
//!
//! A stash maps each key to a *slot*. The policy decides what a slot holds
//! and what inserting a value into an occupied slot means:
//!
//! - [`Many`]: an ordered, deduplicated list. Inserting appends unless the
//!   value is already present.
//! - [`One`]: a single value. Inserting overwrites.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// Snapshot layout tag, written into every encoded stash
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// At most one value per key
    One,
    /// An ordered set of values per key
    Many,
}

impl Layout {
    pub fn as_byte(&self) -> u8 {
        match self {
            Layout::One => 1,
            Layout::Many => 2,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Layout::One),
            2 => Some(Layout::Many),
            _ => None,
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::One => write!(f, "single-valued"),
            Layout::Many => write!(f, "multi-valued"),
        }
    }
}

/// Strategy for how values are stored under a key
pub trait Cardinality: Send + Sync + 'static {
    /// What a key maps to in memory and on disk
    type Slot: Serialize + DeserializeOwned + Clone + fmt::Debug + PartialEq + Send + Sync;

    /// Tag identifying this layout in encoded snapshots
    const LAYOUT: Layout;

    /// Build the slot for a key seen for the first time
    fn create(value: String) -> Self::Slot;

    /// Insert `value` into an occupied slot, returning whether it changed
    fn merge(slot: &mut Self::Slot, value: String) -> bool;

    /// View the slot's values in stored order
    fn values(slot: &Self::Slot) -> &[String];
}

/// Multi-valued policy: append-if-absent
#[derive(Clone, Copy, Debug, Default)]
pub struct Many;

impl Cardinality for Many {
    type Slot = Vec<String>;

    const LAYOUT: Layout = Layout::Many;

    fn create(value: String) -> Self::Slot {
        vec![value]
    }

    fn merge(slot: &mut Self::Slot, value: String) -> bool {
        if slot.contains(&value) {
            return false;
        }
        slot.push(value);
        true
    }

    fn values(slot: &Self::Slot) -> &[String] {
        slot
    }
}

/// Single-valued policy: overwrite
#[derive(Clone, Copy, Debug, Default)]
pub struct One;

impl Cardinality for One {
    type Slot = String;

    const LAYOUT: Layout = Layout::One;

    fn create(value: String) -> Self::Slot {
        value
    }

    // An overwrite always counts as a write, even with an equal value.
    fn merge(slot: &mut Self::Slot, value: String) -> bool {
        *slot = value;
        true
    }

    fn values(slot: &Self::Slot) -> &[String] {
        std::slice::from_ref(slot)
    }
}
