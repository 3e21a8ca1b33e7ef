//! Core data model types for stashdb

mod cardinality;
mod hash;

pub use cardinality::{Cardinality, Layout, Many, One};
pub use hash::Hash;
