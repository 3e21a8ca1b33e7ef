//! Snapshot encoding
//!
//! Format:
//! ```text
//! [magic: 8 bytes "STASHMAP"]
//! [version: 4 bytes (u32 LE)]
//! [layout: 1 byte]
//! [payload: bincode map of key → slot, keys sorted]
//! ```

use crate::model::{Cardinality, Layout};
use crate::{Error, Result, MAGIC, VERSION};
use bincode::Options;
use std::collections::BTreeMap;

const HEADER_SIZE: usize = 13;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Encode a stash's entries into a self-describing snapshot
pub fn encode<C: Cardinality>(entries: &BTreeMap<String, C::Slot>) -> Result<Vec<u8>> {
    let payload = options().serialize(entries)?;

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.push(C::LAYOUT.as_byte());
    out.extend(payload);
    Ok(out)
}

/// Decode a snapshot, rejecting anything not written for layout `C`
pub fn decode<C: Cardinality>(bytes: &[u8]) -> Result<BTreeMap<String, C::Slot>> {
    if bytes.len() < HEADER_SIZE {
        return Err(Error::Corruption(format!(
            "Snapshot too short: {} bytes",
            bytes.len()
        )));
    }

    if &bytes[0..8] != MAGIC {
        return Err(Error::Corruption("Invalid magic bytes".into()));
    }

    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[8..12]);
    let version = u32::from_le_bytes(version);
    if version != VERSION {
        return Err(Error::VersionMismatch {
            expected: VERSION,
            found: version,
        });
    }

    match Layout::from_byte(bytes[12]) {
        Some(layout) if layout == C::LAYOUT => {}
        Some(layout) => {
            return Err(Error::LayoutMismatch {
                expected: C::LAYOUT.to_string(),
                found: layout.to_string(),
            })
        }
        None => {
            return Err(Error::Corruption(format!(
                "Unknown layout tag: {}",
                bytes[12]
            )))
        }
    }

    let payload = &bytes[HEADER_SIZE..];
    Ok(options()
        .with_limit(payload.len() as u64)
        .deserialize(payload)?)
}
