//! Blob type - the unit of content-addressed storage

use crate::model::Hash;

/// How a blob's bytes are laid out on disk
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    /// Stored verbatim
    None,
    /// zstd-compressed
    Zstd,
}

impl Compression {
    pub fn as_byte(&self) -> u8 {
        match self {
            Compression::None => 0,
            Compression::Zstd => 1,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Compression::None),
            1 => Some(Compression::Zstd),
            _ => None,
        }
    }
}

/// A blob is an opaque chunk of asset bytes, addressed by its content
#[derive(Clone, Debug)]
pub struct Blob {
    /// Raw data (uncompressed)
    pub data: Vec<u8>,
}

impl Blob {
    /// Create a new blob
    pub fn new(data: Vec<u8>) -> Self {
        Blob { data }
    }

    /// Compute the content hash of the uncompressed data
    pub fn hash(&self) -> Hash {
        Hash::digest(&self.data)
    }

    /// Encode the blob for storage
    ///
    /// A `level` of 0 stores the data uncompressed.
    pub fn compress(&self, level: i32) -> crate::Result<Vec<u8>> {
        let mut output = Vec::with_capacity(self.data.len() + 1);
        if level == 0 {
            output.push(Compression::None.as_byte());
            output.extend_from_slice(&self.data);
        } else {
            output.push(Compression::Zstd.as_byte());
            output.extend(zstd::encode_all(self.data.as_slice(), level)?);
        }
        Ok(output)
    }

    /// Decode a blob from storage
    pub fn decompress(data: &[u8]) -> crate::Result<Self> {
        let (&flag, body) = data
            .split_first()
            .ok_or_else(|| crate::Error::Corruption("Empty blob data".into()))?;

        let compression = Compression::from_byte(flag)
            .ok_or_else(|| crate::Error::Corruption(format!("Invalid blob flag: {}", flag)))?;

        let data = match compression {
            Compression::None => body.to_vec(),
            Compression::Zstd => zstd::decode_all(body)?,
        };

        Ok(Blob { data })
    }

    /// Get the size of the uncompressed data
    pub fn size(&self) -> usize {
        self.data.len()
    }
}
