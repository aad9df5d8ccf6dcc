//! Internal cell encoding and decoding.
//!
//! Leaf cells are encoded rows (see [`crate::record`]) and need no codec of
//! their own. Internal cells carry a separator key and a child pointer:
//! ```text
//! key bytes | 0x00 | child page (u32, little-endian)
//! ```

use crate::error::{Result, StorageError};
use crate::types::PageId;

/// Size of the child pointer that follows the key terminator
const CHILD_SIZE: usize = 4;

/// A separator cell within an internal page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalCell {
    /// Separator key; the child holds keys >= this key
    pub key: String,
    /// Child page for keys at or above the separator
    pub child: PageId,
}

impl InternalCell {
    /// Create a new separator cell
    pub fn new(key: impl Into<String>, child: PageId) -> Self {
        Self {
            key: key.into(),
            child,
        }
    }

    /// Calculate the encoded size of this cell in bytes
    pub fn encoded_size(&self) -> usize {
        self.key.len() + 1 + CHILD_SIZE
    }

    /// Encode this cell into bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_size());
        buf.extend_from_slice(self.key.as_bytes());
        buf.push(0);
        buf.extend_from_slice(&self.child.value().to_le_bytes());
        buf
    }

    /// Decode a cell from exactly its payload bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let nul = bytes.iter().position(|&b| b == 0).ok_or_else(|| {
            StorageError::malformed_cell(format!("no key terminator in {} bytes", bytes.len()))
        })?;

        let child_bytes = bytes.get(nul + 1..nul + 1 + CHILD_SIZE).ok_or_else(|| {
            StorageError::malformed_cell(format!(
                "terminator at {} leaves no child pointer in {} bytes",
                nul,
                bytes.len()
            ))
        })?;

        let key = std::str::from_utf8(&bytes[..nul])
            .map_err(|_| StorageError::malformed_cell("separator key is not valid UTF-8"))?;
        let mut child = [0u8; CHILD_SIZE];
        child.copy_from_slice(child_bytes);

        Ok(Self::new(key, PageId::new(u32::from_le_bytes(child))))
    }
}
