//! Page layer: slotted page format with cell-based layout.
//!
//! This module implements the on-disk structure of B+Tree pages.
//! Pages use a slotted format where:
//! - A fixed 9-byte header contains metadata
//! - Cell offsets grow from the header toward the end
//! - Cell content grows from the end toward the header
//! - Free space is in the middle

mod cell;
mod header;
mod slotted;

pub use cell::InternalCell;
pub use header::{PageHeader, CELL_POINTER_SIZE, HEADER_SIZE};
pub use slotted::{InternalPage, LeafPage, Page};

use crate::types::PAGE_SIZE;

/// A raw page buffer
#[derive(Clone)]
pub struct PageBuf {
    data: [u8; PAGE_SIZE],
}

impl PageBuf {
    /// Create a new zeroed page buffer
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    /// Whether every byte of the page is zero (a never-initialized slot)
    pub fn is_zeroed(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }
}

impl Default for PageBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PageBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageBuf")
            .field("type", &self.data[0])
            .finish_non_exhaustive()
    }
}

impl std::ops::Deref for PageBuf {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl std::ops::DerefMut for PageBuf {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}

impl AsRef<[u8]> for PageBuf {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
