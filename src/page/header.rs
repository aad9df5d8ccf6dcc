//! Page header structure.
//!
//! The page header occupies the first bytes of each B+Tree page and contains
//! metadata about the page contents.

use crate::error::{Result, StorageError};
use crate::types::PageType;

/// Size of the page header (same for leaf and internal pages)
pub const HEADER_SIZE: usize = 9;

/// Size of one entry in the cell offset table
pub const CELL_POINTER_SIZE: usize = 2;

/// Page header structure
///
/// Layout (all integers little-endian):
/// ```text
/// Offset  Size  Description
/// 0       1     Page type flag (0x0D leaf, 0x05 internal)
/// 1       2     Number of cells on this page
/// 3       2     Offset to start of cell content area
/// 5       4     Next leaf page (leaf) or left-most child page (internal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    /// Type of this page
    pub page_type: PageType,
    /// Number of cells on this page
    pub cell_count: u16,
    /// Offset to the start of the cell content area
    pub cell_content_start: u16,
    /// `next_leaf` for leaves, `left_child` for internal pages
    pub special: u32,
}

impl PageHeader {
    /// Read a page header from bytes
    pub fn read(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(StorageError::InvalidPageSize(bytes.len()));
        }

        let page_type =
            PageType::from_byte(bytes[0]).ok_or(StorageError::InvalidPageType(bytes[0]))?;
        let cell_count = u16::from_le_bytes([bytes[1], bytes[2]]);
        let cell_content_start = u16::from_le_bytes([bytes[3], bytes[4]]);
        let special = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);

        Ok(Self {
            page_type,
            cell_count,
            cell_content_start,
            special,
        })
    }

    /// Write this header to bytes
    pub fn write(&self, bytes: &mut [u8]) {
        bytes[0] = self.page_type as u8;
        bytes[1..3].copy_from_slice(&self.cell_count.to_le_bytes());
        bytes[3..5].copy_from_slice(&self.cell_content_start.to_le_bytes());
        bytes[5..9].copy_from_slice(&self.special.to_le_bytes());
    }

    /// Offset of the cell pointer at the given index
    pub fn cell_pointer_offset(index: usize) -> usize {
        HEADER_SIZE + index * CELL_POINTER_SIZE
    }

    /// Calculate the end of the cell pointer array
    pub fn cell_pointer_array_end(&self) -> usize {
        Self::cell_pointer_offset(self.cell_count as usize)
    }
}
