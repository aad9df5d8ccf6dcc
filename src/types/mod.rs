//! Common types used throughout the storage engine.

mod page_id;

pub use page_id::PageId;

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Page types
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Interior node: separator keys + child pointers
    Internal = 0x05,
    /// Leaf node: encoded rows
    Leaf = 0x0D,
}

impl PageType {
    /// Convert from byte value
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x05 => Some(Self::Internal),
            0x0D => Some(Self::Leaf),
            _ => None,
        }
    }
}
