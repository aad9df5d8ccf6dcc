//! Page identifier type.

use std::fmt;

/// Number of a page slot in the database file.
///
/// Page numbers are 1-indexed. Page 1 holds the table catalog, and the
/// value 0 is used on disk to mean "no page" (an empty leaf chain link).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PageId(pub u32);

impl PageId {
    /// Sentinel stored in pointer fields that point nowhere
    pub const NONE: PageId = PageId(0);

    /// Page reserved for the catalog append log
    pub const CATALOG: PageId = PageId(1);

    /// First page number the allocator may hand out
    pub const FIRST_DATA: PageId = PageId(2);

    /// Create a new page ID
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw page number
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Check whether this refers to an actual slot
    pub const fn is_some(self) -> bool {
        self.0 != 0
    }

    /// Byte offset of this page in the file, or `None` for page 0
    pub const fn file_offset(self, page_size: usize) -> Option<u64> {
        if self.0 == 0 {
            None
        } else {
            Some((self.0 as u64 - 1) * page_size as u64)
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
