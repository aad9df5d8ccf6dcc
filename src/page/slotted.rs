//! Slotted page implementation.
//!
//! A slotted page uses the following layout:
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │                 Page Header (9 bytes)               │
//! ├────────────────────────────────────────────────────┤
//! │                 Cell Offset Table                   │
//! │  [off0][off1][off2]...      →                      │
//! ├────────────────────────────────────────────────────┤
//! │                                                    │
//! │                   Free Space                        │
//! │                                                    │
//! ├────────────────────────────────────────────────────┤
//! │                 Cell Content Area                   │
//! │      ←  [cell2][cell1][cell0]                      │
//! └────────────────────────────────────────────────────┘
//! ```
//!
//! Pages are decoded into owned values, edited in memory, and encoded back
//! as a whole. Cell 0 sits at the very end of the page, so the payload of
//! cell `i` ends where cell `i - 1` begins.

use crate::error::{Result, StorageError};
use crate::page::{InternalCell, PageBuf, PageHeader, CELL_POINTER_SIZE, HEADER_SIZE};
use crate::record;
use crate::types::{PageId, PageType, PAGE_SIZE};

/// A decoded B+Tree page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    Leaf(LeafPage),
    Internal(InternalPage),
}

/// Leaf page: encoded rows in key order, chained to the next leaf
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeafPage {
    /// Encoded rows
    pub cells: Vec<Vec<u8>>,
    /// Next leaf to the right, or `PageId::NONE`
    pub next_leaf: PageId,
}

/// Internal page: separators in key order plus the left-most child
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalPage {
    /// Child holding every key below the first separator
    pub left_child: PageId,
    /// Separator cells
    pub cells: Vec<InternalCell>,
}

impl Page {
    /// Encode this page into a full page buffer
    pub fn encode(&self) -> Result<PageBuf> {
        match self {
            Page::Leaf(leaf) => leaf.encode(),
            Page::Internal(node) => node.encode(),
        }
    }

    /// Decode a page from exactly one page of bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PAGE_SIZE {
            return Err(StorageError::InvalidPageSize(bytes.len()));
        }

        let header = PageHeader::read(bytes)?;
        let cells = read_slotted(&header, bytes)?;
        let special = PageId::new(header.special);

        match header.page_type {
            PageType::Leaf => Ok(Page::Leaf(LeafPage {
                cells: cells.into_iter().map(<[u8]>::to_vec).collect(),
                next_leaf: special,
            })),
            PageType::Internal => {
                let cells = cells
                    .into_iter()
                    .map(InternalCell::decode)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Page::Internal(InternalPage {
                    left_child: special,
                    cells,
                }))
            }
        }
    }
}

impl LeafPage {
    /// Create a new empty leaf page
    pub fn new() -> Self {
        Self::default()
    }

    /// Size in bytes this page would occupy once encoded
    pub fn encoded_size(&self) -> usize {
        slotted_size(self.cells.iter().map(Vec::len))
    }

    /// Encode this leaf into a full page buffer
    pub fn encode(&self) -> Result<PageBuf> {
        let cells: Vec<&[u8]> = self.cells.iter().map(Vec::as_slice).collect();
        write_slotted(PageType::Leaf, self.next_leaf.value(), &cells)
    }

    /// Key of the cell at the given index
    pub fn key_at(&self, index: usize) -> Result<String> {
        let cell = self.cells.get(index).ok_or_else(|| {
            StorageError::invalid_operation(format!(
                "cell index {} out of bounds (count: {})",
                index,
                self.cells.len()
            ))
        })?;
        record::row_key(cell)
    }

    /// Linear scan for the cell whose key equals `key`
    pub fn find(&self, key: &str) -> Result<Option<usize>> {
        for (i, cell) in self.cells.iter().enumerate() {
            if record::row_key(cell)? == key {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    /// Insert an encoded row at its sorted position
    ///
    /// Returns the index where the cell was inserted.
    pub fn insert_sorted(&mut self, key: &str, row: Vec<u8>) -> Result<usize> {
        let mut pos = self.cells.len();
        for (i, cell) in self.cells.iter().enumerate() {
            let existing = record::row_key(cell)?;
            if existing.as_str() == key {
                return Err(StorageError::DuplicateKey(key.to_string()));
            }
            if key < existing.as_str() {
                pos = i;
                break;
            }
        }
        self.cells.insert(pos, row);
        Ok(pos)
    }
}

impl InternalPage {
    /// Create a new internal page with no separators
    pub fn new(left_child: PageId) -> Self {
        Self {
            left_child,
            cells: Vec::new(),
        }
    }

    /// Size in bytes this page would occupy once encoded
    pub fn encoded_size(&self) -> usize {
        slotted_size(self.cells.iter().map(InternalCell::encoded_size))
    }

    /// Encode this page into a full page buffer
    pub fn encode(&self) -> Result<PageBuf> {
        let encoded: Vec<Vec<u8>> = self.cells.iter().map(InternalCell::encode).collect();
        let cells: Vec<&[u8]> = encoded.iter().map(Vec::as_slice).collect();
        write_slotted(PageType::Internal, self.left_child.value(), &cells)
    }

    /// Find the child page for a given key
    ///
    /// Cells are stored in key order, each with (key, child):
    /// - left_child holds keys < first separator
    /// - cell[i].child holds keys >= cell[i].key and < cell[i + 1].key
    ///
    /// The last separator <= key wins.
    pub fn find_child(&self, key: &str) -> PageId {
        let mut child = self.left_child;
        for cell in &self.cells {
            if key < cell.key.as_str() {
                break;
            }
            child = cell.child;
        }
        child
    }

    /// Insert a separator after every separator <= its key
    ///
    /// Returns the index where the cell was inserted.
    pub fn insert_separator(&mut self, cell: InternalCell) -> usize {
        let pos = self
            .cells
            .iter()
            .position(|c| cell.key < c.key)
            .unwrap_or(self.cells.len());
        self.cells.insert(pos, cell);
        pos
    }
}

/// Total encoded size for cells of the given payload sizes
fn slotted_size(payloads: impl Iterator<Item = usize>) -> usize {
    payloads.fold(HEADER_SIZE, |acc, len| acc + CELL_POINTER_SIZE + len)
}

fn write_slotted(page_type: PageType, special: u32, cells: &[&[u8]]) -> Result<PageBuf> {
    let needed = slotted_size(cells.iter().map(|c| c.len()));
    if needed > PAGE_SIZE {
        return Err(StorageError::PageOverflow {
            needed,
            available: PAGE_SIZE,
        });
    }

    let mut buf = PageBuf::new();
    let mut offset = PAGE_SIZE;

    for (i, cell) in cells.iter().enumerate() {
        offset -= cell.len();
        buf[offset..offset + cell.len()].copy_from_slice(cell);

        let ptr = PageHeader::cell_pointer_offset(i);
        buf[ptr..ptr + CELL_POINTER_SIZE].copy_from_slice(&(offset as u16).to_le_bytes());
    }

    let header = PageHeader {
        page_type,
        cell_count: cells.len() as u16,
        cell_content_start: offset as u16,
        special,
    };
    header.write(&mut buf);

    Ok(buf)
}

fn read_slotted<'a>(header: &PageHeader, bytes: &'a [u8]) -> Result<Vec<&'a [u8]>> {
    let table_end = header.cell_pointer_array_end();
    if table_end > PAGE_SIZE {
        return Err(StorageError::corruption(format!(
            "{} cell offsets do not fit in a page",
            header.cell_count
        )));
    }

    let mut cells = Vec::with_capacity(header.cell_count as usize);
    let mut end = PAGE_SIZE;

    for i in 0..header.cell_count as usize {
        let ptr = PageHeader::cell_pointer_offset(i);
        let start = u16::from_le_bytes([bytes[ptr], bytes[ptr + 1]]) as usize;
        if start < table_end || start > end {
            return Err(StorageError::corruption(format!(
                "cell {} offset {} outside {}..={}",
                i, start, table_end, end
            )));
        }
        cells.push(&bytes[start..end]);
        end = start;
    }

    Ok(cells)
}
