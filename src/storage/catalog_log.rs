//! Catalog append log.
//!
//! Page 1 of the database file holds the table catalog. Unlike B+Tree
//! pages it is a plain forward-packed log of row entries.
//!
//! Layout:
//! ```text
//! Offset  Size  Description
//! 0       4     Entry count (little-endian u32)
//! 4       4     Length of entry 0 (little-endian u32)
//! 8       n     Entry 0 bytes (an encoded row)
//! ...           Repeated for each remaining entry
//! ```
//!
//! An all-zero page is an empty log. Entries are only appended or replaced;
//! there is no removal.

use crate::error::{Result, StorageError};
use crate::page::PageBuf;
use crate::storage::Pager;
use crate::types::{PageId, PAGE_SIZE};

/// Size of the count and length prefixes
const LEN_SIZE: usize = 4;

/// Decoded view of the catalog page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogLog {
    entries: Vec<Vec<u8>>,
}

impl CatalogLog {
    /// Load the log from the catalog page
    pub fn load<P: Pager + ?Sized>(pager: &P) -> Result<Self> {
        let buf = pager.read_page(PageId::CATALOG)?;
        Self::read(&buf)
    }

    /// Read a log from page bytes
    pub fn read(bytes: &[u8]) -> Result<Self> {
        let count = read_u32(bytes, 0)? as usize;
        let mut entries = Vec::with_capacity(count.min(PAGE_SIZE / LEN_SIZE));
        let mut offset = LEN_SIZE;

        for i in 0..count {
            let len = read_u32(bytes, offset)? as usize;
            offset += LEN_SIZE;
            let entry = bytes.get(offset..offset + len).ok_or_else(|| {
                StorageError::corruption(format!(
                    "catalog entry {} of {} bytes at offset {} overruns the page",
                    i, len, offset
                ))
            })?;
            entries.push(entry.to_vec());
            offset += len;
        }

        Ok(Self { entries })
    }

    /// Encode the log into a page buffer
    pub fn write(&self) -> Result<PageBuf> {
        let needed = self.encoded_size();
        if needed > PAGE_SIZE {
            return Err(StorageError::CatalogFull {
                needed,
                available: PAGE_SIZE,
            });
        }

        let mut buf = PageBuf::new();
        buf[0..LEN_SIZE].copy_from_slice(&(self.entries.len() as u32).to_le_bytes());
        let mut offset = LEN_SIZE;
        for entry in &self.entries {
            buf[offset..offset + LEN_SIZE].copy_from_slice(&(entry.len() as u32).to_le_bytes());
            offset += LEN_SIZE;
            buf[offset..offset + entry.len()].copy_from_slice(entry);
            offset += entry.len();
        }

        Ok(buf)
    }

    /// All entries in log order
    pub fn entries(&self) -> &[Vec<u8>] {
        &self.entries
    }

    /// Size in bytes the log occupies on its page
    pub fn encoded_size(&self) -> usize {
        self.entries
            .iter()
            .fold(LEN_SIZE, |acc, e| acc + LEN_SIZE + e.len())
    }

    /// Size the log would occupy after appending an entry of `len` bytes
    pub fn size_after_append(&self, len: usize) -> usize {
        self.encoded_size() + LEN_SIZE + len
    }

    /// Append an entry and persist the page
    ///
    /// Returns the index of the new entry.
    pub fn append<P: Pager + ?Sized>(&mut self, pager: &mut P, entry: Vec<u8>) -> Result<usize> {
        let needed = self.size_after_append(entry.len());
        if needed > PAGE_SIZE {
            return Err(StorageError::CatalogFull {
                needed,
                available: PAGE_SIZE,
            });
        }

        self.entries.push(entry);
        if let Err(e) = self.persist(pager) {
            self.entries.pop();
            return Err(e);
        }
        Ok(self.entries.len() - 1)
    }

    /// Replace an existing entry and persist the page
    ///
    /// Same-length entries overwrite in place; otherwise the entries after
    /// it shift, which rewrites the rest of the log.
    pub fn replace<P: Pager + ?Sized>(
        &mut self,
        pager: &mut P,
        index: usize,
        entry: Vec<u8>,
    ) -> Result<()> {
        let current = self.entries.get(index).ok_or_else(|| {
            StorageError::invalid_operation(format!(
                "catalog entry {} out of bounds (count: {})",
                index,
                self.entries.len()
            ))
        })?;

        let needed = self.encoded_size() - current.len() + entry.len();
        if needed > PAGE_SIZE {
            return Err(StorageError::CatalogFull {
                needed,
                available: PAGE_SIZE,
            });
        }

        let previous = std::mem::replace(&mut self.entries[index], entry);
        if let Err(e) = self.persist(pager) {
            self.entries[index] = previous;
            return Err(e);
        }
        Ok(())
    }

    fn persist<P: Pager + ?Sized>(&self, pager: &mut P) -> Result<()> {
        let buf = self.write()?;
        pager.write_page(PageId::CATALOG, &buf)
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32> {
    let raw = bytes.get(offset..offset + LEN_SIZE).ok_or_else(|| {
        StorageError::corruption(format!("catalog length at offset {} overruns the page", offset))
    })?;
    Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}
