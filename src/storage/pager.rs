//! Pager implementation.
//!
//! The pager is responsible for reading and writing pages to the database
//! file. It abstracts the file I/O operations behind a trait so that the
//! tree algorithms only see read/write/allocate.

use crate::error::{Result, StorageError};
use crate::page::PageBuf;
use crate::types::{PageId, PAGE_SIZE};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Trait for page I/O operations
pub trait Pager {
    /// Read a page from disk
    fn read_page(&self, page_id: PageId) -> Result<PageBuf>;

    /// Write a page to disk
    fn write_page(&mut self, page_id: PageId, data: &[u8]) -> Result<()>;

    /// Allocate a new page number
    fn allocate_page(&mut self) -> PageId;

    /// Number of pages issued or present in the file
    fn page_count(&self) -> u32;
}

/// File-based pager implementation
///
/// Pages are 1-indexed: page `n` lives at byte offset `(n - 1) * PAGE_SIZE`.
/// Page numbers are never reused.
#[derive(Debug)]
pub struct FilePager {
    /// The database file
    file: File,
    /// Next page number the allocator hands out
    next_page: u32,
    /// Whether to sync after each write
    sync_on_write: bool,
}

impl FilePager {
    /// Open or create a database file
    pub fn open(path: &Path, sync_on_write: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let size = file.metadata()?.len();
        let mut page_count = size.div_ceil(PAGE_SIZE as u64) as u32;

        if page_count == 0 {
            // New database: page 1 is an empty catalog
            let mut file_ref = &file;
            file_ref.seek(SeekFrom::Start(0))?;
            file_ref.write_all(&[0u8; PAGE_SIZE])?;
            file_ref.sync_all()?;
            page_count = 1;
        }

        tracing::info!(path = %path.display(), page_count, "opened database file");

        Ok(Self {
            file,
            next_page: page_count + 1,
            sync_on_write,
        })
    }

    /// Flush everything and release the file handle
    pub fn close(self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

impl Pager for FilePager {
    fn read_page(&self, page_id: PageId) -> Result<PageBuf> {
        let offset = page_id
            .file_offset(PAGE_SIZE)
            .ok_or(StorageError::InvalidPageNumber(page_id))?;

        let mut buf = PageBuf::new();
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)?;

        Ok(buf)
    }

    fn write_page(&mut self, page_id: PageId, data: &[u8]) -> Result<()> {
        let offset = page_id
            .file_offset(PAGE_SIZE)
            .ok_or(StorageError::InvalidPageNumber(page_id))?;

        if data.len() != PAGE_SIZE {
            return Err(StorageError::SizeMismatch {
                expected: PAGE_SIZE,
                actual: data.len(),
            });
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;

        if self.sync_on_write {
            self.file.sync_data()?;
        }

        // Writing past the allocator (e.g. an explicit slot) keeps numbers unique
        if page_id.value() >= self.next_page {
            self.next_page = page_id.value() + 1;
        }

        Ok(())
    }

    fn allocate_page(&mut self) -> PageId {
        if self.next_page < PageId::FIRST_DATA.value() {
            self.next_page = PageId::FIRST_DATA.value();
        }
        let page_id = PageId::new(self.next_page);
        self.next_page += 1;
        page_id
    }

    fn page_count(&self) -> u32 {
        self.next_page - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_new_database() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut pager = FilePager::open(&path, false)?;
        assert_eq!(pager.page_count(), 1);
        assert_eq!(std::fs::metadata(&path)?.len(), PAGE_SIZE as u64);
        assert!(pager.read_page(PageId::CATALOG)?.is_zeroed());
        assert_eq!(pager.allocate_page(), PageId::new(2));

        Ok(())
    }

    #[test]
    fn test_allocate_and_write_page() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut pager = FilePager::open(&path, true)?;

        let page_id = pager.allocate_page();
        assert_eq!(page_id, PageId::new(2));

        let mut data = vec![0u8; PAGE_SIZE];
        data[0..5].copy_from_slice(b"hello");
        pager.write_page(page_id, &data)?;

        let read_data = pager.read_page(page_id)?;
        assert_eq!(&read_data[0..5], b"hello");

        Ok(())
    }

    #[test]
    fn test_allocation_is_monotonic() -> Result<()> {
        let dir = tempdir().unwrap();
        let mut pager = FilePager::open(&dir.path().join("test.db"), false)?;

        let ids: Vec<PageId> = (0..5).map(|_| pager.allocate_page()).collect();
        assert_eq!(ids, (2..7).map(PageId::new).collect::<Vec<_>>());

        Ok(())
    }

    #[test]
    fn test_reopen_database() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut pager = FilePager::open(&path, true)?;
            let page_id = pager.allocate_page();
            let mut data = vec![0u8; PAGE_SIZE];
            data[0..4].copy_from_slice(b"test");
            pager.write_page(page_id, &data)?;
            pager.close()?;
        }

        {
            let mut pager = FilePager::open(&path, false)?;
            assert_eq!(pager.page_count(), 2);

            let read_data = pager.read_page(PageId::new(2))?;
            assert_eq!(&read_data[0..4], b"test");
            assert_eq!(pager.allocate_page(), PageId::new(3));
        }

        Ok(())
    }

    #[test]
    fn test_partial_trailing_page_rounds_up() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        std::fs::write(&path, vec![0u8; PAGE_SIZE + 10])?;

        let mut pager = FilePager::open(&path, false)?;
        assert_eq!(pager.page_count(), 2);
        assert_eq!(pager.allocate_page(), PageId::new(3));

        // The partial page cannot be read back whole
        assert!(matches!(
            pager.read_page(PageId::new(2)),
            Err(StorageError::Io(_))
        ));

        Ok(())
    }

    #[test]
    fn test_invalid_requests() -> Result<()> {
        let dir = tempdir().unwrap();
        let mut pager = FilePager::open(&dir.path().join("test.db"), false)?;

        assert!(matches!(
            pager.read_page(PageId::NONE),
            Err(StorageError::InvalidPageNumber(_))
        ));
        assert!(matches!(
            pager.write_page(PageId::new(2), &[0u8; 10]),
            Err(StorageError::SizeMismatch { expected: PAGE_SIZE, actual: 10 })
        ));

        // Allocated but never written
        let page_id = pager.allocate_page();
        assert!(matches!(pager.read_page(page_id), Err(StorageError::Io(_))));

        Ok(())
    }
}
