//! Table registry backed by the catalog page.
//!
//! Each table is one catalog row `(name, "|"-joined columns, root page)`
//! in the append log on page 1. The registry is an owned map rebuilt from
//! that log on open and kept in sync whenever a table's root changes.

use crate::error::{Result, StorageError};
use crate::page::LeafPage;
use crate::record::{decode_row, encode_row};
use crate::storage::{CatalogLog, Pager};
use crate::types::{PageId, PAGE_SIZE};
use std::collections::BTreeMap;

/// Separator between column names inside a catalog row
const COLUMN_SEPARATOR: char = '|';

/// Decimal digits in the widest root page number
const ROOT_DIGITS: usize = 10;

fn root_digits(page_id: PageId) -> usize {
    page_id.value().to_string().len()
}

/// Metadata for one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    /// Table name
    pub name: String,
    /// Column names in declaration order
    pub columns: Vec<String>,
    /// Current root page of the table's B+Tree
    pub root_page: PageId,
    /// Index of this table's entry in the catalog log
    slot: usize,
}

impl TableInfo {
    fn to_row(&self) -> Vec<u8> {
        let columns = self.columns.join(&COLUMN_SEPARATOR.to_string());
        let root = self.root_page.value().to_string();
        encode_row(&[self.name.as_str(), columns.as_str(), root.as_str()])
    }

    fn from_row(bytes: &[u8], slot: usize) -> Option<Self> {
        let fields = decode_row(bytes).ok()?;
        let [name, columns, root] = <[String; 3]>::try_from(fields).ok()?;
        let root_page = root.parse::<u32>().ok().map(PageId::new)?;

        Some(Self {
            name,
            columns: columns.split(COLUMN_SEPARATOR).map(str::to_string).collect(),
            root_page,
            slot,
        })
    }
}

/// Owned registry mapping table names to their metadata
#[derive(Debug, Default)]
pub struct Catalog {
    tables: BTreeMap<String, TableInfo>,
    log: CatalogLog,
}

impl Catalog {
    /// Rebuild the registry from the catalog page
    ///
    /// Entries that do not decode to exactly three fields with a numeric
    /// root page are skipped. A later entry for a name replaces an earlier one.
    pub fn load<P: Pager + ?Sized>(pager: &P) -> Result<Self> {
        let log = CatalogLog::load(pager)?;
        let mut tables = BTreeMap::new();

        for (slot, entry) in log.entries().iter().enumerate() {
            match TableInfo::from_row(entry, slot) {
                Some(info) => {
                    tables.insert(info.name.clone(), info);
                }
                None => {
                    tracing::warn!(slot, len = entry.len(), "skipping malformed catalog entry");
                }
            }
        }

        tracing::debug!(tables = tables.len(), "loaded catalog");

        Ok(Self { tables, log })
    }

    /// Create a table with an empty leaf as its root
    ///
    /// The catalog must have room for every table's root, the new one
    /// included, to grow to its widest decimal form; otherwise this fails
    /// with [`StorageError::CatalogFull`]. Later root updates then always fit.
    ///
    /// Returns the root page of the new table.
    pub fn create_table<P, S>(&mut self, pager: &mut P, name: &str, columns: &[S]) -> Result<PageId>
    where
        P: Pager + ?Sized,
        S: AsRef<str>,
    {
        if self.tables.contains_key(name) {
            return Err(StorageError::TableAlreadyExists(name.to_string()));
        }
        let columns: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
        if let Some(bad) = columns.iter().find(|c| c.contains(COLUMN_SEPARATOR)) {
            return Err(StorageError::invalid_operation(format!(
                "column name {:?} contains '{}'",
                bad, COLUMN_SEPARATOR
            )));
        }

        let mut info = TableInfo {
            name: name.to_string(),
            columns,
            root_page: PageId::new(u32::MAX),
            slot: 0,
        };
        let needed = self.log.size_after_append(info.to_row().len()) + self.root_slack();
        if needed > PAGE_SIZE {
            return Err(StorageError::CatalogFull {
                needed,
                available: PAGE_SIZE,
            });
        }

        let root_page = pager.allocate_page();
        pager.write_page(root_page, &LeafPage::new().encode()?)?;
        info.root_page = root_page;
        info.slot = self.log.append(pager, info.to_row())?;

        tracing::info!(table = name, root = root_page.value(), "created table");

        self.tables.insert(info.name.clone(), info);
        Ok(root_page)
    }

    /// Persist a new root page for a table
    pub fn set_root<P: Pager + ?Sized>(
        &mut self,
        pager: &mut P,
        name: &str,
        root_page: PageId,
    ) -> Result<()> {
        let info = self
            .tables
            .get_mut(name)
            .ok_or_else(|| StorageError::TableNotFound(name.to_string()))?;
        if info.root_page == root_page {
            return Ok(());
        }

        let previous = info.root_page;
        info.root_page = root_page;
        if let Err(e) = self.log.replace(pager, info.slot, info.to_row()) {
            info.root_page = previous;
            return Err(e);
        }

        tracing::debug!(
            table = name,
            old_root = previous.value(),
            new_root = root_page.value(),
            "persisted new root"
        );
        Ok(())
    }

    /// Catalog bytes the registered roots may still grow by
    fn root_slack(&self) -> usize {
        self.tables
            .values()
            .map(|t| ROOT_DIGITS.saturating_sub(root_digits(t.root_page)))
            .sum()
    }

    /// Look up a table by name
    pub fn get(&self, name: &str) -> Result<&TableInfo> {
        self.tables
            .get(name)
            .ok_or_else(|| StorageError::TableNotFound(name.to_string()))
    }

    /// All tables, ordered by name
    pub fn tables(&self) -> impl Iterator<Item = &TableInfo> {
        self.tables.values()
    }

    /// Number of registered tables
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Check if no tables are registered
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
