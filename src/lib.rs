//! # B+Tree Row Store
//!
//! A minimal disk-backed relational storage engine: a fixed-page file
//! manager plus one B+Tree per table, keyed by the first column of each row.
//!
//! ## Architecture
//!
//! - **Record Codec** (`record`): length-prefixed rows of text fields
//! - **Page Layer** (`page`): slotted 4KB leaf and internal pages
//! - **Storage Layer** (`storage`): 1-indexed page file and the catalog log
//! - **B+Tree Layer** (`btree`): insert, search, delete and full scans
//! - **Catalog** (`catalog`): table registry persisted on page 1
//!
//! ## Usage
//!
//! ```rust,ignore
//! use btree_rowstore::{Config, Db};
//!
//! let mut db = Db::open(Config::new("my_database.db"))?;
//! db.create_table("users", &["id", "name"])?;
//!
//! db.insert_fields("users", &["1", "alice"])?;
//! let row = db.search("users", "1")?;
//!
//! db.delete("users", "1")?;
//! for row in db.scan("users")? {
//!     println!("{:?}", row);
//! }
//! ```
//!
//! Keys compare byte-wise, so `"10"` sorts before `"9"`. Deletes never
//! merge or rebalance pages, and freed pages are never reused.

pub mod btree;
pub mod catalog;
pub mod error;
pub mod page;
pub mod record;
pub mod storage;
pub mod types;

pub use error::{Result, StorageError};
pub use types::{PageId, PAGE_SIZE};

pub use btree::TreeNode;
pub use catalog::{Catalog, TableInfo};
pub use record::{decode_row, encode_row, Row};
pub use storage::{FilePager, Pager};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Database configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the database file
    pub path: PathBuf,
    /// Whether every page write is synced before returning (default: true)
    pub sync_on_write: bool,
}

impl Config {
    /// Create a new configuration with default settings
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            sync_on_write: true,
        }
    }

    /// Enable or disable syncing after each page write
    pub fn sync_on_write(mut self, enabled: bool) -> Self {
        self.sync_on_write = enabled;
        self
    }
}

/// Main database handle
///
/// Owns the page file and the table registry, and keeps each table's root
/// page in the catalog in step with its tree.
pub struct Db {
    pager: FilePager,
    catalog: Catalog,
}

impl Db {
    /// Open or create a database at the given path
    pub fn open(config: Config) -> Result<Self> {
        let pager = FilePager::open(&config.path, config.sync_on_write)?;
        let catalog = Catalog::load(&pager)?;
        Ok(Self { pager, catalog })
    }

    /// Create a table; returns its root page
    pub fn create_table<S: AsRef<str>>(&mut self, name: &str, columns: &[S]) -> Result<PageId> {
        self.catalog.create_table(&mut self.pager, name, columns)
    }

    /// Look up a table's metadata
    pub fn table(&self, name: &str) -> Result<&TableInfo> {
        self.catalog.get(name)
    }

    /// All tables, ordered by name
    pub fn tables(&self) -> impl Iterator<Item = &TableInfo> {
        self.catalog.tables()
    }

    /// Insert an encoded row; returns the table's root page afterwards
    ///
    /// A grown root is recorded in the catalog before returning. Room for
    /// that update was reserved when the table was created.
    pub fn insert(&mut self, table: &str, row: &[u8]) -> Result<PageId> {
        let root = self.catalog.get(table)?.root_page;
        let new_root = btree::insert_row(&mut self.pager, root, row)?;
        if new_root != root {
            self.catalog.set_root(&mut self.pager, table, new_root)?;
        }
        Ok(new_root)
    }

    /// Encode and insert a list of fields
    pub fn insert_fields<S: AsRef<str>>(&mut self, table: &str, fields: &[S]) -> Result<PageId> {
        self.insert(table, &encode_row(fields))
    }

    /// Find the row whose first column equals `key`
    pub fn search(&self, table: &str, key: &str) -> Result<Row> {
        let root = self.catalog.get(table)?.root_page;
        let row = btree::search_row(&self.pager, root, key)?;
        decode_row(&row)
    }

    /// Delete the row whose first column equals `key`
    pub fn delete(&mut self, table: &str, key: &str) -> Result<PageId> {
        let root = self.catalog.get(table)?.root_page;
        let new_root = btree::delete_row(&mut self.pager, root, key)?;
        if new_root != root {
            self.catalog.set_root(&mut self.pager, table, new_root)?;
        }
        Ok(new_root)
    }

    /// All rows of a table in key order
    pub fn scan(&self, table: &str) -> Result<Vec<Row>> {
        let root = self.catalog.get(table)?.root_page;
        btree::scan_all(&self.pager, root)?
            .iter()
            .map(|row| decode_row(row))
            .collect()
    }

    /// Export a table's tree structure for visualization
    pub fn export_tree(&self, table: &str) -> Result<TreeNode> {
        let root = self.catalog.get(table)?.root_page;
        btree::export_tree(&self.pager, root)
    }

    /// Export a table's tree structure as JSON
    pub fn export_tree_json(&self, table: &str) -> Result<String> {
        let tree = self.export_tree(table)?;
        serde_json::to_string_pretty(&tree)
            .map_err(|e| StorageError::invalid_operation(format!("tree export failed: {}", e)))
    }

    /// Get statistics about the database
    pub fn stats(&self) -> Result<DbStats> {
        let tables = self
            .catalog
            .tables()
            .map(|info| -> Result<TableStats> {
                Ok(TableStats {
                    name: info.name.clone(),
                    root_page: info.root_page.value(),
                    tree_height: btree::tree_height(&self.pager, info.root_page)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DbStats {
            page_count: self.pager.page_count(),
            tables,
        })
    }

    /// Flush and close the database file
    pub fn close(self) -> Result<()> {
        self.pager.close()
    }
}

/// Database statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbStats {
    /// Total number of pages in the database, catalog included
    pub page_count: u32,
    /// Per-table tree information
    pub tables: Vec<TableStats>,
}

/// Statistics for one table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStats {
    pub name: String,
    pub root_page: u32,
    pub tree_height: usize,
}
