//! Storage layer: disk I/O and page management.
//!
//! This module provides the pager abstraction for reading, writing and
//! allocating pages, and the append-log format of the catalog page.

mod catalog_log;
mod pager;

pub use catalog_log::CatalogLog;
pub use pager::{FilePager, Pager};
