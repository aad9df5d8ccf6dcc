//! B+Tree implementation.
//!
//! This module provides a disk-based B+Tree that supports:
//! - Point lookups (search_row)
//! - Insertions with page splits and root growth (insert_row)
//! - Deletions, leaf-only without rebalancing (delete_row)
//! - Full scans guarded against page cycles (scan_all)
//!
//! Keys are compared byte-wise, so `"10"` sorts before `"9"`.

mod export;
mod scan;
mod tree;

pub use export::{export_tree, tree_height, TreeNode};
pub use scan::scan_all;
pub use tree::{delete_row, insert_row, search_row};
