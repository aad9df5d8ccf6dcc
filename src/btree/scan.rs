//! Full-table scan.
//!
//! The scan walks the tree depth first: an internal page visits its
//! left_child and then each separator child; a leaf emits its rows and then
//! follows the `next_leaf` chain. Following the chain from the left-most
//! leaf already covers every later leaf, so a leaf that is reached again
//! through a child pointer after being emitted via the chain is skipped.
//!
//! Any other repeat visit means the page graph has a cycle, and the scan
//! fails with [`StorageError::CycleDetected`] instead of looping.

use crate::btree::tree::read_node;
use crate::error::{Result, StorageError};
use crate::page::{LeafPage, Page};
use crate::storage::Pager;
use crate::types::PageId;
use std::collections::HashMap;

/// How a page was first reached during a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reached {
    /// Through a root or child pointer
    Child,
    /// Through a `next_leaf` link
    Chain,
}

/// Collect every encoded row of the tree rooted at `root`
pub fn scan_all<P: Pager + ?Sized>(pager: &P, root: PageId) -> Result<Vec<Vec<u8>>> {
    let mut scan = Scan {
        pager,
        visited: HashMap::new(),
        rows: Vec::new(),
    };
    scan.visit_child(root)?;

    tracing::trace!(
        root = root.value(),
        pages = scan.visited.len(),
        rows = scan.rows.len(),
        "scan finished"
    );

    Ok(scan.rows)
}

struct Scan<'a, P: Pager + ?Sized> {
    pager: &'a P,
    visited: HashMap<PageId, Reached>,
    rows: Vec<Vec<u8>>,
}

impl<P: Pager + ?Sized> Scan<'_, P> {
    fn visit_child(&mut self, page_id: PageId) -> Result<()> {
        match self.visited.insert(page_id, Reached::Child) {
            None => {}
            Some(Reached::Chain) => return Ok(()),
            Some(Reached::Child) => return Err(StorageError::CycleDetected(page_id)),
        }

        match read_node(self.pager, page_id)? {
            Page::Leaf(leaf) => self.follow_chain(leaf),
            Page::Internal(node) => {
                self.visit_child(node.left_child)?;
                for cell in node.cells {
                    self.visit_child(cell.child)?;
                }
                Ok(())
            }
        }
    }

    fn follow_chain(&mut self, mut leaf: LeafPage) -> Result<()> {
        loop {
            let next = leaf.next_leaf;
            self.rows.append(&mut leaf.cells);

            if !next.is_some() {
                return Ok(());
            }
            if self.visited.insert(next, Reached::Chain).is_some() {
                return Err(StorageError::CycleDetected(next));
            }

            leaf = match read_node(self.pager, next)? {
                Page::Leaf(leaf) => leaf,
                Page::Internal(_) => {
                    return Err(StorageError::corruption(format!(
                        "leaf chain links to internal page {}",
                        next
                    )))
                }
            };
        }
    }
}
