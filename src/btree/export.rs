//! Tree structure export for debugging and visualization.

use crate::btree::tree::read_node;
use crate::error::{Result, StorageError};
use crate::page::Page;
use crate::record;
use crate::storage::Pager;
use crate::types::PageId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Node type for visualization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// Page ID
    pub page_id: u32,
    /// Whether this is a leaf node
    pub is_leaf: bool,
    /// Row keys (leaf) or separator keys (internal)
    pub keys: Vec<String>,
    /// Next leaf in the chain (leaf nodes only, 0 if none)
    pub next_leaf: u32,
    /// Child nodes, left_child first (internal nodes only)
    pub children: Vec<TreeNode>,
}

/// Export the structure of the tree rooted at `root`
///
/// Only child pointers are followed. A page reached twice fails with
/// [`StorageError::CycleDetected`].
pub fn export_tree<P: Pager + ?Sized>(pager: &P, root: PageId) -> Result<TreeNode> {
    let mut visited = HashSet::new();
    export_node(pager, root, &mut visited)
}

/// Height of the tree rooted at `root`, following left-most children
pub fn tree_height<P: Pager + ?Sized>(pager: &P, root: PageId) -> Result<usize> {
    let mut visited = HashSet::new();
    let mut page_id = root;
    loop {
        if !visited.insert(page_id) {
            return Err(StorageError::CycleDetected(page_id));
        }
        match read_node(pager, page_id)? {
            Page::Leaf(_) => return Ok(visited.len()),
            Page::Internal(node) => page_id = node.left_child,
        }
    }
}

fn export_node<P: Pager + ?Sized>(
    pager: &P,
    page_id: PageId,
    visited: &mut HashSet<PageId>,
) -> Result<TreeNode> {
    if !visited.insert(page_id) {
        return Err(StorageError::CycleDetected(page_id));
    }

    match read_node(pager, page_id)? {
        Page::Leaf(leaf) => {
            let keys = leaf
                .cells
                .iter()
                .map(|cell| record::row_key(cell))
                .collect::<Result<Vec<_>>>()?;

            Ok(TreeNode {
                page_id: page_id.value(),
                is_leaf: true,
                keys,
                next_leaf: leaf.next_leaf.value(),
                children: Vec::new(),
            })
        }
        Page::Internal(node) => {
            let mut children = Vec::with_capacity(node.cells.len() + 1);
            children.push(export_node(pager, node.left_child, visited)?);
            for cell in &node.cells {
                children.push(export_node(pager, cell.child, visited)?);
            }

            Ok(TreeNode {
                page_id: page_id.value(),
                is_leaf: false,
                keys: node.cells.into_iter().map(|c| c.key).collect(),
                next_leaf: 0,
                children,
            })
        }
    }
}
