//! B+Tree core implementation.
//!
//! Every operation is a plain function over a [`Pager`] and a root page
//! number. Pages are decoded on each visit and written back whole; nothing
//! is cached between calls.
//!
//! - insert_row: sorted insert with leaf/internal splits and root growth
//! - search_row: point lookup
//! - delete_row: leaf-only removal (no merging or rebalancing)

use crate::error::{Result, StorageError};
use crate::page::{InternalCell, InternalPage, LeafPage, Page, CELL_POINTER_SIZE, HEADER_SIZE};
use crate::record;
use crate::storage::Pager;
use crate::types::{PageId, PAGE_SIZE};

/// Result of inserting below a page
#[derive(Debug)]
enum InsertOutcome {
    /// The page absorbed the row; nothing changes above it
    Done,
    /// The page split; the parent needs these separators, in key order
    Split(Vec<InternalCell>),
}

/// Bytes available to cells and their offsets on one page
const CELL_SPACE: usize = PAGE_SIZE - HEADER_SIZE;

/// Read and decode a page
pub(crate) fn read_node<P: Pager + ?Sized>(pager: &P, page_id: PageId) -> Result<Page> {
    let buf = pager.read_page(page_id)?;
    Page::decode(&buf)
}

/// Insert an encoded row into the tree rooted at `root`
///
/// Returns the root page after the insert. It differs from `root` only when
/// the root itself split and a new root was allocated above it.
pub fn insert_row<P: Pager + ?Sized>(pager: &mut P, root: PageId, row: &[u8]) -> Result<PageId> {
    let key = record::row_key(row)?;
    if key.as_bytes().contains(&0) {
        return Err(StorageError::InvalidKey(format!(
            "{:?} contains a NUL byte",
            key
        )));
    }

    // A row that cannot fit an empty leaf can never be split into place
    check_fits(HEADER_SIZE + CELL_POINTER_SIZE + row.len())?;

    let mut path = Vec::new();
    match insert_recursive(pager, root, &key, row, &mut path)? {
        InsertOutcome::Done => Ok(root),
        InsertOutcome::Split(separators) => grow_root(pager, root, separators),
    }
}

/// Look up the encoded row whose key equals `key`
pub fn search_row<P: Pager + ?Sized>(pager: &P, root: PageId, key: &str) -> Result<Vec<u8>> {
    let mut path = Vec::new();
    let mut page_id = root;

    loop {
        enter(&mut path, page_id)?;
        match read_node(pager, page_id)? {
            Page::Leaf(mut leaf) => {
                return match leaf.find(key)? {
                    Some(idx) => Ok(leaf.cells.swap_remove(idx)),
                    None => Err(StorageError::KeyNotFound(key.to_string())),
                };
            }
            Page::Internal(node) => {
                let child = node.find_child(key);
                tracing::trace!(page = page_id.value(), child = child.value(), "descending");
                page_id = child;
            }
        }
    }
}

/// Delete the row whose key equals `key`
///
/// Only the leaf holding the row is rewritten. Pages are never merged,
/// rebalanced or freed, so the returned root is always `root`.
pub fn delete_row<P: Pager + ?Sized>(pager: &mut P, root: PageId, key: &str) -> Result<PageId> {
    let mut path = Vec::new();
    delete_recursive(pager, root, key, &mut path)?;
    Ok(root)
}

/// Record a page on the current descent path, failing on a repeat
fn enter(path: &mut Vec<PageId>, page_id: PageId) -> Result<()> {
    if path.contains(&page_id) {
        return Err(StorageError::CycleDetected(page_id));
    }
    path.push(page_id);
    Ok(())
}

/// Recursive insert
fn insert_recursive<P: Pager + ?Sized>(
    pager: &mut P,
    page_id: PageId,
    key: &str,
    row: &[u8],
    path: &mut Vec<PageId>,
) -> Result<InsertOutcome> {
    enter(path, page_id)?;

    match read_node(pager, page_id)? {
        Page::Leaf(mut leaf) => {
            leaf.insert_sorted(key, row.to_vec())?;
            store_leaf(pager, page_id, leaf)
        }
        Page::Internal(mut node) => {
            let child = node.find_child(key);
            tracing::trace!(page = page_id.value(), child = child.value(), "descending");

            match insert_recursive(pager, child, key, row, path)? {
                InsertOutcome::Done => Ok(InsertOutcome::Done),
                InsertOutcome::Split(separators) => {
                    for cell in separators {
                        node.insert_separator(cell);
                    }
                    store_internal(pager, page_id, node)
                }
            }
        }
    }
}

/// Write a leaf back, splitting it when it no longer fits one page
fn store_leaf<P: Pager + ?Sized>(
    pager: &mut P,
    page_id: PageId,
    leaf: LeafPage,
) -> Result<InsertOutcome> {
    if leaf.encoded_size() > PAGE_SIZE {
        return split_leaf(pager, page_id, leaf);
    }
    pager.write_page(page_id, &leaf.encode()?)?;
    Ok(InsertOutcome::Done)
}

/// Write an internal page back, splitting it when it no longer fits one page
///
/// A separator is always shorter than the row it was taken from, so any
/// single separator fits an empty internal page and the split never fails
/// for lack of room.
fn store_internal<P: Pager + ?Sized>(
    pager: &mut P,
    page_id: PageId,
    node: InternalPage,
) -> Result<InsertOutcome> {
    if node.encoded_size() > PAGE_SIZE {
        return split_internal(pager, page_id, node);
    }
    pager.write_page(page_id, &node.encode()?)?;
    Ok(InsertOutcome::Done)
}

/// Indexes where an overfull page is cut
///
/// Each index starts a new page. With `promote` the cell at each index moves
/// up to the parent and lands in neither page. One cut nearest the middle is
/// preferred; when no single cut leaves both sides within a page, cells are
/// packed left to right into as many pages as they need.
fn split_points(sizes: &[usize], promote: bool) -> Vec<usize> {
    let mut prefix = Vec::with_capacity(sizes.len() + 1);
    prefix.push(0);
    for (i, size) in sizes.iter().enumerate() {
        prefix.push(prefix[i] + size + CELL_POINTER_SIZE);
    }
    let span = |from: usize, to: usize| prefix[to] - prefix[from];

    let n = sizes.len();
    let skip = usize::from(promote);
    let mid = n / 2;

    let mut candidates: Vec<usize> = (1 - skip..n).collect();
    candidates.sort_by_key(|&cut| cut.abs_diff(mid));
    if let Some(cut) = candidates
        .into_iter()
        .find(|&cut| span(0, cut) <= CELL_SPACE && span(cut + skip, n) <= CELL_SPACE)
    {
        return vec![cut];
    }

    let mut cuts = Vec::new();
    let mut start = 0;
    for i in 0..n {
        if span(start, i + 1) > CELL_SPACE {
            cuts.push(i);
            start = i + skip;
        }
    }
    cuts
}

/// Fail with `PageOverflow` if a page of `needed` bytes cannot be written
fn check_fits(needed: usize) -> Result<()> {
    if needed > PAGE_SIZE {
        return Err(StorageError::PageOverflow {
            needed,
            available: PAGE_SIZE,
        });
    }
    Ok(())
}

/// Split an overfull leaf
///
/// The first part stays at `page_id` and every later part gets a new page.
/// Parts are chained in order, and the last one takes over the original
/// `next_leaf` link.
fn split_leaf<P: Pager + ?Sized>(
    pager: &mut P,
    page_id: PageId,
    leaf: LeafPage,
) -> Result<InsertOutcome> {
    let sizes: Vec<usize> = leaf.cells.iter().map(Vec::len).collect();
    let cuts = split_points(&sizes, false);

    let LeafPage {
        mut cells,
        next_leaf,
    } = leaf;
    let mut pages = Vec::with_capacity(cuts.len() + 1);
    for &cut in cuts.iter().rev() {
        pages.push(LeafPage {
            cells: cells.split_off(cut),
            next_leaf: PageId::NONE,
        });
    }
    pages.push(LeafPage {
        cells,
        next_leaf: PageId::NONE,
    });
    pages.reverse();

    let keys = pages[1..]
        .iter()
        .map(|page| page.key_at(0))
        .collect::<Result<Vec<_>>>()?;
    for page in &pages {
        check_fits(page.encoded_size())?;
    }

    let mut ids = vec![page_id];
    ids.extend((1..pages.len()).map(|_| pager.allocate_page()));
    for (i, page) in pages.iter_mut().enumerate() {
        page.next_leaf = ids.get(i + 1).copied().unwrap_or(next_leaf);
    }
    let bufs = pages
        .iter()
        .map(LeafPage::encode)
        .collect::<Result<Vec<_>>>()?;

    // Right to left, so the chain never points at an unwritten page
    for (id, buf) in ids.iter().zip(&bufs).rev() {
        pager.write_page(*id, buf)?;
    }

    tracing::debug!(
        left = page_id.value(),
        parts = pages.len(),
        cells = ?pages.iter().map(|p| p.cells.len()).collect::<Vec<_>>(),
        "split leaf page"
    );

    Ok(InsertOutcome::Split(
        keys.into_iter()
            .zip(&ids[1..])
            .map(|(key, &child)| InternalCell::new(key, child))
            .collect(),
    ))
}

/// Split an overfull internal page around its promoted separators
///
/// When splitting [k1, k2, k3, k4, k5] at index 2:
/// - Left page keeps [k1, k2] and its left_child
/// - k3 moves up to the parent and is in neither half
/// - Right page gets [k4, k5], with left_child = k3.child
fn split_internal<P: Pager + ?Sized>(
    pager: &mut P,
    page_id: PageId,
    node: InternalPage,
) -> Result<InsertOutcome> {
    let sizes: Vec<usize> = node.cells.iter().map(InternalCell::encoded_size).collect();
    let cuts = split_points(&sizes, true);

    let InternalPage {
        left_child,
        mut cells,
    } = node;
    let mut pages = Vec::with_capacity(cuts.len() + 1);
    let mut promoted = Vec::with_capacity(cuts.len());
    for &cut in cuts.iter().rev() {
        let mut upper = cells.split_off(cut).into_iter();
        let separator = upper.next().ok_or_else(|| {
            StorageError::corruption(format!("internal page {} split past its last cell", page_id))
        })?;
        pages.push(InternalPage {
            left_child: separator.child,
            cells: upper.collect(),
        });
        promoted.push(separator.key);
    }
    pages.push(InternalPage { left_child, cells });
    pages.reverse();
    promoted.reverse();

    for page in &pages {
        check_fits(page.encoded_size())?;
    }
    let bufs = pages
        .iter()
        .map(InternalPage::encode)
        .collect::<Result<Vec<_>>>()?;

    let mut ids = vec![page_id];
    ids.extend((1..pages.len()).map(|_| pager.allocate_page()));
    for (id, buf) in ids.iter().zip(&bufs).rev() {
        pager.write_page(*id, buf)?;
    }

    tracing::debug!(
        left = page_id.value(),
        parts = pages.len(),
        separators = ?promoted,
        "split internal page"
    );

    Ok(InsertOutcome::Split(
        promoted
            .into_iter()
            .zip(&ids[1..])
            .map(|(key, &child)| InternalCell::new(key, child))
            .collect(),
    ))
}

/// Allocate new roots above a root that split
///
/// The old root keeps every key below the first separator. A new root that
/// cannot hold every separator splits in turn and grows another level.
fn grow_root<P: Pager + ?Sized>(
    pager: &mut P,
    old_root: PageId,
    separators: Vec<InternalCell>,
) -> Result<PageId> {
    let mut root = InternalPage {
        left_child: old_root,
        cells: separators,
    };

    loop {
        let new_root = pager.allocate_page();
        tracing::debug!(
            old_root = root.left_child.value(),
            new_root = new_root.value(),
            "tree grew a new root"
        );

        match store_internal(pager, new_root, root)? {
            InsertOutcome::Done => return Ok(new_root),
            InsertOutcome::Split(separators) => {
                root = InternalPage {
                    left_child: new_root,
                    cells: separators,
                };
            }
        }
    }
}

/// Recursive delete
fn delete_recursive<P: Pager + ?Sized>(
    pager: &mut P,
    page_id: PageId,
    key: &str,
    path: &mut Vec<PageId>,
) -> Result<()> {
    enter(path, page_id)?;

    match read_node(pager, page_id)? {
        Page::Leaf(mut leaf) => {
            let idx = leaf
                .find(key)?
                .ok_or_else(|| StorageError::KeyNotFound(key.to_string()))?;
            leaf.cells.remove(idx);
            let buf = leaf.encode()?;
            pager.write_page(page_id, &buf)
        }
        Page::Internal(node) => {
            // Note: underfull leaves are left in place; the tree never shrinks.
            let child = node.find_child(key);
            delete_recursive(pager, child, key, path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::{export_tree, scan_all, tree_height, TreeNode};
    use crate::record::{decode_row, encode_row};
    use crate::storage::FilePager;
    use rand::seq::SliceRandom;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn create_test_tree() -> Result<(FilePager, PageId, tempfile::TempDir)> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let mut pager = FilePager::open(&path, false)?;
        let root = pager.allocate_page();
        pager.write_page(root, &LeafPage::new().encode()?)?;
        Ok((pager, root, dir))
    }

    fn insert(pager: &mut FilePager, root: PageId, fields: &[&str]) -> Result<PageId> {
        insert_row(pager, root, &encode_row(fields))
    }

    /// Walk the exported tree and check key ordering on every page
    fn assert_sorted(node: &TreeNode) {
        assert!(
            node.keys.windows(2).all(|w| w[0] < w[1]),
            "page {} keys out of order: {:?}",
            node.page_id,
            node.keys
        );
        for child in &node.children {
            assert_sorted(child);
        }
    }

    fn height(node: &TreeNode) -> usize {
        1 + node.children.first().map_or(0, height)
    }

    #[test]
    fn test_single_insert_and_search() -> Result<()> {
        let (mut pager, root, _dir) = create_test_tree()?;

        let root2 = insert(&mut pager, root, &["hello", "world"])?;
        assert_eq!(root2, root);

        let row = search_row(&pager, root, "hello")?;
        assert_eq!(decode_row(&row)?, ["hello", "world"]);
        assert!(matches!(
            search_row(&pager, root, "other"),
            Err(StorageError::KeyNotFound(_))
        ));

        Ok(())
    }

    #[test]
    fn test_leaf_split_grows_root() -> Result<()> {
        let (mut pager, mut root, _dir) = create_test_tree()?;
        let original_root = root;

        for i in 0..400 {
            root = insert(&mut pager, root, &[&format!("{:04}", i), "some value"])?;
        }
        assert_ne!(root, original_root);

        match read_node(&pager, root)? {
            Page::Internal(node) => assert_eq!(node.left_child, original_root),
            Page::Leaf(_) => panic!("root should be internal after a split"),
        }

        for i in 0..400 {
            let row = search_row(&pager, root, &format!("{:04}", i))?;
            assert_eq!(decode_row(&row)?[0], format!("{:04}", i));
        }

        Ok(())
    }

    #[test]
    fn test_many_inserts_scan_completeness() -> Result<()> {
        let (mut pager, mut root, _dir) = create_test_tree()?;

        for i in 0..4000 {
            root = insert(&mut pager, root, &[&i.to_string(), &format!("user{}", i)])?;
        }

        let rows = scan_all(&pager, root)?;
        assert_eq!(rows.len(), 4000);

        let keys: HashSet<String> = rows
            .iter()
            .map(|r| record::row_key(r).unwrap())
            .collect();
        assert_eq!(keys.len(), 4000);

        // Byte-wise order end to end: "10" sorts before "9"
        let ordered: Vec<String> = rows.iter().map(|r| record::row_key(r).unwrap()).collect();
        assert!(ordered.windows(2).all(|w| w[0] < w[1]));

        for i in (0..4000).step_by(7) {
            let row = search_row(&pager, root, &i.to_string())?;
            assert_eq!(decode_row(&row)?, [i.to_string(), format!("user{}", i)]);
        }
        assert!(search_row(&pager, root, "4000").is_err());
        assert!(search_row(&pager, root, "").is_err());

        assert_sorted(&export_tree(&pager, root)?);

        Ok(())
    }

    #[test]
    fn test_internal_splits_with_long_keys() -> Result<()> {
        let (mut pager, mut root, _dir) = create_test_tree()?;

        // ~200-byte keys: about 19 separators fit an internal page
        let key = |i: usize| format!("{:0>200}", i);
        let mut order: Vec<usize> = (0..1500).collect();
        order.shuffle(&mut StdRng::seed_from_u64(7));

        for &i in &order {
            root = insert(&mut pager, root, &[&key(i), "v"])?;
        }

        let tree = export_tree(&pager, root)?;
        assert!(height(&tree) >= 3, "expected internal splits, height {}", height(&tree));
        assert_sorted(&tree);

        let rows = scan_all(&pager, root)?;
        assert_eq!(rows.len(), 1500);
        let scanned: Vec<String> = rows.iter().map(|r| record::row_key(r).unwrap()).collect();
        let expected: Vec<String> = (0..1500).map(key).collect();
        assert_eq!(scanned, expected);

        for i in 0..1500 {
            search_row(&pager, root, &key(i))?;
        }
        assert!(search_row(&pager, root, &key(1500)).is_err());

        Ok(())
    }

    #[test]
    fn test_random_order_inserts() -> Result<()> {
        let (mut pager, mut root, _dir) = create_test_tree()?;

        let mut keys: Vec<String> = (0..3000).map(|i| format!("key{}", i)).collect();
        keys.shuffle(&mut StdRng::seed_from_u64(42));

        for k in &keys {
            root = insert(&mut pager, root, &[k, "payload"])?;
        }

        assert_eq!(scan_all(&pager, root)?.len(), 3000);
        for k in &keys {
            search_row(&pager, root, k)?;
        }
        assert_sorted(&export_tree(&pager, root)?);

        Ok(())
    }

    #[test]
    fn test_leaf_chain_preserved_on_split() -> Result<()> {
        let (mut pager, mut root, _dir) = create_test_tree()?;

        for i in 0..600 {
            root = insert(&mut pager, root, &[&format!("{:05}", i), "chain"])?;
        }

        // Walk the chain from the left-most leaf without the tree
        let mut page_id = match read_node(&pager, root)? {
            Page::Internal(node) => node.left_child,
            Page::Leaf(_) => root,
        };
        let mut count = 0;
        while page_id.is_some() {
            match read_node(&pager, page_id)? {
                Page::Leaf(leaf) => {
                    count += leaf.cells.len();
                    page_id = leaf.next_leaf;
                }
                Page::Internal(_) => panic!("chain reached an internal page"),
            }
        }
        assert_eq!(count, 600);

        Ok(())
    }

    #[test]
    fn test_duplicate_key_rejected() -> Result<()> {
        let (mut pager, root, _dir) = create_test_tree()?;

        insert(&mut pager, root, &["k", "1"])?;
        assert!(matches!(
            insert(&mut pager, root, &["k", "2"]),
            Err(StorageError::DuplicateKey(_))
        ));
        assert_eq!(decode_row(&search_row(&pager, root, "k")?)?, ["k", "1"]);

        Ok(())
    }

    #[test]
    fn test_oversized_and_invalid_rows() -> Result<()> {
        let (mut pager, root, _dir) = create_test_tree()?;

        let big = "x".repeat(PAGE_SIZE);
        assert!(matches!(
            insert(&mut pager, root, &["k", &big]),
            Err(StorageError::PageOverflow { .. })
        ));
        assert!(matches!(
            insert(&mut pager, root, &[]),
            Err(StorageError::MalformedRecord(_))
        ));
        assert!(matches!(
            insert(&mut pager, root, &["a\0b", "v"]),
            Err(StorageError::InvalidKey(_))
        ));

        assert!(scan_all(&pager, root)?.is_empty());

        Ok(())
    }

    #[test]
    fn test_delete_from_root_leaf() -> Result<()> {
        let (mut pager, mut root, _dir) = create_test_tree()?;

        for k in ["a", "b", "c", "d"] {
            root = insert(&mut pager, root, &[k, "v"])?;
        }

        assert_eq!(delete_row(&mut pager, root, "b")?, root);
        assert!(matches!(
            search_row(&pager, root, "b"),
            Err(StorageError::KeyNotFound(_))
        ));
        for k in ["a", "c", "d"] {
            search_row(&pager, root, k)?;
        }

        assert!(matches!(
            delete_row(&mut pager, root, "b"),
            Err(StorageError::KeyNotFound(_))
        ));

        Ok(())
    }

    #[test]
    fn test_delete_through_internal_pages() -> Result<()> {
        let (mut pager, mut root, _dir) = create_test_tree()?;

        for i in 0..1000 {
            root = insert(&mut pager, root, &[&format!("{:04}", i), "value"])?;
        }
        let pages_before = pager.page_count();

        for i in (0..1000).step_by(2) {
            assert_eq!(delete_row(&mut pager, root, &format!("{:04}", i))?, root);
        }

        // No merging: the tree keeps every page it had
        assert_eq!(pager.page_count(), pages_before);

        let rows = scan_all(&pager, root)?;
        assert_eq!(rows.len(), 500);
        for i in 0..1000 {
            let found = search_row(&pager, root, &format!("{:04}", i));
            assert_eq!(found.is_ok(), i % 2 == 1, "key {:04}", i);
        }

        assert!(matches!(
            delete_row(&mut pager, root, "0000"),
            Err(StorageError::KeyNotFound(_))
        ));

        // Emptied leaves still accept inserts
        for i in (0..1000).step_by(2) {
            root = insert(&mut pager, root, &[&format!("{:04}", i), "again"])?;
        }
        assert_eq!(scan_all(&pager, root)?.len(), 1000);

        Ok(())
    }

    fn count_pages(node: &TreeNode) -> usize {
        1 + node.children.iter().map(count_pages).sum::<usize>()
    }

    fn filled(prefix: &str, len: usize) -> String {
        format!("{}{}", prefix, "x".repeat(len - prefix.len()))
    }

    fn keys_of(pager: &FilePager, root: PageId) -> Result<Vec<String>> {
        scan_all(pager, root)?
            .iter()
            .map(|r| record::row_key(r))
            .collect()
    }

    #[test]
    fn test_split_around_large_left_row() -> Result<()> {
        let (mut pager, mut root, _dir) = create_test_tree()?;

        let a = "x".repeat(2000);
        let b = "y".repeat(2500);
        for (k, v) in [("a", a.as_str()), ("c", "v"), ("d", "v"), ("b", b.as_str())] {
            root = insert(&mut pager, root, &[k, v])?;
        }

        assert_eq!(keys_of(&pager, root)?, ["a", "b", "c", "d"]);
        assert_eq!(decode_row(&search_row(&pager, root, "b")?)?, ["b", b.as_str()]);
        assert_eq!(tree_height(&pager, root)?, 2);

        Ok(())
    }

    #[test]
    fn test_leaf_split_into_three_parts() -> Result<()> {
        let (mut pager, mut root, _dir) = create_test_tree()?;

        // Two large rows around a small one fill the leaf; a third large
        // row between them fits neither half of any single cut
        let big = "x".repeat(1960);
        for k in ["a", "b", "d"] {
            let v = if k == "b" { "v" } else { big.as_str() };
            root = insert(&mut pager, root, &[k, v])?;
        }
        let original_root = root;
        root = insert(&mut pager, root, &["c", &"z".repeat(3000)])?;

        match read_node(&pager, root)? {
            Page::Internal(node) => {
                assert_eq!(node.left_child, original_root);
                let seps: Vec<&str> = node.cells.iter().map(|c| c.key.as_str()).collect();
                assert_eq!(seps, ["c", "d"]);
            }
            Page::Leaf(_) => panic!("root should be internal after a split"),
        }
        assert_eq!(keys_of(&pager, root)?, ["a", "b", "c", "d"]);
        for k in ["a", "b", "c", "d"] {
            search_row(&pager, root, k)?;
        }

        Ok(())
    }

    #[test]
    fn test_internal_split_with_large_separators() -> Result<()> {
        let (mut pager, first, _dir) = create_test_tree()?;
        let key_a = filled("a", 2100);
        let key_b = filled("b", 2100);

        let l1 = pager.allocate_page();
        let l2 = pager.allocate_page();
        let l3 = pager.allocate_page();
        let root = pager.allocate_page();
        let leaf = |rows: Vec<Vec<u8>>, next_leaf| LeafPage {
            cells: rows,
            next_leaf,
        };
        pager.write_page(first, &leaf(vec![], l1).encode()?)?;
        pager.write_page(l1, &leaf(vec![encode_row(&[key_a.as_str(), "v"])], l2).encode()?)?;
        pager.write_page(l2, &leaf(vec![encode_row(&["c", "v"])], l3).encode()?)?;
        pager.write_page(l3, &leaf(vec![encode_row(&["d", "v"])], PageId::NONE).encode()?)?;

        let mut node = InternalPage::new(first);
        node.cells.push(InternalCell::new(key_a.clone(), l1));
        node.cells.push(InternalCell::new("c", l2));
        node.cells.push(InternalCell::new("d", l3));
        pager.write_page(root, &node.encode()?)?;

        // The new separator for key_b overflows the root next to key_a
        let new_root = insert(&mut pager, root, &[&key_b, "v"])?;
        assert_ne!(new_root, root);

        let expected = [key_a.clone(), key_b.clone(), "c".to_string(), "d".to_string()];
        assert_eq!(keys_of(&pager, new_root)?, expected);
        for k in &expected {
            search_row(&pager, new_root, k)?;
        }
        assert_sorted(&export_tree(&pager, new_root)?);

        Ok(())
    }

    #[test]
    fn test_long_keys_few_separators_per_page() -> Result<()> {
        let (mut pager, mut root, _dir) = create_test_tree()?;

        // ~1800-byte keys: two rows per leaf, two separators per internal page
        let key = |i: usize| format!("{:0>1800}", i);
        let mut order: Vec<usize> = (0..60).collect();
        order.shuffle(&mut StdRng::seed_from_u64(11));

        for &i in &order {
            root = insert(&mut pager, root, &[&key(i), "v"])?;
        }

        let tree = export_tree(&pager, root)?;
        assert!(height(&tree) >= 4, "height {}", height(&tree));
        assert_sorted(&tree);

        let expected: Vec<String> = (0..60).map(key).collect();
        assert_eq!(keys_of(&pager, root)?, expected);
        for k in &expected {
            search_row(&pager, root, k)?;
        }

        Ok(())
    }

    #[test]
    fn test_mixed_row_sizes() -> Result<()> {
        let (mut pager, mut root, _dir) = create_test_tree()?;
        let mut rng = StdRng::seed_from_u64(99);

        let mut rows = Vec::new();
        for i in 0..400 {
            let key_len = rng.gen_range(1..=2000);
            let value_len = rng.gen_range(0..=1500);
            let key = format!("{:04}{}", i, "k".repeat(key_len));
            rows.push((key, "v".repeat(value_len)));
        }
        rows.shuffle(&mut rng);

        for (k, v) in &rows {
            root = insert(&mut pager, root, &[k, v])?;
        }

        let mut expected: Vec<String> = rows.iter().map(|(k, _)| k.clone()).collect();
        expected.sort();
        assert_eq!(keys_of(&pager, root)?, expected);
        for (k, v) in &rows {
            assert_eq!(decode_row(&search_row(&pager, root, k)?)?, [k.as_str(), v.as_str()]);
        }
        assert_sorted(&export_tree(&pager, root)?);

        Ok(())
    }

    #[test]
    fn test_every_allocated_page_is_in_the_tree() -> Result<()> {
        let (mut pager, mut root, _dir) = create_test_tree()?;
        let mut rng = StdRng::seed_from_u64(5);

        for i in 0..300 {
            let value = "v".repeat(rng.gen_range(0..=1200));
            root = insert(&mut pager, root, &[&format!("{:04}", i), &value])?;
        }

        // Page 1 is the catalog; every other page belongs to the tree
        let tree = export_tree(&pager, root)?;
        assert_eq!(pager.page_count() as usize, 1 + count_pages(&tree));

        let before = pager.page_count();
        assert!(matches!(
            insert(&mut pager, root, &["0000", &"v".repeat(3000)]),
            Err(StorageError::DuplicateKey(_))
        ));
        assert_eq!(pager.page_count(), before);

        Ok(())
    }

    #[test]
    fn test_descent_cycle_detected() -> Result<()> {
        let (mut pager, _root, _dir) = create_test_tree()?;

        // Internal page whose only child is itself
        let page_id = pager.allocate_page();
        let node = InternalPage::new(page_id);
        pager.write_page(page_id, &node.encode()?)?;

        assert!(matches!(
            search_row(&pager, page_id, "k"),
            Err(StorageError::CycleDetected(_))
        ));
        assert!(matches!(
            insert(&mut pager, page_id, &["k", "v"]),
            Err(StorageError::CycleDetected(_))
        ));

        Ok(())
    }
}
