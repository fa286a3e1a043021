//! Copy-on-write B+Tree over a [`Storage`] backend.
//!
//! The algorithms all live in the `_with_root` methods, which take the root
//! page id and allocation tail as parameters and return the new ones: given
//! the same storage, any previously returned root id still reads as the
//! exact tree it described, because mutations only ever write freshly
//! allocated pages. The stateful methods (`insert`, `find`, ...) are thin
//! shells that thread the tree's own `root_page_id` and `alloc_tail` through
//! the core.

use std::cmp::Ordering;

use eyre::Result;

use super::{byte_order, BTreeInternal, BTreeLeaf, Comparator, Cursor, Entry, NODE_HEADER_OFFSET};
use crate::error::StoreError;
use crate::storage::{PageAlloc, Storage};

/// Outcome of [`BTree::insert_with_root`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreeInsert {
    pub new_root: u64,
    pub new_tail: u64,
    /// True when the key was already present and its value ref was replaced.
    pub replaced: bool,
}

/// Outcome of [`BTree::delete_with_root`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreeDelete {
    pub new_root: u64,
    pub new_tail: u64,
    /// False when the key was absent; the tree is unchanged in that case.
    pub deleted: bool,
}

#[derive(Debug)]
pub(crate) enum Node {
    Leaf(BTreeLeaf),
    Internal(BTreeInternal),
}

enum InsertUpdate {
    Single(u64),
    Split {
        left: u64,
        separator: Vec<u8>,
        right: u64,
        level: u16,
    },
}

/// Key-ordered COW index. Root page id 0 is the empty tree; valid page ids
/// start at 1.
#[derive(Debug)]
pub struct BTree<'a, S: Storage> {
    storage: &'a mut S,
    alloc: PageAlloc,
    compare: Comparator,
    root_page_id: u64,
    alloc_tail: u64,
}

impl<'a, S: Storage> BTree<'a, S> {
    /// Empty tree with lexicographic byte ordering, allocating past the
    /// current end of storage.
    pub fn new(storage: &'a mut S, page_size: u32) -> Result<Self> {
        Self::with_comparator(storage, page_size, byte_order)
    }

    pub fn with_comparator(
        storage: &'a mut S,
        page_size: u32,
        compare: Comparator,
    ) -> Result<Self> {
        let alloc = PageAlloc::new(page_size)?;
        let alloc_tail = storage.size()?;
        Ok(Self {
            storage,
            alloc,
            compare,
            root_page_id: 0,
            alloc_tail,
        })
    }

    /// Attaches to an existing tree at `root_page_id`.
    pub fn open(
        storage: &'a mut S,
        page_size: u32,
        compare: Comparator,
        root_page_id: u64,
        alloc_tail: u64,
    ) -> Result<Self> {
        let alloc = PageAlloc::new(page_size)?;
        Ok(Self {
            storage,
            alloc,
            compare,
            root_page_id,
            alloc_tail,
        })
    }

    pub fn page_size(&self) -> u32 {
        self.alloc.page_size()
    }

    pub fn root_page_id(&self) -> u64 {
        self.root_page_id
    }

    pub fn set_root_page_id(&mut self, root_page_id: u64) {
        self.root_page_id = root_page_id;
    }

    pub fn alloc_tail(&self) -> u64 {
        self.alloc_tail
    }

    pub fn set_alloc_tail(&mut self, alloc_tail: u64) {
        self.alloc_tail = alloc_tail;
    }

    pub(crate) fn comparator(&self) -> Comparator {
        self.compare
    }

    /// Reads and decodes a node, dispatching on the level field: level 0 is
    /// a leaf, anything else an internal node.
    pub(crate) fn read_node(&self, page_id: u64) -> Result<Node> {
        let page_size = self.alloc.page_size() as usize;
        // A page id that cannot be converted back to an offset can only come
        // from a damaged node.
        let offset = page_id
            .checked_mul(page_size as u64)
            .ok_or(StoreError::Corrupt {
                page_id,
                reason: "page offset out of range".into(),
            })?;
        let mut page = vec![0u8; page_size];
        self.storage.read(offset, &mut page)?;

        let level = u16::from_le_bytes([page[NODE_HEADER_OFFSET], page[NODE_HEADER_OFFSET + 1]]);
        if level == 0 {
            Ok(Node::Leaf(BTreeLeaf::from_page(&page, page_id)?))
        } else {
            Ok(Node::Internal(BTreeInternal::from_page(&page, page_id)?))
        }
    }

    fn write_page(&mut self, tail: u64, page: &[u8]) -> Result<(u64, u64)> {
        let allocation = self.alloc.allocate_page(tail)?;
        self.storage.write(allocation.offset, page)?;
        Ok((allocation.page_id, allocation.new_tail))
    }

    fn write_leaf(&mut self, tail: u64, leaf: &BTreeLeaf) -> Result<(u64, u64)> {
        let page = leaf.to_page(self.alloc.page_size())?;
        self.write_page(tail, &page)
    }

    fn write_internal(&mut self, tail: u64, node: &BTreeInternal) -> Result<(u64, u64)> {
        let page = node.to_page(self.alloc.page_size())?;
        self.write_page(tail, &page)
    }

    /// Point lookup against an arbitrary root.
    pub fn find_with_root(&self, root: u64, key: &[u8]) -> Result<Option<u64>> {
        if root == 0 {
            return Ok(None);
        }
        let mut page_id = root;
        loop {
            match self.read_node(page_id)? {
                Node::Internal(node) => {
                    page_id = node.children[node.find_child_index(key, self.compare)];
                }
                Node::Leaf(leaf) => {
                    return Ok(match leaf.find(key, self.compare) {
                        Ok(index) => Some(leaf.value_refs[index]),
                        Err(_) => None,
                    });
                }
            }
        }
    }

    /// Inserts or replaces, rewriting the leaf-to-root path onto new pages.
    /// Splits propagate upward; a root split grows the tree by one level.
    pub fn insert_with_root(
        &mut self,
        root: u64,
        tail: u64,
        key: &[u8],
        value_ref: u64,
    ) -> Result<BTreeInsert> {
        if root == 0 {
            let leaf = BTreeLeaf {
                keys: vec![key.to_vec()],
                value_refs: vec![value_ref],
                next_leaf_page_id: 0,
            };
            let (new_root, new_tail) = self.write_leaf(tail, &leaf)?;
            return Ok(BTreeInsert {
                new_root,
                new_tail,
                replaced: false,
            });
        }

        let (update, tail, replaced) = self.insert_rec(root, tail, key, value_ref)?;
        match update {
            InsertUpdate::Single(new_root) => Ok(BTreeInsert {
                new_root,
                new_tail: tail,
                replaced,
            }),
            InsertUpdate::Split {
                left,
                separator,
                right,
                level,
            } => {
                let new_root_node = BTreeInternal::new(level + 1, vec![separator], vec![left, right]);
                let (new_root, new_tail) = self.write_internal(tail, &new_root_node)?;
                Ok(BTreeInsert {
                    new_root,
                    new_tail,
                    replaced,
                })
            }
        }
    }

    fn insert_rec(
        &mut self,
        page_id: u64,
        tail: u64,
        key: &[u8],
        value_ref: u64,
    ) -> Result<(InsertUpdate, u64, bool)> {
        let page_size = self.alloc.page_size();
        match self.read_node(page_id)? {
            Node::Leaf(mut leaf) => {
                let replaced = match leaf.find(key, self.compare) {
                    Ok(index) => {
                        leaf.value_refs[index] = value_ref;
                        true
                    }
                    Err(index) => {
                        leaf.keys.insert(index, key.to_vec());
                        leaf.value_refs.insert(index, value_ref);
                        false
                    }
                };

                if leaf.is_full(page_size) {
                    let right = leaf.split();
                    let separator = right.keys[0].clone();
                    let (right_id, tail) = self.write_leaf(tail, &right)?;
                    leaf.next_leaf_page_id = right_id;
                    let (left_id, tail) = self.write_leaf(tail, &leaf)?;
                    Ok((
                        InsertUpdate::Split {
                            left: left_id,
                            separator,
                            right: right_id,
                            level: 0,
                        },
                        tail,
                        replaced,
                    ))
                } else {
                    let (new_id, tail) = self.write_leaf(tail, &leaf)?;
                    Ok((InsertUpdate::Single(new_id), tail, replaced))
                }
            }
            Node::Internal(mut node) => {
                let index = node.find_child_index(key, self.compare);
                let (update, tail, replaced) =
                    self.insert_rec(node.children[index], tail, key, value_ref)?;
                match update {
                    InsertUpdate::Single(child_id) => node.children[index] = child_id,
                    InsertUpdate::Split {
                        left,
                        separator,
                        right,
                        ..
                    } => {
                        node.children[index] = left;
                        node.keys.insert(index, separator);
                        node.children.insert(index + 1, right);
                    }
                }

                if node.is_full(page_size) {
                    let (promoted, right_node) = node.split();
                    let (right_id, tail) = self.write_internal(tail, &right_node)?;
                    let (left_id, tail) = self.write_internal(tail, &node)?;
                    Ok((
                        InsertUpdate::Split {
                            left: left_id,
                            separator: promoted,
                            right: right_id,
                            level: node.level,
                        },
                        tail,
                        replaced,
                    ))
                } else {
                    let (new_id, tail) = self.write_internal(tail, &node)?;
                    Ok((InsertUpdate::Single(new_id), tail, replaced))
                }
            }
        }
    }

    /// Deletes without rebalancing: no merges, no height reduction. A leaf
    /// that empties stays in the tree unless it is the root, in which case
    /// the result is the empty tree (root 0). An absent key leaves the tree
    /// untouched, allocating nothing.
    pub fn delete_with_root(&mut self, root: u64, tail: u64, key: &[u8]) -> Result<BTreeDelete> {
        if root == 0 {
            return Ok(BTreeDelete {
                new_root: 0,
                new_tail: tail,
                deleted: false,
            });
        }
        match self.delete_rec(root, tail, key, true)? {
            None => Ok(BTreeDelete {
                new_root: root,
                new_tail: tail,
                deleted: false,
            }),
            Some((new_root, new_tail)) => Ok(BTreeDelete {
                new_root,
                new_tail,
                deleted: true,
            }),
        }
    }

    fn delete_rec(
        &mut self,
        page_id: u64,
        tail: u64,
        key: &[u8],
        is_root: bool,
    ) -> Result<Option<(u64, u64)>> {
        match self.read_node(page_id)? {
            Node::Leaf(mut leaf) => match leaf.find(key, self.compare) {
                Err(_) => Ok(None),
                Ok(index) => {
                    leaf.keys.remove(index);
                    leaf.value_refs.remove(index);
                    if is_root && leaf.is_empty() {
                        return Ok(Some((0, tail)));
                    }
                    let (new_id, tail) = self.write_leaf(tail, &leaf)?;
                    Ok(Some((new_id, tail)))
                }
            },
            Node::Internal(mut node) => {
                let index = node.find_child_index(key, self.compare);
                match self.delete_rec(node.children[index], tail, key, false)? {
                    None => Ok(None),
                    Some((child_id, tail)) => {
                        node.children[index] = child_id;
                        let (new_id, tail) = self.write_internal(tail, &node)?;
                        Ok(Some((new_id, tail)))
                    }
                }
            }
        }
    }

    /// Smallest entry, or `None` on an empty tree. Skips over leaves that
    /// deletion has emptied.
    pub fn first_entry_with_root(&self, root: u64) -> Result<Option<Entry>> {
        self.cursor_with_root(root)?.next()
    }

    /// Largest entry, or `None` on an empty tree.
    pub fn last_entry_with_root(&self, root: u64) -> Result<Option<Entry>> {
        if root == 0 {
            return Ok(None);
        }
        self.last_in_subtree(root)
    }

    fn last_in_subtree(&self, page_id: u64) -> Result<Option<Entry>> {
        match self.read_node(page_id)? {
            Node::Leaf(leaf) => {
                Ok(leaf
                    .keys
                    .last()
                    .zip(leaf.value_refs.last())
                    .map(|(key, &value_ref)| Entry {
                        key: key.clone(),
                        value_ref,
                    }))
            }
            Node::Internal(node) => {
                for &child in node.children.iter().rev() {
                    if let Some(entry) = self.last_in_subtree(child)? {
                        return Ok(Some(entry));
                    }
                }
                Ok(None)
            }
        }
    }

    /// Greatest entry strictly below `key`. Single root-to-leaf descent,
    /// falling back to the nearest left sibling subtree when the routed
    /// subtree has nothing below the key.
    pub fn lower_with_root(&self, root: u64, key: &[u8]) -> Result<Option<Entry>> {
        if root == 0 {
            return Ok(None);
        }
        self.below_in_subtree(root, key, false)
    }

    /// Greatest entry at or below `key`.
    pub fn floor_with_root(&self, root: u64, key: &[u8]) -> Result<Option<Entry>> {
        if root == 0 {
            return Ok(None);
        }
        self.below_in_subtree(root, key, true)
    }

    fn below_in_subtree(
        &self,
        page_id: u64,
        key: &[u8],
        inclusive: bool,
    ) -> Result<Option<Entry>> {
        match self.read_node(page_id)? {
            Node::Leaf(leaf) => {
                let pos = leaf.keys.partition_point(|probe| {
                    let ord = (self.compare)(probe, key);
                    ord == Ordering::Less || (inclusive && ord == Ordering::Equal)
                });
                Ok((pos > 0).then(|| Entry {
                    key: leaf.keys[pos - 1].clone(),
                    value_ref: leaf.value_refs[pos - 1],
                }))
            }
            Node::Internal(node) => {
                let index = node.find_child_index(key, self.compare);
                if let Some(entry) = self.below_in_subtree(node.children[index], key, inclusive)? {
                    return Ok(Some(entry));
                }
                for left in (0..index).rev() {
                    if let Some(entry) = self.last_in_subtree(node.children[left])? {
                        return Ok(Some(entry));
                    }
                }
                Ok(None)
            }
        }
    }

    /// Smallest entry at or above `key`.
    pub fn ceiling_with_root(&self, root: u64, key: &[u8]) -> Result<Option<Entry>> {
        self.range_with_root(root, Some((key, true)), None)?.next()
    }

    /// Smallest entry strictly above `key`.
    pub fn higher_with_root(&self, root: u64, key: &[u8]) -> Result<Option<Entry>> {
        self.range_with_root(root, Some((key, false)), None)?.next()
    }

    /// Ascending cursor over the whole tree.
    pub fn cursor_with_root(&self, root: u64) -> Result<Cursor<'_, 'a, S>> {
        Cursor::new(self, root, None, None)
    }

    /// Ascending cursor over a key range. Each bound is an optional
    /// `(key, inclusive)` pair, independently inclusive or exclusive.
    pub fn range_with_root(
        &self,
        root: u64,
        start: Option<(&[u8], bool)>,
        end: Option<(&[u8], bool)>,
    ) -> Result<Cursor<'_, 'a, S>> {
        Cursor::new(self, root, start, end)
    }

    /// Number of entries reachable from `root`.
    pub fn len_with_root(&self, root: u64) -> Result<u64> {
        if root == 0 {
            return Ok(0);
        }
        self.count_subtree(root)
    }

    fn count_subtree(&self, page_id: u64) -> Result<u64> {
        match self.read_node(page_id)? {
            Node::Leaf(leaf) => Ok(leaf.len() as u64),
            Node::Internal(node) => {
                let mut total = 0;
                for &child in &node.children {
                    total += self.count_subtree(child)?;
                }
                Ok(total)
            }
        }
    }

    // Stateful API: same operations against the tree's own root and tail.

    pub fn find(&self, key: &[u8]) -> Result<Option<u64>> {
        self.find_with_root(self.root_page_id, key)
    }

    /// Returns true when an existing value was replaced.
    pub fn insert(&mut self, key: &[u8], value_ref: u64) -> Result<bool> {
        let result = self.insert_with_root(self.root_page_id, self.alloc_tail, key, value_ref)?;
        self.root_page_id = result.new_root;
        self.alloc_tail = result.new_tail;
        Ok(result.replaced)
    }

    /// Returns true when the key was present.
    pub fn delete(&mut self, key: &[u8]) -> Result<bool> {
        let result = self.delete_with_root(self.root_page_id, self.alloc_tail, key)?;
        self.root_page_id = result.new_root;
        self.alloc_tail = result.new_tail;
        Ok(result.deleted)
    }

    pub fn first_entry(&self) -> Result<Option<Entry>> {
        self.first_entry_with_root(self.root_page_id)
    }

    pub fn last_entry(&self) -> Result<Option<Entry>> {
        self.last_entry_with_root(self.root_page_id)
    }

    pub fn lower(&self, key: &[u8]) -> Result<Option<Entry>> {
        self.lower_with_root(self.root_page_id, key)
    }

    pub fn floor(&self, key: &[u8]) -> Result<Option<Entry>> {
        self.floor_with_root(self.root_page_id, key)
    }

    pub fn ceiling(&self, key: &[u8]) -> Result<Option<Entry>> {
        self.ceiling_with_root(self.root_page_id, key)
    }

    pub fn higher(&self, key: &[u8]) -> Result<Option<Entry>> {
        self.higher_with_root(self.root_page_id, key)
    }

    pub fn cursor(&self) -> Result<Cursor<'_, 'a, S>> {
        self.cursor_with_root(self.root_page_id)
    }

    pub fn range(
        &self,
        start: Option<(&[u8], bool)>,
        end: Option<(&[u8], bool)>,
    ) -> Result<Cursor<'_, 'a, S>> {
        self.range_with_root(self.root_page_id, start, end)
    }

    pub fn len(&self) -> Result<u64> {
        self.len_with_root(self.root_page_id)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn empty_tree_lookups() {
        let mut storage = MemoryStorage::new();
        let tree = BTree::new(&mut storage, 4096).unwrap();

        assert_eq!(tree.find(b"anything").unwrap(), None);
        assert_eq!(tree.first_entry().unwrap(), None);
        assert_eq!(tree.last_entry().unwrap(), None);
        assert_eq!(tree.len().unwrap(), 0);
        assert!(tree.is_empty().unwrap());
    }

    #[test]
    fn insert_and_find() {
        let mut storage = MemoryStorage::new();
        let mut tree = BTree::new(&mut storage, 4096).unwrap();

        assert!(!tree.insert(b"b", 2).unwrap());
        assert!(!tree.insert(b"a", 1).unwrap());
        assert!(!tree.insert(b"c", 3).unwrap());

        assert_eq!(tree.find(b"a").unwrap(), Some(1));
        assert_eq!(tree.find(b"b").unwrap(), Some(2));
        assert_eq!(tree.find(b"c").unwrap(), Some(3));
        assert_eq!(tree.find(b"d").unwrap(), None);
        assert_eq!(tree.len().unwrap(), 3);
    }

    #[test]
    fn duplicate_insert_replaces() {
        let mut storage = MemoryStorage::new();
        let mut tree = BTree::new(&mut storage, 4096).unwrap();

        assert!(!tree.insert(b"k", 1).unwrap());
        assert!(tree.insert(b"k", 2).unwrap());

        assert_eq!(tree.find(b"k").unwrap(), Some(2));
        assert_eq!(tree.len().unwrap(), 1);
    }

    #[test]
    fn delete_last_entry_empties_root() {
        let mut storage = MemoryStorage::new();
        let mut tree = BTree::new(&mut storage, 4096).unwrap();

        tree.insert(b"only", 9).unwrap();
        assert!(tree.delete(b"only").unwrap());

        assert_eq!(tree.root_page_id(), 0);
        assert_eq!(tree.find(b"only").unwrap(), None);
    }

    #[test]
    fn delete_of_absent_key_changes_nothing() {
        let mut storage = MemoryStorage::new();
        let mut tree = BTree::new(&mut storage, 4096).unwrap();

        tree.insert(b"a", 1).unwrap();
        let root = tree.root_page_id();
        let tail = tree.alloc_tail();

        assert!(!tree.delete(b"missing").unwrap());
        assert_eq!(tree.root_page_id(), root);
        assert_eq!(tree.alloc_tail(), tail);
    }

    // Keys of ~400 bytes force a fanout around 9 on 4096-byte pages, so a
    // few hundred inserts exercise splits across multiple internal levels.
    fn wide_key(i: u32) -> Vec<u8> {
        let mut key = vec![b'x'; 400];
        key[..4].copy_from_slice(&i.to_be_bytes());
        key
    }

    #[test]
    fn splits_preserve_every_entry() {
        let mut storage = MemoryStorage::new();
        let mut tree = BTree::new(&mut storage, 4096).unwrap();

        for i in 0..300u32 {
            // Shuffled order via a coprime stride.
            let k = (i * 7) % 300;
            tree.insert(&wide_key(k), k as u64).unwrap();
        }

        assert_eq!(tree.len().unwrap(), 300);
        for i in 0..300u32 {
            assert_eq!(tree.find(&wide_key(i)).unwrap(), Some(i as u64));
        }

        // The root must be internal with internal children by now.
        match tree.read_node(tree.root_page_id()).unwrap() {
            Node::Internal(node) => assert!(node.level >= 2),
            Node::Leaf(_) => panic!("expected a deep tree"),
        }
    }

    #[test]
    fn ordered_scan_after_splits() {
        let mut storage = MemoryStorage::new();
        let mut tree = BTree::new(&mut storage, 4096).unwrap();

        for i in (0..200u32).rev() {
            tree.insert(&wide_key(i), i as u64).unwrap();
        }

        let mut cursor = tree.cursor().unwrap();
        let mut expected = 0u32;
        while let Some(entry) = cursor.next().unwrap() {
            assert_eq!(entry.key, wide_key(expected));
            assert_eq!(entry.value_ref, expected as u64);
            expected += 1;
        }
        assert_eq!(expected, 200);
    }

    #[test]
    fn relational_lookups() {
        let mut storage = MemoryStorage::new();
        let mut tree = BTree::new(&mut storage, 4096).unwrap();

        for i in [10u32, 20, 30, 40] {
            tree.insert(&i.to_be_bytes(), i as u64).unwrap();
        }
        let key = |i: u32| i.to_be_bytes().to_vec();

        assert_eq!(tree.floor(&key(20)).unwrap().unwrap().key, key(20));
        assert_eq!(tree.lower(&key(20)).unwrap().unwrap().key, key(10));
        assert_eq!(tree.ceiling(&key(20)).unwrap().unwrap().key, key(20));
        assert_eq!(tree.higher(&key(20)).unwrap().unwrap().key, key(30));

        assert_eq!(tree.floor(&key(25)).unwrap().unwrap().key, key(20));
        assert_eq!(tree.ceiling(&key(25)).unwrap().unwrap().key, key(30));

        assert_eq!(tree.lower(&key(10)).unwrap(), None);
        assert_eq!(tree.higher(&key(40)).unwrap(), None);
        assert_eq!(tree.floor(&key(5)).unwrap(), None);
        assert_eq!(tree.ceiling(&key(45)).unwrap(), None);
    }

    #[test]
    fn relational_lookups_descend_across_subtrees() {
        let mut storage = MemoryStorage::new();
        let mut tree = BTree::new(&mut storage, 4096).unwrap();

        for i in 0..300u32 {
            tree.insert(&wide_key(i * 2), i as u64).unwrap();
        }

        // Odd probes sit between entries, including at subtree boundaries.
        for probe in [1u32, 99, 301, 597] {
            let below = tree.lower(&wide_key(probe)).unwrap().unwrap();
            assert_eq!(below.key, wide_key(probe - 1));
            let above = tree.higher(&wide_key(probe)).unwrap().unwrap();
            assert_eq!(above.key, wide_key(probe + 1));
        }
    }

    #[test]
    fn out_of_range_page_id_is_corrupt() {
        let mut storage = MemoryStorage::new();
        let tree = BTree::open(&mut storage, 4096, crate::btree::byte_order, u64::MAX, 0).unwrap();

        let err = tree.find(b"k").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn old_root_reads_unchanged_after_mutations() {
        let mut storage = MemoryStorage::new();
        let mut tree = BTree::new(&mut storage, 4096).unwrap();

        tree.insert(b"a", 1).unwrap();
        tree.insert(b"b", 2).unwrap();
        let snapshot_root = tree.root_page_id();

        tree.insert(b"c", 3).unwrap();
        tree.delete(b"a").unwrap();
        tree.insert(b"b", 20).unwrap();

        assert_eq!(tree.find_with_root(snapshot_root, b"a").unwrap(), Some(1));
        assert_eq!(tree.find_with_root(snapshot_root, b"b").unwrap(), Some(2));
        assert_eq!(tree.find_with_root(snapshot_root, b"c").unwrap(), None);
        assert_eq!(tree.len_with_root(snapshot_root).unwrap(), 2);
    }

    #[test]
    fn custom_comparator_orders_the_tree() {
        fn reverse(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
            b.cmp(a)
        }

        let mut storage = MemoryStorage::new();
        let mut tree = BTree::with_comparator(&mut storage, 4096, reverse).unwrap();

        tree.insert(b"a", 1).unwrap();
        tree.insert(b"b", 2).unwrap();
        tree.insert(b"c", 3).unwrap();

        assert_eq!(tree.first_entry().unwrap().unwrap().key, b"c".to_vec());
        assert_eq!(tree.last_entry().unwrap().unwrap().key, b"a".to_vec());
    }
}
