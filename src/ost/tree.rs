//! Copy-on-write order-statistics tree over a [`Storage`] backend.
//!
//! Same shape as the B+Tree: a stateless `_with_root` core carrying root id
//! and allocation tail through every call, wrapped by stateful methods that
//! maintain the tree's own `root_page_id` and `alloc_tail`.

use eyre::{eyre, Result};

use super::{OstInternal, OstLeaf, OST_INTERNAL_TAG, OST_LEAF_TAG};
use crate::error::StoreError;
use crate::storage::{PageAlloc, Storage};

/// Outcome of [`Ost::insert_with_root`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OstInsert {
    pub new_root: u64,
    pub new_tail: u64,
}

/// Outcome of [`Ost::remove_with_root`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OstRemove {
    pub new_root: u64,
    pub new_tail: u64,
    /// The value ref that was removed.
    pub removed_ref: u64,
}

enum Node {
    Leaf(OstLeaf),
    Internal(OstInternal),
}

enum InsertUpdate {
    Single(u64),
    Split {
        left: u64,
        left_count: u32,
        right: u64,
        right_count: u32,
        level: u16,
    },
}

/// Subtree counts are stored as u32 on disk; a total past that range cannot
/// be recorded in a parent entry.
fn subtree_count(total: u64) -> Result<u32> {
    u32::try_from(total).map_err(|_| eyre!("subtree count {total} exceeds the on-disk u32 range"))
}

/// Position-ordered COW sequence of value refs. Root page id 0 is the empty
/// tree.
pub struct Ost<'a, S: Storage> {
    storage: &'a mut S,
    alloc: PageAlloc,
    root_page_id: u64,
    alloc_tail: u64,
    leaf_capacity: usize,
    internal_capacity: usize,
}

impl<'a, S: Storage> Ost<'a, S> {
    /// Empty tree with the default node capacities, allocating past the
    /// current end of storage.
    pub fn new(storage: &'a mut S, page_size: u32) -> Result<Self> {
        Self::with_capacities(
            storage,
            page_size,
            super::OST_LEAF_CAPACITY,
            super::OST_INTERNAL_CAPACITY,
        )
    }

    /// Empty tree with explicit leaf/internal capacities. Small capacities
    /// keep the tree correct and make deep shapes cheap to reach.
    pub fn with_capacities(
        storage: &'a mut S,
        page_size: u32,
        leaf_capacity: usize,
        internal_capacity: usize,
    ) -> Result<Self> {
        eyre::ensure!(
            leaf_capacity >= 2 && internal_capacity >= 2,
            "node capacities must be at least 2"
        );
        let alloc = PageAlloc::new(page_size)?;
        let alloc_tail = storage.size()?;
        Ok(Self {
            storage,
            alloc,
            root_page_id: 0,
            alloc_tail,
            leaf_capacity,
            internal_capacity,
        })
    }

    /// Attaches to an existing tree at `root_page_id`.
    pub fn open(
        storage: &'a mut S,
        page_size: u32,
        root_page_id: u64,
        alloc_tail: u64,
    ) -> Result<Self> {
        let mut tree = Self::new(storage, page_size)?;
        tree.root_page_id = root_page_id;
        tree.alloc_tail = alloc_tail;
        Ok(tree)
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

    fn read_node(&self, page_id: u64) -> Result<Node> {
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

        match page[0] {
            OST_LEAF_TAG => Ok(Node::Leaf(OstLeaf::from_page(&page, page_id)?)),
            OST_INTERNAL_TAG => Ok(Node::Internal(OstInternal::from_page(&page, page_id)?)),
            tag => Err(StoreError::Corrupt {
                page_id,
                reason: format!("unknown node tag {tag}"),
            }
            .into()),
        }
    }

    fn write_page(&mut self, tail: u64, page: &[u8]) -> Result<(u64, u64)> {
        let allocation = self.alloc.allocate_page(tail)?;
        self.storage.write(allocation.offset, page)?;
        Ok((allocation.page_id, allocation.new_tail))
    }

    fn write_leaf(&mut self, tail: u64, leaf: &OstLeaf) -> Result<(u64, u64)> {
        let page = leaf.to_page(self.alloc.page_size())?;
        self.write_page(tail, &page)
    }

    fn write_internal(&mut self, tail: u64, node: &OstInternal) -> Result<(u64, u64)> {
        let page = node.to_page(self.alloc.page_size())?;
        self.write_page(tail, &page)
    }

    /// Number of values reachable from `root`. One page read: internal
    /// roots carry the subtree counts of all their children.
    pub fn size_with_root(&self, root: u64) -> Result<u64> {
        if root == 0 {
            return Ok(0);
        }
        match self.read_node(root)? {
            Node::Leaf(leaf) => Ok(leaf.len() as u64),
            Node::Internal(node) => Ok(node.total_count()),
        }
    }

    /// Value ref at `index`, failing `PositionOutOfRange` for any index at
    /// or past the size (so every access on an empty tree fails).
    pub fn get_with_root(&self, root: u64, index: u64) -> Result<u64> {
        let size = self.size_with_root(root)?;
        if index >= size {
            return Err(StoreError::PositionOutOfRange { index, size }.into());
        }

        let mut page_id = root;
        let mut position = index;
        loop {
            match self.read_node(page_id)? {
                Node::Internal(node) => {
                    let (child, local) =
                        node.find_child_for_position(position)
                            .ok_or(StoreError::Corrupt {
                                page_id,
                                reason: "subtree counts do not cover position".into(),
                            })?;
                    page_id = node.children[child];
                    position = local;
                }
                Node::Leaf(leaf) => {
                    return leaf
                        .value_refs
                        .get(position as usize)
                        .copied()
                        .ok_or_else(|| {
                            StoreError::Corrupt {
                                page_id,
                                reason: "leaf shorter than recorded count".into(),
                            }
                            .into()
                        });
                }
            }
        }
    }

    /// Inserts `value_ref` at `index`, shifting later positions up by one.
    /// `index` may equal the current size (append). Rewrites the
    /// leaf-to-root path with every ancestor's subtree count for the
    /// affected child raised by one; splits propagate like the B+Tree's.
    pub fn insert_with_root(
        &mut self,
        root: u64,
        tail: u64,
        index: u64,
        value_ref: u64,
    ) -> Result<OstInsert> {
        let size = self.size_with_root(root)?;
        if index > size {
            return Err(StoreError::PositionOutOfRange { index, size }.into());
        }

        if root == 0 {
            let leaf = OstLeaf {
                value_refs: vec![value_ref],
                next_leaf_page_id: 0,
            };
            let (new_root, new_tail) = self.write_leaf(tail, &leaf)?;
            return Ok(OstInsert { new_root, new_tail });
        }

        let (update, tail) = self.insert_rec(root, tail, index, value_ref)?;
        match update {
            InsertUpdate::Single(new_root) => Ok(OstInsert {
                new_root,
                new_tail: tail,
            }),
            InsertUpdate::Split {
                left,
                left_count,
                right,
                right_count,
                level,
            } => {
                let new_root_node = OstInternal::new(
                    level + 1,
                    vec![left, right],
                    vec![left_count, right_count],
                );
                let (new_root, new_tail) = self.write_internal(tail, &new_root_node)?;
                Ok(OstInsert { new_root, new_tail })
            }
        }
    }

    fn insert_rec(
        &mut self,
        page_id: u64,
        tail: u64,
        position: u64,
        value_ref: u64,
    ) -> Result<(InsertUpdate, u64)> {
        match self.read_node(page_id)? {
            Node::Leaf(mut leaf) => {
                leaf.value_refs.insert(position as usize, value_ref);
                if leaf.len() > self.leaf_capacity {
                    let right = leaf.split();
                    let (right_id, tail) = self.write_leaf(tail, &right)?;
                    leaf.next_leaf_page_id = right_id;
                    let (left_id, tail) = self.write_leaf(tail, &leaf)?;
                    Ok((
                        InsertUpdate::Split {
                            left: left_id,
                            left_count: leaf.len() as u32,
                            right: right_id,
                            right_count: right.len() as u32,
                            level: 0,
                        },
                        tail,
                    ))
                } else {
                    let (new_id, tail) = self.write_leaf(tail, &leaf)?;
                    Ok((InsertUpdate::Single(new_id), tail))
                }
            }
            Node::Internal(mut node) => {
                let (index, local) =
                    node.find_child_for_position(position)
                        .ok_or(StoreError::Corrupt {
                            page_id,
                            reason: "subtree counts do not cover position".into(),
                        })?;
                let (update, tail) = self.insert_rec(node.children[index], tail, local, value_ref)?;
                match update {
                    InsertUpdate::Single(child_id) => {
                        node.children[index] = child_id;
                        node.subtree_counts[index] += 1;
                    }
                    InsertUpdate::Split {
                        left,
                        left_count,
                        right,
                        right_count,
                        ..
                    } => {
                        node.children[index] = left;
                        node.subtree_counts[index] = left_count;
                        node.children.insert(index + 1, right);
                        node.subtree_counts.insert(index + 1, right_count);
                    }
                }

                if node.len() > self.internal_capacity {
                    let right = node.split();
                    let (right_id, tail) = self.write_internal(tail, &right)?;
                    let (left_id, tail) = self.write_internal(tail, &node)?;
                    Ok((
                        InsertUpdate::Split {
                            left: left_id,
                            left_count: subtree_count(node.total_count())?,
                            right: right_id,
                            right_count: subtree_count(right.total_count())?,
                            level: node.level,
                        },
                        tail,
                    ))
                } else {
                    let (new_id, tail) = self.write_internal(tail, &node)?;
                    Ok((InsertUpdate::Single(new_id), tail))
                }
            }
        }
    }

    /// Removes the value at `index`, shifting later positions down by one.
    /// A leaf that empties stays in the tree with count zero unless it is
    /// the root, which collapses to the empty tree.
    pub fn remove_with_root(&mut self, root: u64, tail: u64, index: u64) -> Result<OstRemove> {
        let size = self.size_with_root(root)?;
        if index >= size {
            return Err(StoreError::PositionOutOfRange { index, size }.into());
        }

        let (new_root, new_tail, removed_ref) = self.remove_rec(root, tail, index, true)?;
        Ok(OstRemove {
            new_root,
            new_tail,
            removed_ref,
        })
    }

    fn remove_rec(
        &mut self,
        page_id: u64,
        tail: u64,
        position: u64,
        is_root: bool,
    ) -> Result<(u64, u64, u64)> {
        match self.read_node(page_id)? {
            Node::Leaf(mut leaf) => {
                let removed = leaf.value_refs.remove(position as usize);
                if is_root && leaf.is_empty() {
                    return Ok((0, tail, removed));
                }
                let (new_id, tail) = self.write_leaf(tail, &leaf)?;
                Ok((new_id, tail, removed))
            }
            Node::Internal(mut node) => {
                let (index, local) =
                    node.find_child_for_position(position)
                        .ok_or(StoreError::Corrupt {
                            page_id,
                            reason: "subtree counts do not cover position".into(),
                        })?;
                let (child_id, tail, removed) =
                    self.remove_rec(node.children[index], tail, local, false)?;
                node.children[index] = child_id;
                node.subtree_counts[index] -= 1;
                let (new_id, tail) = self.write_internal(tail, &node)?;
                Ok((new_id, tail, removed))
            }
        }
    }

    // Stateful API.

    pub fn get(&self, index: u64) -> Result<u64> {
        self.get_with_root(self.root_page_id, index)
    }

    pub fn insert(&mut self, index: u64, value_ref: u64) -> Result<()> {
        let result = self.insert_with_root(self.root_page_id, self.alloc_tail, index, value_ref)?;
        self.root_page_id = result.new_root;
        self.alloc_tail = result.new_tail;
        Ok(())
    }

    /// Appends at the end.
    pub fn push(&mut self, value_ref: u64) -> Result<()> {
        let size = self.len()?;
        self.insert(size, value_ref)
    }

    pub fn remove(&mut self, index: u64) -> Result<u64> {
        let result = self.remove_with_root(self.root_page_id, self.alloc_tail, index)?;
        self.root_page_id = result.new_root;
        self.alloc_tail = result.new_tail;
        Ok(result.removed_ref)
    }

    pub fn len(&self) -> Result<u64> {
        self.size_with_root(self.root_page_id)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn collect<S: Storage>(tree: &Ost<'_, S>) -> Vec<u64> {
        let size = tree.len().unwrap();
        (0..size).map(|i| tree.get(i).unwrap()).collect()
    }

    #[test]
    fn positional_inserts_shift_later_values() {
        let mut storage = MemoryStorage::new();
        let mut tree = Ost::new(&mut storage, 4096).unwrap();

        tree.insert(0, 100).unwrap();
        tree.insert(1, 200).unwrap();
        tree.insert(1, 150).unwrap();
        tree.insert(0, 50).unwrap();

        assert_eq!(collect(&tree), vec![50, 100, 150, 200]);
        assert_eq!(tree.len().unwrap(), 4);
    }

    #[test]
    fn empty_tree_rejects_every_access() {
        let mut storage = MemoryStorage::new();
        let mut tree = Ost::new(&mut storage, 4096).unwrap();

        let err = tree.get(0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::PositionOutOfRange { index: 0, size: 0 })
        ));
        assert!(tree.remove(0).is_err());
        // Index 0 insert is the one legal empty-tree operation.
        tree.insert(0, 1).unwrap();
        assert_eq!(tree.get(0).unwrap(), 1);
    }

    #[test]
    fn out_of_range_positions_are_rejected() {
        let mut storage = MemoryStorage::new();
        let mut tree = Ost::new(&mut storage, 4096).unwrap();
        tree.push(10).unwrap();
        tree.push(20).unwrap();

        let err = tree.insert(3, 30).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::PositionOutOfRange { index: 3, size: 2 })
        ));
        assert!(tree.get(2).is_err());
        assert!(tree.remove(2).is_err());
        // The failed calls left the tree untouched.
        assert_eq!(collect(&tree), vec![10, 20]);
    }

    #[test]
    fn removing_last_value_empties_root() {
        let mut storage = MemoryStorage::new();
        let mut tree = Ost::new(&mut storage, 4096).unwrap();

        tree.push(42).unwrap();
        assert_eq!(tree.remove(0).unwrap(), 42);
        assert_eq!(tree.root_page_id(), 0);
        assert!(tree.is_empty().unwrap());
    }

    #[test]
    fn small_capacities_force_multi_level_splits() {
        let mut storage = MemoryStorage::new();
        let mut tree = Ost::with_capacities(&mut storage, 4096, 4, 4).unwrap();

        for i in 0..200u64 {
            tree.push(i * 10).unwrap();
        }

        assert_eq!(tree.len().unwrap(), 200);
        for i in 0..200u64 {
            assert_eq!(tree.get(i).unwrap(), i * 10);
        }
    }

    #[test]
    fn front_inserts_keep_positions_consistent() {
        let mut storage = MemoryStorage::new();
        let mut tree = Ost::with_capacities(&mut storage, 4096, 4, 4).unwrap();

        for i in 0..100u64 {
            tree.insert(0, i).unwrap();
        }

        let values = collect(&tree);
        let expected: Vec<u64> = (0..100u64).rev().collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn interleaved_removes_shift_positions_down() {
        let mut storage = MemoryStorage::new();
        let mut tree = Ost::with_capacities(&mut storage, 4096, 4, 4).unwrap();

        for i in 0..50u64 {
            tree.push(i).unwrap();
        }
        // Remove every even-indexed value, front to back.
        for i in 0..25u64 {
            let removed = tree.remove(i).unwrap();
            assert_eq!(removed, i * 2);
        }

        let expected: Vec<u64> = (0..50u64).filter(|v| v % 2 == 1).collect();
        assert_eq!(collect(&tree), expected);
    }

    #[test]
    fn old_root_reads_unchanged_after_mutations() {
        let mut storage = MemoryStorage::new();
        let mut tree = Ost::with_capacities(&mut storage, 4096, 4, 4).unwrap();

        for i in 0..20u64 {
            tree.push(i).unwrap();
        }
        let snapshot_root = tree.root_page_id();

        tree.insert(0, 999).unwrap();
        tree.remove(10).unwrap();

        assert_eq!(tree.size_with_root(snapshot_root).unwrap(), 20);
        for i in 0..20u64 {
            assert_eq!(tree.get_with_root(snapshot_root, i).unwrap(), i);
        }
    }

    #[test]
    fn out_of_range_page_id_is_corrupt() {
        let mut storage = MemoryStorage::new();
        let tree = Ost::open(&mut storage, 4096, u64::MAX, 0).unwrap();

        let err = tree.get(0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn unknown_tag_is_corrupt() {
        let mut storage = MemoryStorage::new();
        // A zeroed page has tag 0, which is neither node kind.
        storage.write(0, &vec![0u8; 8192]).unwrap();
        let tree = Ost::open(&mut storage, 4096, 1, 8192).unwrap();

        let err = tree.get(0).unwrap_err();
        assert!(format!("{err}").contains("unknown node tag"));
    }

    #[test]
    fn subtree_count_past_u32_is_an_error() {
        let page_size = 4096u32;
        let mut storage = MemoryStorage::new();
        // Four small leaves whose parent claims u32::MAX values apiece, so a
        // split of the parent produces a half whose total no longer fits in
        // the on-disk count field.
        for id in 1u64..=4 {
            let leaf = OstLeaf {
                value_refs: vec![id * 10, id * 10 + 1, id * 10 + 2, id * 10 + 3],
                next_leaf_page_id: if id < 4 { id + 1 } else { 0 },
            };
            let page = leaf.to_page(page_size).unwrap();
            storage.write(id * page_size as u64, &page).unwrap();
        }
        let root = OstInternal::new(1, vec![1, 2, 3, 4], vec![u32::MAX; 4]);
        let page = root.to_page(page_size).unwrap();
        storage.write(5 * page_size as u64, &page).unwrap();

        let mut tree = Ost::with_capacities(&mut storage, page_size, 4, 4).unwrap();
        tree.set_root_page_id(5);
        tree.set_alloc_tail(6 * page_size as u64);

        let err = tree.insert(0, 99).unwrap_err();
        assert!(format!("{err}").contains("exceeds the on-disk u32 range"));
        // The failed insert leaves the tree handle untouched.
        assert_eq!(tree.root_page_id(), 5);
        assert_eq!(tree.alloc_tail(), 6 * page_size as u64);
    }
}
