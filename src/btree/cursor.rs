//! Ascending range cursor over a B+Tree snapshot.
//!
//! The cursor keeps an explicit descent stack of `(internal node, child
//! index)` frames and advances by popping up to the first frame with an
//! unvisited sibling, then descending to the leftmost leaf of that subtree.
//! Leaf `next_leaf_page_id` hints are never followed; under copy-on-write
//! they can point at siblings from an older tree version.

use std::cmp::Ordering;

use eyre::Result;
use smallvec::SmallVec;

use super::tree::Node;
use super::{BTree, BTreeInternal, BTreeLeaf, Entry, MAX_TREE_DEPTH};
use crate::storage::Storage;

struct Frame {
    node: BTreeInternal,
    child_index: usize,
}

/// Forward iterator over entries, optionally bounded on either side. Each
/// bound is independently inclusive or exclusive. Once exhausted, a cursor
/// stays exhausted.
pub struct Cursor<'t, 'a, S: Storage> {
    tree: &'t BTree<'a, S>,
    stack: SmallVec<[Frame; MAX_TREE_DEPTH]>,
    leaf: Option<BTreeLeaf>,
    entry_index: usize,
    end: Option<(Vec<u8>, bool)>,
    done: bool,
    peeked: Option<Entry>,
}

impl<'t, 'a, S: Storage> Cursor<'t, 'a, S> {
    pub(crate) fn new(
        tree: &'t BTree<'a, S>,
        root: u64,
        start: Option<(&[u8], bool)>,
        end: Option<(&[u8], bool)>,
    ) -> Result<Self> {
        let mut cursor = Self {
            tree,
            stack: SmallVec::new(),
            leaf: None,
            entry_index: 0,
            end: end.map(|(key, inclusive)| (key.to_vec(), inclusive)),
            done: root == 0,
            peeked: None,
        };
        if root != 0 {
            cursor.seek(root, start)?;
        }
        Ok(cursor)
    }

    /// Descends from `root` to the first leaf position at or after the start
    /// bound, recording the path.
    fn seek(&mut self, root: u64, start: Option<(&[u8], bool)>) -> Result<()> {
        let compare = self.tree.comparator();
        let mut page_id = root;
        loop {
            match self.tree.read_node(page_id)? {
                Node::Internal(node) => {
                    let child_index = match start {
                        Some((key, _)) => node.find_child_index(key, compare),
                        None => 0,
                    };
                    page_id = node.children[child_index];
                    self.stack.push(Frame { node, child_index });
                }
                Node::Leaf(leaf) => {
                    self.entry_index = match start {
                        Some((key, inclusive)) => leaf.keys.partition_point(|probe| {
                            let ord = compare(probe, key);
                            ord == Ordering::Less || (!inclusive && ord == Ordering::Equal)
                        }),
                        None => 0,
                    };
                    self.leaf = Some(leaf);
                    return Ok(());
                }
            }
        }
    }

    /// Next entry in key order, or `None` once the range is exhausted.
    pub fn next(&mut self) -> Result<Option<Entry>> {
        if let Some(entry) = self.peeked.take() {
            return Ok(Some(entry));
        }
        if self.done {
            return Ok(None);
        }

        loop {
            if let Some(leaf) = &self.leaf {
                if self.entry_index < leaf.len() {
                    let key = &leaf.keys[self.entry_index];
                    if let Some((end_key, inclusive)) = &self.end {
                        let ord = (self.tree.comparator())(key, end_key);
                        let past = if *inclusive {
                            ord == Ordering::Greater
                        } else {
                            ord != Ordering::Less
                        };
                        if past {
                            self.exhaust();
                            return Ok(None);
                        }
                    }
                    let entry = Entry {
                        key: key.clone(),
                        value_ref: leaf.value_refs[self.entry_index],
                    };
                    self.entry_index += 1;
                    return Ok(Some(entry));
                }
            }
            if !self.advance()? {
                self.exhaust();
                return Ok(None);
            }
        }
    }

    /// Next entry without consuming it.
    pub fn peek(&mut self) -> Result<Option<Entry>> {
        if self.peeked.is_none() {
            self.peeked = self.next()?;
        }
        Ok(self.peeked.clone())
    }

    /// Moves to the leftmost leaf of the next unvisited sibling subtree.
    fn advance(&mut self) -> Result<bool> {
        self.leaf = None;
        while let Some(frame) = self.stack.last_mut() {
            if frame.child_index + 1 < frame.node.children.len() {
                frame.child_index += 1;
                let child = frame.node.children[frame.child_index];
                self.descend_leftmost(child)?;
                return Ok(true);
            }
            self.stack.pop();
        }
        Ok(false)
    }

    fn descend_leftmost(&mut self, mut page_id: u64) -> Result<()> {
        loop {
            match self.tree.read_node(page_id)? {
                Node::Internal(node) => {
                    page_id = node.children[0];
                    self.stack.push(Frame {
                        node,
                        child_index: 0,
                    });
                }
                Node::Leaf(leaf) => {
                    self.leaf = Some(leaf);
                    self.entry_index = 0;
                    return Ok(());
                }
            }
        }
    }

    fn exhaust(&mut self) {
        self.done = true;
        self.leaf = None;
        self.stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use crate::btree::BTree;
    use crate::storage::MemoryStorage;

    fn populated_tree(storage: &mut MemoryStorage) -> BTree<'_, MemoryStorage> {
        let mut tree = BTree::new(storage, 4096).unwrap();
        for i in [5u32, 3, 8, 1, 9, 2, 7, 4, 6, 0] {
            tree.insert(&i.to_be_bytes(), i as u64 * 10).unwrap();
        }
        tree
    }

    #[test]
    fn full_scan_is_key_ordered() {
        let mut storage = MemoryStorage::new();
        let tree = populated_tree(&mut storage);

        let mut cursor = tree.cursor().unwrap();
        let mut seen = Vec::new();
        while let Some(entry) = cursor.next().unwrap() {
            seen.push(entry.value_ref);
        }
        assert_eq!(seen, vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90]);
    }

    #[test]
    fn bounds_are_independently_inclusive() {
        let mut storage = MemoryStorage::new();
        let tree = populated_tree(&mut storage);
        let key = |i: u32| i.to_be_bytes().to_vec();

        let collect = |start, end| {
            let mut cursor = tree.range(start, end).unwrap();
            let mut refs = Vec::new();
            while let Some(entry) = cursor.next().unwrap() {
                refs.push(entry.value_ref);
            }
            refs
        };

        let k1 = key(1);
        let k2 = key(2);
        let k5 = key(5);
        assert_eq!(
            collect(Some((&k2[..], true)), Some((&k5[..], true))),
            vec![20, 30, 40, 50]
        );
        assert_eq!(
            collect(Some((&k2[..], false)), Some((&k5[..], true))),
            vec![30, 40, 50]
        );
        assert_eq!(
            collect(Some((&k2[..], true)), Some((&k5[..], false))),
            vec![20, 30, 40]
        );
        assert_eq!(collect(None, Some((&k1[..], false))), vec![0]);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut storage = MemoryStorage::new();
        let tree = populated_tree(&mut storage);

        let mut cursor = tree.cursor().unwrap();
        assert_eq!(cursor.peek().unwrap().unwrap().value_ref, 0);
        assert_eq!(cursor.peek().unwrap().unwrap().value_ref, 0);
        assert_eq!(cursor.next().unwrap().unwrap().value_ref, 0);
        assert_eq!(cursor.next().unwrap().unwrap().value_ref, 10);
    }

    #[test]
    fn exhaustion_is_permanent() {
        let mut storage = MemoryStorage::new();
        let mut tree = BTree::new(&mut storage, 4096).unwrap();
        tree.insert(b"a", 1).unwrap();

        let mut cursor = tree.cursor().unwrap();
        assert!(cursor.next().unwrap().is_some());
        assert!(cursor.next().unwrap().is_none());
        assert!(cursor.next().unwrap().is_none());
        assert!(cursor.peek().unwrap().is_none());
    }

    #[test]
    fn empty_tree_cursor_yields_nothing() {
        let mut storage = MemoryStorage::new();
        let tree = BTree::new(&mut storage, 4096).unwrap();

        let mut cursor = tree.cursor().unwrap();
        assert!(cursor.next().unwrap().is_none());
    }
}
