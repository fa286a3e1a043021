//! # Copy-on-Write B+Tree
//!
//! Key-ordered index over `(key bytes, value_ref)` entries. All data lives in
//! leaves; internal nodes hold separator keys and child page ids only. Every
//! mutation rewrites the path from the affected leaf to the root onto freshly
//! allocated pages, so a previously published root id keeps describing a
//! fully consistent tree.
//!
//! ## Node Layout
//!
//! Pages reserve their first 32 bytes for the embedding store. The node
//! header sits at offset 32, little-endian:
//!
//! ```text
//! [32, 34)  level      u16   0 for leaves, > 0 for internal nodes
//! [34, 36)  count      u16   entry count (leaf) / separator count (internal)
//! ```
//!
//! Leaves continue with a next-leaf page id at `[36, 44)` and their entries
//! at 44; internal nodes put their `count + 1` child page ids directly at 36,
//! followed by the separator keys.
//!
//! A node is full once its serialized form exceeds
//! `page_size - RESERVED_MARGIN`.

use std::cmp::Ordering;

use zerocopy::little_endian::{U16, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

mod cursor;
mod internal;
mod leaf;
mod tree;

pub use cursor::Cursor;
pub use internal::BTreeInternal;
pub use leaf::BTreeLeaf;
pub use tree::{BTree, BTreeDelete, BTreeInsert};

/// First 32 page bytes are reserved for the embedding store.
pub(crate) const NODE_HEADER_OFFSET: usize = 32;
/// Where internal-node child ids begin.
pub(crate) const INTERNAL_BODY_OFFSET: usize = 36;
/// Where leaf entries begin, past the next-leaf pointer.
pub(crate) const LEAF_BODY_OFFSET: usize = 44;

/// A node is full when its serialized size exceeds `page_size` minus this.
pub const RESERVED_MARGIN: usize = 100;

/// Descent stacks are inlined up to this depth.
pub(crate) const MAX_TREE_DEPTH: usize = 8;

/// Key ordering used by a tree. Must be a total order; keys within the tree
/// are strictly increasing under it.
pub type Comparator = fn(&[u8], &[u8]) -> Ordering;

/// Lexicographic byte order, the default comparator.
pub fn byte_order(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

/// Fixed header shared by both node kinds, at offset 32.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy)]
#[repr(C)]
pub(crate) struct NodeHeader {
    pub level: U16,
    pub count: U16,
}

/// Leaf header including the next-leaf pointer at `[36, 44)`.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy)]
#[repr(C)]
pub(crate) struct LeafHeader {
    pub level: U16,
    pub count: U16,
    pub next_leaf: U64,
}

/// One leaf entry as returned by lookups and cursors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Vec<u8>,
    pub value_ref: u64,
}
