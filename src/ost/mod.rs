//! # Copy-on-Write Order-Statistics Tree
//!
//! Position-ordered counterpart of the B+Tree: values are addressed by
//! index, not key. Leaves hold flat runs of value refs; internal nodes hold
//! child page ids paired with exact subtree value counts, so any position
//! maps to a leaf slot in one root-to-leaf descent.
//!
//! Nodes are discriminated by a leading tag byte rather than a level field:
//! `1` for leaves, `2` for internal nodes. Capacities are count-based, not
//! size-based, since entries are fixed width.
//!
//! The copy-on-write contract matches the B+Tree's: mutations rewrite the
//! affected path onto fresh pages and old roots stay readable.

mod internal;
mod leaf;
mod tree;

pub use internal::OstInternal;
pub use leaf::OstLeaf;
pub use tree::{Ost, OstInsert, OstRemove};

pub(crate) const OST_LEAF_TAG: u8 = 1;
pub(crate) const OST_INTERNAL_TAG: u8 = 2;

/// Default maximum values per leaf.
pub const OST_LEAF_CAPACITY: usize = 100;
/// Default maximum children per internal node.
pub const OST_INTERNAL_CAPACITY: usize = 128;
