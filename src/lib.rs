//! # cowstore
//!
//! Embedded, single-file, page-based copy-on-write tree engine. Two tree
//! kinds share one storage substrate:
//!
//! - [`btree::BTree`]: key-ordered B+Tree mapping byte keys to `u64` value
//!   refs, with point lookups, relational lookups (lower/floor/ceiling/
//!   higher) and bounded range cursors.
//! - [`ost::Ost`]: order-statistics tree addressing value refs by position,
//!   with O(log n) get/insert/remove at any index.
//!
//! ## Copy-on-Write
//!
//! Pages are immutable once written. Every mutation allocates fresh pages
//! for the leaf-to-root path and returns a new root page id; any root id a
//! caller holds keeps describing the exact tree it described when it was
//! returned. That is the entire concurrency story: a single writer advances
//! the tree while readers work from captured root ids without any locking.
//! Superseded pages are not reclaimed here; offline compaction owns that.
//!
//! Both trees expose the same API twice: a stateless `_with_root` core that
//! takes and returns `(root page id, allocation tail)` explicitly, and
//! stateful convenience methods that track the pair internally. The
//! stateless form is the engine; snapshot bookkeeping composes on top of it.
//!
//! ## Storage
//!
//! [`storage::Storage`] abstracts the backing bytes; [`storage::MemoryStorage`]
//! and the memory-mapped [`storage::FileStorage`] are interchangeable.
//! Page ids address fixed-size pages (`offset = page_id * page_size`), page
//! id 0 meaning "empty tree". Page sizes are 4096, 8192 or 16384 bytes.
//!
//! ```
//! use cowstore::btree::BTree;
//! use cowstore::storage::MemoryStorage;
//!
//! # fn main() -> eyre::Result<()> {
//! let mut storage = MemoryStorage::new();
//! let mut tree = BTree::new(&mut storage, 4096)?;
//!
//! tree.insert(b"alpha", 1)?;
//! tree.insert(b"beta", 2)?;
//! let snapshot = tree.root_page_id();
//!
//! tree.delete(b"alpha")?;
//! assert_eq!(tree.find(b"alpha")?, None);
//! // The captured root still sees the old version.
//! assert_eq!(tree.find_with_root(snapshot, b"alpha")?, Some(1));
//! # Ok(())
//! # }
//! ```

pub mod btree;
pub mod error;
pub mod ost;
pub mod storage;

pub use btree::{BTree, BTreeDelete, BTreeInsert, Cursor, Entry};
pub use error::StoreError;
pub use ost::{Ost, OstInsert, OstRemove};
pub use storage::{Allocator, FileStorage, MemoryStorage, PageAlloc, Storage};
