//! # Storage Module
//!
//! Foundation of the engine: a byte-addressable backing medium behind the
//! `Storage` trait, and the allocator that turns a monotonically increasing
//! allocation tail into aligned page and record offsets.
//!
//! ## Backends
//!
//! Two interchangeable implementations are provided:
//!
//! - `FileStorage`: memory-mapped file access via `memmap2`. Writes go
//!   through the map; `force()` performs an msync-equivalent flush.
//! - `MemoryStorage`: a growable in-memory buffer with an optional byte
//!   limit, used for tests and ephemeral stores.
//!
//! Both enforce the same contract: reads and writes transfer exactly the
//! requested number of bytes or fail, `extend` only grows (zero-filling the
//! gap), `truncate` only shrinks (compaction support).
//!
//! ## Append-Only Discipline
//!
//! The tree layers above never overwrite a live page: every logical mutation
//! allocates fresh space past the allocation tail and writes there. The
//! storage layer itself does not enforce this (compaction legitimately
//! rewrites from offset zero), but everything reachable from a published
//! tree root is immutable by construction.
//!
//! ## Page Addressing
//!
//! Pages are fixed-size (4096, 8192, or 16384 bytes) and addressed by
//! `page_id = offset / page_size`. Page id 0 is reserved as the "null / empty
//! tree" sentinel; the allocator never hands it out.
//!
//! ## Error Handling
//!
//! All fallible operations return `eyre::Result`. Failures a caller can act
//! on (closed storage, out-of-bounds read, read-only violation, memory limit,
//! allocation overflow) are typed `StoreError` values inside the report.

mod alloc;
mod file;
mod memory;

pub use alloc::{Allocator, PageAlloc, PageAllocation, RecordAllocation};
pub use file::FileStorage;
pub use memory::MemoryStorage;

use eyre::Result;

/// Valid page sizes for the engine.
pub const VALID_PAGE_SIZES: [u32; 3] = [4096, 8192, 16384];

/// Default page size.
pub const DEFAULT_PAGE_SIZE: u32 = 4096;

/// Alignment for record allocations.
pub const RECORD_ALIGNMENT: u64 = 8;

/// Byte-addressable backing medium.
///
/// File-backed and memory-backed implementations must be behaviorally
/// interchangeable; the tree engine calls nothing beyond this trait.
pub trait Storage {
    /// Reads exactly `buf.len()` bytes starting at `offset`.
    ///
    /// Fails with `StoreError::OutOfBounds` if the range extends past the
    /// current logical size, and `StoreError::Closed` after `close()`.
    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Writes exactly `data.len()` bytes starting at `offset`, growing the
    /// logical size if the write extends past it.
    fn write(&mut self, offset: u64, data: &[u8]) -> Result<()>;

    /// Grows the backing space to `new_size`, zero-filling the gap.
    /// Never shrinks; a smaller `new_size` is a no-op.
    fn extend(&mut self, new_size: u64) -> Result<()>;

    /// Shrinks the backing space to `new_size`. Used only by compaction.
    /// Never grows; a larger `new_size` is a no-op.
    fn truncate(&mut self, new_size: u64) -> Result<()>;

    /// Flushes buffered writes to durable media. `metadata` additionally
    /// syncs file metadata where the backend distinguishes the two.
    fn force(&mut self, metadata: bool) -> Result<()>;

    /// Current logical length in bytes.
    fn size(&self) -> Result<u64>;
}

pub(crate) fn is_valid_page_size(size: u32) -> bool {
    VALID_PAGE_SIZES.contains(&size)
}
