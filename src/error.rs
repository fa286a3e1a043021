//! # Error Taxonomy
//!
//! This module defines `StoreError`, the typed failure categories of the
//! engine. All public operations return `eyre::Result`; failures that a
//! caller may need to branch on are constructed as `StoreError` values and
//! can be recovered from the report with `downcast_ref::<StoreError>()`.
//!
//! The categories are deliberately coarse:
//!
//! - **Argument errors** (`PositionOutOfRange`, `InvalidRecordSize`,
//!   `InvalidPageSize`): rejected synchronously, before any page is written.
//! - **Storage I/O** (`Closed`, `ReadOnly`, `OutOfBounds`, `MemoryLimit`,
//!   `Io`): propagated unchanged; the engine never retries. Durability
//!   decisions belong to the caller.
//! - **Allocation overflow** (`AllocOverflow`): offset arithmetic would leave
//!   insufficient headroom before the numeric range limit.
//! - **Corruption** (`Corrupt`): a page read back does not parse as a valid
//!   node for its claimed type. Never masked as an empty node.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage is closed")]
    Closed,

    #[error("storage is read-only")]
    ReadOnly,

    #[error("read out of bounds: offset={offset}, len={len}, size={size}")]
    OutOfBounds { offset: u64, len: u64, size: u64 },

    #[error("memory limit exceeded: {required} > {limit}")]
    MemoryLimit { required: u64, limit: u64 },

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("allocation overflow: cannot allocate at offset {offset}")]
    AllocOverflow { offset: u64 },

    #[error("record size must be positive")]
    InvalidRecordSize,

    #[error("invalid page size {0}: must be 4096, 8192, or 16384")]
    InvalidPageSize(u32),

    #[error("position {index} out of bounds for size {size}")]
    PositionOutOfRange { index: u64, size: u64 },

    #[error("page {page_id} is corrupt: {reason}")]
    Corrupt { page_id: u64, reason: String },
}
