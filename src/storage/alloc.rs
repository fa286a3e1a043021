//! # Append-Only Allocation
//!
//! The allocator turns a monotonically increasing allocation tail into
//! aligned offsets: pages are page-size aligned, records are 8-byte aligned.
//!
//! ## Stateless Core
//!
//! `PageAlloc` holds only the page size. `allocate_page` and
//! `allocate_record` take the current tail as a parameter and return the new
//! tail along with the allocated offset. This is the form the tree engine
//! uses: a writer threads the tail through a COW mutation and publishes it
//! as part of a snapshot while readers keep older tails.
//!
//! ## Stateful Wrapper
//!
//! `Allocator` owns committed and current tails for callers that predate the
//! snapshot model. `begin_pending`/`commit_pending`/`rollback_pending` stage
//! a batch of allocations: rollback resets the current tail to the committed
//! one, discarding every page the batch allocated without touching
//! already-committed space.
//!
//! ## Invariants
//!
//! - The tail only ever grows (compaction excepted, and compaction rebuilds
//!   the allocator).
//! - Page id 0 is the empty-tree sentinel; `allocate_page` never returns it.
//! - Offsets that would leave less than two pages of headroom before the
//!   signed 64-bit limit fail with `StoreError::AllocOverflow`.

use eyre::{bail, Result};

use super::is_valid_page_size;
use crate::error::StoreError;

const OVERFLOW_THRESHOLD: u64 = i64::MAX as u64 - 2 * 16384;

/// Result of a page allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageAllocation {
    pub page_id: u64,
    pub offset: u64,
    pub new_tail: u64,
}

/// Result of a record allocation. Records have no page id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordAllocation {
    pub offset: u64,
    pub new_tail: u64,
}

/// Stateless allocator: all tail state lives with the caller.
#[derive(Debug, Clone, Copy)]
pub struct PageAlloc {
    page_size: u32,
}

impl PageAlloc {
    pub fn new(page_size: u32) -> Result<Self> {
        if !is_valid_page_size(page_size) {
            return Err(StoreError::InvalidPageSize(page_size).into());
        }
        Ok(Self { page_size })
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Allocates one page past `current_tail`, aligned to the page size.
    ///
    /// A tail inside the first page is rounded past it so the returned
    /// `page_id` is always at least 1 (id 0 means "empty tree").
    pub fn allocate_page(&self, current_tail: u64) -> Result<PageAllocation> {
        let page_size = self.page_size as u64;
        let offset = align_up(current_tail.max(1), page_size);

        if offset > OVERFLOW_THRESHOLD {
            return Err(StoreError::AllocOverflow { offset }.into());
        }
        let new_tail = offset + page_size;

        Ok(PageAllocation {
            page_id: offset / page_size,
            offset,
            new_tail,
        })
    }

    /// Allocates `size` bytes past `current_tail`, aligned to 8 bytes.
    pub fn allocate_record(&self, current_tail: u64, size: u64) -> Result<RecordAllocation> {
        if size == 0 {
            return Err(StoreError::InvalidRecordSize.into());
        }

        let offset = align_up(current_tail, super::RECORD_ALIGNMENT);
        if offset > OVERFLOW_THRESHOLD || offset.checked_add(size).is_none() {
            return Err(StoreError::AllocOverflow { offset }.into());
        }

        Ok(RecordAllocation {
            offset,
            new_tail: offset + size,
        })
    }
}

/// Stateful allocator with pending-batch support.
///
/// Thin shell over `PageAlloc`: the only state is the pair of tails and the
/// pending flag.
#[derive(Debug)]
pub struct Allocator {
    alloc: PageAlloc,
    committed_tail: u64,
    current_tail: u64,
    pending_active: bool,
}

impl Allocator {
    pub fn new(page_size: u32, initial_tail: u64) -> Result<Self> {
        Ok(Self {
            alloc: PageAlloc::new(page_size)?,
            committed_tail: initial_tail,
            current_tail: initial_tail,
            pending_active: false,
        })
    }

    pub fn page_size(&self) -> u32 {
        self.alloc.page_size()
    }

    pub fn tail(&self) -> u64 {
        self.current_tail
    }

    pub fn committed_tail(&self) -> u64 {
        self.committed_tail
    }

    pub fn is_pending(&self) -> bool {
        self.pending_active
    }

    pub fn allocate_page(&mut self) -> Result<PageAllocation> {
        let allocation = self.alloc.allocate_page(self.current_tail)?;
        self.advance(allocation.new_tail);
        Ok(allocation)
    }

    pub fn allocate_record(&mut self, size: u64) -> Result<RecordAllocation> {
        let allocation = self.alloc.allocate_record(self.current_tail, size)?;
        self.advance(allocation.new_tail);
        Ok(allocation)
    }

    /// Starts a pending batch: subsequent allocations stay uncommitted until
    /// `commit_pending` or `rollback_pending`.
    pub fn begin_pending(&mut self) -> Result<()> {
        if self.pending_active {
            bail!("already in pending mode");
        }
        self.pending_active = true;
        Ok(())
    }

    pub fn commit_pending(&mut self) -> Result<()> {
        if !self.pending_active {
            bail!("not in pending mode");
        }
        self.committed_tail = self.current_tail;
        self.pending_active = false;
        Ok(())
    }

    /// Discards every allocation made since `begin_pending`.
    pub fn rollback_pending(&mut self) -> Result<()> {
        if !self.pending_active {
            bail!("not in pending mode");
        }
        self.current_tail = self.committed_tail;
        self.pending_active = false;
        Ok(())
    }

    fn advance(&mut self, new_tail: u64) {
        self.current_tail = new_tail;
        if !self.pending_active {
            self.committed_tail = new_tail;
        }
    }
}

fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}
