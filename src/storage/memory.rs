//! # In-Memory Storage
//!
//! `MemoryStorage` backs a store with a growable byte buffer. It exists for
//! tests and for ephemeral stores that never touch disk, and it must behave
//! exactly like `FileStorage` at the `Storage` trait boundary.
//!
//! An optional memory limit caps the logical size; breaching it fails with
//! `StoreError::MemoryLimit` rather than aborting the process. The buffer
//! grows by doubling to amortize reallocation.

use eyre::Result;

use super::Storage;
use crate::error::StoreError;

const INITIAL_CAPACITY: usize = 4096;

#[derive(Debug)]
pub struct MemoryStorage {
    data: Vec<u8>,
    size: u64,
    memory_limit: u64,
    closed: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_limit(u64::MAX)
    }

    /// Creates a storage whose logical size may never exceed `memory_limit`
    /// bytes.
    pub fn with_limit(memory_limit: u64) -> Self {
        Self {
            data: vec![0; INITIAL_CAPACITY],
            size: 0,
            memory_limit,
            closed: false,
        }
    }

    /// Releases the buffer. Every subsequent call fails with
    /// `StoreError::Closed`.
    pub fn close(&mut self) {
        self.closed = true;
        self.data = Vec::new();
    }

    /// Copy of the live bytes, for export and compaction tooling.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.check_open()?;
        Ok(self.data[..self.size as usize].to_vec())
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(StoreError::Closed.into());
        }
        Ok(())
    }

    fn ensure_capacity(&mut self, required: u64) -> Result<()> {
        if required > self.memory_limit {
            return Err(StoreError::MemoryLimit {
                required,
                limit: self.memory_limit,
            }
            .into());
        }
        if required > self.data.len() as u64 {
            let mut new_capacity = self.data.len().max(1);
            while (new_capacity as u64) < required {
                new_capacity = new_capacity.saturating_mul(2);
            }
            self.data.resize(new_capacity, 0);
        }
        Ok(())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.check_open()?;
        let end = offset.checked_add(buf.len() as u64);
        if end.map_or(true, |end| end > self.size) {
            return Err(StoreError::OutOfBounds {
                offset,
                len: buf.len() as u64,
                size: self.size,
            }
            .into());
        }
        let start = offset as usize;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.check_open()?;
        let required =
            offset
                .checked_add(data.len() as u64)
                .ok_or(StoreError::OutOfBounds {
                    offset,
                    len: data.len() as u64,
                    size: self.size,
                })?;
        self.ensure_capacity(required)?;
        let start = offset as usize;
        self.data[start..start + data.len()].copy_from_slice(data);
        if required > self.size {
            self.size = required;
        }
        Ok(())
    }

    fn extend(&mut self, new_size: u64) -> Result<()> {
        self.check_open()?;
        self.ensure_capacity(new_size)?;
        if new_size > self.size {
            self.size = new_size;
        }
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> Result<()> {
        self.check_open()?;
        if new_size < self.size {
            self.size = new_size;
        }
        Ok(())
    }

    fn force(&mut self, _metadata: bool) -> Result<()> {
        self.check_open()
    }

    fn size(&self) -> Result<u64> {
        self.check_open()?;
        Ok(self.size)
    }
}
