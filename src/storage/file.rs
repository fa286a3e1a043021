//! # Memory-Mapped File Storage
//!
//! `FileStorage` backs a store with a single file mapped into the process
//! address space. Reads copy out of the map; writes copy into it; `force()`
//! performs an msync-equivalent flush.
//!
//! ## Resizing
//!
//! A mapped region becomes invalid when the file is resized, so `extend` and
//! `truncate` flush the current map, call `set_len`, and remap. Both take
//! `&mut self`; the borrow checker guarantees no slice into the old map can
//! survive across the remap. An empty file carries no map at all.
//!
//! ## Read-Only Mode
//!
//! `open_read_only` maps the file immutably. Any mutating call fails with
//! `StoreError::ReadOnly`. Verification tooling opens stores this way so it
//! cannot damage them.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};
use memmap2::{Mmap, MmapMut};

use super::Storage;
use crate::error::StoreError;

#[derive(Debug)]
enum MapKind {
    ReadWrite(MmapMut),
    ReadOnly(Mmap),
}

#[derive(Debug)]
pub struct FileStorage {
    file: File,
    map: Option<MapKind>,
    size: u64,
    read_only: bool,
    closed: bool,
    path: PathBuf,
}

impl FileStorage {
    /// Creates a new, empty store file. Fails if the file already exists.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(StoreError::Io)
            .wrap_err_with(|| format!("failed to create store file '{}'", path.display()))?;

        Ok(Self {
            file,
            map: None,
            size: 0,
            read_only: false,
            closed: false,
            path: path.to_path_buf(),
        })
    }

    /// Opens an existing store file for reading and writing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_inner(path.as_ref(), false)
    }

    /// Opens an existing store file read-only. Mutating calls fail with
    /// `StoreError::ReadOnly`.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_inner(path.as_ref(), true)
    }

    fn open_inner(path: &Path, read_only: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(!read_only)
            .open(path)
            .map_err(StoreError::Io)
            .wrap_err_with(|| format!("failed to open store file '{}'", path.display()))?;

        let size = file
            .metadata()
            .map_err(StoreError::Io)
            .wrap_err_with(|| format!("failed to stat '{}'", path.display()))?
            .len();

        let mut storage = Self {
            file,
            map: None,
            size,
            read_only,
            closed: false,
            path: path.to_path_buf(),
        };
        storage.remap()?;
        Ok(storage)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Flushes and drops the map. Every subsequent call fails with
    /// `StoreError::Closed`.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if let Some(MapKind::ReadWrite(map)) = &self.map {
            map.flush().map_err(StoreError::Io)?;
        }
        self.map = None;
        self.closed = true;
        Ok(())
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(StoreError::Closed.into());
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(StoreError::ReadOnly.into());
        }
        Ok(())
    }

    fn remap(&mut self) -> Result<()> {
        // Drop the old map before remapping so the file is not double-mapped.
        self.map = None;

        if self.size == 0 {
            return Ok(());
        }

        // SAFETY: mapping a file is unsafe because external processes could
        // mutate it underneath us. This is safe in practice because:
        // 1. Store files are owned by a single process (the caller is
        //    responsible for process-level locking).
        // 2. The map's lifetime is tied to FileStorage; resizing takes
        //    &mut self, so no slice into the old map can outlive it.
        // 3. All access is bounds-checked against the logical size.
        let map = if self.read_only {
            MapKind::ReadOnly(unsafe {
                Mmap::map(&self.file)
                    .map_err(StoreError::Io)
                    .wrap_err_with(|| format!("failed to map '{}'", self.path.display()))?
            })
        } else {
            MapKind::ReadWrite(unsafe {
                MmapMut::map_mut(&self.file)
                    .map_err(StoreError::Io)
                    .wrap_err_with(|| format!("failed to map '{}'", self.path.display()))?
            })
        };
        self.map = Some(map);
        Ok(())
    }

    fn set_len(&mut self, new_size: u64) -> Result<()> {
        if let Some(MapKind::ReadWrite(map)) = &self.map {
            map.flush().map_err(StoreError::Io)?;
        }
        self.file
            .set_len(new_size)
            .map_err(StoreError::Io)
            .wrap_err_with(|| format!("failed to resize '{}' to {}", self.path.display(), new_size))?;
        self.size = new_size;
        self.remap()
    }

    fn bytes(&self) -> &[u8] {
        match &self.map {
            Some(MapKind::ReadWrite(map)) => map,
            Some(MapKind::ReadOnly(map)) => map,
            None => &[],
        }
    }
}

impl Storage for FileStorage {
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
        buf.copy_from_slice(&self.bytes()[start..start + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.check_open()?;
        self.check_writable()?;
        if data.is_empty() {
            return Ok(());
        }

        let required =
            offset
                .checked_add(data.len() as u64)
                .ok_or(StoreError::OutOfBounds {
                    offset,
                    len: data.len() as u64,
                    size: self.size,
                })?;
        if required > self.size {
            self.set_len(required)?;
        }

        match &mut self.map {
            Some(MapKind::ReadWrite(map)) => {
                let start = offset as usize;
                map[start..start + data.len()].copy_from_slice(data);
                Ok(())
            }
            // Writable storage with a non-zero size always carries a map.
            _ => Err(StoreError::Closed.into()),
        }
    }

    fn extend(&mut self, new_size: u64) -> Result<()> {
        self.check_open()?;
        self.check_writable()?;
        if new_size > self.size {
            self.set_len(new_size)?;
        }
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> Result<()> {
        self.check_open()?;
        self.check_writable()?;
        if new_size < self.size {
            self.set_len(new_size)?;
        }
        Ok(())
    }

    fn force(&mut self, metadata: bool) -> Result<()> {
        self.check_open()?;
        if let Some(MapKind::ReadWrite(map)) = &self.map {
            map.flush().map_err(StoreError::Io)?;
        }
        if metadata {
            self.file.sync_all().map_err(StoreError::Io)?;
        }
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        self.check_open()?;
        Ok(self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_write_read_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");

        let mut storage = FileStorage::create(&path).unwrap();
        storage.write(0, b"cowstore").unwrap();

        let mut buf = [0u8; 8];
        storage.read(0, &mut buf).unwrap();
        assert_eq!(&buf, b"cowstore");
        assert_eq!(storage.size().unwrap(), 8);
    }

    #[test]
    fn create_fails_if_file_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");

        FileStorage::create(&path).unwrap();
        assert!(FileStorage::create(&path).is_err());
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");

        {
            let mut storage = FileStorage::create(&path).unwrap();
            storage.write(100, &[0xDE, 0xAD]).unwrap();
            storage.force(true).unwrap();
        }

        let storage = FileStorage::open(&path).unwrap();
        let mut buf = [0u8; 2];
        storage.read(100, &mut buf).unwrap();
        assert_eq!(buf, [0xDE, 0xAD]);
    }

    #[test]
    fn extend_zero_fills_gap() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");

        let mut storage = FileStorage::create(&path).unwrap();
        storage.write(0, &[0xFF; 4]).unwrap();
        storage.extend(4096).unwrap();

        assert_eq!(storage.size().unwrap(), 4096);
        let mut buf = [0xAAu8; 8];
        storage.read(4, &mut buf).unwrap();
        assert_eq!(buf, [0u8; 8]);
    }

    #[test]
    fn truncate_shrinks_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");

        let mut storage = FileStorage::create(&path).unwrap();
        storage.extend(8192).unwrap();

        storage.truncate(1024).unwrap();
        assert_eq!(storage.size().unwrap(), 1024);

        storage.truncate(4096).unwrap();
        assert_eq!(storage.size().unwrap(), 1024);
    }

    #[test]
    fn read_only_rejects_mutation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");

        {
            let mut storage = FileStorage::create(&path).unwrap();
            storage.write(0, b"ro").unwrap();
        }

        let mut storage = FileStorage::open_read_only(&path).unwrap();

        let mut buf = [0u8; 2];
        storage.read(0, &mut buf).unwrap();
        assert_eq!(&buf, b"ro");

        let err = storage.write(0, b"xx").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::ReadOnly)
        ));
        assert!(storage.extend(100).is_err());
        assert!(storage.truncate(0).is_err());
    }

    #[test]
    fn open_read_only_fails_for_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.db");

        assert!(FileStorage::open_read_only(&path).is_err());
    }

    #[test]
    fn closed_storage_rejects_access() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");

        let mut storage = FileStorage::create(&path).unwrap();
        storage.write(0, b"x").unwrap();
        storage.close().unwrap();

        let mut buf = [0u8; 1];
        let err = storage.read(0, &mut buf).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Closed)
        ));
    }

    #[test]
    fn near_max_offset_is_out_of_bounds_not_overflow() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");

        let mut storage = FileStorage::create(&path).unwrap();
        storage.write(0, &[0u8; 100]).unwrap();

        let mut buf = [0u8; 16];
        let err = storage.read(u64::MAX - 4, &mut buf).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::OutOfBounds { size: 100, .. })
        ));

        let err = storage.write(u64::MAX - 4, &[1u8; 16]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn out_of_bounds_read_is_typed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");

        let mut storage = FileStorage::create(&path).unwrap();
        storage.write(0, &[1, 2, 3]).unwrap();

        let mut buf = [0u8; 8];
        let err = storage.read(0, &mut buf).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::OutOfBounds { size: 3, .. })
        ));
    }
}
