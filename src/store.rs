//! Persistent byte store (the microcontroller's EEPROM).
//!
//! Layout, for a store of `capacity` bytes:
//! - RAM snapshots in 16-byte slots from offset 0 upward
//! - the last [`CONFIG_REGION_LEN`] bytes are reserved for configuration; the
//!   breakpoint record sits at the very top of that region

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::StoreError;
use crate::isa::RAM_SIZE;

pub const CONFIG_REGION_LEN: usize = 16;
pub const SNAPSHOT_LEN: usize = RAM_SIZE;

/// Value of an erased cell.
pub const ERASED: u8 = 0xFF;

/// A flat, bounds-checked, byte-addressable store.
pub trait ByteStore {
    fn capacity(&self) -> usize;

    /// Fill `buf` from `offset`. Fails if the range leaves the store.
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), StoreError>;

    /// Write `bytes` at `offset`. Fails without writing anything if the range
    /// leaves the store.
    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), StoreError>;

    fn check_bounds(&self, offset: usize, len: usize) -> Result<(), StoreError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.capacity() => Ok(()),
            _ => Err(StoreError::OutOfBounds {
                offset,
                len,
                capacity: self.capacity(),
            }),
        }
    }

    /// Number of snapshot slots below the configuration region.
    fn snapshot_slots(&self) -> usize {
        self.capacity().saturating_sub(CONFIG_REGION_LEN) / SNAPSHOT_LEN
    }
}

/// Store kept in RAM, erased to [`ERASED`].
#[derive(Debug, Clone)]
pub struct MemoryStore {
    bytes: Vec<u8>,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![ERASED; capacity],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl ByteStore for MemoryStore {
    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), StoreError> {
        self.check_bounds(offset, buf.len())?;
        buf.copy_from_slice(&self.bytes[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), StoreError> {
        self.check_bounds(offset, bytes.len())?;
        self.bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

/// Store backed by an image file, used when running against the simulator so
/// breakpoints and snapshots survive between invocations.
#[derive(Debug)]
pub struct FileStore {
    file: File,
    capacity: usize,
}

impl FileStore {
    /// Open (or create) the image at `path`, padding it to `capacity` with
    /// erased cells.
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let len = file.metadata()?.len() as usize;
        if len < capacity {
            file.seek(SeekFrom::Start(len as u64))?;
            file.write_all(&vec![ERASED; capacity - len])?;
            file.flush()?;
            tracing::info!(path = %path.display(), capacity, "initialised store image");
        }

        Ok(Self { file, capacity })
    }
}

impl ByteStore for FileStore {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), StoreError> {
        self.check_bounds(offset, buf.len())?;
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), StoreError> {
        self.check_bounds(offset, bytes.len())?;
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.write_all(bytes)?;
        self.file.flush()?;
        Ok(())
    }
}
