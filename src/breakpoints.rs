//! Persistent breakpoint set.

use crate::error::BreakpointError;
use crate::isa::RAM_SIZE;
use crate::store::{ByteStore, ERASED};

pub const MAX_BREAKPOINTS: usize = 10;

/// Bytes used by the persisted record: a count byte and one byte per slot.
pub const RECORD_LEN: usize = MAX_BREAKPOINTS + 1;

/// At most [`MAX_BREAKPOINTS`] distinct program-counter values, kept in the
/// order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakpointSet {
    addresses: Vec<u8>,
}

impl BreakpointSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn contains(&self, pc: u8) -> bool {
        self.addresses.contains(&pc)
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.addresses.iter().copied()
    }

    fn record_offset(store: &dyn ByteStore) -> usize {
        store.capacity().saturating_sub(RECORD_LEN)
    }

    /// Load the set from the top of the store's configuration region. An
    /// erased or corrupt record loads as an empty set.
    pub fn load(store: &mut dyn ByteStore) -> Result<Self, BreakpointError> {
        let mut record = [ERASED; RECORD_LEN];
        let offset = Self::record_offset(store);
        store.read(offset, &mut record)?;

        let count = record[RECORD_LEN - 1] as usize;
        if count > MAX_BREAKPOINTS {
            tracing::debug!(count, "no breakpoint record in store");
            return Ok(Self::new());
        }

        let mut set = Self::new();
        for i in 0..count {
            let pc = record[RECORD_LEN - 2 - i];
            if pc as usize >= RAM_SIZE || set.contains(pc) {
                tracing::warn!(pc, "corrupt breakpoint record, discarding it");
                return Ok(Self::new());
            }
            set.addresses.push(pc);
        }

        tracing::info!(count = set.len(), "loaded breakpoints");
        Ok(set)
    }

    /// Persist the whole set in one store write: count byte at the top of the
    /// region, values below it from the highest address down.
    pub fn persist(&self, store: &mut dyn ByteStore) -> Result<(), BreakpointError> {
        let mut record = [ERASED; RECORD_LEN];
        record[RECORD_LEN - 1] = self.addresses.len() as u8;
        for (i, &pc) in self.addresses.iter().enumerate() {
            record[RECORD_LEN - 2 - i] = pc;
        }

        let offset = Self::record_offset(store);
        store.write(offset, &record)?;
        Ok(())
    }

    /// Add `pc` and persist. The in-memory set only changes if the store write
    /// succeeded.
    pub fn add(&mut self, pc: u8, store: &mut dyn ByteStore) -> Result<(), BreakpointError> {
        if pc as usize >= RAM_SIZE {
            return Err(BreakpointError::OutOfRange(pc));
        }
        if self.contains(pc) {
            return Err(BreakpointError::AlreadyExists(pc));
        }
        if self.addresses.len() >= MAX_BREAKPOINTS {
            return Err(BreakpointError::Full {
                capacity: MAX_BREAKPOINTS,
            });
        }

        let mut next = self.clone();
        next.addresses.push(pc);
        next.persist(store)?;
        *self = next;

        tracing::debug!("breakpoint added at {:X}", pc);
        Ok(())
    }

    pub fn remove(&mut self, pc: u8, store: &mut dyn ByteStore) -> Result<(), BreakpointError> {
        let Some(index) = self.addresses.iter().position(|&a| a == pc) else {
            return Err(BreakpointError::NotFound(pc));
        };

        let mut next = self.clone();
        next.addresses.remove(index);
        next.persist(store)?;
        *self = next;

        tracing::debug!("breakpoint removed at {:X}", pc);
        Ok(())
    }

    pub fn remove_all(&mut self, store: &mut dyn ByteStore) -> Result<(), BreakpointError> {
        let next = Self::new();
        next.persist(store)?;
        *self = next;
        tracing::debug!("all breakpoints removed");
        Ok(())
    }
}
