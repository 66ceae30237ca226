//! RAM and program-counter transfers.
//!
//! This is the only path by which anything touches target memory. All
//! transfers assume the programmer is parked as bus master (see
//! [`crate::bus::acquire_control`]).

use crate::bus::{self, wait_level, Timing};
use crate::error::TransferError;
use crate::hal::{Board, ControlLine, CriticalSection, Direction, Level};
use crate::isa::{ADDRESS_MASK, RAM_SIZE};

/// Byte-addressable access to a RAM image, either the real target or an
/// offline buffer. The assembler and disassembler only ever see this.
pub trait RamAccess {
    fn read_block(&mut self, start: u8, buf: &mut [u8]) -> Result<(), TransferError>;
    fn write_block(&mut self, start: u8, bytes: &[u8]) -> Result<(), TransferError>;

    fn read_byte(&mut self, address: u8) -> Result<u8, TransferError> {
        let mut byte = [0u8];
        self.read_block(address, &mut byte)?;
        Ok(byte[0])
    }

    fn write_byte(&mut self, address: u8, value: u8) -> Result<(), TransferError> {
        self.write_block(address, &[value])
    }
}

pub fn check_range(start: u8, count: usize) -> Result<(), TransferError> {
    if (start as usize).saturating_add(count) > RAM_SIZE {
        return Err(TransferError::OutOfRange {
            start,
            count,
            size: RAM_SIZE,
        });
    }
    Ok(())
}

/// An in-memory RAM image with the same bounds as the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RamImage(pub [u8; RAM_SIZE]);

impl RamImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> &[u8; RAM_SIZE] {
        &self.0
    }
}

impl RamAccess for RamImage {
    fn read_block(&mut self, start: u8, buf: &mut [u8]) -> Result<(), TransferError> {
        check_range(start, buf.len())?;
        let start = start as usize;
        buf.copy_from_slice(&self.0[start..start + buf.len()]);
        Ok(())
    }

    fn write_block(&mut self, start: u8, bytes: &[u8]) -> Result<(), TransferError> {
        check_range(start, bytes.len())?;
        let start = start as usize;
        self.0[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

/// Latch `address` into the target's memory address register.
///
/// Starts in a clock low phase and returns in the following high phase, just
/// after the rising edge that latched the address.
fn latch_address<B: Board + ?Sized>(board: &mut B, address: u8, timing: Timing) {
    wait_level(board, Level::Low, timing);
    board.set_data_direction(Direction::Output);
    board.write_data(address & ADDRESS_MASK);
    board.set_control(ControlLine::AddressIn, Level::High);
    wait_level(board, Level::High, timing);
    board.set_control(ControlLine::AddressIn, Level::Low);
}

/// Read `buf.len()` bytes starting at `start`, one byte per clock cycle.
pub fn read_block<B: Board + ?Sized>(
    board: &mut B,
    timing: Timing,
    start: u8,
    buf: &mut [u8],
) -> Result<(), TransferError> {
    check_range(start, buf.len())?;

    let span = tracing::debug_span!("read_block", start, count = buf.len());
    let _guard = span.enter();

    let mut cs = CriticalSection::enter(board);
    wait_level(&mut *cs, Level::High, timing);

    for (offset, slot) in buf.iter_mut().enumerate() {
        let address = start + offset as u8;
        latch_address(&mut *cs, address, timing);

        // RAM drives the bus while RO is high
        cs.set_data_direction(Direction::Input);
        cs.set_control(ControlLine::RamOut, Level::High);
        *slot = cs.read_data();
        cs.set_control(ControlLine::RamOut, Level::Low);

        tracing::trace!("read RAM[{:X}] = {:02X}", address, *slot);
    }

    cs.set_data_direction(Direction::Input);
    Ok(())
}

/// Write `bytes` starting at `start`, one byte per clock cycle.
pub fn write_block<B: Board + ?Sized>(
    board: &mut B,
    timing: Timing,
    start: u8,
    bytes: &[u8],
) -> Result<(), TransferError> {
    check_range(start, bytes.len())?;

    let span = tracing::debug_span!("write_block", start, count = bytes.len());
    let _guard = span.enter();

    let mut cs = CriticalSection::enter(board);
    wait_level(&mut *cs, Level::High, timing);

    for (offset, &value) in bytes.iter().enumerate() {
        let address = start + offset as u8;
        latch_address(&mut *cs, address, timing);

        // the RAM is write-enabled while RI and the clock are both high
        cs.write_data(value);
        cs.set_control(ControlLine::RamIn, Level::High);
        cs.set_control(ControlLine::RamIn, Level::Low);

        tracing::trace!("wrote RAM[{:X}] = {:02X}", address, value);
    }

    cs.set_data_direction(Direction::Input);
    Ok(())
}

/// Sample the program counter during the next fetch step.
///
/// The target is released at a falling edge, the PC is read while the
/// sequencer's first step drives it onto the bus, and the target is parked
/// again in the same low phase so the instruction never starts.
pub fn read_program_counter<B: Board + ?Sized>(board: &mut B, timing: Timing) -> u8 {
    let mut cs = CriticalSection::enter(board);

    bus::release_control(&mut *cs, true, timing);
    let pc = cs.read_data() & ADDRESS_MASK;
    bus::acquire_control(&mut *cs);

    tracing::debug!("program counter = {:X}", pc);
    pc
}
