//! Pin-level collaborator contract.
//!
//! The core never touches GPIO registers directly. A hardware backend (or the
//! [`crate::sim`] target) implements [`Board`] and the rest of the firmware is
//! written purely against it.

use std::ops::{Deref, DerefMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// The three control lines the programmer can take over from the target's
/// control ROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlLine {
    /// Memory address register in (`MI`).
    AddressIn,
    /// RAM data in (`RI`).
    RamIn,
    /// RAM data out (`RO`).
    RamOut,
}

impl ControlLine {
    pub const ALL: [ControlLine; 3] = [
        ControlLine::AddressIn,
        ControlLine::RamIn,
        ControlLine::RamOut,
    ];
}

/// Everything the core needs from the microcontroller.
///
/// `clock` and `host_input_pending` are sampled in tight loops; implementations
/// must not block in them.
pub trait Board {
    /// Sample the 8 data bus lines.
    fn read_data(&mut self) -> u8;
    /// Drive the 8 data bus lines (only effective while the bus is an output).
    fn write_data(&mut self, value: u8);
    fn set_data_direction(&mut self, direction: Direction);

    fn set_control(&mut self, line: ControlLine, level: Level);
    fn set_control_direction(&mut self, line: ControlLine, direction: Direction);

    /// Enable or disable the outputs of the target's control ROM. While
    /// disabled the target's sequencer is held at its first step.
    fn set_control_rom_enabled(&mut self, enabled: bool);

    /// Level of the target clock line.
    fn clock(&mut self) -> Level;

    /// Digital status line asserted while host serial data is waiting.
    fn host_input_pending(&mut self) -> bool;

    /// One raw sample of an analog input.
    fn analog_sample(&mut self, channel: u8) -> u16;

    /// Monotonic microsecond counter.
    fn micros(&mut self) -> u64;

    fn interrupts_enabled(&self) -> bool;
    fn disable_interrupts(&mut self);
    fn enable_interrupts(&mut self);
}

/// Scoped suspension of interrupts.
///
/// The previous interrupt state is restored when the guard drops, so early
/// returns out of a bus transaction can never leave interrupts disabled. Guards
/// nest: an inner guard restores "disabled" and the outermost one re-enables.
pub struct CriticalSection<'a, B: Board + ?Sized> {
    board: &'a mut B,
    restore: bool,
}

impl<'a, B: Board + ?Sized> CriticalSection<'a, B> {
    pub fn enter(board: &'a mut B) -> Self {
        let restore = board.interrupts_enabled();
        board.disable_interrupts();
        Self { board, restore }
    }
}

impl<B: Board + ?Sized> Deref for CriticalSection<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        self.board
    }
}

impl<B: Board + ?Sized> DerefMut for CriticalSection<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        self.board
    }
}

impl<B: Board + ?Sized> Drop for CriticalSection<'_, B> {
    fn drop(&mut self) {
        if self.restore {
            self.board.enable_interrupts();
        }
    }
}
