use crate::isa::{ADDRESS_MASK, RAM_SIZE};

use super::control::{self, Signals};

/// Register-level state of the target computer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    pub ram: [u8; RAM_SIZE],

    // Program Counter (4 bits)
    pub pc: u8,
    // Memory address register (4 bits)
    pub mar: u8,
    // instruction register
    pub ir: u8,

    pub a: u8,
    pub b: u8,
    /// Output display register
    pub out: u8,

    pub carry: bool,
    pub zero: bool,

    /// Micro-step counter, 0 is the first fetch step.
    pub step: u8,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    pub fn new() -> Self {
        Self {
            ram: [0; RAM_SIZE],
            pc: 0,
            mar: 0,
            ir: 0,
            a: 0,
            b: 0,
            out: 0,
            carry: false,
            zero: false,
            step: 0,
        }
    }

    /// Control word the ROM currently outputs.
    pub fn rom_word(&self) -> u16 {
        control::control_word(self.ir >> 4, self.step, self.carry, self.zero)
    }

    /// ALU output and the carry/zero flags it would latch.
    pub fn alu(&self, word: u16) -> (u8, bool, bool) {
        let (result, carry) = if word & control::SU != 0 {
            // A + !B + 1, carry set when no borrow
            let sum = self.a as u16 + (!self.b) as u16 + 1;
            (sum as u8, sum > 0xFF)
        } else {
            let sum = self.a as u16 + self.b as u16;
            (sum as u8, sum > 0xFF)
        };
        (result, carry, result == 0)
    }

    /// Value the target itself puts on the bus for `word`, if any.
    pub fn drive_bus(&self, word: u16) -> Option<u8> {
        if word & control::CO != 0 {
            Some(self.pc)
        } else if word & control::RO != 0 {
            Some(self.ram[self.mar as usize])
        } else if word & control::IO != 0 {
            Some(self.ir & 0x0F)
        } else if word & control::AO != 0 {
            Some(self.a)
        } else if word & control::EO != 0 {
            Some(self.alu(word).0)
        } else {
            None
        }
    }

    /// Latch registers on a rising clock edge. `bus` is the bus value just
    /// before the edge.
    pub fn rising_edge(&mut self, word: u16, bus: u8) {
        let span = tracing::trace_span!("rising_edge", step = self.step);
        let _enter = span.enter();

        tracing::trace!("control {} bus {:02X}", Signals(word), bus);

        if word & control::FI != 0 {
            let (_, carry, zero) = self.alu(word);
            self.carry = carry;
            self.zero = zero;
        }
        if word & control::MI != 0 {
            self.mar = bus & ADDRESS_MASK;
        }
        if word & control::II != 0 {
            self.ir = bus;
        }
        if word & control::AI != 0 {
            self.a = bus;
        }
        if word & control::BI != 0 {
            self.b = bus;
        }
        if word & control::OI != 0 {
            self.out = bus;
            tracing::debug!(out = bus, "output register");
        }
        if word & control::J != 0 {
            self.pc = bus & ADDRESS_MASK;
        } else if word & control::CE != 0 {
            self.pc = (self.pc + 1) & ADDRESS_MASK;
        }
    }

    /// Advance the step counter on a falling edge. While the control ROM is
    /// disabled the counter is held at the first step.
    pub fn falling_edge(&mut self, rom_enabled: bool) {
        self.step = if rom_enabled {
            (self.step + 1) % control::STEPS
        } else {
            0
        };
    }

    /// The RAM is written for as long as RI and the clock are both high.
    pub fn ram_write(&mut self, word: u16, clock_high: bool, bus: u8) {
        if clock_high && word & control::RI != 0 {
            self.ram[self.mar as usize] = bus;
        }
    }
}
