//! The programmer: one owner for the board, the persistent store and the
//! breakpoint set, exposing every operation the console layer calls.

#[cfg(test)]
mod tests;

use crate::analog;
use crate::assembler::{self, AssemblyReport};
use crate::breakpoints::BreakpointSet;
use crate::bus::{self, Timing};
use crate::config::ProgrammerConfig;
use crate::disassembler::{self, DisassembledLine};
use crate::error::{ProgrammerError, TransferError};
use crate::execution::{self, RunLimit, RunOutcome, RunReport};
use crate::hal::Board;
use crate::isa::{ADDRESS_MASK, OPCODE_JMP, RAM_SIZE};
use crate::store::{ByteStore, SNAPSHOT_LEN};
use crate::transfer::{self, RamAccess};

pub struct Programmer<B: Board, S: ByteStore> {
    board: B,
    store: S,
    breakpoints: BreakpointSet,
    config: ProgrammerConfig,
    timing: Timing,
}

impl<B: Board, S: ByteStore> Programmer<B, S> {
    /// Take over the bus and load the persisted breakpoints.
    ///
    /// Whatever the target was doing is interrupted; from here on the target
    /// is parked between operations.
    pub fn new(mut board: B, mut store: S, config: ProgrammerConfig) -> Result<Self, ProgrammerError> {
        let span = tracing::info_span!("programmer_init", store_capacity = store.capacity());
        let _guard = span.enter();

        let breakpoints = BreakpointSet::load(&mut store)?;
        bus::acquire_control(&mut board);
        tracing::info!(breakpoints = breakpoints.len(), "target parked");

        let timing = config.timing();
        Ok(Self {
            board,
            store,
            breakpoints,
            config,
            timing,
        })
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ProgrammerConfig {
        &self.config
    }

    pub fn into_parts(self) -> (B, S) {
        (self.board, self.store)
    }

    pub fn read_program_counter(&mut self) -> u8 {
        transfer::read_program_counter(&mut self.board, self.timing)
    }

    /// Redirect execution to `value`.
    ///
    /// There is no direct way to load the PC, so a `JMP value` is patched over
    /// the instruction at the current PC, executed once, and the original byte
    /// is put back.
    pub fn set_program_counter(&mut self, value: u8) -> Result<(), ProgrammerError> {
        let value = value & ADDRESS_MASK;
        let span = tracing::info_span!("set_program_counter", value);
        let _guard = span.enter();

        let pc = self.read_program_counter();
        if pc == value {
            tracing::debug!("already at {:X}", pc);
            return Ok(());
        }

        let original = self.read_byte(pc)?;
        self.write_byte(pc, OPCODE_JMP | value)?;
        let report = self.run_raw(RunLimit::Steps(1), &BreakpointSet::new());
        self.write_byte(pc, original)?;

        match report.outcome {
            RunOutcome::LimitReached => {
                tracing::debug!("program counter moved {:X} -> {:X}", pc, report.pc);
                Ok(())
            }
            RunOutcome::HostInput => Err(ProgrammerError::Interrupted),
            RunOutcome::Halted | RunOutcome::Breakpoint { .. } => Err(ProgrammerError::Halted),
        }
    }
}

impl<B: Board, S: ByteStore> Programmer<B, S> {
    fn run_raw(&mut self, limit: RunLimit, breakpoints: &BreakpointSet) -> RunReport {
        execution::run(
            &mut self.board,
            self.timing,
            breakpoints,
            limit,
            self.config.unbounded_run_cap,
        )
    }

    pub fn run(&mut self, limit: RunLimit) -> RunReport {
        execution::run(
            &mut self.board,
            self.timing,
            &self.breakpoints,
            limit,
            self.config.unbounded_run_cap,
        )
    }

    /// Execute exactly one instruction.
    pub fn step(&mut self) -> RunReport {
        self.run(RunLimit::Steps(1))
    }

    /// Block until the operator stops the target clock. Returns the clock
    /// period measured before it stopped, in microseconds.
    pub fn await_clock_stopped(&mut self) -> u64 {
        bus::wait_for_clock_stop(&mut self.board, self.timing)
    }
}

impl<B: Board, S: ByteStore> Programmer<B, S> {
    pub fn breakpoints(&self) -> &BreakpointSet {
        &self.breakpoints
    }

    pub fn add_breakpoint(&mut self, pc: u8) -> Result<(), ProgrammerError> {
        Ok(self.breakpoints.add(pc, &mut self.store)?)
    }

    pub fn remove_breakpoint(&mut self, pc: u8) -> Result<(), ProgrammerError> {
        Ok(self.breakpoints.remove(pc, &mut self.store)?)
    }

    pub fn remove_all_breakpoints(&mut self) -> Result<(), ProgrammerError> {
        Ok(self.breakpoints.remove_all(&mut self.store)?)
    }

    fn snapshot_offset(&self, slot: usize) -> Result<usize, ProgrammerError> {
        let slots = self.store.snapshot_slots();
        if slot >= slots {
            return Err(ProgrammerError::SnapshotSlot { slot, slots });
        }
        Ok(slot * SNAPSHOT_LEN)
    }

    /// Copy the whole target RAM into snapshot `slot`.
    pub fn save_snapshot(&mut self, slot: usize) -> Result<(), ProgrammerError> {
        let offset = self.snapshot_offset(slot)?;
        let mut image = [0u8; RAM_SIZE];
        self.read_block(0, &mut image)?;
        self.store.write(offset, &image)?;
        tracing::info!(slot, "saved RAM snapshot");
        Ok(())
    }

    /// Restore the target RAM from snapshot `slot`.
    pub fn load_snapshot(&mut self, slot: usize) -> Result<(), ProgrammerError> {
        let offset = self.snapshot_offset(slot)?;
        let mut image = [0u8; RAM_SIZE];
        self.store.read(offset, &mut image)?;
        self.write_block(0, &image)?;
        tracing::info!(slot, "loaded RAM snapshot");
        Ok(())
    }
}

impl<B: Board, S: ByteStore> Programmer<B, S> {
    pub fn assemble(&mut self, source: &str, origin: u8) -> AssemblyReport {
        assembler::assemble(self, source, origin)
    }

    pub fn disassemble(
        &mut self,
        address: u8,
        count: usize,
    ) -> Result<Vec<DisassembledLine>, ProgrammerError> {
        Ok(disassembler::disassemble(self, address, count)?)
    }

    /// Position (0..positions) of a multi-position switch wired to an analog
    /// input.
    pub fn switch_position(&mut self, channel: u8, positions: u8) -> u8 {
        let level = analog::averaged_level(&mut self.board, channel, self.config.analog_samples);
        analog::quantize(level, positions)
    }
}

impl<B: Board, S: ByteStore> RamAccess for Programmer<B, S> {
    fn read_block(&mut self, start: u8, buf: &mut [u8]) -> Result<(), TransferError> {
        transfer::read_block(&mut self.board, self.timing, start, buf)
    }

    fn write_block(&mut self, start: u8, bytes: &[u8]) -> Result<(), TransferError> {
        transfer::write_block(&mut self.board, self.timing, start, bytes)
    }
}
