//! Free-run and single-step execution with breakpoints.

use std::fmt;

use crate::breakpoints::BreakpointSet;
use crate::bus::{self, wait_cycle, Timing};
use crate::hal::{Board, CriticalSection};
use crate::isa::{self, ADDRESS_MASK, OPCODE_HLT};

/// How many instructions a `run` may execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunLimit {
    Steps(u32),
    /// Until a breakpoint, a halt or host input. Still capped internally.
    Unbounded,
}

impl RunLimit {
    fn cap(self, unbounded_cap: u32) -> u32 {
        match self {
            RunLimit::Steps(n) => n,
            RunLimit::Unbounded => unbounded_cap,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Serial data is waiting; the caller should drain it.
    HostInput,
    /// The next instruction is HLT.
    Halted,
    /// Stopped in front of the instruction at `pc`.
    Breakpoint { pc: u8 },
    /// The instruction budget ran out.
    LimitReached,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::HostInput => write!(f, "stopped by host input"),
            RunOutcome::Halted => write!(f, "halted"),
            RunOutcome::Breakpoint { pc } => write!(f, "breakpoint at {pc:X}"),
            RunOutcome::LimitReached => write!(f, "step limit reached"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Instructions that completed.
    pub executed: u32,
    /// Program counter the target is parked at.
    pub pc: u8,
}

/// Let the target execute until a stop condition.
///
/// Starts and ends parked. The whole run is one critical section: phase
/// tracking is done by counting clock cycles, so a missed edge would put the
/// programmer out of step with the target. Every exit re-parks the target in
/// the fetch step of the instruction it stopped in front of.
pub fn run<B: Board + ?Sized>(
    board: &mut B,
    timing: Timing,
    breakpoints: &BreakpointSet,
    limit: RunLimit,
    unbounded_cap: u32,
) -> RunReport {
    let max = limit.cap(unbounded_cap);
    let span = tracing::info_span!("run", ?limit, max, breakpoints = breakpoints.len());
    let _guard = span.enter();

    let mut cs = CriticalSection::enter(board);
    let mut executed = 0u32;

    // the target picks up at its first fetch step
    bus::release_control(&mut *cs, true, timing);

    let (outcome, pc) = loop {
        // T0: the program counter is on the bus
        let pc = cs.read_data() & ADDRESS_MASK;

        if executed >= max {
            break (RunOutcome::LimitReached, pc);
        }

        // a breakpoint at the starting location must not fire again
        if executed > 0 && breakpoints.contains(pc) {
            tracing::debug!("breakpoint hit at {:X}", pc);
            break (RunOutcome::Breakpoint { pc }, pc);
        }

        if cs.host_input_pending() {
            tracing::debug!("host input pending, stopping at {:X}", pc);
            break (RunOutcome::HostInput, pc);
        }

        // T1: the opcode is on the bus
        wait_cycle(&mut *cs, timing);
        let opcode = cs.read_data();
        if opcode & 0xF0 == OPCODE_HLT {
            tracing::debug!("HLT at {:X}", pc);
            break (RunOutcome::Halted, pc);
        }

        let desc = isa::decode(opcode);
        tracing::trace!("{:X}: {:02X} {}", pc, opcode, desc);

        // finish T1, then sit out the remaining micro-steps
        wait_cycle(&mut *cs, timing);
        for _ in 0..desc.idle_cycles {
            wait_cycle(&mut *cs, timing);
        }
        executed += 1;
    };

    // still in the low phase of T0 (or T1 for HLT): park before the next edge
    bus::acquire_control(&mut *cs);

    tracing::info!(%outcome, executed, "run finished");
    RunReport {
        outcome,
        executed,
        pc,
    }
}
