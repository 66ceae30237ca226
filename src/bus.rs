//! Bus ownership and clock synchronization.
//!
//! The target's clock is external and may be paused by the operator at any
//! time, so every wait here can block indefinitely. The only bound is an
//! advisory diagnostic.

use crate::hal::{Board, ControlLine, CriticalSection, Direction, Level};

/// Timing parameters for the clock waits, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// No-edge window after which `wait_level` logs a diagnostic.
    pub edge_warning_us: u64,
    /// Minimum silence before `wait_for_clock_stop` reports a stopped clock.
    pub clock_stop_floor_us: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            edge_warning_us: 2_000_000,
            clock_stop_floor_us: 100_000,
        }
    }
}

/// Block until the clock line reads `level`.
///
/// Logs one warning if nothing happens for `timing.edge_warning_us`, then keeps
/// waiting. Never times out.
pub fn wait_level<B: Board + ?Sized>(board: &mut B, level: Level, timing: Timing) {
    if board.clock() == level {
        return;
    }

    let started = board.micros();
    let mut warned = false;
    while board.clock() != level {
        if !warned && board.micros().saturating_sub(started) >= timing.edge_warning_us {
            tracing::warn!(
                waiting_for = ?level,
                after_ms = timing.edge_warning_us / 1000,
                "no clock edge seen, is the target clock running?"
            );
            warned = true;
        }
    }
}

/// Wait for one full high -> low transition, returning at the start of a low
/// phase.
pub fn wait_cycle<B: Board + ?Sized>(board: &mut B, timing: Timing) {
    wait_level(board, Level::High, timing);
    wait_level(board, Level::Low, timing);
}

/// Become bus master: drive MI/RI/RO low as outputs, then disable the
/// target's control ROM. The target's sequencer is held at its first step
/// until control is released.
pub fn acquire_control<B: Board + ?Sized>(board: &mut B) {
    let mut cs = CriticalSection::enter(board);

    for line in ControlLine::ALL {
        cs.set_control(line, Level::Low);
        cs.set_control_direction(line, Direction::Output);
    }
    cs.set_data_direction(Direction::Input);
    cs.set_control_rom_enabled(false);

    tracing::trace!("acquired bus control");
}

/// Hand the control lines back to the target.
///
/// With `wait_for_edge` the hand-over happens right after a falling clock
/// edge, so the target's sequencer starts with a full fetch step. Releasing in
/// the middle of a high phase makes the target skip that step.
pub fn release_control<B: Board + ?Sized>(board: &mut B, wait_for_edge: bool, timing: Timing) {
    let mut cs = CriticalSection::enter(board);

    if wait_for_edge {
        wait_cycle(&mut *cs, timing);
    }

    cs.set_data_direction(Direction::Input);
    for line in ControlLine::ALL {
        cs.set_control_direction(line, Direction::Input);
    }
    cs.set_control_rom_enabled(true);

    tracing::trace!(wait_for_edge, "released bus control");
}

/// Block until the clock has stopped.
///
/// Measures one nominal period first, then waits until a period longer than
/// twice that (and at least `timing.clock_stop_floor_us`) goes by without a
/// rising edge. Returns the measured baseline period in microseconds.
pub fn wait_for_clock_stop<B: Board + ?Sized>(board: &mut B, timing: Timing) -> u64 {
    let span = tracing::debug_span!("wait_for_clock_stop");
    let _guard = span.enter();

    wait_level(board, Level::Low, timing);
    wait_level(board, Level::High, timing);
    let first_rise = board.micros();
    wait_cycle(board, timing);
    wait_level(board, Level::High, timing);
    let baseline = board.micros().saturating_sub(first_rise).max(1);

    let threshold = baseline.saturating_mul(2).max(timing.clock_stop_floor_us);
    tracing::debug!(baseline_us = baseline, threshold_us = threshold, "clock period measured");

    let mut last_rise = board.micros();
    let mut last_level = Level::High;
    loop {
        let level = board.clock();
        let now = board.micros();
        if level != last_level {
            if level.is_high() {
                last_rise = now;
            }
            last_level = level;
        } else if now.saturating_sub(last_rise) > threshold {
            tracing::debug!(silent_us = now - last_rise, "clock stopped");
            return baseline;
        }
    }
}
