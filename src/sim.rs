//! Cycle-level simulation of the target computer behind the [`Board`] trait.
//!
//! Simulated time advances by a fixed cost on every board call, and the
//! target's oscillator toggles on its own schedule, so the programmer code runs
//! against a clock it does not control, the same way it does on hardware.

mod control;
mod machine;

pub use control::{control_word, Signals, STEPS};
pub use machine::Machine;

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::hal::{Board, ControlLine, Direction, Level};
use crate::isa::RAM_SIZE;

/// Number of analog channels the simulated board exposes.
pub const ANALOG_CHANNELS: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Half of the target clock period.
    pub half_period_us: u64,
    /// Simulated time every board call costs the host.
    pub call_cost_us: u64,
    /// Whether the oscillator runs from time zero.
    pub clock_running: bool,
    /// Initial RAM contents.
    pub ram: [u8; RAM_SIZE],
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            half_period_us: 50,
            call_cost_us: 1,
            clock_running: true,
            ram: [0; RAM_SIZE],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    StopClock,
    StartClock,
    HostInput(bool),
}

pub struct SimBoard {
    config: SimConfig,
    now: u64,

    osc_running: bool,
    osc_high: bool,
    next_toggle: u64,
    /// Gated clock as seen by the target (and the programmer).
    clock: bool,
    events: VecDeque<(u64, SimEvent)>,

    interrupts_enabled: bool,
    data_direction: Direction,
    data_out: u8,
    control_levels: [Level; 3],
    control_directions: [Direction; 3],
    rom_enabled: bool,
    host_input: bool,
    analog: [u16; ANALOG_CHANNELS],

    machine: Machine,
    rising_edges: u64,
    /// Clock samples taken while interrupts were enabled.
    unguarded_clock_reads: u64,
}

fn line_index(line: ControlLine) -> usize {
    match line {
        ControlLine::AddressIn => 0,
        ControlLine::RamIn => 1,
        ControlLine::RamOut => 2,
    }
}

const LINE_SIGNALS: [u16; 3] = [control::MI, control::RI, control::RO];

impl SimBoard {
    pub fn new(config: SimConfig) -> Self {
        let mut machine = Machine::new();
        machine.ram = config.ram;

        Self {
            now: 0,
            osc_running: config.clock_running,
            osc_high: false,
            next_toggle: config.half_period_us,
            clock: false,
            events: VecDeque::new(),
            interrupts_enabled: true,
            data_direction: Direction::Input,
            data_out: 0,
            control_levels: [Level::Low; 3],
            control_directions: [Direction::Input; 3],
            rom_enabled: true,
            host_input: false,
            analog: [0; ANALOG_CHANNELS],
            machine,
            rising_edges: 0,
            unguarded_clock_reads: 0,
            config,
        }
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }

    /// Current simulated time in microseconds.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Value latched in the target's output register.
    pub fn output(&self) -> u8 {
        self.machine.out
    }

    pub fn rising_edges(&self) -> u64 {
        self.rising_edges
    }

    /// How many times the clock was sampled with interrupts enabled. Bus
    /// transactions should never add to this.
    pub fn unguarded_clock_reads(&self) -> u64 {
        self.unguarded_clock_reads
    }

    pub fn rom_enabled(&self) -> bool {
        self.rom_enabled
    }

    /// Queue `event` at absolute time `at`.
    pub fn schedule(&mut self, at: u64, event: SimEvent) {
        let index = self
            .events
            .iter()
            .position(|(time, _)| *time > at)
            .unwrap_or(self.events.len());
        self.events.insert(index, (at, event));
    }

    pub fn set_host_input(&mut self, pending: bool) {
        self.host_input = pending;
    }

    pub fn set_analog(&mut self, channel: u8, value: u16) {
        if let Some(slot) = self.analog.get_mut(channel as usize) {
            *slot = value;
        }
    }

    /// Let the simulation run on its own for `us` microseconds, as if the host
    /// were busy elsewhere.
    pub fn advance(&mut self, us: u64) {
        self.now += us;
        self.process_until(self.now);
    }

    fn tick(&mut self) {
        self.now += self.config.call_cost_us;
        self.process_until(self.now);
    }

    fn process_until(&mut self, until: u64) {
        loop {
            let toggle_at = self.osc_running.then_some(self.next_toggle);
            let event_at = self.events.front().map(|(time, _)| *time);

            let (toggle_first, at) = match (toggle_at, event_at) {
                (Some(t), Some(e)) if t <= e => (true, t),
                (Some(t), None) => (true, t),
                (_, Some(e)) => (false, e),
                (None, None) => return,
            };
            if at > until {
                return;
            }

            if toggle_first {
                self.osc_high = !self.osc_high;
                self.next_toggle += self.config.half_period_us;
            } else if let Some((time, event)) = self.events.pop_front() {
                self.apply(time, event);
            }
            self.settle();
        }
    }

    fn apply(&mut self, time: u64, event: SimEvent) {
        tracing::trace!(time, ?event, "sim event");
        match event {
            SimEvent::StopClock => {
                self.osc_running = false;
                self.osc_high = false;
            }
            SimEvent::StartClock => {
                if !self.osc_running {
                    self.osc_running = true;
                    self.osc_high = false;
                    self.next_toggle = time + self.config.half_period_us;
                }
            }
            SimEvent::HostInput(pending) => self.host_input = pending,
        }
    }

    /// Control signals currently asserted, from the ROM and the programmer.
    fn word(&self) -> u16 {
        let mut word = if self.rom_enabled {
            self.machine.rom_word()
        } else {
            0
        };
        for (i, signal) in LINE_SIGNALS.iter().enumerate() {
            if self.control_directions[i] == Direction::Output
                && self.control_levels[i] == Level::High
            {
                word |= signal;
            }
        }
        word
    }

    fn bus(&self, word: u16) -> u8 {
        if self.data_direction == Direction::Output {
            self.data_out
        } else {
            self.machine.drive_bus(word).unwrap_or(0)
        }
    }

    /// Propagate pin and oscillator changes into the machine.
    fn settle(&mut self) {
        loop {
            let halted = self.rom_enabled && self.machine.rom_word() & control::HLT != 0;
            let clock = self.osc_high && !halted;
            if clock == self.clock {
                break;
            }
            self.clock = clock;

            if clock {
                let word = self.word();
                let bus = self.bus(word);
                self.machine.rising_edge(word, bus);
                self.rising_edges += 1;
            } else {
                self.machine.falling_edge(self.rom_enabled);
            }
        }

        let word = self.word();
        let bus = self.bus(word);
        self.machine.ram_write(word, self.clock, bus);
    }
}

impl Board for SimBoard {
    fn read_data(&mut self) -> u8 {
        self.tick();
        self.bus(self.word())
    }

    fn write_data(&mut self, value: u8) {
        self.tick();
        self.data_out = value;
        self.settle();
    }

    fn set_data_direction(&mut self, direction: Direction) {
        self.tick();
        self.data_direction = direction;
        self.settle();
    }

    fn set_control(&mut self, line: ControlLine, level: Level) {
        self.tick();
        self.control_levels[line_index(line)] = level;
        self.settle();
    }

    fn set_control_direction(&mut self, line: ControlLine, direction: Direction) {
        self.tick();
        self.control_directions[line_index(line)] = direction;
        self.settle();
    }

    fn set_control_rom_enabled(&mut self, enabled: bool) {
        self.tick();
        self.rom_enabled = enabled;
        if !enabled {
            self.machine.step = 0;
        }
        self.settle();
    }

    fn clock(&mut self) -> Level {
        if self.interrupts_enabled {
            self.unguarded_clock_reads += 1;
        }
        self.tick();
        Level::from(self.clock)
    }

    fn host_input_pending(&mut self) -> bool {
        self.tick();
        self.host_input
    }

    fn analog_sample(&mut self, channel: u8) -> u16 {
        self.tick();
        self.analog.get(channel as usize).copied().unwrap_or(0)
    }

    fn micros(&mut self) -> u64 {
        self.tick();
        self.now
    }

    fn interrupts_enabled(&self) -> bool {
        self.interrupts_enabled
    }

    fn disable_interrupts(&mut self) {
        self.interrupts_enabled = false;
    }

    fn enable_interrupts(&mut self) {
        self.interrupts_enabled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(bytes: &[u8]) -> SimConfig {
        let mut config = SimConfig::default();
        config.ram[..bytes.len()].copy_from_slice(bytes);
        config
    }

    #[test]
    fn test_free_running_target_executes_and_halts() {
        // LDI 7, ADD 14, OUT, HLT ; [14] = 3
        let mut config = program(&[0x57, 0x2E, 0xE0, 0xF0]);
        config.ram[14] = 3;
        let mut board = SimBoard::new(config);

        board.advance(10_000);

        assert_eq!(board.output(), 10);
        assert_eq!(board.machine().pc, 4);
        assert_eq!(board.clock(), Level::Low);
        let edges = board.rising_edges();
        board.advance(1_000);
        assert_eq!(board.rising_edges(), edges, "halted clock must stay low");
    }

    #[test]
    fn test_conditional_jump_loop_counts_down() {
        // 0: LDI 3
        // 1: SUB 15   ; [15] = 1
        // 2: JZ 4
        // 3: JMP 1
        // 4: OUT
        // 5: HLT
        let mut config = program(&[0x53, 0x3F, 0x84, 0x61, 0xE0, 0xF0]);
        config.ram[15] = 1;
        let mut board = SimBoard::new(config);

        board.advance(50_000);
        assert_eq!(board.machine().a, 0);
        assert!(board.machine().zero);
        assert_eq!(board.machine().pc, 6);
    }

    #[test]
    fn test_disabled_rom_holds_step_counter() {
        let mut board = SimBoard::new(SimConfig::default());
        board.set_control_rom_enabled(false);
        board.advance(1_000);
        assert_eq!(board.machine().step, 0);
        assert_eq!(board.machine().pc, 0);
        assert!(board.rising_edges() > 0);
    }

    #[test]
    fn test_scheduled_clock_stop_and_restart() {
        let mut board = SimBoard::new(SimConfig::default());
        board.set_control_rom_enabled(false);
        board.schedule(1_000, SimEvent::StopClock);
        board.schedule(5_000, SimEvent::StartClock);

        board.advance(1_000);
        let edges = board.rising_edges();
        board.advance(3_000);
        assert_eq!(board.rising_edges(), edges);
        board.advance(2_000);
        assert!(board.rising_edges() > edges);
    }
}
