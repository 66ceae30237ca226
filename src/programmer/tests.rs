use super::*;
use crate::error::BreakpointError;
use crate::hal::Board;
use crate::sim::{SimBoard, SimConfig, SimEvent};
use crate::store::MemoryStore;
use tracing_test::traced_test;

fn board_with(ram: &[u8]) -> SimBoard {
    let mut config = SimConfig::default();
    config.ram[..ram.len()].copy_from_slice(ram);
    SimBoard::new(config)
}

fn programmer_with(ram: &[u8]) -> Programmer<SimBoard, MemoryStore> {
    Programmer::new(
        board_with(ram),
        MemoryStore::new(1024),
        ProgrammerConfig::default(),
    )
    .unwrap()
}

/// Parked, with interrupts back on.
fn assert_parked(programmer: &Programmer<SimBoard, MemoryStore>) {
    assert!(programmer.board().interrupts_enabled());
    assert!(!programmer.board().rom_enabled());
    assert_eq!(programmer.board().machine().step, 0);
}

#[traced_test]
#[test]
fn test_new_parks_target() {
    tracing::info_span!("test_new_parks_target").in_scope(|| {
        let mut programmer = programmer_with(&[0x51, 0xE0, 0xF0]);

        assert_parked(&programmer);
        assert_eq!(programmer.read_program_counter(), 0);
        assert_eq!(programmer.board().machine().out, 0);
        assert_parked(&programmer);
        assert!(logs_contain("target parked"));
    });
}

#[test]
fn test_write_then_read_ram() {
    let mut programmer = programmer_with(&[]);

    programmer.write_block(3, &[0xAB, 0xCD, 0x12]).unwrap();
    assert_eq!(&programmer.board().machine().ram[3..6], &[0xAB, 0xCD, 0x12]);

    let mut buf = [0u8; 3];
    programmer.read_block(3, &mut buf).unwrap();
    assert_eq!(buf, [0xAB, 0xCD, 0x12]);

    assert_eq!(programmer.read_byte(4).unwrap(), 0xCD);
    assert!(matches!(
        programmer.write_block(15, &[1, 2]),
        Err(TransferError::OutOfRange { start: 15, .. })
    ));
    assert_eq!(programmer.board().machine().ram[15], 0);

    // transfers never start the target
    assert_eq!(programmer.read_program_counter(), 0);
    assert_parked(&programmer);
}

#[test]
fn test_full_ram_round_trip() {
    let mut programmer = programmer_with(&[]);
    let image: Vec<u8> = (0..RAM_SIZE as u8).map(|i| i.wrapping_mul(37)).collect();

    programmer.write_block(0, &image).unwrap();
    let mut back = vec![0u8; RAM_SIZE];
    programmer.read_block(0, &mut back).unwrap();
    assert_eq!(back, image);
}

#[test]
fn test_bus_transactions_sample_clock_with_interrupts_off() {
    // LDI 2, OUT, JMP 0
    let mut programmer = programmer_with(&[0x52, 0xE0, 0x60]);
    assert_eq!(programmer.board().unguarded_clock_reads(), 0);

    programmer.write_block(8, &[1, 2, 3, 4]).unwrap();
    let mut buf = [0u8; 4];
    programmer.read_block(8, &mut buf).unwrap();
    assert_eq!(buf, [1, 2, 3, 4]);

    assert_eq!(programmer.read_program_counter(), 0);
    let report = programmer.run(RunLimit::Steps(5));
    assert_eq!(report.outcome, RunOutcome::LimitReached);
    programmer.step();
    programmer.set_program_counter(1).unwrap();

    assert!(programmer.board().rising_edges() > 0);
    assert_eq!(programmer.board().unguarded_clock_reads(), 0);
    assert_parked(&programmer);
}

#[traced_test]
#[test]
fn test_run_until_halt() {
    tracing::info_span!("test_run_until_halt").in_scope(|| {
        // LDI 7, ADD 14, OUT, HLT ; [14] = 3
        let mut ram = [0u8; RAM_SIZE];
        ram[..4].copy_from_slice(&[0x57, 0x2E, 0xE0, 0xF0]);
        ram[14] = 3;
        let mut programmer = programmer_with(&ram);

        let report = programmer.run(RunLimit::Unbounded);
        assert_eq!(report.outcome, RunOutcome::Halted);
        assert_eq!(report.executed, 3);
        assert_eq!(report.pc, 3);
        assert_eq!(programmer.board().output(), 10);
        assert_parked(&programmer);

        // halted in front of HLT; running again stops right away
        assert_eq!(programmer.read_program_counter(), 3);
        let again = programmer.run(RunLimit::Unbounded);
        assert_eq!(again.outcome, RunOutcome::Halted);
        assert_eq!(again.executed, 0);
        assert!(logs_contain("run finished"));
    });
}

#[test]
fn test_breakpoint_stops_and_resumes() {
    // LDI 1, OUT, ADD 15, OUT, HLT ; [15] = 1
    let mut ram = [0u8; RAM_SIZE];
    ram[..5].copy_from_slice(&[0x51, 0xE0, 0x2F, 0xE0, 0xF0]);
    ram[15] = 1;
    let mut programmer = programmer_with(&ram);
    programmer.add_breakpoint(2).unwrap();

    let report = programmer.run(RunLimit::Unbounded);
    assert_eq!(report.outcome, RunOutcome::Breakpoint { pc: 2 });
    assert_eq!(report.executed, 2);
    assert_eq!(programmer.board().output(), 1);
    assert_parked(&programmer);

    // resuming from the breakpoint does not stop on it again
    let report = programmer.run(RunLimit::Unbounded);
    assert_eq!(report.outcome, RunOutcome::Halted);
    assert_eq!(report.executed, 2);
    assert_eq!(report.pc, 4);
    assert_eq!(programmer.board().output(), 2);
}

#[test]
fn test_halt_before_any_breakpoint() {
    let mut programmer = programmer_with(&[0x51, 0xE0, 0xF0]);
    for pc in 3..8 {
        programmer.add_breakpoint(pc).unwrap();
    }

    let report = programmer.run(RunLimit::Unbounded);
    assert_eq!(report.outcome, RunOutcome::Halted);
    assert_eq!(report.pc, 2);
    assert_eq!(programmer.breakpoints().len(), 5);
}

#[test]
fn test_host_input_stops_run() {
    let mut programmer = programmer_with(&[0x51, 0xE0, 0xF0]);
    programmer.board_mut().set_host_input(true);

    let report = programmer.run(RunLimit::Unbounded);
    assert_eq!(report.outcome, RunOutcome::HostInput);
    assert_eq!(report.executed, 0);
    assert_eq!(report.pc, 0);
    assert_parked(&programmer);
    assert_eq!(programmer.read_program_counter(), 0);

    programmer.board_mut().set_host_input(false);
    let report = programmer.run(RunLimit::Unbounded);
    assert_eq!(report.outcome, RunOutcome::Halted);
    assert_eq!(programmer.board().output(), 1);
}

#[test]
fn test_host_input_arriving_mid_run() {
    // 0: LDI 1, 1: JMP 1
    let mut programmer = programmer_with(&[0x51, 0x61]);
    let at = programmer.board().now() + 20_000;
    programmer
        .board_mut()
        .schedule(at, SimEvent::HostInput(true));

    let report = programmer.run(RunLimit::Unbounded);
    assert_eq!(report.outcome, RunOutcome::HostInput);
    assert!(report.executed > 1);
    assert_eq!(report.pc, 1);
    assert_parked(&programmer);
}

#[test]
fn test_step_limit() {
    // 0: JMP 0
    let mut programmer = programmer_with(&[0x60]);
    let report = programmer.run(RunLimit::Steps(7));
    assert_eq!(report.outcome, RunOutcome::LimitReached);
    assert_eq!(report.executed, 7);
    assert_eq!(report.pc, 0);
}

#[test]
fn test_single_step() {
    let mut programmer = programmer_with(&[0x53, 0xE0, 0xF0]);

    let report = programmer.step();
    assert_eq!(report.outcome, RunOutcome::LimitReached);
    assert_eq!(report.pc, 1);
    assert_eq!(programmer.board().machine().a, 3);
    assert_eq!(programmer.board().output(), 0);

    let report = programmer.step();
    assert_eq!(report.pc, 2);
    assert_eq!(programmer.board().output(), 3);

    let report = programmer.step();
    assert_eq!(report.outcome, RunOutcome::Halted);
    assert_eq!(report.executed, 0);
    assert_parked(&programmer);
}

#[traced_test]
#[test]
fn test_set_program_counter() {
    tracing::info_span!("test_set_program_counter").in_scope(|| {
        // 0: LDI 5, 1: OUT, 2: HLT, ... 8: LDI 9, 9: OUT, 10: HLT
        let mut ram = [0u8; RAM_SIZE];
        ram[..3].copy_from_slice(&[0x55, 0xE0, 0xF0]);
        ram[8..11].copy_from_slice(&[0x59, 0xE0, 0xF0]);
        let mut programmer = programmer_with(&ram);

        programmer.set_program_counter(8).unwrap();
        assert_eq!(programmer.read_program_counter(), 8);
        assert_eq!(programmer.board().machine().ram, ram);
        assert_parked(&programmer);

        let report = programmer.run(RunLimit::Unbounded);
        assert_eq!(report.outcome, RunOutcome::Halted);
        assert_eq!(report.pc, 10);
        assert_eq!(programmer.board().output(), 9);

        // already there: nothing to do
        programmer.set_program_counter(10).unwrap();
        assert!(logs_contain("already at A"));
    });
}

#[test]
fn test_set_program_counter_interrupted() {
    let mut programmer = programmer_with(&[0x55, 0xE0, 0xF0]);
    programmer.board_mut().set_host_input(true);

    assert!(matches!(
        programmer.set_program_counter(6),
        Err(ProgrammerError::Interrupted)
    ));
    // the patched byte is put back
    assert_eq!(programmer.board().machine().ram[0], 0x55);
    assert_eq!(programmer.read_program_counter(), 0);
}

#[test]
fn test_breakpoints_persist_across_restart() {
    let mut programmer = programmer_with(&[]);
    programmer.add_breakpoint(3).unwrap();
    programmer.add_breakpoint(7).unwrap();
    assert!(matches!(
        programmer.add_breakpoint(3),
        Err(ProgrammerError::Breakpoint(BreakpointError::AlreadyExists(3)))
    ));

    let (board, store) = programmer.into_parts();
    let mut programmer = Programmer::new(board, store, ProgrammerConfig::default()).unwrap();
    assert_eq!(programmer.breakpoints().len(), 2);
    assert!(programmer.breakpoints().contains(3));
    assert!(programmer.breakpoints().contains(7));

    programmer.remove_breakpoint(3).unwrap();
    assert!(matches!(
        programmer.remove_breakpoint(3),
        Err(ProgrammerError::Breakpoint(BreakpointError::NotFound(3)))
    ));
    programmer.remove_all_breakpoints().unwrap();

    let (board, store) = programmer.into_parts();
    let programmer = Programmer::new(board, store, ProgrammerConfig::default()).unwrap();
    assert!(programmer.breakpoints().is_empty());
}

#[test]
fn test_snapshots() {
    let image: Vec<u8> = (0..RAM_SIZE as u8).collect();
    let mut programmer = programmer_with(&image);
    let slots = programmer.store().snapshot_slots();
    assert_eq!(slots, 63);

    programmer.save_snapshot(2).unwrap();
    assert_eq!(&programmer.store().as_bytes()[32..48], image.as_slice());

    programmer.write_block(0, &[0xFF; RAM_SIZE]).unwrap();
    programmer.load_snapshot(2).unwrap();
    assert_eq!(programmer.board().machine().ram.as_slice(), image.as_slice());

    assert!(matches!(
        programmer.save_snapshot(slots),
        Err(ProgrammerError::SnapshotSlot { slot: 63, slots: 63 })
    ));
    assert!(matches!(
        programmer.load_snapshot(100),
        Err(ProgrammerError::SnapshotSlot { .. })
    ));
}

#[test]
fn test_snapshots_leave_breakpoints_alone() {
    let mut programmer = programmer_with(&[0xAA; RAM_SIZE]);
    programmer.add_breakpoint(5).unwrap();
    programmer.save_snapshot(programmer.store().snapshot_slots() - 1).unwrap();

    let (board, store) = programmer.into_parts();
    let programmer = Programmer::new(board, store, ProgrammerConfig::default()).unwrap();
    assert!(programmer.breakpoints().contains(5));
}

#[test]
fn test_await_clock_stopped() {
    let mut programmer = programmer_with(&[]);
    programmer
        .board_mut()
        .schedule(2_000, SimEvent::StopClock);

    let baseline = programmer.await_clock_stopped();
    // nominal period is 100us, sampled at 1us per call
    assert!((95..=110).contains(&baseline), "baseline {baseline}");
    assert!(programmer.board().now() > 100_000);
}

#[traced_test]
#[test]
fn test_paused_clock_logs_warning_and_keeps_waiting() {
    let board = SimBoard::new(SimConfig {
        half_period_us: 5_000,
        call_cost_us: 100,
        clock_running: false,
        ..SimConfig::default()
    });
    let mut programmer =
        Programmer::new(board, MemoryStore::new(1024), ProgrammerConfig::default()).unwrap();
    programmer
        .board_mut()
        .schedule(2_500_000, SimEvent::StartClock);

    assert_eq!(programmer.read_program_counter(), 0);
    assert!(programmer.board().now() > 2_500_000);
    assert!(logs_contain("no clock edge seen"));
}

#[test]
fn test_switch_position() {
    let mut programmer = programmer_with(&[]);
    programmer.board_mut().set_analog(1, 800);
    programmer.board_mut().set_analog(2, 10);

    assert_eq!(programmer.switch_position(1, 4), 3);
    assert_eq!(programmer.switch_position(2, 4), 0);
    assert_eq!(programmer.switch_position(1, 2), 1);
}

#[traced_test]
#[test]
fn test_assemble_and_run_on_target() {
    tracing::info_span!("test_assemble_and_run_on_target").in_scope(|| {
        let source = "\
            ; add a constant to four
                  LDI 4
                  ADD NUM
                  OUT
                  HLT
            NUM:  DB 5";
        let mut programmer = programmer_with(&[]);

        let report = programmer.assemble(source, 0);
        assert!(report.is_clean(), "{:?}", report.errors);
        assert_eq!(report.bytes_written, 5);

        let lines: Vec<String> = programmer
            .disassemble(0, 5)
            .unwrap()
            .iter()
            .map(|line| line.text.clone())
            .collect();
        assert_eq!(lines, vec!["LDI  4", "ADD  4", "OUT  ", "HLT  ", "NOP  "]);

        let run = programmer.run(RunLimit::Unbounded);
        assert_eq!(run.outcome, RunOutcome::Halted);
        assert_eq!(programmer.board().output(), 9);
    });
}
