#![warn(clippy::all, rust_2018_idioms)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use sap_programmer::config::ProgrammerConfig;
use sap_programmer::error::{BreakpointError, ProgrammerError};
use sap_programmer::execution::RunLimit;
use sap_programmer::isa::RAM_SIZE;
use sap_programmer::sim::{SimBoard, SimConfig};
use sap_programmer::store::{ByteStore, FileStore, MemoryStore};
use sap_programmer::Programmer;

/// Programmer for a 4-bit SAP computer, driving a simulated target
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Assembly source to load into target RAM
    source: Option<PathBuf>,

    /// Address the first assembled byte goes to
    #[clap(long, default_value = "0", value_parser = parse_address)]
    origin: u8,

    /// RON configuration file
    #[clap(long)]
    config: Option<PathBuf>,

    /// Persistent store file for breakpoints and snapshots (in memory when omitted)
    #[clap(long)]
    store: Option<PathBuf>,

    /// Drop all persisted breakpoints before anything else
    #[clap(long)]
    clear_breakpoints: bool,

    /// Stop in front of the instruction at this address (repeatable)
    #[clap(long = "breakpoint", value_parser = parse_address)]
    breakpoints: Vec<u8>,

    /// Restore RAM from this snapshot slot before assembling
    #[clap(long)]
    load_snapshot: Option<usize>,

    /// Save RAM to this snapshot slot after assembling
    #[clap(long)]
    save_snapshot: Option<usize>,

    /// Print the whole RAM as disassembly
    #[clap(long)]
    disassemble: bool,

    /// Run until a halt, a breakpoint or the instruction cap
    #[clap(long)]
    run: bool,

    /// Run at most this many instructions
    #[clap(long, conflicts_with = "run")]
    steps: Option<u32>,

    /// Half of the simulated clock period in microseconds
    #[clap(long, default_value_t = 50)]
    half_period: u64,
}

/// Accepts `$A`, `0xA` or decimal.
fn parse_address(text: &str) -> Result<u8, String> {
    let value = if let Some(hex) = text.strip_prefix('$').or_else(|| text.strip_prefix("0x")) {
        u8::from_str_radix(hex, 16)
    } else {
        text.parse::<u8>()
    }
    .map_err(|e| format!("'{text}': {e}"))?;

    if value as usize >= RAM_SIZE {
        return Err(format!("address {value} is outside the {RAM_SIZE}-byte RAM"));
    }
    Ok(value)
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ProgrammerConfig::load(path)
            .with_context(|| format!("failed to load config {:?}", path))?,
        None => ProgrammerConfig::default(),
    };

    let board = SimBoard::new(SimConfig {
        half_period_us: args.half_period,
        ..SimConfig::default()
    });

    match &args.store {
        Some(path) => {
            let store = FileStore::open(path, config.store_capacity)
                .with_context(|| format!("failed to open store {:?}", path))?;
            session(board, store, config, &args)
        }
        None => session(board, MemoryStore::new(config.store_capacity), config, &args),
    }
}

fn session<S: ByteStore>(
    board: SimBoard,
    store: S,
    config: ProgrammerConfig,
    args: &Args,
) -> Result<()> {
    let mut programmer =
        Programmer::new(board, store, config).context("failed to start programmer")?;

    if args.clear_breakpoints {
        programmer.remove_all_breakpoints()?;
    }
    for &pc in &args.breakpoints {
        match programmer.add_breakpoint(pc) {
            Ok(()) => {}
            Err(ProgrammerError::Breakpoint(BreakpointError::AlreadyExists(_))) => {
                tracing::debug!("breakpoint {:X} already set", pc);
            }
            Err(e) => return Err(e).with_context(|| format!("failed to set breakpoint {pc:X}")),
        }
    }

    if let Some(slot) = args.load_snapshot {
        programmer.load_snapshot(slot)?;
    }

    if let Some(path) = &args.source {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {:?}", path))?;
        let report = programmer.assemble(&source, args.origin);

        for error in &report.errors {
            eprintln!("{error}");
        }
        for name in &report.undefined {
            eprintln!("undefined label {name}");
        }
        println!(
            "assembled {} bytes from {} lines, next address {:X}",
            report.bytes_written, report.lines, report.end_address
        );
    }

    if let Some(slot) = args.save_snapshot {
        programmer.save_snapshot(slot)?;
    }

    if args.disassemble {
        for line in programmer.disassemble(0, RAM_SIZE)? {
            println!("{line}");
        }
    }

    let limit = match (args.steps, args.run) {
        (Some(steps), _) => Some(RunLimit::Steps(steps)),
        (None, true) => Some(RunLimit::Unbounded),
        (None, false) => None,
    };
    if let Some(limit) = limit {
        let report = programmer.run(limit);
        println!(
            "{} after {} instructions, PC {:X}",
            report.outcome, report.executed, report.pc
        );
        println!("output register: {}", programmer.board().output());
    }

    Ok(())
}
