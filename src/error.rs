//! Error types for the programmer firmware.
//!
//! Every error is handled at the operation that detected it; none of them is
//! fatal to the process.

use thiserror::Error;

use crate::assembler::LabelName;

/// Errors raised by the RAM/PC transfer engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("address range {start:#04x}+{count} is outside the {size}-byte target RAM")]
    OutOfRange { start: u8, count: usize, size: usize },
}

/// Errors raised by a persistent byte store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store access {offset}+{len} exceeds the {capacity}-byte region")]
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    #[error("store IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised when mutating the breakpoint set.
#[derive(Error, Debug)]
pub enum BreakpointError {
    #[error("breakpoint table full ({capacity} entries)")]
    Full { capacity: usize },

    #[error("breakpoint {0:X} already exists")]
    AlreadyExists(u8),

    #[error("breakpoint {0:X} not found")]
    NotFound(u8),

    #[error("breakpoint address {0:#04x} is outside the target RAM")]
    OutOfRange(u8),

    #[error("could not persist breakpoints: {0}")]
    Store(#[from] StoreError),
}

/// Per-line assembly errors. The offending line is discarded and assembly
/// continues at the same address.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AsmError {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("unknown mnemonic '{0}'")]
    UnknownMnemonic(String),

    #[error("bad argument '{0}'")]
    BadArgument(String),

    #[error("argument {0} out of range")]
    ArgumentOutOfRange(i32),

    #[error("'{0}' needs an argument")]
    MissingArgument(String),

    #[error("'{0}' takes no argument")]
    UnexpectedArgument(String),

    #[error("bad label '{0}'")]
    BadLabel(String),

    #[error("label {0} already defined")]
    DuplicateLabel(LabelName),

    #[error("label table full")]
    LabelTableFull,

    #[error("too many forward references to {0}")]
    TooManyForwardRefs(LabelName),

    #[error("origin must be a resolved value")]
    UnresolvedOrigin,

    #[error("address {0:#04x} is past the end of RAM")]
    AddressOverflow(u16),

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

/// Errors raised while loading the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

/// Umbrella error for operations on [`crate::programmer::Programmer`].
#[derive(Error, Debug)]
pub enum ProgrammerError {
    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Breakpoint(#[from] BreakpointError),

    #[error("snapshot slot {slot} out of range (0..{slots})")]
    SnapshotSlot { slot: usize, slots: usize },

    #[error("interrupted by host input")]
    Interrupted,

    #[error("target halted before the operation completed")]
    Halted,
}
