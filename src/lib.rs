#![warn(clippy::all, rust_2018_idioms)]

pub mod analog;
pub mod assembler;
pub mod breakpoints;
pub mod bus;
pub mod config;
pub mod disassembler;
pub mod error;
pub mod execution;
pub mod hal;
pub mod isa;
pub mod programmer;
pub mod sim;
pub mod store;
pub mod transfer;

pub use programmer::Programmer;
