use std::fmt;

use crate::error::TransferError;
use crate::isa;
use crate::transfer::{check_range, RamAccess};

/// One decoded RAM byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisassembledLine {
    pub address: u8,
    pub byte: u8,
    pub text: String,
}

impl fmt::Display for DisassembledLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}: {:02X}  {}", self.address, self.byte, self.text)
    }
}

/// Render one byte as `MNE  a`: mnemonic, marker slot, space, and the low
/// nibble as a hex digit when the opcode takes an argument.
///
/// Every byte decodes to something; unassigned opcodes print their
/// placeholder mnemonic.
pub fn format_instruction(byte: u8) -> String {
    let desc = isa::decode(byte);
    if desc.has_argument {
        format!("{desc} {:X}", byte & 0x0F)
    } else {
        format!("{desc} ")
    }
}

pub fn disassemble<M: RamAccess + ?Sized>(
    memory: &mut M,
    address: u8,
    count: usize,
) -> Result<Vec<DisassembledLine>, TransferError> {
    let span = tracing::debug_span!("disassemble", address, count);
    let _guard = span.enter();

    check_range(address, count)?;
    let mut bytes = vec![0u8; count];
    memory.read_block(address, &mut bytes)?;

    Ok(bytes
        .into_iter()
        .enumerate()
        .map(|(offset, byte)| DisassembledLine {
            address: address + offset as u8,
            byte,
            text: format_instruction(byte),
        })
        .collect())
}
