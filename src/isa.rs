//! Opcode table for the 4-bit target.
//!
//! The high nibble of a RAM byte selects the instruction, the low nibble is its
//! argument. Only the 4-bit addressing configuration is implemented; an 8-bit
//! variant would widen [`ADDRESS_BITS`] and give instructions a second byte.

use std::fmt;

pub const ADDRESS_BITS: u32 = 4;
/// Bytes of target RAM.
pub const RAM_SIZE: usize = 1 << ADDRESS_BITS;
pub const ADDRESS_MASK: u8 = (RAM_SIZE - 1) as u8;

/// Marker that selects the immediate form of a mnemonic (`LDA#`).
pub const IMMEDIATE_MARKER: char = '#';

pub const OPCODE_JMP: u8 = 0x60;
pub const OPCODE_HLT: u8 = 0xF0;

/// Reserved values of the assembler-only pseudo instructions. They never
/// appear in generated code.
pub const PSEUDO_ORG: u8 = 0xFE;
pub const PSEUDO_DB: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeDescriptor {
    /// Three characters, space padded.
    pub mnemonic: &'static str,
    /// Immediate-argument form (`#` marker).
    pub immediate: bool,
    /// Only the high nibble is significant when decoding.
    pub opcode: u8,
    /// Clock cycles after the two fetch cycles before the next fetch.
    pub idle_cycles: u8,
    pub has_argument: bool,
}

impl OpcodeDescriptor {
    const fn new(mnemonic: &'static str, opcode: u8, has_argument: bool) -> Self {
        Self {
            mnemonic,
            immediate: false,
            opcode,
            idle_cycles: 3,
            has_argument,
        }
    }

    pub fn is_pseudo(&self) -> bool {
        matches!(self.opcode, PSEUDO_ORG | PSEUDO_DB)
    }
}

impl fmt::Display for OpcodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.immediate { IMMEDIATE_MARKER } else { ' ' };
        write!(f, "{}{}", self.mnemonic, marker)
    }
}

/// One descriptor per high nibble. The control ROM runs five micro-steps for
/// every opcode, so all of them idle for three cycles after the fetch.
pub static DECODE_TABLE: [OpcodeDescriptor; 16] = [
    OpcodeDescriptor::new("NOP", 0x00, false),
    OpcodeDescriptor::new("LDA", 0x10, true),
    OpcodeDescriptor::new("ADD", 0x20, true),
    OpcodeDescriptor::new("SUB", 0x30, true),
    OpcodeDescriptor::new("STA", 0x40, true),
    OpcodeDescriptor::new("LDI", 0x50, true),
    OpcodeDescriptor::new("JMP", OPCODE_JMP, true),
    OpcodeDescriptor::new("JC ", 0x70, true),
    OpcodeDescriptor::new("JZ ", 0x80, true),
    // unassigned in the control ROM, they execute as NOP
    OpcodeDescriptor::new("OP9", 0x90, true),
    OpcodeDescriptor::new("OPA", 0xA0, true),
    OpcodeDescriptor::new("OPB", 0xB0, true),
    OpcodeDescriptor::new("OPC", 0xC0, true),
    OpcodeDescriptor::new("OPD", 0xD0, true),
    OpcodeDescriptor::new("OUT", 0xE0, false),
    OpcodeDescriptor::new("HLT", OPCODE_HLT, false),
];

/// Forms only the assembler understands.
pub static ASSEMBLER_EXTRAS: [OpcodeDescriptor; 3] = [
    OpcodeDescriptor {
        mnemonic: "LDA",
        immediate: true,
        opcode: 0x50,
        idle_cycles: 3,
        has_argument: true,
    },
    OpcodeDescriptor {
        mnemonic: "ORG",
        immediate: false,
        opcode: PSEUDO_ORG,
        idle_cycles: 0,
        has_argument: true,
    },
    OpcodeDescriptor {
        mnemonic: "DB ",
        immediate: false,
        opcode: PSEUDO_DB,
        idle_cycles: 0,
        has_argument: true,
    },
];

pub fn decode(byte: u8) -> &'static OpcodeDescriptor {
    &DECODE_TABLE[(byte >> 4) as usize]
}

/// Find the descriptor for a 1-3 character mnemonic. Matching is case
/// insensitive, and the immediate marker has to agree as well.
pub fn lookup(mnemonic: &str, immediate: bool) -> Option<&'static OpcodeDescriptor> {
    if mnemonic.is_empty() || mnemonic.len() > 3 {
        return None;
    }
    let padded = format!("{:<3}", mnemonic.to_ascii_uppercase());

    DECODE_TABLE
        .iter()
        .chain(ASSEMBLER_EXTRAS.iter())
        .find(|desc| desc.mnemonic == padded && desc.immediate == immediate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_table_is_indexed_by_high_nibble() {
        for (nibble, desc) in DECODE_TABLE.iter().enumerate() {
            assert_eq!(desc.opcode >> 4, nibble as u8);
            assert_eq!(desc.mnemonic.len(), 3);
            assert!(!desc.is_pseudo());
        }
        assert_eq!(decode(0x5F).mnemonic, "LDI");
        assert_eq!(decode(0xF3).opcode, OPCODE_HLT);
    }

    #[test]
    fn test_lookup_is_case_insensitive_and_pads() {
        assert_eq!(lookup("ldi", false).unwrap().opcode, 0x50);
        assert_eq!(lookup("jc", false).unwrap().opcode, 0x70);
        assert_eq!(lookup("Db", false).unwrap().opcode, PSEUDO_DB);
        assert!(lookup("LDAX", false).is_none());
        assert!(lookup("", false).is_none());
    }

    #[test]
    fn test_lookup_requires_matching_marker() {
        assert_eq!(lookup("LDA", false).unwrap().opcode, 0x10);
        assert_eq!(lookup("LDA", true).unwrap().opcode, 0x50);
        assert!(lookup("JMP", true).is_none());
    }
}
