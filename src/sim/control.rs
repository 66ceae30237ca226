//! Control ROM of the simulated target.
//!
//! One 16-bit control word per (flags, opcode, step), the same table the
//! target's EEPROMs are burned with.

use std::fmt;

pub const HLT: u16 = 0b1000_0000_0000_0000; // Halt clock
pub const MI: u16 = 0b0100_0000_0000_0000; // Memory address register in
pub const RI: u16 = 0b0010_0000_0000_0000; // RAM data in
pub const RO: u16 = 0b0001_0000_0000_0000; // RAM data out
pub const IO: u16 = 0b0000_1000_0000_0000; // Instruction register out
pub const II: u16 = 0b0000_0100_0000_0000; // Instruction register in
pub const AI: u16 = 0b0000_0010_0000_0000; // A register in
pub const AO: u16 = 0b0000_0001_0000_0000; // A register out
pub const EO: u16 = 0b0000_0000_1000_0000; // ALU out
pub const SU: u16 = 0b0000_0000_0100_0000; // ALU subtract
pub const BI: u16 = 0b0000_0000_0010_0000; // B register in
pub const OI: u16 = 0b0000_0000_0001_0000; // Output register in
pub const CE: u16 = 0b0000_0000_0000_1000; // Program counter enable
pub const CO: u16 = 0b0000_0000_0000_0100; // Program counter out
pub const J: u16 = 0b0000_0000_0000_0010; // Jump (program counter in)
pub const FI: u16 = 0b0000_0000_0000_0001; // Flags in

/// Micro-steps per instruction; the step counter resets after the last one.
pub const STEPS: u8 = 5;

const JC: usize = 0b0111;
const JZ: usize = 0b1000;

const FETCH: [u16; 2] = [MI | CO, RO | II | CE];

const fn steps(rest: [u16; 3]) -> [u16; STEPS as usize] {
    [FETCH[0], FETCH[1], rest[0], rest[1], rest[2]]
}

#[rustfmt::skip]
const TEMPLATE: [[u16; STEPS as usize]; 16] = [
    steps([0, 0, 0]),                             // 0000 - NOP
    steps([IO | MI, RO | AI, 0]),                 // 0001 - LDA
    steps([IO | MI, RO | BI, EO | AI | FI]),      // 0010 - ADD
    steps([IO | MI, RO | BI, EO | AI | SU | FI]), // 0011 - SUB
    steps([IO | MI, AO | RI, 0]),                 // 0100 - STA
    steps([IO | AI, 0, 0]),                       // 0101 - LDI
    steps([IO | J, 0, 0]),                        // 0110 - JMP
    steps([0, 0, 0]),                             // 0111 - JC
    steps([0, 0, 0]),                             // 1000 - JZ
    steps([0, 0, 0]),                             // 1001
    steps([0, 0, 0]),                             // 1010
    steps([0, 0, 0]),                             // 1011
    steps([0, 0, 0]),                             // 1100
    steps([0, 0, 0]),                             // 1101
    steps([AO | OI, 0, 0]),                       // 1110 - OUT
    steps([HLT, 0, 0]),                           // 1111 - HLT
];

/// Control word for `opcode` (high nibble of IR) at `step`, given the flags
/// register.
pub fn control_word(opcode: u8, step: u8, carry: bool, zero: bool) -> u16 {
    let opcode = (opcode & 0x0F) as usize;
    let step = (step % STEPS) as usize;

    let taken = (opcode == JC && carry) || (opcode == JZ && zero);
    if taken && step == 2 {
        return IO | J;
    }
    TEMPLATE[opcode][step]
}

/// Pretty printer for a control word, e.g. `MI|CO`.
pub struct Signals(pub u16);

impl fmt::Display for Signals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(u16, &str); 16] = [
            (HLT, "HLT"),
            (MI, "MI"),
            (RI, "RI"),
            (RO, "RO"),
            (IO, "IO"),
            (II, "II"),
            (AI, "AI"),
            (AO, "AO"),
            (EO, "EO"),
            (SU, "SU"),
            (BI, "BI"),
            (OI, "OI"),
            (CE, "CE"),
            (CO, "CO"),
            (J, "J"),
            (FI, "FI"),
        ];

        if self.0 == 0 {
            return write!(f, "-");
        }
        let mut first = true;
        for (bit, name) in NAMES {
            if self.0 & bit != 0 {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        Ok(())
    }
}
