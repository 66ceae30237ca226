//! Single-pass symbolic assembler.
//!
//! Source is consumed line by line and every instruction is written to RAM
//! as soon as its line is accepted. A reference to a label that is not yet
//! defined leaves a placeholder holding the folded offset, and the site is
//! patched when the definition shows up.
//!
//! Line syntax:
//!
//! ```text
//! [label[:]] [mnemonic[#] [argument]] [; comment]
//! ```
//!
//! A label on a line of its own needs the colon. Arguments are `$h`/`$hh`
//! hex, `d`/`dd`/`ddd` decimal, or `label`, `label+n`, `label-n`.

mod labels;
mod lexer;

use std::fmt;

pub use labels::{Label, LabelName, LabelTable, LABEL_LEN, MAX_FORWARD_REFS, MAX_LABELS};
pub use lexer::{LineLexer, Token};

use crate::error::AsmError;
use crate::isa::{self, OpcodeDescriptor, ADDRESS_MASK, PSEUDO_DB, PSEUDO_ORG, RAM_SIZE};
use crate::transfer::RamAccess;

/// Ends assembly after the text before it on the same line.
pub const ESCAPE: char = '\x1b';
/// Ends assembly, discarding the line it appears on.
pub const ABORT: char = '\x03';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEnd {
    /// Ran out of source text.
    Exhausted,
    Escape,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineError {
    /// 1-based line number.
    pub line: usize,
    pub text: String,
    pub kind: AsmError,
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} ({})", self.line, self.kind, self.text)
    }
}

#[derive(Debug, Clone)]
pub struct AssemblyReport {
    pub origin: u8,
    /// Address the next byte would have gone to. `RAM_SIZE` once RAM is full.
    pub end_address: u16,
    pub bytes_written: usize,
    pub lines: usize,
    pub errors: Vec<LineError>,
    /// Labels still waiting for a definition. Their reference sites keep the
    /// unpatched placeholder.
    pub undefined: Vec<LabelName>,
    pub labels: LabelTable,
    pub ended_by: InputEnd,
}

impl AssemblyReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.undefined.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Argument {
    Number(u16),
    Label { name: LabelName, offset: i32 },
}

#[derive(Debug)]
struct Statement {
    label: Option<LabelName>,
    instruction: Option<(&'static OpcodeDescriptor, Option<Argument>)>,
}

enum Value {
    Known(i32),
    Pending { name: LabelName, offset: i32 },
}

enum Action {
    Nothing,
    Origin(u8),
    Emit {
        byte: u8,
        fixup: Option<LabelName>,
    },
}

/// A fully validated line, ready to be applied.
struct Plan {
    define: Option<LabelName>,
    action: Action,
}

fn split_label(tokens: &[Token]) -> Result<(Option<LabelName>, &[Token]), AsmError> {
    match tokens {
        [first @ Token::Word { text, immediate }, Token::Colon, rest @ ..] => {
            if *immediate {
                return Err(AsmError::BadLabel(first.to_string()));
            }
            let name = LabelName::parse(text).ok_or_else(|| AsmError::BadLabel(text.clone()))?;
            Ok((Some(name), rest))
        }
        // A leading word that is not a mnemonic, followed by another word
        [Token::Word {
            text,
            immediate: false,
        }, Token::Word { .. }, ..]
            if isa::lookup(text, false).is_none() =>
        {
            let name = LabelName::parse(text).ok_or_else(|| AsmError::BadLabel(text.clone()))?;
            Ok((Some(name), &tokens[1..]))
        }
        _ => Ok((None, tokens)),
    }
}

fn bad_argument(tokens: &[Token]) -> AsmError {
    let text: Vec<String> = tokens.iter().map(Token::to_string).collect();
    AsmError::BadArgument(text.join(" "))
}

fn parse_argument(tokens: &[Token]) -> Result<Option<Argument>, AsmError> {
    let argument = match tokens {
        [] => return Ok(None),
        [Token::Hex(value) | Token::Decimal(value)] => Argument::Number(*value),
        [Token::Word {
            text,
            immediate: false,
        }, tail @ ..] => {
            let name = LabelName::parse(text).ok_or_else(|| AsmError::BadLabel(text.clone()))?;
            let offset = match tail {
                [] => 0,
                [Token::Plus, Token::Hex(n) | Token::Decimal(n)] => *n as i32,
                [Token::Minus, Token::Hex(n) | Token::Decimal(n)] => -(*n as i32),
                _ => return Err(bad_argument(tokens)),
            };
            Argument::Label { name, offset }
        }
        _ => return Err(bad_argument(tokens)),
    };
    Ok(Some(argument))
}

fn parse_statement(tokens: &[Token]) -> Result<Statement, AsmError> {
    let (label, rest) = split_label(tokens)?;
    let Some((head, args)) = rest.split_first() else {
        return Ok(Statement {
            label,
            instruction: None,
        });
    };

    let desc = match head {
        Token::Word { text, immediate } => isa::lookup(text, *immediate),
        _ => None,
    }
    .ok_or_else(|| AsmError::UnknownMnemonic(head.to_string()))?;

    Ok(Statement {
        label,
        instruction: Some((desc, parse_argument(args)?)),
    })
}

fn in_range(value: i32, max: u8) -> Result<u8, AsmError> {
    if (0..=max as i32).contains(&value) {
        Ok(value as u8)
    } else {
        Err(AsmError::ArgumentOutOfRange(value))
    }
}

fn mnemonic_text(desc: &OpcodeDescriptor) -> String {
    desc.to_string().trim_end().to_string()
}

struct Assembler<'m, M: RamAccess + ?Sized> {
    memory: &'m mut M,
    labels: LabelTable,
    address: u16,
    bytes_written: usize,
}

impl<'m, M: RamAccess + ?Sized> Assembler<'m, M> {
    fn new(memory: &'m mut M, origin: u8) -> Self {
        Self {
            memory,
            labels: LabelTable::new(),
            address: origin as u16,
            bytes_written: 0,
        }
    }

    fn check_room(&self) -> Result<(), AsmError> {
        if self.address >= RAM_SIZE as u16 {
            return Err(AsmError::AddressOverflow(self.address));
        }
        Ok(())
    }

    fn resolve(&self, argument: &Argument, own_label: Option<LabelName>) -> Value {
        match *argument {
            Argument::Number(value) => Value::Known(value as i32),
            Argument::Label { name, offset } => {
                let address = if own_label == Some(name) {
                    Some(self.address as u8)
                } else {
                    self.labels.address(&name)
                };
                match address {
                    Some(address) => Value::Known(address as i32 + offset),
                    None => Value::Pending { name, offset },
                }
            }
        }
    }

    /// Validate a statement against the current state without touching it.
    fn plan(&self, statement: &Statement) -> Result<Plan, AsmError> {
        let mut reserved = 0;
        if let Some(name) = &statement.label {
            self.check_room()?;
            if self.labels.check_define(name)? {
                reserved = 1;
            }
        }

        let Some((desc, argument)) = &statement.instruction else {
            return Ok(Plan {
                define: statement.label,
                action: Action::Nothing,
            });
        };

        let value = match (desc.has_argument, argument) {
            (false, None) => None,
            (false, Some(_)) => return Err(AsmError::UnexpectedArgument(mnemonic_text(desc))),
            (true, None) => return Err(AsmError::MissingArgument(mnemonic_text(desc))),
            (true, Some(argument)) => Some(self.resolve(argument, statement.label)),
        };

        let action = match desc.opcode {
            PSEUDO_ORG => match value {
                Some(Value::Known(value)) => Action::Origin(in_range(value, ADDRESS_MASK)?),
                _ => return Err(AsmError::UnresolvedOrigin),
            },
            opcode => {
                self.check_room()?;
                let data = opcode == PSEUDO_DB;
                let max = if data { u8::MAX } else { ADDRESS_MASK };
                let merge = |low: u8| if data { low } else { opcode | low };

                match value {
                    None => Action::Emit {
                        byte: opcode,
                        fixup: None,
                    },
                    Some(Value::Known(value)) => Action::Emit {
                        byte: merge(in_range(value, max)?),
                        fixup: None,
                    },
                    Some(Value::Pending { name, offset }) => {
                        self.labels.check_forward_ref(&name, reserved, self.address as u8)?;
                        Action::Emit {
                            byte: merge((offset & 0x0F) as u8),
                            fixup: Some(name),
                        }
                    }
                }
            }
        };

        Ok(Plan {
            define: statement.label,
            action,
        })
    }

    fn patch(&mut self, site: u8, address: u8) -> Result<(), AsmError> {
        let byte = self.memory.read_byte(site)?;
        let patched = (byte & 0xF0) | (byte.wrapping_add(address) & 0x0F);
        self.memory.write_byte(site, patched)?;
        tracing::trace!(site, byte, patched, "patched forward reference");
        Ok(())
    }

    fn commit(&mut self, plan: Plan) -> Result<(), AsmError> {
        if let Some(name) = plan.define {
            let address = self.address as u8;
            let sites = self.labels.define(name, address)?;
            for &site in &sites {
                self.patch(site, address)?;
            }
            tracing::debug!(label = %name, address, patched = sites.len(), "label defined");
        }

        match plan.action {
            Action::Nothing => {}
            Action::Origin(address) => {
                tracing::debug!("origin {:X}", address);
                self.address = address as u16;
            }
            Action::Emit { byte, fixup } => {
                let address = self.address as u8;
                self.memory.write_byte(address, byte)?;
                match fixup {
                    Some(name) => self.labels.add_forward_ref(name, address)?,
                    None => self.labels.release_site(address),
                }
                tracing::trace!("{:X}: {:02X}", address, byte);
                self.address += 1;
                self.bytes_written += 1;
            }
        }
        Ok(())
    }

    fn assemble_line(&mut self, text: &str) -> Result<(), AsmError> {
        let tokens = LineLexer::new(text).tokenize()?;
        let statement = parse_statement(&tokens)?;
        let plan = self.plan(&statement)?;
        self.commit(plan)
    }
}

/// Assemble `source` into `memory`, starting at `origin`.
///
/// Errors are per line: the line is dropped, reported, and assembly carries on
/// at the same address. Bytes from accepted lines stay written no matter what
/// follows.
pub fn assemble<M: RamAccess + ?Sized>(memory: &mut M, source: &str, origin: u8) -> AssemblyReport {
    let origin = origin & ADDRESS_MASK;
    let span = tracing::info_span!("assemble", origin);
    let _guard = span.enter();

    let mut asm = Assembler::new(memory, origin);
    let mut errors = Vec::new();
    let mut lines = 0;
    let mut ended_by = InputEnd::Exhausted;

    for (index, raw) in source.lines().enumerate() {
        let (text, end) = match raw.find(|c: char| c == ESCAPE || c == ABORT) {
            Some(pos) if raw[pos..].starts_with(ABORT) => {
                tracing::info!(line = index + 1, "assembly aborted");
                ended_by = InputEnd::Aborted;
                break;
            }
            Some(pos) => (&raw[..pos], Some(InputEnd::Escape)),
            None => (raw, None),
        };

        lines += 1;
        if let Err(kind) = asm.assemble_line(text) {
            tracing::error!(line = index + 1, "{}: {}", kind, text.trim());
            errors.push(LineError {
                line: index + 1,
                text: text.trim().to_string(),
                kind,
            });
        }

        if let Some(end) = end {
            ended_by = end;
            break;
        }
    }

    let undefined = asm.labels.undefined();
    if !undefined.is_empty() {
        let names: Vec<String> = undefined.iter().map(LabelName::to_string).collect();
        tracing::warn!("undefined labels: {}", names.join(", "));
    }

    tracing::info!(
        bytes = asm.bytes_written,
        errors = errors.len(),
        end = asm.address,
        "assembly finished"
    );

    AssemblyReport {
        origin,
        end_address: asm.address,
        bytes_written: asm.bytes_written,
        lines,
        errors,
        undefined,
        labels: asm.labels,
        ended_by,
    }
}
