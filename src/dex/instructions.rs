//! Instructions as handed to the builder and as produced by the finalizer.
//!
//! An instruction is generic over its branch target: the builder stores
//! [`Label`]s, the finalizer emits signed code-unit offsets (`i32`). Operand
//! shapes follow the instruction formats; every register, literal and
//! reference is checked against its format when the instruction is built.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::dex::error::{BuilderError, ErrorKind};
use crate::dex::location::Label;
use crate::dex::opcode_format::{Format, ReferenceType};
use crate::dex::opcodes::Opcode;
use crate::dex::references::Reference;
use crate::dex::{fits, fits_signed_bits, fits_unsigned_bits};

/// An instruction whose branch targets are still symbolic.
pub type BuilderInstruction = Instruction<Label>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseSwitchEntry<T> {
    pub key: i32,
    pub target: T,
}

/// Operands of an instruction, one variant per operand layout.
///
/// Register fields are named after the format letters (`vA`, `vB`, `vC`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operands<T> {
    /// 10x
    None,
    /// 10t, 20t, 30t
    Branch { target: T },
    /// 11x
    Register { a: u16 },
    /// 11n, 21s, 21ih, 21lh, 31i, 51l
    RegisterLiteral { a: u16, literal: i64 },
    /// 12x, 22x, 32x
    RegisterPair { a: u16, b: u16 },
    /// 21c, 31c
    RegisterReference { a: u16, reference: Reference },
    /// 21t, and 31t where the target is a payload
    RegisterBranch { a: u16, target: T },
    /// 22b, 22s
    TwoRegisterLiteral { a: u16, b: u16, literal: i64 },
    /// 22c
    TwoRegisterReference { a: u16, b: u16, reference: Reference },
    /// 22t
    TwoRegisterBranch { a: u16, b: u16, target: T },
    /// 23x
    ThreeRegister { a: u16, b: u16, c: u16 },
    /// 35c
    RegisterList { registers: Vec<u16>, reference: Reference },
    /// 3rc
    RegisterRange { start: u16, count: u16, reference: Reference },
    /// 45cc
    RegisterListProto { registers: Vec<u16>, reference: Reference, proto: Reference },
    /// 4rcc
    RegisterRangeProto { start: u16, count: u16, reference: Reference, proto: Reference },
    PackedSwitchPayload { first_key: i32, targets: Vec<T> },
    SparseSwitchPayload { entries: Vec<SparseSwitchEntry<T>> },
    ArrayPayload { element_width: u16, elements: Vec<i64> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction<T> {
    opcode: Opcode,
    operands: Operands<T>,
}

impl<T> Instruction<T> {
    /// Builds an instruction, rejecting operands that do not fit `opcode`'s format.
    pub fn new(opcode: Opcode, operands: Operands<T>) -> Result<Instruction<T>, BuilderError> {
        validate(opcode, &operands)?;
        Ok(Instruction { opcode, operands })
    }

    pub fn nop() -> Instruction<T> {
        Instruction { opcode: Opcode::Nop, operands: Operands::None }
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn format(&self) -> Format {
        self.opcode.format()
    }

    pub fn operands(&self) -> &Operands<T> {
        &self.operands
    }

    pub fn is_nop(&self) -> bool {
        self.opcode == Opcode::Nop
    }

    /// Size in 16-bit code units, including variable-length payloads.
    pub fn code_units(&self) -> u64 {
        if let Some(units) = self.format().code_units() {
            return units as u64;
        }
        match &self.operands {
            Operands::PackedSwitchPayload { targets, .. } => 4 + 2 * targets.len() as u64,
            Operands::SparseSwitchPayload { entries } => 2 + 4 * entries.len() as u64,
            Operands::ArrayPayload { element_width, elements } => {
                4 + (elements.len() as u64 * *element_width as u64 + 1) / 2
            }
            // validate() only admits payload operands for payload formats
            _ => 0,
        }
    }

    /// The single label reference of a branch or payload-referencing instruction.
    pub fn branch_target(&self) -> Option<&T> {
        match &self.operands {
            Operands::Branch { target }
            | Operands::RegisterBranch { target, .. }
            | Operands::TwoRegisterBranch { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Every label reference, including switch payload entries.
    pub fn targets(&self) -> Vec<&T> {
        match &self.operands {
            Operands::PackedSwitchPayload { targets, .. } => targets.iter().collect(),
            Operands::SparseSwitchPayload { entries } => entries.iter().map(|e| &e.target).collect(),
            _ => self.branch_target().into_iter().collect(),
        }
    }

    /// Converts the instruction's targets, keeping the opcode and every other operand.
    pub fn try_map_targets<U, E, F>(&self, mut f: F) -> Result<Instruction<U>, E>
    where
        F: FnMut(&T) -> Result<U, E>,
    {
        let operands = match &self.operands {
            Operands::None => Operands::None,
            Operands::Branch { target } => Operands::Branch { target: f(target)? },
            Operands::Register { a } => Operands::Register { a: *a },
            Operands::RegisterLiteral { a, literal } => {
                Operands::RegisterLiteral { a: *a, literal: *literal }
            }
            Operands::RegisterPair { a, b } => Operands::RegisterPair { a: *a, b: *b },
            Operands::RegisterReference { a, reference } => {
                Operands::RegisterReference { a: *a, reference: reference.clone() }
            }
            Operands::RegisterBranch { a, target } => {
                Operands::RegisterBranch { a: *a, target: f(target)? }
            }
            Operands::TwoRegisterLiteral { a, b, literal } => {
                Operands::TwoRegisterLiteral { a: *a, b: *b, literal: *literal }
            }
            Operands::TwoRegisterReference { a, b, reference } => {
                Operands::TwoRegisterReference { a: *a, b: *b, reference: reference.clone() }
            }
            Operands::TwoRegisterBranch { a, b, target } => {
                Operands::TwoRegisterBranch { a: *a, b: *b, target: f(target)? }
            }
            Operands::ThreeRegister { a, b, c } => Operands::ThreeRegister { a: *a, b: *b, c: *c },
            Operands::RegisterList { registers, reference } => Operands::RegisterList {
                registers: registers.clone(),
                reference: reference.clone(),
            },
            Operands::RegisterRange { start, count, reference } => Operands::RegisterRange {
                start: *start,
                count: *count,
                reference: reference.clone(),
            },
            Operands::RegisterListProto { registers, reference, proto } => {
                Operands::RegisterListProto {
                    registers: registers.clone(),
                    reference: reference.clone(),
                    proto: proto.clone(),
                }
            }
            Operands::RegisterRangeProto { start, count, reference, proto } => {
                Operands::RegisterRangeProto {
                    start: *start,
                    count: *count,
                    reference: reference.clone(),
                    proto: proto.clone(),
                }
            }
            Operands::PackedSwitchPayload { first_key, targets } => Operands::PackedSwitchPayload {
                first_key: *first_key,
                targets: targets.iter().map(&mut f).collect::<Result<Vec<_>, E>>()?,
            },
            Operands::SparseSwitchPayload { entries } => Operands::SparseSwitchPayload {
                entries: entries
                    .iter()
                    .map(|e| Ok(SparseSwitchEntry { key: e.key, target: f(&e.target)? }))
                    .collect::<Result<Vec<_>, E>>()?,
            },
            Operands::ArrayPayload { element_width, elements } => Operands::ArrayPayload {
                element_width: *element_width,
                elements: elements.clone(),
            },
        };
        Ok(Instruction { opcode: self.opcode, operands })
    }
}

impl<T: Clone> Instruction<T> {
    /// Re-encodes the instruction under another opcode with the same operand layout.
    pub(crate) fn with_opcode(&self, opcode: Opcode) -> Result<Instruction<T>, BuilderError> {
        Instruction::new(opcode, self.operands.clone())
    }
}

impl<T: fmt::Display> fmt::Display for Instruction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        match &self.operands {
            Operands::None => Ok(()),
            Operands::Branch { target } => write!(f, " {}", target),
            Operands::Register { a } => write!(f, " v{}", a),
            Operands::RegisterLiteral { a, literal } => write!(f, " v{}, {:#x}", a, literal),
            Operands::RegisterPair { a, b } => write!(f, " v{}, v{}", a, b),
            Operands::RegisterReference { a, reference } => write!(f, " v{}, {}", a, reference),
            Operands::RegisterBranch { a, target } => write!(f, " v{}, {}", a, target),
            Operands::TwoRegisterLiteral { a, b, literal } => {
                write!(f, " v{}, v{}, {:#x}", a, b, literal)
            }
            Operands::TwoRegisterReference { a, b, reference } => {
                write!(f, " v{}, v{}, {}", a, b, reference)
            }
            Operands::TwoRegisterBranch { a, b, target } => write!(f, " v{}, v{}, {}", a, b, target),
            Operands::ThreeRegister { a, b, c } => write!(f, " v{}, v{}, v{}", a, b, c),
            Operands::RegisterList { registers, reference } => {
                write!(f, " {{{}}}, {}", register_list(registers), reference)
            }
            Operands::RegisterRange { start, count, reference } => {
                write!(f, " {{{}}}, {}", register_range(*start, *count), reference)
            }
            Operands::RegisterListProto { registers, reference, proto } => {
                write!(f, " {{{}}}, {}, {}", register_list(registers), reference, proto)
            }
            Operands::RegisterRangeProto { start, count, reference, proto } => {
                write!(f, " {{{}}}, {}, {}", register_range(*start, *count), reference, proto)
            }
            Operands::PackedSwitchPayload { first_key, targets } => {
                write!(f, " {:#x}", first_key)?;
                for target in targets {
                    write!(f, " {}", target)?;
                }
                Ok(())
            }
            Operands::SparseSwitchPayload { entries } => {
                for entry in entries {
                    write!(f, " {:#x} -> {}", entry.key, entry.target)?;
                }
                Ok(())
            }
            Operands::ArrayPayload { element_width, elements } => {
                write!(f, " {:#x} [{} elements]", element_width, elements.len())
            }
        }
    }
}

fn register_list(registers: &[u16]) -> String {
    registers.iter().map(|r| format!("v{}", r)).collect::<Vec<_>>().join(", ")
}

fn register_range(start: u16, count: u16) -> String {
    match count {
        0 => String::new(),
        _ => format!("v{} .. v{}", start, start as u32 + count as u32 - 1),
    }
}

fn check_register(opcode: Opcode, register: u16, bits: u32) -> Result<(), BuilderError> {
    if !fits_unsigned_bits(register as u32, bits) {
        fail!(MalformedInstruction, "register v{} does not fit in {} bits for {}", register, bits, opcode);
    }
    Ok(())
}

fn check_reference(opcode: Opcode, reference: &Reference, expected: ReferenceType) -> Result<(), BuilderError> {
    if reference.reference_type() != expected {
        fail!(
            MalformedInstruction,
            "{} expects a {:?} reference, got {:?}",
            opcode,
            expected,
            reference.reference_type()
        );
    }
    Ok(())
}

/// The second reference of 45cc/4rcc, typed by the opcode's catalog entry.
fn check_proto(opcode: Opcode, proto: &Reference) -> Result<(), BuilderError> {
    match opcode.reference_type2() {
        Some(expected) => check_reference(opcode, proto, expected),
        None => fail!(MalformedInstruction, "{} takes no second reference", opcode),
    }
}

fn check_literal(opcode: Opcode, literal: i64, ok: bool) -> Result<(), BuilderError> {
    if !ok {
        fail!(MalformedInstruction, "literal {:#x} cannot be encoded by {}", literal, opcode);
    }
    Ok(())
}

fn check_register_list(opcode: Opcode, registers: &[u16]) -> Result<(), BuilderError> {
    if registers.len() > 5 {
        fail!(MalformedInstruction, "{} takes at most 5 registers, got {}", opcode, registers.len());
    }
    for r in registers {
        check_register(opcode, *r, 4)?;
    }
    Ok(())
}

fn check_register_range(opcode: Opcode, start: u16, count: u16) -> Result<(), BuilderError> {
    if !fits_unsigned_bits(count as u32, 8) {
        fail!(MalformedInstruction, "register count {} does not fit in 8 bits for {}", count, opcode);
    }
    if count > 0 && start as u32 + count as u32 - 1 > u16::MAX as u32 {
        fail!(MalformedInstruction, "register range v{} .. +{} exceeds v65535 for {}", start, count, opcode);
    }
    Ok(())
}

fn validate<T>(opcode: Opcode, operands: &Operands<T>) -> Result<(), BuilderError> {
    let format = opcode.format();
    let reference_type = opcode.reference_type();
    match (format, operands) {
        (Format::Format10x, Operands::None) => Ok(()),
        (Format::Format10t | Format::Format20t | Format::Format30t, Operands::Branch { .. }) => Ok(()),
        (Format::Format11x, Operands::Register { a }) => check_register(opcode, *a, 8),
        (Format::Format11n, Operands::RegisterLiteral { a, literal }) => {
            check_register(opcode, *a, 4)?;
            check_literal(opcode, *literal, fits_signed_bits(*literal, 4))
        }
        (Format::Format21s, Operands::RegisterLiteral { a, literal }) => {
            check_register(opcode, *a, 8)?;
            check_literal(opcode, *literal, fits::<i16>(*literal))
        }
        (Format::Format21ih, Operands::RegisterLiteral { a, literal }) => {
            check_register(opcode, *a, 8)?;
            check_literal(opcode, *literal, fits::<i32>(*literal) && literal & 0xffff == 0)
        }
        (Format::Format21lh, Operands::RegisterLiteral { a, literal }) => {
            check_register(opcode, *a, 8)?;
            check_literal(opcode, *literal, literal & 0xffff_ffff_ffff == 0)
        }
        (Format::Format31i, Operands::RegisterLiteral { a, literal }) => {
            check_register(opcode, *a, 8)?;
            check_literal(opcode, *literal, fits::<i32>(*literal))
        }
        (Format::Format51l, Operands::RegisterLiteral { a, .. }) => check_register(opcode, *a, 8),
        (Format::Format12x, Operands::RegisterPair { a, b }) => {
            check_register(opcode, *a, 4)?;
            check_register(opcode, *b, 4)
        }
        (Format::Format22x, Operands::RegisterPair { a, b }) => {
            check_register(opcode, *a, 8)?;
            check_register(opcode, *b, 16)
        }
        (Format::Format32x, Operands::RegisterPair { .. }) => Ok(()),
        (Format::Format21c | Format::Format31c, Operands::RegisterReference { a, reference }) => {
            check_register(opcode, *a, 8)?;
            check_reference(opcode, reference, reference_type)
        }
        (Format::Format21t | Format::Format31t, Operands::RegisterBranch { a, .. }) => {
            check_register(opcode, *a, 8)
        }
        (Format::Format22b, Operands::TwoRegisterLiteral { a, b, literal }) => {
            check_register(opcode, *a, 8)?;
            check_register(opcode, *b, 8)?;
            check_literal(opcode, *literal, fits::<i8>(*literal))
        }
        (Format::Format22s, Operands::TwoRegisterLiteral { a, b, literal }) => {
            check_register(opcode, *a, 4)?;
            check_register(opcode, *b, 4)?;
            check_literal(opcode, *literal, fits::<i16>(*literal))
        }
        (Format::Format22c, Operands::TwoRegisterReference { a, b, reference }) => {
            check_register(opcode, *a, 4)?;
            check_register(opcode, *b, 4)?;
            check_reference(opcode, reference, reference_type)
        }
        (Format::Format22t, Operands::TwoRegisterBranch { a, b, .. }) => {
            check_register(opcode, *a, 4)?;
            check_register(opcode, *b, 4)
        }
        (Format::Format23x, Operands::ThreeRegister { a, b, c }) => {
            check_register(opcode, *a, 8)?;
            check_register(opcode, *b, 8)?;
            check_register(opcode, *c, 8)
        }
        (Format::Format35c, Operands::RegisterList { registers, reference }) => {
            check_register_list(opcode, registers)?;
            check_reference(opcode, reference, reference_type)
        }
        (Format::Format3rc, Operands::RegisterRange { start, count, reference }) => {
            check_register_range(opcode, *start, *count)?;
            check_reference(opcode, reference, reference_type)
        }
        (Format::Format45cc, Operands::RegisterListProto { registers, reference, proto }) => {
            check_register_list(opcode, registers)?;
            check_reference(opcode, reference, reference_type)?;
            check_proto(opcode, proto)
        }
        (Format::Format4rcc, Operands::RegisterRangeProto { start, count, reference, proto }) => {
            check_register_range(opcode, *start, *count)?;
            check_reference(opcode, reference, reference_type)?;
            check_proto(opcode, proto)
        }
        (Format::PackedSwitchPayload, Operands::PackedSwitchPayload { targets, .. }) => {
            if targets.len() > u16::MAX as usize {
                fail!(EncodingOverflow, "packed-switch payload has {} targets", targets.len());
            }
            Ok(())
        }
        (Format::SparseSwitchPayload, Operands::SparseSwitchPayload { entries }) => {
            if entries.len() > u16::MAX as usize {
                fail!(EncodingOverflow, "sparse-switch payload has {} entries", entries.len());
            }
            Ok(())
        }
        (Format::ArrayPayload, Operands::ArrayPayload { element_width, elements }) => {
            let bits = match element_width {
                1 | 2 | 4 => *element_width as u32 * 8,
                8 => return Ok(()),
                _ => fail!(MalformedInstruction, "invalid array element width {}", element_width),
            };
            for element in elements {
                // either the signed or the unsigned reading of the element must fit
                let unsigned_ok = *element >= 0 && *element < (1i64 << bits);
                if !unsigned_ok && !fits_signed_bits(*element, bits) {
                    fail!(
                        MalformedInstruction,
                        "array element {:#x} does not fit in {} bytes",
                        element,
                        element_width
                    );
                }
            }
            Ok(())
        }
        _ => fail!(MalformedInstruction, "operands do not match format {:?} of {}", format, opcode),
    }
}
