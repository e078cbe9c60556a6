//! Instruction formats: operand layout, code-unit size and branch reach.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Represents different types of references used by opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceType {
    None,
    String,
    Type,
    Field,
    Method,
    CallSite,
    MethodProto,
    MethodHandle,
}

// Defines various flags that can be associated with an opcode.
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpcodeFlags: u32 {
        const CAN_THROW = 0x1;
        const CAN_CONTINUE = 0x4;
        const SETS_RESULT = 0x8;
        const SETS_REGISTER = 0x10;
        const SETS_WIDE_REGISTER = 0x20;
        const STATIC_FIELD_ACCESSOR = 0x100;
        const CAN_INITIALIZE_REFERENCE = 0x400;
        /// The instruction transfers control to a label (goto, if-*).
        const BRANCH = 0x800;
        /// The instruction refers to a payload block (switches, fill-array-data).
        const PAYLOAD_REFERENCE = 0x1000;
        /// Conditional branch; the fall-through path stays live.
        const CONDITIONAL = 0x2000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    Format10t,
    Format10x,
    Format11n,
    Format11x,
    Format12x,
    Format20t,
    Format21c,
    Format21ih,
    Format21lh,
    Format21s,
    Format21t,
    Format22b,
    Format22c,
    Format22s,
    Format22t,
    Format22x,
    Format23x,
    Format30t,
    Format31c,
    Format31i,
    Format31t,
    Format32x,
    Format35c,
    Format3rc,
    Format45cc,
    Format4rcc,
    Format51l,
    ArrayPayload,
    PackedSwitchPayload,
    SparseSwitchPayload,
}

impl Format {
    /// Returns the fixed size of the format in 16-bit code units.
    ///
    /// Payload formats are variable-sized and return `None`; their size depends on the
    /// payload contents (see `Operands::code_units`).
    pub const fn code_units(&self) -> Option<u32> {
        match self {
            Format::Format10t
            | Format::Format10x
            | Format::Format11n
            | Format::Format11x
            | Format::Format12x => Some(1),

            Format::Format20t
            | Format::Format21c
            | Format::Format21ih
            | Format::Format21lh
            | Format::Format21s
            | Format::Format21t
            | Format::Format22b
            | Format::Format22c
            | Format::Format22s
            | Format::Format22t
            | Format::Format22x
            | Format::Format23x => Some(2),

            Format::Format30t
            | Format::Format31c
            | Format::Format31i
            | Format::Format31t
            | Format::Format32x
            | Format::Format35c
            | Format::Format3rc => Some(3),

            Format::Format45cc | Format::Format4rcc => Some(4),

            Format::Format51l => Some(5),

            Format::ArrayPayload
            | Format::PackedSwitchPayload
            | Format::SparseSwitchPayload => None,
        }
    }

    /// Indicates whether the format is a payload format.
    pub const fn is_payload_format(&self) -> bool {
        matches!(
            self,
            Format::ArrayPayload | Format::PackedSwitchPayload | Format::SparseSwitchPayload
        )
    }

    /// Signed code-unit offsets representable by a label-carrying format.
    pub fn branch_range(&self) -> Option<RangeInclusive<i64>> {
        match self {
            Format::Format10t => Some(i8::MIN as i64..=i8::MAX as i64),
            Format::Format20t | Format::Format21t | Format::Format22t => {
                Some(i16::MIN as i64..=i16::MAX as i64)
            }
            Format::Format30t | Format::Format31t => Some(i32::MIN as i64..=i32::MAX as i64),
            _ => None,
        }
    }

    /// True if a label-carrying format can encode `offset`.
    ///
    /// Offset 0 is reserved in every branch format below 32 bits, so a branch
    /// to itself needs 30t.
    pub fn encodes_offset(&self, offset: i64) -> bool {
        match self.branch_range() {
            Some(_) if offset == 0 => matches!(self, Format::Format30t | Format::Format31t),
            Some(range) => range.contains(&offset),
            None => false,
        }
    }

    /// The next wider format of the same kind, if any.
    ///
    /// Only the unconditional branch family has one; conditional branches top out at 16 bits.
    pub const fn promotion(&self) -> Option<Format> {
        match self {
            Format::Format10t => Some(Format::Format20t),
            Format::Format20t => Some(Format::Format30t),
            _ => None,
        }
    }

    /// How many times an instruction of this format can still grow during relaxation.
    pub const fn remaining_promotions(&self) -> usize {
        match self {
            Format::Format10t => 2,
            Format::Format20t => 1,
            // rewritten once into an inverted branch around a goto/32
            Format::Format21t | Format::Format22t => 1,
            _ => 0,
        }
    }
}
