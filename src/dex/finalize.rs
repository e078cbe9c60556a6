//! The address-resolved form of a method.

use serde::{Deserialize, Serialize};

use crate::dex::builder::MethodImplementationBuilder;
use crate::dex::debug::DebugItem;
use crate::dex::error::{BuilderError, ErrorKind};
use crate::dex::fits;
use crate::dex::instructions::{BuilderInstruction, Instruction};
use crate::dex::location::{Label, LocationId, MethodLocation};
use crate::dex::opcodes::Opcode;
use crate::dex::try_list::TryListBuilder;

/// A finished method body, ready for a binary or text writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodImplementation {
    pub register_count: u16,
    pub instructions: Vec<ResolvedInstruction>,
    pub try_blocks: Vec<TryBlock>,
    pub debug_items: Vec<ResolvedDebugItem>,
}

impl MethodImplementation {
    /// Total size of the instruction stream in code units.
    pub fn code_units(&self) -> u64 {
        self.instructions.iter().map(|i| i.instruction.code_units()).sum()
    }
}

/// An instruction whose targets are signed code-unit offsets.
///
/// Branch offsets are relative to the instruction itself. Switch payload
/// entries are relative to the switch instruction that uses the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedInstruction {
    pub code_address: u32,
    pub instruction: Instruction<i32>,
}

impl ResolvedInstruction {
    pub fn opcode(&self) -> Opcode {
        self.instruction.opcode()
    }

    /// The branch or payload offset, if the instruction has one.
    pub fn offset(&self) -> Option<i32> {
        self.instruction.branch_target().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TryBlock {
    pub start_address: u32,
    pub code_unit_count: u16,
    pub handlers: Vec<ExceptionHandler>,
}

impl TryBlock {
    pub fn end_address(&self) -> u32 {
        self.start_address + self.code_unit_count as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExceptionHandler {
    /// `None` catches everything.
    pub exception_type: Option<String>,
    pub handler_address: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDebugItem {
    pub code_address: u32,
    pub item: DebugItem,
}

/// Single walk over a relaxed builder.
pub(crate) struct Finalizer<'a> {
    builder: &'a MethodImplementationBuilder,
}

impl<'a> Finalizer<'a> {
    pub(crate) fn new(builder: &'a MethodImplementationBuilder) -> Self {
        Finalizer { builder }
    }

    pub(crate) fn run(&self) -> Result<MethodImplementation, BuilderError> {
        let mut instructions = Vec::new();
        let mut debug_items = Vec::new();

        for (id, location) in self.builder.ordered() {
            for item in location.debug_items() {
                debug_items.push(ResolvedDebugItem { code_address: location.code_address(), item: item.clone() });
            }
            let Some(instruction) = location.instruction() else { continue };
            let resolved = self.resolve(id, location, instruction).map_err(|e| {
                BuilderError::with_context(
                    e,
                    format!("{} at {:#x} (index {})", instruction.opcode(), location.code_address(), location.index()),
                )
            })?;
            instructions.push(ResolvedInstruction { code_address: location.code_address(), instruction: resolved });
        }

        Ok(MethodImplementation {
            register_count: self.builder.register_count(),
            instructions,
            try_blocks: self.resolve_try_blocks()?,
            debug_items,
        })
    }

    fn resolve(
        &self,
        id: LocationId,
        location: &MethodLocation,
        instruction: &BuilderInstruction,
    ) -> Result<Instruction<i32>, BuilderError> {
        let opcode = instruction.opcode();
        let format = instruction.format();

        // switch payload entries count from the switch, everything else from itself
        let base: i64 = match opcode {
            Opcode::PackedSwitchPayload | Opcode::SparseSwitchPayload => {
                let referrer = self.builder.payload_referrer(id).ok_or_else(|| {
                    err!(InvalidPayloadReference, "{} is not referenced by a switch", opcode)
                })?;
                self.builder.location(referrer).code_address() as i64
            }
            _ => location.code_address() as i64,
        };

        instruction.try_map_targets(|label| {
            let target = if opcode.is_payload_reference() {
                let payload = self.builder.payload_target(id).ok_or_else(|| {
                    err!(InvalidPayloadReference, "{} is not linked to a payload", opcode)
                })?;
                self.builder.location(payload).code_address()
            } else {
                self.builder.location(self.builder.label_location(*label)?).code_address()
            };
            let offset = target as i64 - base;
            let fits_format = match format.branch_range() {
                Some(_) => format.encodes_offset(offset),
                None => fits::<i32>(offset),
            };
            if !fits_format {
                fail!(
                    EncodingOverflow,
                    "offset {} to {} does not fit format {:?}",
                    offset,
                    self.builder.label_name(*label),
                    format
                );
            }
            Ok(offset as i32)
        })
    }

    fn resolve_try_blocks(&self) -> Result<Vec<TryBlock>, BuilderError> {
        let mut list = TryListBuilder::new();
        for registration in self.builder.try_registrations() {
            let address = |label: Label| -> Result<u32, BuilderError> {
                let location = self.builder.label_location(label)?;
                Ok(self.builder.location(location).code_address())
            };
            let context = || {
                format!(
                    "try block {} .. {} catching {}",
                    self.builder.label_name(registration.start),
                    self.builder.label_name(registration.end),
                    registration.exception_type.as_deref().unwrap_or("everything")
                )
            };
            let resolved = address(registration.start).and_then(|start| {
                let end = address(registration.end)?;
                let handler_address = address(registration.handler)?;
                list.add(
                    start,
                    end,
                    ExceptionHandler { exception_type: registration.exception_type.clone(), handler_address },
                )
            });
            resolved.map_err(|e| BuilderError::with_context(e, context()))?;
        }
        Ok(list.build())
    }
}
