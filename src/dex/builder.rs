//! Method builder and branch relaxation.
//!
//! [`MethodImplementationBuilder`] collects instructions, labels, try blocks and
//! debug items in source order. [`MethodImplementationBuilder::finalize`] then
//! lays the method out, widening branches whose targets are out of range and
//! padding payloads onto even code-unit addresses until the layout is stable,
//! and hands the result to the finalizer.
//!
//! ```
//! use smali_builder::dex::builder::MethodImplementationBuilder;
//! use smali_builder::dex::instructions::{Instruction, Operands};
//! use smali_builder::dex::opcodes::Opcode;
//!
//! let mut builder = MethodImplementationBuilder::new(1);
//! let end = builder.get_label(Some("end"));
//! builder.add_instruction(Instruction::new(Opcode::Goto, Operands::Branch { target: end }).unwrap()).unwrap();
//! for _ in 0..500 {
//!     builder.add_instruction(Instruction::nop()).unwrap();
//! }
//! builder.add_label(Some("end")).unwrap();
//! builder.add_instruction(Instruction::new(Opcode::ReturnVoid, Operands::None).unwrap()).unwrap();
//!
//! let method = builder.finalize().unwrap();
//! assert_eq!(method.instructions[0].opcode(), Opcode::Goto16);
//! assert_eq!(method.instructions[0].offset(), Some(502));
//! ```

use log::{debug, trace, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::dex::debug::DebugItem;
use crate::dex::error::{BuilderError, ErrorKind};
use crate::dex::finalize::{Finalizer, MethodImplementation};
use crate::dex::instructions::{BuilderInstruction, Instruction, Operands};
use crate::dex::location::{Label, LocationId, MethodLocation};
use crate::dex::opcodes::Opcode;

// Source of the builder ids stamped into labels.
static NEXT_METHOD_ID: AtomicU32 = AtomicU32::new(0);

/// Tuning knobs for [`MethodImplementationBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderOptions {
    /// Upper bound on relaxation passes. `None` derives the bound from the
    /// number of branches that can still be widened.
    pub iteration_limit: Option<usize>,
    /// Drop packed/sparse-switch payloads that no switch instruction points at.
    pub remove_unreferenced_switch_payloads: bool,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        BuilderOptions { iteration_limit: None, remove_unreferenced_switch_payloads: true }
    }
}

#[derive(Debug, Clone)]
struct LabelState {
    name: Option<String>,
    location: Option<LocationId>,
}

/// A try block as registered, before its labels are resolved.
#[derive(Debug, Clone)]
pub(crate) struct TryRegistration {
    pub(crate) start: Label,
    pub(crate) end: Label,
    pub(crate) exception_type: Option<String>,
    pub(crate) handler: Label,
}

#[derive(Debug, Clone)]
pub struct MethodImplementationBuilder {
    // Stamped into every label issued here. A clone keeps it, and with it the label table.
    id: u32,
    register_count: u16,
    options: BuilderOptions,
    arena: Vec<MethodLocation>,
    // Live locations in code order. The last one is the end-of-method sentinel.
    order: Vec<LocationId>,
    labels: Vec<LabelState>,
    named_labels: HashMap<String, Label>,
    try_blocks: Vec<TryRegistration>,
    // payload-referencing instruction -> payload location
    payload_targets: HashMap<LocationId, LocationId>,
    // switch payload -> the switch that refers to it
    payload_referrers: HashMap<LocationId, LocationId>,
    finalized: Option<MethodImplementation>,
}

impl MethodImplementationBuilder {
    pub fn new(register_count: u16) -> Self {
        Self::with_options(register_count, BuilderOptions::default())
    }

    pub fn with_options(register_count: u16, options: BuilderOptions) -> Self {
        MethodImplementationBuilder {
            id: NEXT_METHOD_ID.fetch_add(1, Ordering::Relaxed),
            register_count,
            options,
            arena: vec![MethodLocation::new(None)],
            order: vec![LocationId(0)],
            labels: Vec::new(),
            named_labels: HashMap::new(),
            try_blocks: Vec::new(),
            payload_targets: HashMap::new(),
            payload_referrers: HashMap::new(),
            finalized: None,
        }
    }

    pub fn register_count(&self) -> u16 {
        self.register_count
    }

    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    /// Number of instructions, the end-of-method sentinel excluded.
    pub fn instruction_count(&self) -> usize {
        self.order.len() - 1
    }

    /// Locations in code order, ending with the end-of-method sentinel.
    ///
    /// Addresses and indices are only meaningful after [`finalize`](Self::finalize).
    pub fn locations(&self) -> impl Iterator<Item = &MethodLocation> + '_ {
        self.order.iter().map(move |id| &self.arena[id.0])
    }

    // Labels

    /// Returns the label called `name`, creating it unplaced if needed. Without a
    /// name a fresh anonymous label is returned.
    pub fn get_label(&mut self, name: Option<&str>) -> Label {
        if let Some(name) = name {
            if let Some(label) = self.named_labels.get(name) {
                return *label;
            }
        }
        let label = Label::new(self.id, self.labels.len());
        self.labels.push(LabelState { name: name.map(str::to_string), location: None });
        if let Some(name) = name {
            self.named_labels.insert(name.to_string(), label);
        }
        label
    }

    /// Gets or creates a label and places it at the current end of the method.
    pub fn add_label(&mut self, name: Option<&str>) -> Result<Label, BuilderError> {
        let label = self.get_label(name);
        self.place_label(label)?;
        Ok(label)
    }

    /// Places an unplaced label at the current end of the method.
    pub fn place_label(&mut self, label: Label) -> Result<(), BuilderError> {
        self.check_label(label)?;
        if let Some(location) = self.labels[label.index].location {
            fail!(
                LabelAlreadyPlaced,
                "label {} is already placed at index {}",
                self.label_name(label),
                self.arena[location.0].index
            );
        }
        let end = self.end_location();
        self.attach_label(label, end);
        self.invalidate();
        Ok(())
    }

    /// Unplaces a label so it can be placed again.
    pub fn remove_label(&mut self, label: Label) -> Result<(), BuilderError> {
        self.check_label(label)?;
        if let Some(location) = self.labels[label.index].location.take() {
            self.arena[location.0].remove_label(label);
            self.invalidate();
        }
        Ok(())
    }

    pub fn is_placed(&self, label: Label) -> bool {
        self.state(label).map_or(false, |state| state.location.is_some())
    }

    /// The label's code address as of the last [`finalize`](Self::finalize).
    pub fn label_address(&self, label: Label) -> Option<u32> {
        let location = self.state(label)?.location?;
        Some(self.arena[location.0].code_address)
    }

    pub fn label_name(&self, label: Label) -> String {
        match self.state(label).and_then(|state| state.name.as_ref()) {
            Some(name) => format!(":{}", name.trim_start_matches(':')),
            None => label.to_string(),
        }
    }

    // Try blocks and debug items

    /// Registers a catch of `exception_type` (`None` for catch-all) over `[start, end)`.
    ///
    /// The range is checked once addresses are known, in [`finalize`](Self::finalize).
    pub fn add_try_block(
        &mut self,
        start: Label,
        end: Label,
        exception_type: Option<&str>,
        handler: Label,
    ) -> Result<(), BuilderError> {
        for label in [start, end, handler] {
            self.check_label(label)?;
        }
        self.try_blocks.push(TryRegistration {
            start,
            end,
            exception_type: exception_type.map(str::to_string),
            handler,
        });
        self.invalidate();
        Ok(())
    }

    pub fn add_line_number(&mut self, line: u32) {
        self.add_debug_item(DebugItem::LineNumber(line));
    }

    pub fn add_start_local(
        &mut self,
        register: u16,
        name: Option<&str>,
        type_descriptor: Option<&str>,
        signature: Option<&str>,
    ) {
        self.add_debug_item(DebugItem::StartLocal {
            register,
            name: name.map(str::to_string),
            type_descriptor: type_descriptor.map(str::to_string),
            signature: signature.map(str::to_string),
        });
    }

    pub fn add_end_local(&mut self, register: u16) {
        self.add_debug_item(DebugItem::EndLocal(register));
    }

    pub fn add_restart_local(&mut self, register: u16) {
        self.add_debug_item(DebugItem::RestartLocal(register));
    }

    pub fn add_prologue(&mut self) {
        self.add_debug_item(DebugItem::PrologueEnd);
    }

    pub fn add_epilogue(&mut self) {
        self.add_debug_item(DebugItem::EpilogueBegin);
    }

    pub fn add_set_source_file(&mut self, source_file: Option<&str>) {
        self.add_debug_item(DebugItem::SetSourceFile(source_file.map(str::to_string)));
    }

    fn add_debug_item(&mut self, item: DebugItem) {
        let end = self.end_location();
        self.arena[end.0].add_debug_item(item);
        self.invalidate();
    }

    // Instructions

    /// Appends an instruction. Labels and debug items placed at the current end
    /// become anchored to it.
    pub fn add_instruction(&mut self, instruction: BuilderInstruction) -> Result<(), BuilderError> {
        self.check_targets(&instruction)?;
        let end = self.end_location();
        self.arena[end.0].instruction = Some(instruction);
        let sentinel = self.alloc(MethodLocation::new(None));
        self.order.push(sentinel);
        self.invalidate();
        Ok(())
    }

    /// Inserts an instruction before the one at `index`. Labels anchored at
    /// `index` stay with the instruction already there.
    pub fn insert_instruction(&mut self, index: usize, instruction: BuilderInstruction) -> Result<(), BuilderError> {
        if index > self.instruction_count() {
            fail!(InvalidIndex, "cannot insert at index {} of {} instructions", index, self.instruction_count());
        }
        if index == self.instruction_count() {
            return self.add_instruction(instruction);
        }
        self.check_targets(&instruction)?;
        let id = self.alloc(MethodLocation::new(Some(instruction)));
        self.order.insert(index, id);
        self.invalidate();
        Ok(())
    }

    pub fn replace_instruction(&mut self, index: usize, instruction: BuilderInstruction) -> Result<(), BuilderError> {
        let id = self.instruction_slot(index)?;
        self.check_targets(&instruction)?;
        self.arena[id.0].instruction = Some(instruction);
        self.invalidate();
        Ok(())
    }

    /// Removes the instruction at `index`, moving its labels and debug items onto
    /// the following location.
    pub fn remove_instruction(&mut self, index: usize) -> Result<BuilderInstruction, BuilderError> {
        self.instruction_slot(index)?;
        let removed = self.remove_location(index);
        self.invalidate();
        removed.ok_or_else(|| err!(InvalidIndex, "no instruction at index {}", index))
    }

    /// Exchanges two instructions. Labels and debug items stay where they are.
    pub fn swap_instructions(&mut self, first: usize, second: usize) -> Result<(), BuilderError> {
        let a = self.instruction_slot(first)?;
        let b = self.instruction_slot(second)?;
        let tmp = self.arena[a.0].instruction.take();
        self.arena[a.0].instruction = self.arena[b.0].instruction.take();
        self.arena[b.0].instruction = tmp;
        self.invalidate();
        Ok(())
    }

    // Finalization

    /// Resolves all labels and produces the method's final instructions, try
    /// blocks and debug items.
    ///
    /// Calling it again without mutating the builder returns the same result.
    pub fn finalize(&mut self) -> Result<MethodImplementation, BuilderError> {
        if let Some(method) = &self.finalized {
            return Ok(method.clone());
        }
        self.relax()?;
        let method = Finalizer::new(self).run()?;
        self.finalized = Some(method.clone());
        Ok(method)
    }

    fn relax(&mut self) -> Result<(), BuilderError> {
        self.layout()?;
        self.link_payloads()?;
        let limit = self.options.iteration_limit.unwrap_or_else(|| self.iteration_cap());
        for iteration in 0..limit {
            self.layout()?;
            let promoted = self.promote_branches()?;
            if promoted > 0 {
                debug!("relaxation pass {}: promoted {} branches", iteration, promoted);
                continue;
            }
            let (inserted, removed) = self.align_payloads();
            if inserted + removed > 0 {
                debug!("relaxation pass {}: inserted {} and removed {} nops", iteration, inserted, removed);
                continue;
            }
            debug!("layout converged after {} passes, {} instructions", iteration + 1, self.instruction_count());
            return Ok(());
        }
        fail!(EncodingOverflow, "branch relaxation did not converge within {} passes", limit)
    }

    /// Each pass either widens a branch, or fixes alignment and is followed by a
    /// pass that widens a branch or finishes.
    fn iteration_cap(&self) -> usize {
        let promotions: usize = self
            .locations()
            .filter_map(|location| location.instruction.as_ref())
            .filter(|instruction| instruction.opcode().is_branch())
            .map(|instruction| instruction.format().remaining_promotions())
            .sum();
        2 * promotions + 2
    }

    /// Recomputes index and code address of every location from scratch.
    fn layout(&mut self) -> Result<(), BuilderError> {
        let mut address: u64 = 0;
        for (index, id) in self.order.iter().enumerate() {
            let location = &mut self.arena[id.0];
            if address > u32::MAX as u64 {
                fail!(EncodingOverflow, "method exceeds {} code units", u32::MAX);
            }
            location.index = index;
            location.code_address = address as u32;
            address += location.instruction.as_ref().map_or(0, |i| i.code_units());
        }
        Ok(())
    }

    /// Connects every switch and fill-array-data instruction to its payload and
    /// drops switch payloads nothing refers to.
    fn link_payloads(&mut self) -> Result<(), BuilderError> {
        self.payload_targets.clear();
        self.payload_referrers.clear();

        let mut links = Vec::new();
        for (position, id) in self.order.iter().enumerate() {
            let Some(instruction) = &self.arena[id.0].instruction else { continue };
            let Some(expected) = instruction.opcode().expected_payload() else { continue };
            let context = || format!("{} at index {}", instruction.opcode(), position);
            let target = *instruction
                .branch_target()
                .ok_or_else(|| BuilderError::with_context(err!(MalformedInstruction, "missing payload label"), context()))?;
            let payload = self
                .find_payload(target, expected)
                .map_err(|e| BuilderError::with_context(e, context()))?;
            links.push((*id, payload, instruction.opcode()));
        }

        for (referrer, payload, opcode) in links {
            self.payload_targets.insert(referrer, payload);
            if opcode == Opcode::FillArrayData {
                continue;
            }
            if self.payload_referrers.insert(payload, referrer).is_some() {
                fail!(
                    InvalidPayloadReference,
                    "multiple switch instructions refer to the payload at index {}",
                    self.arena[payload.0].index
                );
            }
        }

        let unreferenced: Vec<usize> = self
            .order
            .iter()
            .enumerate()
            .filter(|(_, id)| {
                self.arena[id.0].instruction.as_ref().map_or(false, |i| {
                    matches!(i.opcode(), Opcode::PackedSwitchPayload | Opcode::SparseSwitchPayload)
                }) && !self.payload_referrers.contains_key(*id)
            })
            .map(|(position, _)| position)
            .collect();
        if let Some(position) = unreferenced.first() {
            if !self.options.remove_unreferenced_switch_payloads {
                fail!(InvalidPayloadReference, "switch payload at index {} is not referenced", position);
            }
        }
        for position in unreferenced.into_iter().rev() {
            warn!("removing unreferenced switch payload at index {}", position);
            self.remove_location(position);
        }
        Ok(())
    }

    /// The payload a label resolves to, skipping any padding nops in front of it.
    fn find_payload(&self, target: Label, expected: Opcode) -> Result<LocationId, BuilderError> {
        let start = self.label_location(target)?;
        let mut position = self.arena[start.0].index;
        loop {
            let id = self.order[position];
            match &self.arena[id.0].instruction {
                None => fail!(
                    InvalidPayloadReference,
                    "label {} points to the end of the method",
                    self.label_name(target)
                ),
                Some(instruction) if instruction.is_nop() => position += 1,
                Some(instruction) if instruction.opcode() == expected => return Ok(id),
                Some(instruction) => fail!(
                    InvalidPayloadReference,
                    "label {} points to {} instead of {}",
                    self.label_name(target),
                    instruction.opcode(),
                    expected
                ),
            }
        }
    }

    /// Widens every branch whose target is out of its format's reach, returning
    /// how many were widened.
    fn promote_branches(&mut self) -> Result<usize, BuilderError> {
        let mut pending = Vec::new();
        for (position, id) in self.order.iter().enumerate() {
            let location = &self.arena[id.0];
            let Some(instruction) = &location.instruction else { continue };
            if !instruction.opcode().is_branch() {
                continue;
            }
            let Some(target) = instruction.branch_target() else { continue };
            let target_address = self.arena[self.label_location(*target)?.0].code_address;
            let offset = target_address as i64 - location.code_address as i64;
            if !instruction.format().encodes_offset(offset) {
                pending.push((position, offset));
            }
        }
        // back to front, so rewrites that insert a location keep earlier positions valid
        for (position, offset) in pending.iter().rev() {
            self.promote(*position, *offset)?;
        }
        Ok(pending.len())
    }

    fn promote(&mut self, position: usize, offset: i64) -> Result<(), BuilderError> {
        let id = self.order[position];
        let Some(instruction) = self.arena[id.0].instruction.clone() else {
            fail!(MalformedInstruction, "no instruction at index {}", position)
        };
        let opcode = instruction.opcode();

        if opcode.is_conditional_branch() {
            return self.rewrite_conditional(position, &instruction);
        }

        let mut promoted = opcode
            .promoted()
            .ok_or_else(|| err!(EncodingOverflow, "offset {} does not fit {} at index {}", offset, opcode, position))?;
        while !promoted.format().encodes_offset(offset) {
            match promoted.promoted() {
                Some(wider) => promoted = wider,
                None => break,
            }
        }
        trace!("index {}: {} -> {} for offset {}", position, opcode, promoted, offset);
        self.arena[id.0].instruction = Some(instruction.with_opcode(promoted)?);
        Ok(())
    }

    /// `if-<cond> :target` becomes `if-<!cond> :skip; goto/32 :target; :skip`.
    fn rewrite_conditional(&mut self, position: usize, instruction: &BuilderInstruction) -> Result<(), BuilderError> {
        let opcode = instruction.opcode();
        let inverted = opcode
            .inverted()
            .ok_or_else(|| err!(MalformedInstruction, "{} has no inverse", opcode))?;
        let next = self.order[position + 1];
        let skip = self.get_label(None);
        self.attach_label(skip, next);

        let (operands, target) = match instruction.operands() {
            Operands::RegisterBranch { a, target } => (Operands::RegisterBranch { a: *a, target: skip }, *target),
            Operands::TwoRegisterBranch { a, b, target } => {
                (Operands::TwoRegisterBranch { a: *a, b: *b, target: skip }, *target)
            }
            _ => fail!(MalformedInstruction, "{} does not carry a branch target", opcode),
        };
        let id = self.order[position];
        self.arena[id.0].instruction = Some(Instruction::new(inverted, operands)?);
        let goto = self.alloc(MethodLocation::new(Some(Instruction::new(
            Opcode::Goto32,
            Operands::Branch { target },
        )?)));
        self.order.insert(position + 1, goto);
        trace!("index {}: {} rewritten as {} around goto/32", position, opcode, inverted);
        Ok(())
    }

    /// Puts every payload on an even code-unit address in one forward sweep,
    /// either by dropping the nop right before it or by inserting one.
    fn align_payloads(&mut self) -> (usize, usize) {
        let mut inserted = 0;
        let mut removed = 0;
        let mut aligned = Vec::with_capacity(self.order.len());
        let mut address: u64 = 0;
        let order = std::mem::take(&mut self.order);

        for id in order {
            let (is_payload, size) = match &self.arena[id.0].instruction {
                Some(instruction) => (instruction.opcode().is_payload(), instruction.code_units()),
                None => (false, 0),
            };
            if is_payload && address % 2 == 1 {
                let previous = aligned.last().copied();
                let previous_is_nop = previous
                    .and_then(|p: LocationId| self.arena[p.0].instruction.as_ref())
                    .map_or(false, |i| i.is_nop());
                match previous {
                    Some(previous) if previous_is_nop => {
                        aligned.pop();
                        self.merge_location(previous, id);
                        address -= 1;
                        removed += 1;
                    }
                    _ => {
                        let nop = self.alloc(MethodLocation::new(Some(Instruction::nop())));
                        aligned.push(nop);
                        address += 1;
                        inserted += 1;
                    }
                }
            }
            aligned.push(id);
            address += size;
        }
        self.order = aligned;
        (inserted, removed)
    }

    // Internals shared with the finalizer

    pub(crate) fn location(&self, id: LocationId) -> &MethodLocation {
        &self.arena[id.0]
    }

    pub(crate) fn ordered(&self) -> impl Iterator<Item = (LocationId, &MethodLocation)> + '_ {
        self.order.iter().map(move |id| (*id, &self.arena[id.0]))
    }

    pub(crate) fn label_location(&self, label: Label) -> Result<LocationId, BuilderError> {
        self.check_label(label)?;
        match self.labels[label.index].location {
            Some(location) => Ok(location),
            None => fail!(UnresolvedLabel, "label {} was never placed", self.label_name(label)),
        }
    }

    pub(crate) fn payload_target(&self, referrer: LocationId) -> Option<LocationId> {
        self.payload_targets.get(&referrer).copied()
    }

    pub(crate) fn payload_referrer(&self, payload: LocationId) -> Option<LocationId> {
        self.payload_referrers.get(&payload).copied()
    }

    pub(crate) fn try_registrations(&self) -> &[TryRegistration] {
        &self.try_blocks
    }

    fn end_location(&self) -> LocationId {
        self.order[self.order.len() - 1]
    }

    fn alloc(&mut self, location: MethodLocation) -> LocationId {
        self.arena.push(location);
        LocationId(self.arena.len() - 1)
    }

    fn invalidate(&mut self) {
        self.finalized = None;
    }

    fn attach_label(&mut self, label: Label, location: LocationId) {
        self.arena[location.0].add_label(label);
        self.labels[label.index].location = Some(location);
    }

    fn state(&self, label: Label) -> Option<&LabelState> {
        if label.method != self.id {
            return None;
        }
        self.labels.get(label.index)
    }

    fn check_label(&self, label: Label) -> Result<(), BuilderError> {
        if self.state(label).is_none() {
            fail!(UnresolvedLabel, "label {} does not belong to this method", label);
        }
        Ok(())
    }

    fn check_targets(&self, instruction: &BuilderInstruction) -> Result<(), BuilderError> {
        for label in instruction.targets() {
            if self.state(*label).is_none() {
                fail!(
                    MalformedInstruction,
                    "{} refers to label {} of another method",
                    instruction.opcode(),
                    label
                );
            }
        }
        Ok(())
    }

    fn instruction_slot(&self, index: usize) -> Result<LocationId, BuilderError> {
        if index >= self.instruction_count() {
            fail!(InvalidIndex, "index {} out of range for {} instructions", index, self.instruction_count());
        }
        Ok(self.order[index])
    }

    /// Moves labels and debug items of `from` in front of those of `into`.
    fn merge_location(&mut self, from: LocationId, into: LocationId) {
        let (labels, debug_items) = self.arena[from.0].take_anchors();
        for label in &labels {
            self.labels[label.index].location = Some(into);
        }
        self.arena[into.0].prepend_anchors(labels, debug_items);
        self.arena[from.0].instruction = None;
    }

    /// Unlinks the location at `position`, merging what is anchored there into
    /// its successor. The sentinel is never removed.
    fn remove_location(&mut self, position: usize) -> Option<BuilderInstruction> {
        if position + 1 >= self.order.len() {
            return None;
        }
        let id = self.order.remove(position);
        let next = self.order[position];
        let instruction = self.arena[id.0].instruction.take();
        self.merge_location(id, next);
        instruction
    }
}
