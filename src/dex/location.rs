//! Labels and the slots of a method's instruction sequence.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::dex::debug::DebugItem;
use crate::dex::instructions::BuilderInstruction;

/// A symbolic code position owned by one builder.
///
/// Labels are handles; their name and placement live in the builder that
/// created them, so the handle stays `Copy` and can be stored in operands.
/// Each handle records which builder issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label {
    pub(crate) method: u32,
    pub(crate) index: usize,
}

impl Label {
    pub(crate) fn new(method: u32, index: usize) -> Label {
        Label { method, index }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":L{}", self.index)
    }
}

/// Stable arena handle of a [`MethodLocation`]. It survives insertions and removals
/// elsewhere in the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocationId(pub(crate) usize);

#[derive(Debug, Clone, Default)]
pub struct MethodLocation {
    pub(crate) instruction: Option<BuilderInstruction>,
    pub(crate) code_address: u32,
    pub(crate) index: usize,
    labels: Option<Vec<Label>>,
    debug_items: Option<Vec<DebugItem>>,
}

impl MethodLocation {
    pub(crate) fn new(instruction: Option<BuilderInstruction>) -> MethodLocation {
        MethodLocation { instruction, ..Default::default() }
    }

    pub fn instruction(&self) -> Option<&BuilderInstruction> {
        self.instruction.as_ref()
    }

    /// Address in 16-bit code units from the start of the method.
    pub fn code_address(&self) -> u32 {
        self.code_address
    }

    pub fn byte_address(&self) -> u64 {
        self.code_address as u64 * 2
    }

    /// Position among all locations, the end-of-method sentinel included.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn labels(&self) -> &[Label] {
        self.labels.as_deref().unwrap_or(&[])
    }

    pub fn debug_items(&self) -> &[DebugItem] {
        self.debug_items.as_deref().unwrap_or(&[])
    }

    pub(crate) fn add_label(&mut self, label: Label) {
        self.labels.get_or_insert_with(Vec::new).push(label);
    }

    pub(crate) fn remove_label(&mut self, label: Label) {
        if let Some(labels) = self.labels.as_mut() {
            labels.retain(|l| *l != label);
            if labels.is_empty() {
                self.labels = None;
            }
        }
    }

    pub(crate) fn add_debug_item(&mut self, item: DebugItem) {
        self.debug_items.get_or_insert_with(Vec::new).push(item);
    }

    /// Detaches everything anchored here.
    pub(crate) fn take_anchors(&mut self) -> (Vec<Label>, Vec<DebugItem>) {
        (self.labels.take().unwrap_or_default(), self.debug_items.take().unwrap_or_default())
    }

    /// Anchors `labels` and `debug_items` ahead of the ones already here, keeping their order.
    pub(crate) fn prepend_anchors(&mut self, labels: Vec<Label>, debug_items: Vec<DebugItem>) {
        if !labels.is_empty() {
            let mut merged = labels;
            merged.extend(self.labels.take().unwrap_or_default());
            self.labels = Some(merged);
        }
        if !debug_items.is_empty() {
            let mut merged = debug_items;
            merged.extend(self.debug_items.take().unwrap_or_default());
            self.debug_items = Some(merged);
        }
    }
}
