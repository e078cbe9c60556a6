use serde::{Deserialize, Serialize};

/// A debug-info event anchored to a code position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebugItem {
    LineNumber(u32),
    StartLocal {
        register: u16,
        name: Option<String>,
        type_descriptor: Option<String>,
        signature: Option<String>,
    },
    EndLocal(u16),
    RestartLocal(u16),
    PrologueEnd,
    EpilogueBegin,
    /// `None` resets the source file to the class default.
    SetSourceFile(Option<String>),
}
