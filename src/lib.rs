//! # Smali builder
//!
//! Method assembly for Dalvik bytecode: collects the instructions, labels,
//! try blocks and debug items of one method, relaxes branch encodings and
//! payload alignment until every offset fits, and produces the
//! address-resolved method for a dex or smali writer.
//!
//! Builders share no state, so methods can be assembled on separate threads.
//!

pub mod dex;
mod tests;

pub use dex::builder::{BuilderOptions, MethodImplementationBuilder};
pub use dex::error::{BuilderError, ErrorKind};
pub use dex::finalize::{ExceptionHandler, MethodImplementation, ResolvedDebugItem, ResolvedInstruction, TryBlock};
pub use dex::instructions::{BuilderInstruction, Instruction, Operands, SparseSwitchEntry};
pub use dex::location::Label;
pub use dex::opcodes::Opcode;
