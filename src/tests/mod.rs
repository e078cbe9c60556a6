mod builder_errors;
mod payload_alignment;
mod properties;

#[cfg(test)]
pub(crate) mod support {
    use crate::dex::builder::MethodImplementationBuilder;
    use crate::dex::finalize::MethodImplementation;
    use crate::dex::instructions::{BuilderInstruction, Instruction, Operands};
    use crate::dex::location::Label;
    use crate::dex::opcodes::Opcode;

    pub(crate) fn return_void() -> BuilderInstruction {
        Instruction::new(Opcode::ReturnVoid, Operands::None).unwrap()
    }

    pub(crate) fn branch(opcode: Opcode, target: Label) -> BuilderInstruction {
        Instruction::new(opcode, Operands::Branch { target }).unwrap()
    }

    pub(crate) fn move_reg(a: u16, b: u16) -> BuilderInstruction {
        Instruction::new(Opcode::Move, Operands::RegisterPair { a, b }).unwrap()
    }

    pub(crate) fn array_payload(element_width: u16, elements: Vec<i64>) -> BuilderInstruction {
        Instruction::new(Opcode::ArrayPayload, Operands::ArrayPayload { element_width, elements }).unwrap()
    }

    pub(crate) fn payload_ref(opcode: Opcode, register: u16, target: Label) -> BuilderInstruction {
        Instruction::new(opcode, Operands::RegisterBranch { a: register, target }).unwrap()
    }

    pub(crate) fn add_nops(builder: &mut MethodImplementationBuilder, count: usize) {
        for _ in 0..count {
            builder.add_instruction(Instruction::nop()).unwrap();
        }
    }

    pub(crate) fn opcodes(method: &MethodImplementation) -> Vec<Opcode> {
        method.instructions.iter().map(|i| i.opcode()).collect()
    }
}
