#[cfg(test)]
mod tests {
    use crate::dex::builder::{BuilderOptions, MethodImplementationBuilder};
    use crate::dex::error::ErrorKind;
    use crate::dex::instructions::{Instruction, Operands};
    use crate::dex::opcodes::Opcode;
    use crate::tests::support::{add_nops, branch, move_reg, return_void};

    #[test]
    fn unplaced_branch_target() {
        let mut builder = MethodImplementationBuilder::new(1);
        let nowhere = builder.get_label(Some("nowhere"));
        builder.add_instruction(branch(Opcode::Goto, nowhere)).unwrap();
        builder.add_instruction(return_void()).unwrap();

        let e = builder.finalize().unwrap_err();
        assert_eq!(e.kind(), ErrorKind::UnresolvedLabel);
        assert_eq!(e.message(), "label :nowhere was never placed");
    }

    #[test]
    fn label_placed_twice() {
        let mut builder = MethodImplementationBuilder::new(1);
        let label = builder.add_label(Some("again")).unwrap();
        builder.add_instruction(return_void()).unwrap();

        let e = builder.add_label(Some("again")).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::LabelAlreadyPlaced);
        assert_eq!(builder.place_label(label).unwrap_err().kind(), ErrorKind::LabelAlreadyPlaced);

        builder.remove_label(label).unwrap();
        assert!(!builder.is_placed(label));
        builder.place_label(label).unwrap();
        builder.add_instruction(return_void()).unwrap();
        builder.finalize().unwrap();
        assert_eq!(builder.label_address(label), Some(1));
    }

    #[test]
    fn anonymous_labels_are_distinct() {
        let mut builder = MethodImplementationBuilder::new(1);
        let a = builder.get_label(None);
        let b = builder.get_label(None);
        assert_ne!(a, b);
        assert_eq!(builder.get_label(Some("x")), builder.get_label(Some("x")));
    }

    #[test]
    fn malformed_instructions_fail_at_construction() {
        let e = Instruction::<crate::dex::location::Label>::new(
            Opcode::Move,
            Operands::RegisterPair { a: 16, b: 0 },
        )
        .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::MalformedInstruction);
        assert!(e.message().contains("v16"));

        let mut other = MethodImplementationBuilder::new(1);
        other.get_label(None);
        let foreign = other.get_label(Some("foreign"));
        let mut builder = MethodImplementationBuilder::new(1);
        let e = builder.add_instruction(branch(Opcode::Goto, foreign)).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::MalformedInstruction);
        assert_eq!(builder.instruction_count(), 0);

        // same index as a label of this builder, still rejected
        builder.get_label(None);
        builder.get_label(None);
        let e = builder.add_instruction(branch(Opcode::Goto, foreign)).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::MalformedInstruction);
        assert_eq!(builder.place_label(foreign).unwrap_err().kind(), ErrorKind::UnresolvedLabel);
        assert!(!builder.is_placed(foreign));
        assert_eq!(builder.label_name(foreign), ":L1");

        let mut copy = builder.clone();
        let shared = copy.add_label(None).unwrap();
        assert!(copy.is_placed(shared));
        assert!(!builder.is_placed(shared));
    }

    #[test]
    fn iteration_limit_is_enforced() {
        let build = |limit| {
            let options = BuilderOptions { iteration_limit: Some(limit), ..Default::default() };
            let mut builder = MethodImplementationBuilder::with_options(1, options);
            let target = builder.get_label(Some("target"));
            builder.add_instruction(branch(Opcode::Goto, target)).unwrap();
            add_nops(&mut builder, 500);
            builder.add_label(Some("target")).unwrap();
            builder.add_instruction(return_void()).unwrap();
            builder
        };

        let e = build(1).finalize().unwrap_err();
        assert_eq!(e.kind(), ErrorKind::EncodingOverflow);
        assert!(build(2).finalize().is_ok());
    }

    #[test]
    fn index_mutations_are_bounds_checked() {
        let mut builder = MethodImplementationBuilder::new(1);
        builder.add_instruction(move_reg(0, 0)).unwrap();
        assert_eq!(builder.remove_instruction(1).unwrap_err().kind(), ErrorKind::InvalidIndex);
        assert_eq!(builder.replace_instruction(3, return_void()).unwrap_err().kind(), ErrorKind::InvalidIndex);
        assert_eq!(builder.insert_instruction(2, return_void()).unwrap_err().kind(), ErrorKind::InvalidIndex);
        assert_eq!(builder.swap_instructions(0, 1).unwrap_err().kind(), ErrorKind::InvalidIndex);
        builder.insert_instruction(1, return_void()).unwrap();
        assert_eq!(builder.instruction_count(), 2);
    }
}
