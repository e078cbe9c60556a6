#[cfg(test)]
mod tests {
    use crate::dex::builder::{BuilderOptions, MethodImplementationBuilder};
    use crate::dex::error::ErrorKind;
    use crate::dex::instructions::{Instruction, Operands, SparseSwitchEntry};
    use crate::dex::opcodes::Opcode;
    use crate::tests::support::{add_nops, array_payload, branch, move_reg, opcodes, payload_ref, return_void};

    #[test]
    fn misaligned_payload_drops_preceding_nop() {
        let mut builder = MethodImplementationBuilder::new(10);
        builder.add_instruction(Instruction::nop()).unwrap();
        builder.add_instruction(array_payload(4, vec![])).unwrap();

        let method = builder.finalize().unwrap();
        assert_eq!(opcodes(&method), vec![Opcode::ArrayPayload]);
    }

    #[test]
    fn odd_sized_instruction_gets_padding_nop() {
        let mut builder = MethodImplementationBuilder::new(10);
        builder.add_instruction(move_reg(0, 0)).unwrap();
        builder.add_instruction(array_payload(4, vec![1, 2])).unwrap();

        let method = builder.finalize().unwrap();
        assert_eq!(opcodes(&method), vec![Opcode::Move, Opcode::Nop, Opcode::ArrayPayload]);
        assert_eq!(method.instructions[2].code_address, 2);
        assert_eq!(
            method.instructions[2].instruction.operands(),
            &Operands::ArrayPayload { element_width: 4, elements: vec![1, 2] }
        );
    }

    #[test]
    fn even_sized_instruction_needs_no_nop() {
        let mut builder = MethodImplementationBuilder::new(10);
        builder
            .add_instruction(Instruction::new(Opcode::Const16, Operands::RegisterLiteral { a: 0, literal: 7 }).unwrap())
            .unwrap();
        builder.add_instruction(array_payload(1, vec![1, 2, 3])).unwrap();

        let method = builder.finalize().unwrap();
        assert_eq!(opcodes(&method), vec![Opcode::Const16, Opcode::ArrayPayload]);
        assert_eq!(method.instructions[1].code_address, 2);
    }

    #[test]
    fn removed_nop_keeps_referent_label() {
        let mut builder = MethodImplementationBuilder::new(10);
        let label = builder.get_label(Some("array_payload"));
        builder.add_instruction(payload_ref(Opcode::FillArrayData, 0, label)).unwrap();
        for _ in 0..3 {
            builder.add_instruction(move_reg(0, 0)).unwrap();
        }
        builder.add_instruction(Instruction::nop()).unwrap();
        builder.add_label(Some("array_payload")).unwrap();
        builder.add_instruction(array_payload(4, vec![])).unwrap();

        let method = builder.finalize().unwrap();
        assert_eq!(
            opcodes(&method),
            vec![Opcode::FillArrayData, Opcode::Move, Opcode::Move, Opcode::Move, Opcode::ArrayPayload]
        );
        assert_eq!(method.instructions[0].offset(), Some(6));
    }

    #[test]
    fn inserted_nop_keeps_referent_label() {
        let mut builder = MethodImplementationBuilder::new(10);
        let label = builder.get_label(Some("array_payload"));
        builder.add_instruction(payload_ref(Opcode::FillArrayData, 0, label)).unwrap();
        for _ in 0..4 {
            builder.add_instruction(move_reg(0, 0)).unwrap();
        }
        builder.add_label(Some("array_payload")).unwrap();
        builder.add_instruction(array_payload(4, vec![])).unwrap();

        let method = builder.finalize().unwrap();
        assert_eq!(
            opcodes(&method),
            vec![
                Opcode::FillArrayData,
                Opcode::Move,
                Opcode::Move,
                Opcode::Move,
                Opcode::Move,
                Opcode::Nop,
                Opcode::ArrayPayload
            ]
        );
        assert_eq!(method.instructions[0].offset(), Some(8));
        assert_eq!(builder.label_address(label), Some(8));
    }

    #[test]
    fn padding_nop_removed_after_promotion() {
        let mut builder = MethodImplementationBuilder::new(1);
        let far = builder.get_label(Some("far"));
        builder.add_instruction(branch(Opcode::Goto, far)).unwrap();
        builder.add_instruction(array_payload(4, vec![])).unwrap();
        // the goto reaches exactly 127 units until a padding nop pushes it over
        add_nops(&mut builder, 122);
        builder.add_label(Some("far")).unwrap();
        builder.add_instruction(return_void()).unwrap();

        let method = builder.finalize().unwrap();
        assert_eq!(method.instructions.len(), 125);
        assert_eq!(method.instructions[0].opcode(), Opcode::Goto16);
        assert_eq!(method.instructions[0].offset(), Some(128));
        assert_eq!(method.instructions[1].opcode(), Opcode::ArrayPayload);
        assert_eq!(method.instructions[1].code_address, 2);
    }

    #[test]
    fn packed_switch_alignment() {
        let mut builder = MethodImplementationBuilder::new(10);

        builder.add_label(Some("switch_target_1")).unwrap();
        let goto_target = builder.get_label(Some("goto_target"));
        builder.add_instruction(branch(Opcode::Goto, goto_target)).unwrap();

        builder.add_label(Some("switch_payload")).unwrap();
        let targets = vec![
            builder.get_label(Some("switch_target_1")),
            builder.get_label(Some("switch_target_2")),
            builder.get_label(Some("switch_target_3")),
        ];
        builder
            .add_instruction(
                Instruction::new(Opcode::PackedSwitchPayload, Operands::PackedSwitchPayload { first_key: 0, targets })
                    .unwrap(),
            )
            .unwrap();

        builder.add_label(Some("goto_target")).unwrap();
        add_nops(&mut builder, 2);
        builder.add_label(Some("switch_target_2")).unwrap();
        add_nops(&mut builder, 1);
        builder.add_label(Some("switch_target_3")).unwrap();
        add_nops(&mut builder, 1);

        let payload = builder.get_label(Some("switch_payload"));
        builder.add_instruction(payload_ref(Opcode::PackedSwitch, 0, payload)).unwrap();

        let method = builder.finalize().unwrap();
        assert_eq!(
            opcodes(&method),
            vec![
                Opcode::Goto,
                Opcode::Nop,
                Opcode::PackedSwitchPayload,
                Opcode::Nop,
                Opcode::Nop,
                Opcode::Nop,
                Opcode::Nop,
                Opcode::PackedSwitch
            ]
        );
        assert_eq!(method.instructions[0].offset(), Some(12));
        assert_eq!(
            method.instructions[2].instruction.operands(),
            &Operands::PackedSwitchPayload { first_key: 0, targets: vec![-16, -2, -1] }
        );
        assert_eq!(method.instructions[7].offset(), Some(-14));
    }

    #[test]
    fn sparse_switch_alignment() {
        let mut builder = MethodImplementationBuilder::new(10);

        builder.add_label(Some("switch_target_1")).unwrap();
        let goto_target = builder.get_label(Some("goto_target"));
        builder.add_instruction(branch(Opcode::Goto, goto_target)).unwrap();

        builder.add_label(Some("switch_payload")).unwrap();
        let entries = vec![
            SparseSwitchEntry { key: 0, target: builder.get_label(Some("switch_target_1")) },
            SparseSwitchEntry { key: 5, target: builder.get_label(Some("switch_target_2")) },
            SparseSwitchEntry { key: 10, target: builder.get_label(Some("switch_target_3")) },
        ];
        builder
            .add_instruction(
                Instruction::new(Opcode::SparseSwitchPayload, Operands::SparseSwitchPayload { entries }).unwrap(),
            )
            .unwrap();

        builder.add_label(Some("goto_target")).unwrap();
        add_nops(&mut builder, 2);
        builder.add_label(Some("switch_target_2")).unwrap();
        add_nops(&mut builder, 1);
        builder.add_label(Some("switch_target_3")).unwrap();
        add_nops(&mut builder, 1);

        let payload = builder.get_label(Some("switch_payload"));
        builder.add_instruction(payload_ref(Opcode::SparseSwitch, 0, payload)).unwrap();

        let method = builder.finalize().unwrap();
        assert_eq!(method.instructions.len(), 8);
        assert_eq!(method.instructions[1].opcode(), Opcode::Nop);
        assert_eq!(method.instructions[0].offset(), Some(16));
        assert_eq!(
            method.instructions[2].instruction.targets(),
            vec![&-20, &-2, &-1]
        );
        assert_eq!(method.instructions[7].opcode(), Opcode::SparseSwitch);
        assert_eq!(method.instructions[7].offset(), Some(-18));
    }

    #[test]
    fn switch_label_on_padding_nop_resolves_to_payload() {
        let mut builder = MethodImplementationBuilder::new(1);
        let data = builder.get_label(Some("pswitch_data_0"));
        builder.add_instruction(payload_ref(Opcode::PackedSwitch, 0, data)).unwrap();
        builder.add_label(Some("pswitch_data_0")).unwrap();
        builder.add_instruction(Instruction::nop()).unwrap();
        let done = builder.add_label(Some("done")).unwrap();
        builder
            .add_instruction(
                Instruction::new(
                    Opcode::PackedSwitchPayload,
                    Operands::PackedSwitchPayload { first_key: 1, targets: vec![done] },
                )
                .unwrap(),
            )
            .unwrap();

        let method = builder.finalize().unwrap();
        assert_eq!(opcodes(&method), vec![Opcode::PackedSwitch, Opcode::Nop, Opcode::PackedSwitchPayload]);
        assert_eq!(method.instructions[0].offset(), Some(4));
        assert_eq!(method.instructions[2].code_address, 4);
    }

    #[test]
    fn unreferenced_switch_payload_is_removed() {
        let mut builder = MethodImplementationBuilder::new(1);
        let done = builder.get_label(Some("done"));
        builder.add_instruction(return_void()).unwrap();
        builder.add_line_number(12);
        builder
            .add_instruction(
                Instruction::new(
                    Opcode::SparseSwitchPayload,
                    Operands::SparseSwitchPayload { entries: vec![SparseSwitchEntry { key: 3, target: done }] },
                )
                .unwrap(),
            )
            .unwrap();
        builder.add_label(Some("done")).unwrap();

        let method = builder.finalize().unwrap();
        assert_eq!(opcodes(&method), vec![Opcode::ReturnVoid]);
        // the line marker of the removed payload moves to the end of the method
        assert_eq!(method.debug_items.len(), 1);
        assert_eq!(method.debug_items[0].code_address, 1);

        let options = BuilderOptions { remove_unreferenced_switch_payloads: false, ..Default::default() };
        let mut builder = MethodImplementationBuilder::with_options(1, options);
        let done = builder.get_label(Some("done"));
        builder
            .add_instruction(
                Instruction::new(
                    Opcode::PackedSwitchPayload,
                    Operands::PackedSwitchPayload { first_key: 0, targets: vec![done] },
                )
                .unwrap(),
            )
            .unwrap();
        builder.add_label(Some("done")).unwrap();
        let e = builder.finalize().unwrap_err();
        assert_eq!(e.kind(), ErrorKind::InvalidPayloadReference);
    }

    #[test]
    fn switch_must_point_at_matching_payload() {
        let mut builder = MethodImplementationBuilder::new(1);
        let data = builder.get_label(Some("data"));
        builder.add_instruction(payload_ref(Opcode::PackedSwitch, 0, data)).unwrap();
        builder.add_instruction(Instruction::nop()).unwrap();
        builder.add_label(Some("data")).unwrap();
        builder.add_instruction(array_payload(2, vec![1])).unwrap();
        let e = builder.finalize().unwrap_err();
        assert_eq!(e.kind(), ErrorKind::InvalidPayloadReference);

        let mut builder = MethodImplementationBuilder::new(1);
        let data = builder.get_label(Some("data"));
        builder.add_instruction(payload_ref(Opcode::FillArrayData, 0, data)).unwrap();
        builder.add_label(Some("data")).unwrap();
        let e = builder.finalize().unwrap_err();
        assert_eq!(e.kind(), ErrorKind::InvalidPayloadReference);
    }

    #[test]
    fn shared_switch_payload_is_rejected() {
        let mut builder = MethodImplementationBuilder::new(1);
        let data = builder.get_label(Some("data"));
        builder.add_instruction(payload_ref(Opcode::PackedSwitch, 0, data)).unwrap();
        builder.add_instruction(payload_ref(Opcode::PackedSwitch, 0, data)).unwrap();
        let done = builder.add_label(Some("data")).unwrap();
        builder
            .add_instruction(
                Instruction::new(
                    Opcode::PackedSwitchPayload,
                    Operands::PackedSwitchPayload { first_key: 0, targets: vec![done] },
                )
                .unwrap(),
            )
            .unwrap();
        let e = builder.finalize().unwrap_err();
        assert_eq!(e.kind(), ErrorKind::InvalidPayloadReference);
    }
}
