#[cfg(test)]
mod tests {
    use crate::dex::builder::MethodImplementationBuilder;
    use crate::dex::debug::DebugItem;
    use crate::dex::instructions::{Instruction, Operands};
    use crate::dex::opcodes::Opcode;
    use crate::tests::support::{add_nops, array_payload, branch, move_reg, opcodes, payload_ref, return_void};

    /// Forward and backward branches of mixed widths around payloads of odd sizes.
    fn mixed_method() -> MethodImplementationBuilder {
        let mut builder = MethodImplementationBuilder::new(4);
        let top = builder.add_label(Some("top")).unwrap();
        let end = builder.get_label(Some("end"));
        for round in 0..12u16 {
            let data = builder.get_label(None);
            builder.add_instruction(payload_ref(Opcode::FillArrayData, 0, data)).unwrap();
            builder.add_instruction(branch(Opcode::Goto, end)).unwrap();
            for _ in 0..round % 3 {
                builder.add_instruction(move_reg(1, 2)).unwrap();
            }
            builder
                .add_instruction(Instruction::new(Opcode::IfNez, Operands::RegisterBranch { a: 0, target: top }).unwrap())
                .unwrap();
            add_nops(&mut builder, 3000 * round as usize);
            builder.place_label(data).unwrap();
            builder.add_instruction(array_payload(1, vec![0; round as usize])).unwrap();
        }
        builder.add_label(Some("end")).unwrap();
        builder.add_instruction(return_void()).unwrap();
        builder
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut builder = mixed_method();
        let first = builder.finalize().unwrap();
        let second = builder.finalize().unwrap();
        assert_eq!(first, second);

        // a fresh run over the already relaxed layout changes nothing either
        builder.add_line_number(9);
        let third = builder.finalize().unwrap();
        assert_eq!(first.instructions, third.instructions);
        assert_eq!(third.debug_items.len(), 1);
    }

    #[test]
    fn every_offset_fits_its_format() {
        let method = mixed_method().finalize().unwrap();
        for resolved in &method.instructions {
            let Some(offset) = resolved.offset() else { continue };
            if let Some(range) = resolved.instruction.format().branch_range() {
                assert!(range.contains(&(offset as i64)), "{:?} at {:#x}", resolved.opcode(), resolved.code_address);
            }
        }
        assert!(opcodes(&method).contains(&Opcode::Goto32));
        assert!(opcodes(&method).contains(&Opcode::IfEqz));
    }

    #[test]
    fn payloads_are_aligned() {
        let method = mixed_method().finalize().unwrap();
        let payloads: Vec<u32> = method
            .instructions
            .iter()
            .filter(|i| i.opcode().is_payload())
            .map(|i| i.code_address)
            .collect();
        assert_eq!(payloads.len(), 12);
        assert!(payloads.iter().all(|address| address % 2 == 0));
    }

    #[test]
    fn addresses_are_running_sums() {
        let method = mixed_method().finalize().unwrap();
        let mut address = 0u64;
        for resolved in &method.instructions {
            assert_eq!(resolved.code_address as u64, address);
            address += resolved.instruction.code_units();
        }
        assert_eq!(method.code_units(), address);
    }

    #[test]
    fn formats_never_shrink() {
        let method = mixed_method().finalize().unwrap();
        let gotos: Vec<Opcode> = opcodes(&method)
            .into_iter()
            .filter(|opcode| matches!(opcode, Opcode::Goto | Opcode::Goto16 | Opcode::Goto32))
            .collect();
        assert!(gotos.len() >= 12);
        assert!(gotos.iter().all(|opcode| *opcode == Opcode::Goto32));

        // a goto/16 that could be encoded as goto keeps its width
        let mut builder = MethodImplementationBuilder::new(1);
        let next = builder.get_label(None);
        builder.add_instruction(branch(Opcode::Goto16, next)).unwrap();
        builder.place_label(next).unwrap();
        builder.add_instruction(return_void()).unwrap();
        let method = builder.finalize().unwrap();
        assert_eq!(method.instructions[0].opcode(), Opcode::Goto16);
        assert_eq!(method.instructions[0].offset(), Some(2));
    }

    #[test]
    fn removed_instruction_hands_anchors_forward() {
        let mut builder = MethodImplementationBuilder::new(2);
        builder.add_instruction(move_reg(0, 1)).unwrap();
        let target = builder.add_label(Some("target")).unwrap();
        builder.add_line_number(1);
        builder.add_instruction(Instruction::nop()).unwrap();
        builder.add_line_number(2);
        builder.add_instruction(return_void()).unwrap();

        let removed = builder.remove_instruction(1).unwrap();
        assert_eq!(removed.opcode(), Opcode::Nop);

        let method = builder.finalize().unwrap();
        assert_eq!(opcodes(&method), vec![Opcode::Move, Opcode::ReturnVoid]);
        assert_eq!(builder.label_address(target), Some(1));
        let items: Vec<(u32, &DebugItem)> = method.debug_items.iter().map(|d| (d.code_address, &d.item)).collect();
        assert_eq!(items, vec![(1, &DebugItem::LineNumber(1)), (1, &DebugItem::LineNumber(2))]);
    }

    #[test]
    fn insert_and_swap_keep_labels_in_place() {
        let mut builder = MethodImplementationBuilder::new(2);
        let first = builder.add_label(Some("first")).unwrap();
        builder.add_instruction(move_reg(0, 1)).unwrap();
        let second = builder.add_label(Some("second")).unwrap();
        builder.add_instruction(return_void()).unwrap();

        builder
            .insert_instruction(0, Instruction::new(Opcode::Const16, Operands::RegisterLiteral { a: 0, literal: 1 }).unwrap())
            .unwrap();
        builder.swap_instructions(1, 2).unwrap();

        let method = builder.finalize().unwrap();
        assert_eq!(opcodes(&method), vec![Opcode::Const16, Opcode::ReturnVoid, Opcode::Move]);
        assert_eq!(builder.label_address(first), Some(2));
        assert_eq!(builder.label_address(second), Some(3));
        assert_eq!(builder.locations().map(|l| l.index()).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert_eq!(builder.locations().nth(1).map(|l| l.byte_address()), Some(4));
    }

    #[test]
    fn debug_items_keep_insertion_order() {
        let mut builder = MethodImplementationBuilder::new(3);
        builder.add_prologue();
        builder.add_start_local(2, Some("this"), Some("Lcom/example/Foo;"), None);
        builder.add_line_number(10);
        builder.add_instruction(move_reg(0, 1)).unwrap();
        builder.add_end_local(2);
        builder.add_restart_local(2);
        builder.add_epilogue();
        builder.add_set_source_file(Some("Foo.java"));
        builder.add_instruction(return_void()).unwrap();

        let method = builder.finalize().unwrap();
        let items: Vec<(u32, DebugItem)> = method.debug_items.into_iter().map(|d| (d.code_address, d.item)).collect();
        assert_eq!(
            items,
            vec![
                (0, DebugItem::PrologueEnd),
                (
                    0,
                    DebugItem::StartLocal {
                        register: 2,
                        name: Some("this".to_string()),
                        type_descriptor: Some("Lcom/example/Foo;".to_string()),
                        signature: None,
                    }
                ),
                (0, DebugItem::LineNumber(10)),
                (1, DebugItem::EndLocal(2)),
                (1, DebugItem::RestartLocal(2)),
                (1, DebugItem::EpilogueBegin),
                (1, DebugItem::SetSourceFile(Some("Foo.java".to_string()))),
            ]
        );
    }
}
