#![no_main]

use dotemit::assembly::{opcodes, InstructionEmitter, Label, OperandType};
use dotemit::Token;
use libfuzzer_sys::fuzz_target;

// Each input byte pair is one emitter call. Contract violations are expected and ignored;
// the emitter must never panic and a successful finalize must be repeatable.
fuzz_target!(|data: &[u8]| {
    let mut emitter = InstructionEmitter::new();
    let mut labels = Vec::new();

    for chunk in data.chunks_exact(2) {
        let (action, arg) = (chunk[0], chunk[1]);
        let label = |labels: &[Label]| labels.get(usize::from(arg) % labels.len().max(1)).copied();
        let _ = match action % 6 {
            0 => {
                labels.push(emitter.declare_label());
                Ok(())
            }
            1 => match label(labels.as_slice()) {
                Some(l) => emitter.mark_label(l),
                None => Ok(()),
            },
            2 => match label(labels.as_slice()) {
                Some(l) => emitter.emit_branch(opcodes::LONG_BRANCHES[usize::from(arg) % 14], l),
                None => Ok(()),
            },
            3 => {
                let op = opcodes::OPCODES[usize::from(arg) % opcodes::OPCODES.len()];
                match op.operand_type() {
                    OperandType::None => emitter.emit(op),
                    OperandType::Token => emitter.emit_with(op, Token::new(u32::from(arg))),
                    _ => emitter.emit_with(op, i32::from(arg)),
                }
            }
            4 => emitter.emit_switch(&labels),
            _ => emitter.emit_ret(arg & 1 == 1),
        };
    }

    if let Ok(first) = emitter.finalize() {
        assert_eq!(emitter.finalize().ok(), Some(first));
    }
});
