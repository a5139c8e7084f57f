//! Single-pass CIL instruction emitter.
//!
//! [`InstructionEmitter`] assembles one method body. It appends opcodes and operands to a
//! [`CodeBuffer`], applies every opcode's stack effect to a [`StackTracker`], and resolves
//! branch targets through the [`LabelTable`].
//!
//! # Branch Relocation
//!
//! Labels are declared before their position is known. A branch to a label that is already
//! marked (a backward branch) knows its displacement at emission time and uses the short
//! form when the displacement fits a signed byte. A branch to a label that is not marked yet
//! (a forward branch) is always emitted in long form with a zero placeholder; marking the
//! label later patches every placeholder that is waiting on it. Forward branches therefore
//! never fail with an out-of-range displacement, at the cost of never being short.
//!
//! ```rust
//! use dotemit::assembly::{opcodes, InstructionEmitter};
//!
//! let mut emitter = InstructionEmitter::new();
//! let skip = emitter.declare_label();
//!
//! emitter.emit(opcodes::LDARG_0)?;
//! emitter.emit_branch(opcodes::BRFALSE, skip)?;   // forward: long form, patched later
//! emitter.emit(opcodes::NOP)?;
//! emitter.mark_label(skip)?;
//! emitter.emit_ret(false)?;
//!
//! let (code, max_stack) = emitter.finalize()?;
//! assert_eq!(code, vec![0x02, 0x39, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2A]);
//! assert_eq!(max_stack, 1);
//! # Ok::<(), dotemit::Error>(())
//! ```
//!
//! # Stack Heights at Labels
//!
//! Every edge into a label (branches, switch entries, and the fall-through path when the
//! label is marked in reachable code) contributes its stack height. The label keeps the
//! maximum, and emission continues after the label at that height. Heights of divergent
//! edges are not required to be equal; this tracks depth only and is not a verifier.

use log::{debug, trace};

use crate::{
    assembly::{
        buffer::CodeBuffer,
        config::EmitterConfig,
        instruction::{FlowType, Immediate, Operand, OperandType},
        labels::{Label, LabelTable, PendingRef},
        opcodes::{self, OpCode},
        stack::StackTracker,
    },
    Error, Result, Token,
};

/// Handle of a local variable declared on an [`InstructionEmitter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Local(u16);

impl Local {
    /// Index of the local in the method's local signature.
    #[must_use]
    pub fn index(&self) -> u16 {
        self.0
    }
}

impl From<Local> for u16 {
    fn from(local: Local) -> Self {
        local.0
    }
}

/// Incremental assembler for a single CIL method body.
///
/// One emitter corresponds to exactly one method body. It is not meant to be shared; emit
/// several bodies concurrently by giving each thread its own emitter. The opcode tables it
/// reads are immutable statics.
///
/// # Examples
///
/// ```rust
/// use dotemit::assembly::{opcodes, InstructionEmitter};
///
/// // while (x != 0) x = x - 1; return x;
/// let mut emitter = InstructionEmitter::new();
/// let head = emitter.declare_label();
/// let exit = emitter.declare_label();
///
/// emitter.mark_label(head)?;
/// emitter.emit_ldarg(0)?;
/// emitter.emit_branch(opcodes::BRFALSE, exit)?;
/// emitter.emit_ldarg(0)?;
/// emitter.emit_ldc_i4(1)?;
/// emitter.emit(opcodes::SUB)?;
/// emitter.emit_starg(0)?;
/// emitter.emit_branch(opcodes::BR, head)?;        // backward: short form
/// emitter.mark_label(exit)?;
/// emitter.emit_ldarg(0)?;
/// emitter.emit_ret(true)?;
///
/// let (code, max_stack) = emitter.finalize()?;
/// assert_eq!(&code[11..13], &[0x2B, 0xF3]);      // br.s -13
/// assert_eq!(max_stack, 2);
/// # Ok::<(), dotemit::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct InstructionEmitter {
    config: EmitterConfig,
    buffer: CodeBuffer,
    labels: LabelTable,
    stack: StackTracker,
    locals: Vec<Token>,
}

impl InstructionEmitter {
    /// Create an emitter with the default [`EmitterConfig`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EmitterConfig::default())
    }

    /// Create an emitter with an explicit configuration.
    #[must_use]
    pub fn with_config(config: EmitterConfig) -> Self {
        InstructionEmitter {
            config,
            buffer: CodeBuffer::with_capacity(config.initial_capacity),
            labels: LabelTable::new(),
            stack: StackTracker::new(),
            locals: Vec::new(),
        }
    }

    /// The configuration this emitter was created with.
    #[must_use]
    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    /// Declare a new, unmarked label.
    pub fn declare_label(&mut self) -> Label {
        self.labels.declare()
    }

    /// Declare a local variable of the given (already resolved) type.
    ///
    /// Locals are numbered in declaration order, starting at 0.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] when more than 65535 locals are declared.
    pub fn declare_local(&mut self, local_type: Token) -> Result<Local> {
        let index = u16::try_from(self.locals.len())
            .map_err(|_| malformed_error!("Too many locals - {}", self.locals.len()))?;
        self.locals.push(local_type);
        Ok(Local(index))
    }

    /// Types of the declared locals, in index order.
    #[must_use]
    pub fn locals(&self) -> &[Token] {
        &self.locals
    }

    /// Emit an instruction without operand.
    ///
    /// # Errors
    ///
    /// See [`InstructionEmitter::emit_instruction`].
    pub fn emit(&mut self, opcode: OpCode) -> Result<()> {
        self.emit_instruction(opcode, None)
    }

    /// Emit an instruction with an immediate or token operand.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dotemit::{assembly::{opcodes, InstructionEmitter}, Token};
    ///
    /// let mut emitter = InstructionEmitter::new();
    /// emitter.emit_with(opcodes::LDC_I4_S, -2i8)?;
    /// emitter.emit_with(opcodes::LDSTR, Token::new(0x7000_0001))?;
    /// assert_eq!(emitter.code(), &[0x1F, 0xFE, 0x72, 0x01, 0x00, 0x00, 0x70]);
    /// # Ok::<(), dotemit::Error>(())
    /// ```
    ///
    /// # Errors
    ///
    /// See [`InstructionEmitter::emit_instruction`].
    pub fn emit_with(&mut self, opcode: OpCode, operand: impl Into<Operand>) -> Result<()> {
        self.emit_instruction(opcode, Some(operand.into()))
    }

    /// Emit an instruction with an optional operand.
    ///
    /// The operand must match the opcode's operand type. Nothing is written when an error
    /// is returned.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::InvalidBranch`] for branch and switch opcodes, which take labels
    /// - [`crate::Error::VariableStackEffect`] for call-like opcodes and `ret`
    /// - [`crate::Error::UnexpectedOperand`] / [`crate::Error::WrongOperandType`] on an
    ///   operand mismatch
    /// - [`crate::Error::StackUnderflow`] if the opcode pops more than the stack holds
    pub fn emit_instruction(&mut self, opcode: OpCode, operand: Option<Operand>) -> Result<()> {
        if opcode.is_branch() {
            return Err(Error::InvalidBranch(format!(
                "'{opcode}' takes a label, use emit_branch"
            )));
        }
        if opcode.flow() == FlowType::Switch {
            return Err(Error::InvalidBranch(format!(
                "'{opcode}' takes a label table, use emit_switch"
            )));
        }

        let (pops, pushes) = fixed_stack_effect(opcode)?;
        check_operand(operand.as_ref(), opcode.operand_type())?;
        self.stack.apply(opcode.name(), pops, pushes)?;

        self.write_opcode(opcode);
        if let Some(operand) = operand {
            self.write_operand(operand);
        }
        self.follow_flow(opcode.flow());
        Ok(())
    }

    /// Emit a branch to `label`.
    ///
    /// `opcode` may be either the short or the long form of a branch; the emitter picks the
    /// encoding. A label that is already marked gets the short form if the displacement from
    /// the end of the short instruction fits a signed byte (and the configuration allows it),
    /// otherwise the long form. A label that is not marked yet always gets the long form and a
    /// placeholder that is patched by [`InstructionEmitter::mark_label`].
    ///
    /// # Errors
    ///
    /// - [`crate::Error::InvalidBranch`] if `opcode` is not a branch
    /// - [`crate::Error::UnknownLabel`] for a label this emitter did not declare
    /// - [`crate::Error::StackUnderflow`] if the branch pops more than the stack holds
    pub fn emit_branch(&mut self, opcode: OpCode, label: Label) -> Result<()> {
        let (short, long) = match (opcode.short_form(), opcode.long_form()) {
            (Some(short), Some(long)) => (short, long),
            _ => {
                return Err(Error::InvalidBranch(format!(
                    "'{opcode}' is not a branch instruction"
                )))
            }
        };
        let target = self.labels.get(label)?.offset;
        let (pops, pushes) = fixed_stack_effect(long)?;
        self.stack.apply(long.name(), pops, pushes)?;

        let start = self.buffer.offset();
        match target {
            Some(target) => {
                let short_end = i64::from(start) + i64::from(short.size()) + 1;
                let displacement = i64::from(target) - short_end;
                if self.config.short_backward_branches && (-128..=127).contains(&displacement) {
                    #[allow(clippy::cast_possible_truncation)]
                    let displacement = displacement as i8;
                    self.write_opcode(short);
                    self.buffer.emit_i8(displacement);
                } else {
                    let long_end = i64::from(start) + i64::from(long.size()) + 4;
                    let displacement = i32::try_from(i64::from(target) - long_end)
                        .map_err(|_| malformed_error!("Branch displacement exceeds i32 range"))?;
                    self.write_opcode(long);
                    self.buffer.emit_i32(displacement);
                }
            }
            None => {
                self.write_opcode(long);
                let patch_address = self.buffer.offset();
                self.buffer.emit_u32(0);
                self.labels.get_mut(label)?.pending.push(PendingRef {
                    patch_address,
                    switch_base: None,
                });
            }
        }

        // leave empties the evaluation stack
        let edge_height = if long.flow() == FlowType::Leave {
            0
        } else {
            self.stack.height()
        };
        self.record_edge(label, edge_height)?;
        self.follow_flow(long.flow());
        Ok(())
    }

    /// Emit a `switch` jump table over `targets`.
    ///
    /// Entry `i` transfers control to `targets[i]`; out-of-range values fall through. Each
    /// entry is a 4-byte displacement relative to the end of the table. Entries for labels
    /// that are not marked yet are patched when the label is marked.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::InvalidBranch`] for an empty target list
    /// - [`crate::Error::UnknownLabel`] for a label this emitter did not declare
    /// - [`crate::Error::StackUnderflow`] if the stack holds no selector value
    pub fn emit_switch(&mut self, targets: &[Label]) -> Result<()> {
        if targets.is_empty() {
            return Err(Error::InvalidBranch(
                "switch must have at least one target".to_string(),
            ));
        }
        for label in targets {
            self.labels.get(*label)?;
        }
        let count = u32::try_from(targets.len())
            .map_err(|_| malformed_error!("Too many switch targets"))?;
        let (pops, pushes) = fixed_stack_effect(opcodes::SWITCH)?;
        self.stack.apply(opcodes::SWITCH.name(), pops, pushes)?;

        self.write_opcode(opcodes::SWITCH);
        self.buffer.emit_u32(count);
        let table_start = self.buffer.offset();
        let table_end = i64::from(table_start) + i64::from(count) * 4;
        let switch_base = u32::try_from(table_end)
            .map_err(|_| malformed_error!("Switch table exceeds u32 range"))?;

        for label in targets {
            match self.labels.get(*label)?.offset {
                Some(target) => {
                    let displacement = i32::try_from(i64::from(target) - table_end)
                        .map_err(|_| malformed_error!("Switch displacement exceeds i32 range"))?;
                    self.buffer.emit_i32(displacement);
                }
                None => {
                    let patch_address = self.buffer.offset();
                    self.buffer.emit_u32(0);
                    self.labels.get_mut(*label)?.pending.push(PendingRef {
                        patch_address,
                        switch_base: Some(switch_base),
                    });
                }
            }
        }

        let height = self.stack.height();
        for label in targets {
            self.record_edge(*label, height)?;
        }
        Ok(())
    }

    /// Emit `call`, `callvirt`, `calli` or `newobj` with a call-site stack effect.
    ///
    /// `arg_count` is the number of values popped, including `this` for instance calls.
    /// `has_result` states whether the callee pushes a return value. `newobj` always pushes
    /// the new object and pops only the constructor arguments.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Malformed`] if `opcode` is not a call instruction
    /// - [`crate::Error::StackUnderflow`] if fewer than `arg_count` values are on the stack
    pub fn emit_call(
        &mut self,
        opcode: OpCode,
        method: Token,
        arg_count: u16,
        has_result: bool,
    ) -> Result<()> {
        if opcode.flow() != FlowType::Call {
            return Err(malformed_error!("'{}' is not a call instruction", opcode));
        }

        let (pop, push) = opcode.stack_effect();
        let pops = pop.count().unwrap_or(u32::from(arg_count));
        let pushes = push.count().unwrap_or(u32::from(has_result));
        self.stack.apply(opcode.name(), pops, pushes)?;

        self.write_opcode(opcode);
        self.buffer.emit_u32(method.value());
        Ok(())
    }

    /// Emit `ret`, popping the return value if the method has one.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StackUnderflow`] if a value is returned from an empty stack.
    pub fn emit_ret(&mut self, returns_value: bool) -> Result<()> {
        self.stack
            .apply(opcodes::RET.name(), u32::from(returns_value), 0)?;
        self.write_opcode(opcodes::RET);
        self.follow_flow(opcodes::RET.flow());
        Ok(())
    }

    /// Emit a `ldarg` instruction with optimal encoding.
    ///
    /// Automatically selects the most compact form:
    /// - `ldarg.0` through `ldarg.3` for indices 0-3 (1 byte)
    /// - `ldarg.s` for indices 4-255 (2 bytes)
    /// - `ldarg` for indices 256+ (4 bytes)
    ///
    /// # Errors
    ///
    /// Only fails if the underlying emission fails.
    pub fn emit_ldarg(&mut self, index: u16) -> Result<()> {
        match index {
            0 => self.emit(opcodes::LDARG_0),
            1 => self.emit(opcodes::LDARG_1),
            2 => self.emit(opcodes::LDARG_2),
            3 => self.emit(opcodes::LDARG_3),
            _ => self.emit_indexed(opcodes::LDARG_S, opcodes::LDARG, index),
        }
    }

    /// Emit a `ldarga` instruction, `ldarga.s` for indices up to 255.
    ///
    /// # Errors
    ///
    /// Only fails if the underlying emission fails.
    pub fn emit_ldarga(&mut self, index: u16) -> Result<()> {
        self.emit_indexed(opcodes::LDARGA_S, opcodes::LDARGA, index)
    }

    /// Emit a `starg` instruction, `starg.s` for indices up to 255.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StackUnderflow`] on an empty stack.
    pub fn emit_starg(&mut self, index: u16) -> Result<()> {
        self.emit_indexed(opcodes::STARG_S, opcodes::STARG, index)
    }

    /// Emit a `ldloc` instruction with optimal encoding.
    ///
    /// Automatically selects the most compact form:
    /// - `ldloc.0` through `ldloc.3` for indices 0-3 (1 byte)
    /// - `ldloc.s` for indices 4-255 (2 bytes)
    /// - `ldloc` for indices 256+ (4 bytes)
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for a local that was never declared.
    pub fn emit_ldloc(&mut self, local: impl Into<u16>) -> Result<()> {
        let index = self.check_local(local.into())?;
        match index {
            0 => self.emit(opcodes::LDLOC_0),
            1 => self.emit(opcodes::LDLOC_1),
            2 => self.emit(opcodes::LDLOC_2),
            3 => self.emit(opcodes::LDLOC_3),
            _ => self.emit_indexed(opcodes::LDLOC_S, opcodes::LDLOC, index),
        }
    }

    /// Emit a `ldloca` instruction, `ldloca.s` for indices up to 255.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for a local that was never declared.
    pub fn emit_ldloca(&mut self, local: impl Into<u16>) -> Result<()> {
        let index = self.check_local(local.into())?;
        self.emit_indexed(opcodes::LDLOCA_S, opcodes::LDLOCA, index)
    }

    /// Emit a `stloc` instruction with optimal encoding.
    ///
    /// Automatically selects the most compact form:
    /// - `stloc.0` through `stloc.3` for indices 0-3 (1 byte)
    /// - `stloc.s` for indices 4-255 (2 bytes)
    /// - `stloc` for indices 256+ (4 bytes)
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for a local that was never declared, and
    /// [`crate::Error::StackUnderflow`] on an empty stack.
    pub fn emit_stloc(&mut self, local: impl Into<u16>) -> Result<()> {
        let index = self.check_local(local.into())?;
        match index {
            0 => self.emit(opcodes::STLOC_0),
            1 => self.emit(opcodes::STLOC_1),
            2 => self.emit(opcodes::STLOC_2),
            3 => self.emit(opcodes::STLOC_3),
            _ => self.emit_indexed(opcodes::STLOC_S, opcodes::STLOC, index),
        }
    }

    /// Emit a `ldc.i4` instruction with optimal encoding.
    ///
    /// Automatically selects the most compact form:
    /// - `ldc.i4.m1` through `ldc.i4.8` for values -1 to 8 (1 byte)
    /// - `ldc.i4.s` for values -128 to 127 (2 bytes)
    /// - `ldc.i4` for all other values (5 bytes)
    ///
    /// # Errors
    ///
    /// Only fails if the underlying emission fails.
    pub fn emit_ldc_i4(&mut self, value: i32) -> Result<()> {
        match value {
            -1 => self.emit(opcodes::LDC_I4_M1),
            0 => self.emit(opcodes::LDC_I4_0),
            1 => self.emit(opcodes::LDC_I4_1),
            2 => self.emit(opcodes::LDC_I4_2),
            3 => self.emit(opcodes::LDC_I4_3),
            4 => self.emit(opcodes::LDC_I4_4),
            5 => self.emit(opcodes::LDC_I4_5),
            6 => self.emit(opcodes::LDC_I4_6),
            7 => self.emit(opcodes::LDC_I4_7),
            8 => self.emit(opcodes::LDC_I4_8),
            x => match i8::try_from(x) {
                Ok(small) => self.emit_with(opcodes::LDC_I4_S, small),
                Err(_) => self.emit_with(opcodes::LDC_I4, x),
            },
        }
    }

    /// Mark `label` at the current position.
    ///
    /// Patches every branch and switch entry that was emitted towards the label, and
    /// continues at the merged stack height of all edges into it.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::UnknownLabel`] for a label this emitter did not declare
    /// - [`crate::Error::LabelAlreadyMarked`] if the label was marked before
    pub fn mark_label(&mut self, label: Label) -> Result<()> {
        let offset = self.buffer.offset();
        let record = self.labels.get_mut(label)?;
        if record.is_marked() {
            return Err(Error::LabelAlreadyMarked(label));
        }
        if self.stack.is_reachable() {
            record.merge_height(self.stack.height());
        }
        let height = record.expected_height;

        let pending = self.labels.resolve(label, offset)?;
        for reference in &pending {
            let displacement = reference.displacement_to(offset);
            trace!(
                "{label}: patching IL_{:04x} with {displacement}",
                reference.patch_address
            );
            #[allow(clippy::cast_sign_loss)]
            let value = displacement as u32;
            self.buffer.patch_u32(reference.patch_address, value)?;
        }
        trace!(
            "{label} marked at IL_{offset:04x} with height {height}, {} references patched",
            pending.len()
        );

        self.stack.resume_at(height);
        Ok(())
    }

    /// Freeze the method body and return its code and maximum stack depth.
    ///
    /// Does not consume the emitter; calling it again without further emission returns
    /// identical output.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::UnresolvedLabel`] for the first declared label that was never marked
    /// - [`crate::Error::Malformed`] if the code does not fit 32-bit offsets
    pub fn finalize(&self) -> Result<(Vec<u8>, u32)> {
        if let Some(label) = self.labels.first_unresolved() {
            return Err(Error::UnresolvedLabel(label));
        }
        let code = self.buffer.snapshot();
        if u32::try_from(code.len()).is_err() {
            return Err(malformed_error!("Method body exceeds u32 range"));
        }

        debug!(
            "finalized method body: {} bytes, max stack {}, {} labels, {} locals",
            code.len(),
            self.stack.max_height(),
            self.labels.len(),
            self.locals.len()
        );
        Ok((code.to_vec(), self.stack.max_height()))
    }

    /// Bytes emitted so far, including unpatched placeholders.
    #[must_use]
    pub fn code(&self) -> &[u8] {
        self.buffer.snapshot()
    }

    /// Current write offset.
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.buffer.offset()
    }

    /// Current abstract stack height.
    #[must_use]
    pub fn stack_height(&self) -> u32 {
        self.stack.height()
    }

    /// Maximum stack height reached so far.
    #[must_use]
    pub fn max_stack_height(&self) -> u32 {
        self.stack.max_height()
    }

    /// Whether the current position is reachable by falling through.
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.stack.is_reachable()
    }

    /// Offset a label was marked at, `None` while it is unmarked.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownLabel`] for a label this emitter did not declare.
    pub fn label_offset(&self, label: Label) -> Result<Option<u32>> {
        Ok(self.labels.get(label)?.offset)
    }

    /// Stack height expected at a label, merged over the edges seen so far.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownLabel`] for a label this emitter did not declare.
    pub fn label_height(&self, label: Label) -> Result<u32> {
        Ok(self.labels.get(label)?.expected_height)
    }

    fn emit_indexed(&mut self, short: OpCode, long: OpCode, index: u16) -> Result<()> {
        match u8::try_from(index) {
            Ok(small) => self.emit_with(short, small),
            Err(_) => self.emit_with(long, index),
        }
    }

    fn check_local(&self, index: u16) -> Result<u16> {
        if usize::from(index) < self.locals.len() {
            Ok(index)
        } else {
            Err(malformed_error!(
                "Local {} is not declared ({} locals)",
                index,
                self.locals.len()
            ))
        }
    }

    fn record_edge(&mut self, label: Label, height: u32) -> Result<()> {
        if self.stack.is_reachable() {
            self.labels.get_mut(label)?.merge_height(height);
        }
        Ok(())
    }

    fn follow_flow(&mut self, flow: FlowType) {
        if flow.is_terminal() {
            self.stack.set_unreachable();
        }
    }

    fn write_opcode(&mut self, opcode: OpCode) {
        let [prefix, code] = opcode.value().to_be_bytes();
        if opcode.size() == 2 {
            self.buffer.emit_u8(prefix);
        }
        self.buffer.emit_u8(code);
    }

    fn write_operand(&mut self, operand: Operand) {
        match operand {
            Operand::Immediate(Immediate::Int8(value)) => self.buffer.emit_i8(value),
            Operand::Immediate(Immediate::UInt8(value)) => self.buffer.emit_u8(value),
            Operand::Immediate(Immediate::Int16(value)) => self.buffer.emit_i16(value),
            Operand::Immediate(Immediate::UInt16(value)) => self.buffer.emit_u16(value),
            Operand::Immediate(Immediate::Int32(value)) => self.buffer.emit_i32(value),
            Operand::Immediate(Immediate::UInt32(value)) => self.buffer.emit_u32(value),
            Operand::Immediate(Immediate::Int64(value)) => self.buffer.emit_i64(value),
            Operand::Immediate(Immediate::UInt64(value)) => self.buffer.emit_u64(value),
            Operand::Immediate(Immediate::Float32(value)) => self.buffer.emit_f32(value),
            Operand::Immediate(Immediate::Float64(value)) => self.buffer.emit_f64(value),
            Operand::Token(token) => self.buffer.emit_u32(token.value()),
        }
    }
}

impl Default for InstructionEmitter {
    fn default() -> Self {
        Self::new()
    }
}

fn fixed_stack_effect(opcode: OpCode) -> Result<(u32, u32)> {
    let (pop, push) = opcode.stack_effect();
    match (pop.count(), push.count()) {
        (Some(pops), Some(pushes)) => Ok((pops, pushes)),
        _ => Err(Error::VariableStackEffect(opcode.name())),
    }
}

fn check_operand(operand: Option<&Operand>, expected: OperandType) -> Result<()> {
    match (operand, expected) {
        (None, OperandType::None) => Ok(()),
        (Some(_), OperandType::None) => Err(Error::UnexpectedOperand),
        (Some(operand), expected) if expected.accepts(operand) => Ok(()),
        (_, expected) => Err(Error::WrongOperandType {
            expected: expected.name().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::opcodes::*;

    fn read_i32(code: &[u8], at: usize) -> i32 {
        i32::from_le_bytes([code[at], code[at + 1], code[at + 2], code[at + 3]])
    }

    #[test]
    fn test_emitter_creation() {
        let emitter = InstructionEmitter::new();
        assert!(emitter.code().is_empty());
        assert_eq!(emitter.stack_height(), 0);
        assert_eq!(emitter.max_stack_height(), 0);
        assert!(emitter.is_reachable());
    }

    #[test]
    fn test_simple_instruction_encoding() -> Result<()> {
        let mut emitter = InstructionEmitter::new();
        emitter.emit(NOP)?;
        emitter.emit_ret(false)?;

        let (code, max_stack) = emitter.finalize()?;
        assert_eq!(code, vec![0x00, 0x2A]);
        assert_eq!(max_stack, 0);
        Ok(())
    }

    #[test]
    fn test_instruction_with_operands() -> Result<()> {
        let mut emitter = InstructionEmitter::new();
        emitter.emit_with(LDC_I4_S, 42i8)?;
        emitter.emit_with(LDC_I4, 0x0102_0304)?;
        emitter.emit_with(LDC_I8, -1i64)?;
        emitter.emit(POP)?;
        emitter.emit_with(LDC_R4, 1.5f32)?;

        let mut expected = vec![0x1F, 42, 0x20, 0x04, 0x03, 0x02, 0x01, 0x21];
        expected.extend_from_slice(&[0xFF; 8]);
        expected.push(0x26);
        expected.push(0x22);
        expected.extend_from_slice(&1.5f32.to_le_bytes());
        assert_eq!(emitter.code(), expected.as_slice());
        assert_eq!(emitter.stack_height(), 3);
        Ok(())
    }

    #[test]
    fn test_two_byte_opcode_encoding() -> Result<()> {
        let mut emitter = InstructionEmitter::new();
        emitter.emit_ldc_i4(1)?;
        emitter.emit_ldc_i4(2)?;
        emitter.emit(CEQ)?;
        emitter.emit_with(LDARG, 300u16)?;

        assert_eq!(emitter.code(), &[0x17, 0x18, 0xFE, 0x01, 0xFE, 0x09, 0x2C, 0x01]);
        assert_eq!(emitter.stack_height(), 2);
        Ok(())
    }

    #[test]
    fn test_wrong_operand_type() {
        let mut emitter = InstructionEmitter::new();
        let result = emitter.emit_with(LDARG_S, 1u32);
        assert!(matches!(result, Err(Error::WrongOperandType { .. })));

        let result = emitter.emit(LDC_I4);
        assert!(matches!(result, Err(Error::WrongOperandType { .. })));

        let result = emitter.emit_with(NOP, 1u8);
        assert!(matches!(result, Err(Error::UnexpectedOperand)));

        assert!(emitter.code().is_empty());
    }

    #[test]
    fn test_branch_opcodes_rejected_by_emit() {
        let mut emitter = InstructionEmitter::new();
        assert!(matches!(emitter.emit_with(BR, 0i32), Err(Error::InvalidBranch(_))));
        assert!(matches!(emitter.emit(SWITCH), Err(Error::InvalidBranch(_))));
        assert!(emitter.code().is_empty());
    }

    #[test]
    fn test_non_branch_rejected_by_emit_branch() {
        let mut emitter = InstructionEmitter::new();
        let label = emitter.declare_label();
        assert!(matches!(
            emitter.emit_branch(ADD, label),
            Err(Error::InvalidBranch(_))
        ));
    }

    #[test]
    fn test_variable_stack_effect_requires_call_api() {
        let mut emitter = InstructionEmitter::new();
        let token = Token::new(0x0A00_0001);
        assert!(matches!(
            emitter.emit_with(CALL, token),
            Err(Error::VariableStackEffect("call"))
        ));
        assert!(matches!(
            emitter.emit(RET),
            Err(Error::VariableStackEffect("ret"))
        ));
    }

    #[test]
    fn test_emit_call_stack_effect() -> Result<()> {
        let mut emitter = InstructionEmitter::new();
        let method = Token::new(0x0600_0002);

        emitter.emit_ldarg(0)?;
        emitter.emit_ldarg(1)?;
        emitter.emit_call(CALL, method, 2, true)?;
        assert_eq!(emitter.stack_height(), 1);

        emitter.emit_call(NEWOBJ, Token::new(0x0A00_0003), 1, false)?;
        assert_eq!(emitter.stack_height(), 1);

        emitter.emit_call(CALLVIRT, Token::new(0x0A00_0004), 1, false)?;
        assert_eq!(emitter.stack_height(), 0);
        assert_eq!(emitter.max_stack_height(), 2);

        assert_eq!(&emitter.code()[2..7], &[0x28, 0x02, 0x00, 0x00, 0x06]);
        Ok(())
    }

    #[test]
    fn test_emit_call_rejects_non_calls() {
        let mut emitter = InstructionEmitter::new();
        let result = emitter.emit_call(LDSTR, Token::new(0x7000_0001), 0, true);
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_stack_underflow() {
        let mut emitter = InstructionEmitter::new();
        emitter.emit_ldc_i4(1).unwrap();
        let result = emitter.emit(ADD);
        assert!(matches!(
            result,
            Err(Error::StackUnderflow {
                opcode: "add",
                height: 1,
                pops: 2
            })
        ));
        assert_eq!(emitter.code(), &[0x17]);
    }

    #[test]
    fn test_forward_branch_is_long_and_patched() -> Result<()> {
        let mut emitter = InstructionEmitter::new();
        let target = emitter.declare_label();

        emitter.emit_ldc_i4(1)?;
        emitter.emit_branch(BRTRUE_S, target)?;
        assert_eq!(emitter.code()[1], BRTRUE.value() as u8);
        assert_eq!(read_i32(emitter.code(), 2), 0);

        emitter.emit(NOP)?;
        emitter.emit(NOP)?;
        emitter.mark_label(target)?;

        let (code, _) = emitter.finalize()?;
        assert_eq!(read_i32(&code, 2), 2);
        assert_eq!(emitter.label_offset(target)?, Some(8));
        Ok(())
    }

    #[test]
    fn test_backward_branch_short_and_long() -> Result<()> {
        let mut emitter = InstructionEmitter::new();
        let head = emitter.declare_label();
        emitter.mark_label(head)?;
        emitter.emit(NOP)?;
        emitter.emit_branch(BR, head)?;
        assert_eq!(emitter.code(), &[0x00, 0x2B, 0xFD]);

        let mut emitter = InstructionEmitter::new();
        let head = emitter.declare_label();
        emitter.mark_label(head)?;
        for _ in 0..200 {
            emitter.emit(NOP)?;
        }
        emitter.emit_branch(BR_S, head)?;
        let code = emitter.code();
        assert_eq!(code[200], 0x38);
        assert_eq!(read_i32(code, 201), -205);
        Ok(())
    }

    #[test]
    fn test_long_branch_configuration() -> Result<()> {
        let mut emitter = InstructionEmitter::with_config(EmitterConfig::long_branches());
        let head = emitter.declare_label();
        emitter.mark_label(head)?;
        emitter.emit_branch(BR_S, head)?;
        assert_eq!(emitter.code(), &[0x38, 0xFB, 0xFF, 0xFF, 0xFF]);
        Ok(())
    }

    #[test]
    fn test_mark_label_twice() -> Result<()> {
        let mut emitter = InstructionEmitter::new();
        let label = emitter.declare_label();
        emitter.mark_label(label)?;
        assert!(matches!(
            emitter.mark_label(label),
            Err(Error::LabelAlreadyMarked(l)) if l == label
        ));
        Ok(())
    }

    #[test]
    fn test_unknown_label() {
        let mut other = InstructionEmitter::new();
        other.declare_label();
        let foreign = other.declare_label();

        let mut emitter = InstructionEmitter::new();
        assert!(matches!(
            emitter.emit_branch(BR, foreign),
            Err(Error::UnknownLabel(_))
        ));
        assert!(matches!(
            emitter.mark_label(foreign),
            Err(Error::UnknownLabel(_))
        ));
        assert!(emitter.code().is_empty());
    }

    #[test]
    fn test_unresolved_label() {
        let mut emitter = InstructionEmitter::new();
        let label = emitter.declare_label();
        emitter.emit_branch(BR, label).unwrap();
        assert!(matches!(
            emitter.finalize(),
            Err(Error::UnresolvedLabel(l)) if l == label
        ));
    }

    #[test]
    fn test_unconditional_branch_makes_code_unreachable() -> Result<()> {
        let mut emitter = InstructionEmitter::new();
        let join = emitter.declare_label();
        let other = emitter.declare_label();

        emitter.emit_ldarg(0)?;
        emitter.emit_branch(BRTRUE, other)?;
        emitter.emit_ldc_i4(10)?;
        emitter.emit_branch(BR, join)?;
        assert!(!emitter.is_reachable());

        emitter.mark_label(other)?;
        assert!(emitter.is_reachable());
        assert_eq!(emitter.stack_height(), 0);
        emitter.emit_ldc_i4(20)?;

        emitter.mark_label(join)?;
        assert_eq!(emitter.stack_height(), 1);
        emitter.emit_ret(true)?;
        assert!(!emitter.is_reachable());

        let (_, max_stack) = emitter.finalize()?;
        assert_eq!(max_stack, 1);
        Ok(())
    }

    #[test]
    fn test_join_height_takes_maximum() -> Result<()> {
        let mut emitter = InstructionEmitter::new();
        let join = emitter.declare_label();

        emitter.emit_ldc_i4(1)?;
        emitter.emit_ldc_i4(2)?;
        emitter.emit_ldc_i4(3)?;
        emitter.emit_branch(BRTRUE, join)?;
        assert_eq!(emitter.label_height(join)?, 2);

        emitter.emit(POP)?;
        emitter.mark_label(join)?;
        assert_eq!(emitter.stack_height(), 2);
        Ok(())
    }

    #[test]
    fn test_leave_target_starts_empty() -> Result<()> {
        let mut emitter = InstructionEmitter::new();
        let done = emitter.declare_label();
        emitter.emit_ldc_i4(1)?;
        emitter.emit_ldc_i4(2)?;
        emitter.emit_branch(LEAVE, done)?;
        assert!(!emitter.is_reachable());

        emitter.mark_label(done)?;
        assert_eq!(emitter.stack_height(), 0);
        emitter.emit_ret(false)?;
        Ok(())
    }

    #[test]
    fn test_switch_forward_and_backward() -> Result<()> {
        let mut emitter = InstructionEmitter::new();
        let back = emitter.declare_label();
        let forward = emitter.declare_label();

        emitter.mark_label(back)?;
        emitter.emit_ldarg(0)?;
        emitter.emit_switch(&[back, forward])?;
        // switch at 1, count at 2..6, table at 6..14
        emitter.emit(NOP)?;
        emitter.mark_label(forward)?;
        emitter.emit_ret(false)?;

        let (code, _) = emitter.finalize()?;
        assert_eq!(code[1], 0x45);
        assert_eq!(read_i32(&code, 2), 2);
        assert_eq!(read_i32(&code, 6), -14);
        assert_eq!(read_i32(&code, 10), 1);
        Ok(())
    }

    #[test]
    fn test_empty_switch() {
        let mut emitter = InstructionEmitter::new();
        emitter.emit_ldc_i4(0).unwrap();
        assert!(matches!(
            emitter.emit_switch(&[]),
            Err(Error::InvalidBranch(_))
        ));
    }

    #[test]
    fn test_compact_helpers() -> Result<()> {
        let mut emitter = InstructionEmitter::new();
        for _ in 0..300 {
            emitter.declare_local(Token::new(0x0100_0001))?;
        }

        emitter.emit_ldarg(2)?;
        emitter.emit_ldarg(7)?;
        emitter.emit_ldarg(256)?;
        emitter.emit_ldc_i4(-1)?;
        emitter.emit_ldc_i4(100)?;
        emitter.emit_ldc_i4(1000)?;
        emitter.emit_stloc(3u16)?;
        emitter.emit_stloc(9u16)?;
        emitter.emit_stloc(299u16)?;
        emitter.emit_ldloca(1u16)?;
        emitter.emit_ldarga(1)?;
        emitter.emit_starg(1)?;

        assert_eq!(
            emitter.code(),
            &[
                0x04, // ldarg.2
                0x0E, 7, // ldarg.s 7
                0xFE, 0x09, 0x00, 0x01, // ldarg 256
                0x15, // ldc.i4.m1
                0x1F, 100, // ldc.i4.s 100
                0x20, 0xE8, 0x03, 0x00, 0x00, // ldc.i4 1000
                0x0D, // stloc.3
                0x13, 9, // stloc.s 9
                0xFE, 0x0E, 0x2B, 0x01, // stloc 299
                0x12, 1, // ldloca.s 1
                0x0F, 1, // ldarga.s 1
                0x10, 1, // starg.s 1
            ]
        );
        Ok(())
    }

    #[test]
    fn test_undeclared_local() {
        let mut emitter = InstructionEmitter::new();
        let local = emitter.declare_local(Token::new(0x0100_0001)).unwrap();
        assert_eq!(local.index(), 0);
        assert!(emitter.emit_ldloc(local).is_ok());
        assert!(matches!(
            emitter.emit_ldloc(1u16),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_finalize_is_idempotent() -> Result<()> {
        let mut emitter = InstructionEmitter::new();
        let label = emitter.declare_label();
        emitter.emit_ldc_i4(5)?;
        emitter.emit_branch(BRFALSE, label)?;
        emitter.mark_label(label)?;
        emitter.emit_ret(false)?;

        let first = emitter.finalize()?;
        let second = emitter.finalize()?;
        assert_eq!(first, second);
        Ok(())
    }
}
