//! CIL opcode table (ECMA-335 III).
//!
//! Every opcode is a `const` [`OpCode`] descriptor carrying its mnemonic, encoding, inline
//! operand type, stack effect classes and flow type. Single-byte opcodes are stored with
//! their byte value (e.g. [`ADD`] = `0x58`), two-byte opcodes with the `0xFE` prefix in the
//! high byte (e.g. [`CEQ`] = `0xFE01`).
//!
//! The table is pure data. It is never mutated and can be read from any number of threads.
//!
//! # Branch forms
//!
//! Every branch exists in a short form with a signed 1-byte displacement and a long form with
//! a signed 4-byte displacement. The conditional and unconditional branches sit in two
//! contiguous ranges (`br.s`..=`blt.un.s` at `0x2B`..=`0x37`, `br`..=`blt.un` at
//! `0x38`..=`0x44`) and `leave.s`/`leave` pair up at `0xDE`/`0xDD`.
//! [`OpCode::short_form`] and [`OpCode::long_form`] map between them in both directions.
//!
//! ```rust
//! use dotemit::assembly::opcodes::{self, OpCode};
//!
//! assert_eq!(opcodes::BRTRUE_S.long_form(), Some(opcodes::BRTRUE));
//! assert_eq!(opcodes::LEAVE.short_form(), Some(opcodes::LEAVE_S));
//! assert_eq!(OpCode::from_mnemonic("ceq"), Some(opcodes::CEQ));
//! assert_eq!(opcodes::CEQ.size(), 2);
//! ```
#![allow(missing_docs)]

use std::{collections::HashMap, fmt, str::FromStr, sync::OnceLock};

use crate::{
    assembly::instruction::{FlowType, OperandType, StackPop, StackPush},
    Error,
};

/// Static descriptor of a single CIL opcode.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct OpCode {
    name: &'static str,
    value: u16,
    operand: OperandType,
    pop: StackPop,
    push: StackPush,
    flow: FlowType,
}

impl OpCode {
    const fn new(
        name: &'static str,
        value: u16,
        operand: OperandType,
        pop: StackPop,
        push: StackPush,
        flow: FlowType,
    ) -> Self {
        OpCode {
            name,
            value,
            operand,
            pop,
            push,
            flow,
        }
    }

    /// The instruction mnemonic, e.g. `"ldc.i4.s"`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The numeric encoding, with `0xFE` in the high byte for two-byte opcodes.
    #[must_use]
    pub const fn value(&self) -> u16 {
        self.value
    }

    /// Encoded size of the opcode itself (1 or 2 bytes), excluding the operand.
    #[must_use]
    pub const fn size(&self) -> u32 {
        if self.value > 0xFF {
            2
        } else {
            1
        }
    }

    /// Type of the inline operand that follows the opcode bytes.
    #[must_use]
    pub const fn operand_type(&self) -> OperandType {
        self.operand
    }

    /// Pop and push classes of this opcode.
    #[must_use]
    pub const fn stack_effect(&self) -> (StackPop, StackPush) {
        (self.pop, self.push)
    }

    /// Control-flow behavior of this opcode.
    #[must_use]
    pub const fn flow(&self) -> FlowType {
        self.flow
    }

    /// Whether this opcode takes a label as its operand.
    #[must_use]
    pub const fn is_branch(&self) -> bool {
        self.flow.is_branch()
    }

    /// Whether the stack effect depends on the call site.
    #[must_use]
    pub const fn has_variable_stack_effect(&self) -> bool {
        matches!(self.pop, StackPop::Var) || matches!(self.push, StackPush::Var)
    }

    /// The short (1-byte displacement) counterpart of a branch opcode.
    ///
    /// Returns `self` for an opcode that already is the short form, and `None` for
    /// opcodes that are not branches.
    #[must_use]
    pub fn short_form(&self) -> Option<OpCode> {
        branch_pair_index(self).map(|index| SHORT_BRANCHES[index])
    }

    /// The long (4-byte displacement) counterpart of a branch opcode.
    ///
    /// Returns `self` for an opcode that already is the long form, and `None` for
    /// opcodes that are not branches.
    #[must_use]
    pub fn long_form(&self) -> Option<OpCode> {
        branch_pair_index(self).map(|index| LONG_BRANCHES[index])
    }

    /// Look up an opcode by mnemonic.
    #[must_use]
    pub fn from_mnemonic(mnemonic: &str) -> Option<OpCode> {
        lookup().by_name.get(mnemonic).copied()
    }

    /// Look up an opcode by encoding (`0xFExx` for two-byte opcodes).
    #[must_use]
    pub fn from_value(value: u16) -> Option<OpCode> {
        lookup().by_value.get(&value).copied()
    }
}

impl fmt::Debug for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpCode({}, 0x{:02X})", self.name, self.value)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl FromStr for OpCode {
    type Err = Error;

    fn from_str(mnemonic: &str) -> Result<Self, Self::Err> {
        OpCode::from_mnemonic(mnemonic).ok_or_else(|| Error::InvalidMnemonic(mnemonic.to_string()))
    }
}

struct Lookup {
    by_name: HashMap<&'static str, OpCode>,
    by_value: HashMap<u16, OpCode>,
}

static LOOKUP: OnceLock<Lookup> = OnceLock::new();

fn lookup() -> &'static Lookup {
    LOOKUP.get_or_init(|| Lookup {
        by_name: OPCODES.iter().map(|op| (op.name, *op)).collect(),
        by_value: OPCODES.iter().map(|op| (op.value, *op)).collect(),
    })
}

/// Short-form branches, index-aligned with [`LONG_BRANCHES`].
pub static SHORT_BRANCHES: [OpCode; 14] = [
    BR_S, BRFALSE_S, BRTRUE_S, BEQ_S, BGE_S, BGT_S, BLE_S, BLT_S, BNE_UN_S, BGE_UN_S, BGT_UN_S,
    BLE_UN_S, BLT_UN_S, LEAVE_S,
];

/// Long-form branches, index-aligned with [`SHORT_BRANCHES`].
pub static LONG_BRANCHES: [OpCode; 14] = [
    BR, BRFALSE, BRTRUE, BEQ, BGE, BGT, BLE, BLT, BNE_UN, BGE_UN, BGT_UN, BLE_UN, BLT_UN, LEAVE,
];

fn branch_pair_index(op: &OpCode) -> Option<usize> {
    match op.value {
        0x2B..=0x37 => Some(usize::from(op.value - 0x2B)),
        0x38..=0x44 => Some(usize::from(op.value - 0x38)),
        0xDD | 0xDE => Some(13),
        _ => None,
    }
}

macro_rules! opcodes {
    ($($ident:ident = ($name:literal, $value:literal, $operand:ident, $pop:ident, $push:ident, $flow:ident);)*) => {
        $(
            pub const $ident: OpCode = OpCode::new(
                $name,
                $value,
                OperandType::$operand,
                StackPop::$pop,
                StackPush::$push,
                FlowType::$flow,
            );
        )*

        /// Every opcode of the instruction set, in encoding order.
        pub static OPCODES: &[OpCode] = &[$($ident),*];
    };
}

opcodes! {
    // Misc
    NOP = ("nop", 0x00, None, Pop0, Push0, Sequential);
    BREAK = ("break", 0x01, None, Pop0, Push0, Sequential);

    // Argument / local shorthand
    LDARG_0 = ("ldarg.0", 0x02, None, Pop0, Push1, Sequential);
    LDARG_1 = ("ldarg.1", 0x03, None, Pop0, Push1, Sequential);
    LDARG_2 = ("ldarg.2", 0x04, None, Pop0, Push1, Sequential);
    LDARG_3 = ("ldarg.3", 0x05, None, Pop0, Push1, Sequential);
    LDLOC_0 = ("ldloc.0", 0x06, None, Pop0, Push1, Sequential);
    LDLOC_1 = ("ldloc.1", 0x07, None, Pop0, Push1, Sequential);
    LDLOC_2 = ("ldloc.2", 0x08, None, Pop0, Push1, Sequential);
    LDLOC_3 = ("ldloc.3", 0x09, None, Pop0, Push1, Sequential);
    STLOC_0 = ("stloc.0", 0x0A, None, Pop1, Push0, Sequential);
    STLOC_1 = ("stloc.1", 0x0B, None, Pop1, Push0, Sequential);
    STLOC_2 = ("stloc.2", 0x0C, None, Pop1, Push0, Sequential);
    STLOC_3 = ("stloc.3", 0x0D, None, Pop1, Push0, Sequential);
    LDARG_S = ("ldarg.s", 0x0E, UInt8, Pop0, Push1, Sequential);
    LDARGA_S = ("ldarga.s", 0x0F, UInt8, Pop0, Push1, Sequential);
    STARG_S = ("starg.s", 0x10, UInt8, Pop1, Push0, Sequential);
    LDLOC_S = ("ldloc.s", 0x11, UInt8, Pop0, Push1, Sequential);
    LDLOCA_S = ("ldloca.s", 0x12, UInt8, Pop0, Push1, Sequential);
    STLOC_S = ("stloc.s", 0x13, UInt8, Pop1, Push0, Sequential);

    // Constants
    LDNULL = ("ldnull", 0x14, None, Pop0, Push1, Sequential);
    LDC_I4_M1 = ("ldc.i4.m1", 0x15, None, Pop0, Push1, Sequential);
    LDC_I4_0 = ("ldc.i4.0", 0x16, None, Pop0, Push1, Sequential);
    LDC_I4_1 = ("ldc.i4.1", 0x17, None, Pop0, Push1, Sequential);
    LDC_I4_2 = ("ldc.i4.2", 0x18, None, Pop0, Push1, Sequential);
    LDC_I4_3 = ("ldc.i4.3", 0x19, None, Pop0, Push1, Sequential);
    LDC_I4_4 = ("ldc.i4.4", 0x1A, None, Pop0, Push1, Sequential);
    LDC_I4_5 = ("ldc.i4.5", 0x1B, None, Pop0, Push1, Sequential);
    LDC_I4_6 = ("ldc.i4.6", 0x1C, None, Pop0, Push1, Sequential);
    LDC_I4_7 = ("ldc.i4.7", 0x1D, None, Pop0, Push1, Sequential);
    LDC_I4_8 = ("ldc.i4.8", 0x1E, None, Pop0, Push1, Sequential);
    LDC_I4_S = ("ldc.i4.s", 0x1F, Int8, Pop0, Push1, Sequential);
    LDC_I4 = ("ldc.i4", 0x20, Int32, Pop0, Push1, Sequential);
    LDC_I8 = ("ldc.i8", 0x21, Int64, Pop0, Push1, Sequential);
    LDC_R4 = ("ldc.r4", 0x22, Float32, Pop0, Push1, Sequential);
    LDC_R8 = ("ldc.r8", 0x23, Float64, Pop0, Push1, Sequential);

    // Stack manipulation
    DUP = ("dup", 0x25, None, Pop1, Push2, Sequential);
    POP = ("pop", 0x26, None, Pop1, Push0, Sequential);

    // Calls; jmp requires an empty stack and leaves the method
    JMP = ("jmp", 0x27, Token, Pop0, Push0, Return);
    CALL = ("call", 0x28, Token, Var, Var, Call);
    CALLI = ("calli", 0x29, Token, Var, Var, Call);
    RET = ("ret", 0x2A, None, Var, Push0, Return);

    // Branch (short form)
    BR_S = ("br.s", 0x2B, Int8, Pop0, Push0, UnconditionalBranch);
    BRFALSE_S = ("brfalse.s", 0x2C, Int8, Pop1, Push0, ConditionalBranch);
    BRTRUE_S = ("brtrue.s", 0x2D, Int8, Pop1, Push0, ConditionalBranch);
    BEQ_S = ("beq.s", 0x2E, Int8, Pop2, Push0, ConditionalBranch);
    BGE_S = ("bge.s", 0x2F, Int8, Pop2, Push0, ConditionalBranch);
    BGT_S = ("bgt.s", 0x30, Int8, Pop2, Push0, ConditionalBranch);
    BLE_S = ("ble.s", 0x31, Int8, Pop2, Push0, ConditionalBranch);
    BLT_S = ("blt.s", 0x32, Int8, Pop2, Push0, ConditionalBranch);
    BNE_UN_S = ("bne.un.s", 0x33, Int8, Pop2, Push0, ConditionalBranch);
    BGE_UN_S = ("bge.un.s", 0x34, Int8, Pop2, Push0, ConditionalBranch);
    BGT_UN_S = ("bgt.un.s", 0x35, Int8, Pop2, Push0, ConditionalBranch);
    BLE_UN_S = ("ble.un.s", 0x36, Int8, Pop2, Push0, ConditionalBranch);
    BLT_UN_S = ("blt.un.s", 0x37, Int8, Pop2, Push0, ConditionalBranch);

    // Branch (long form)
    BR = ("br", 0x38, Int32, Pop0, Push0, UnconditionalBranch);
    BRFALSE = ("brfalse", 0x39, Int32, Pop1, Push0, ConditionalBranch);
    BRTRUE = ("brtrue", 0x3A, Int32, Pop1, Push0, ConditionalBranch);
    BEQ = ("beq", 0x3B, Int32, Pop2, Push0, ConditionalBranch);
    BGE = ("bge", 0x3C, Int32, Pop2, Push0, ConditionalBranch);
    BGT = ("bgt", 0x3D, Int32, Pop2, Push0, ConditionalBranch);
    BLE = ("ble", 0x3E, Int32, Pop2, Push0, ConditionalBranch);
    BLT = ("blt", 0x3F, Int32, Pop2, Push0, ConditionalBranch);
    BNE_UN = ("bne.un", 0x40, Int32, Pop2, Push0, ConditionalBranch);
    BGE_UN = ("bge.un", 0x41, Int32, Pop2, Push0, ConditionalBranch);
    BGT_UN = ("bgt.un", 0x42, Int32, Pop2, Push0, ConditionalBranch);
    BLE_UN = ("ble.un", 0x43, Int32, Pop2, Push0, ConditionalBranch);
    BLT_UN = ("blt.un", 0x44, Int32, Pop2, Push0, ConditionalBranch);

    SWITCH = ("switch", 0x45, Switch, Pop1, Push0, Switch);

    // Indirect load / store
    LDIND_I1 = ("ldind.i1", 0x46, None, Pop1, Push1, Sequential);
    LDIND_U1 = ("ldind.u1", 0x47, None, Pop1, Push1, Sequential);
    LDIND_I2 = ("ldind.i2", 0x48, None, Pop1, Push1, Sequential);
    LDIND_U2 = ("ldind.u2", 0x49, None, Pop1, Push1, Sequential);
    LDIND_I4 = ("ldind.i4", 0x4A, None, Pop1, Push1, Sequential);
    LDIND_U4 = ("ldind.u4", 0x4B, None, Pop1, Push1, Sequential);
    LDIND_I8 = ("ldind.i8", 0x4C, None, Pop1, Push1, Sequential);
    LDIND_I = ("ldind.i", 0x4D, None, Pop1, Push1, Sequential);
    LDIND_R4 = ("ldind.r4", 0x4E, None, Pop1, Push1, Sequential);
    LDIND_R8 = ("ldind.r8", 0x4F, None, Pop1, Push1, Sequential);
    LDIND_REF = ("ldind.ref", 0x50, None, Pop1, Push1, Sequential);
    STIND_REF = ("stind.ref", 0x51, None, Pop2, Push0, Sequential);
    STIND_I1 = ("stind.i1", 0x52, None, Pop2, Push0, Sequential);
    STIND_I2 = ("stind.i2", 0x53, None, Pop2, Push0, Sequential);
    STIND_I4 = ("stind.i4", 0x54, None, Pop2, Push0, Sequential);
    STIND_I8 = ("stind.i8", 0x55, None, Pop2, Push0, Sequential);
    STIND_R4 = ("stind.r4", 0x56, None, Pop2, Push0, Sequential);
    STIND_R8 = ("stind.r8", 0x57, None, Pop2, Push0, Sequential);

    // Arithmetic / bitwise
    ADD = ("add", 0x58, None, Pop2, Push1, Sequential);
    SUB = ("sub", 0x59, None, Pop2, Push1, Sequential);
    MUL = ("mul", 0x5A, None, Pop2, Push1, Sequential);
    DIV = ("div", 0x5B, None, Pop2, Push1, Sequential);
    DIV_UN = ("div.un", 0x5C, None, Pop2, Push1, Sequential);
    REM = ("rem", 0x5D, None, Pop2, Push1, Sequential);
    REM_UN = ("rem.un", 0x5E, None, Pop2, Push1, Sequential);
    AND = ("and", 0x5F, None, Pop2, Push1, Sequential);
    OR = ("or", 0x60, None, Pop2, Push1, Sequential);
    XOR = ("xor", 0x61, None, Pop2, Push1, Sequential);
    SHL = ("shl", 0x62, None, Pop2, Push1, Sequential);
    SHR = ("shr", 0x63, None, Pop2, Push1, Sequential);
    SHR_UN = ("shr.un", 0x64, None, Pop2, Push1, Sequential);
    NEG = ("neg", 0x65, None, Pop1, Push1, Sequential);
    NOT = ("not", 0x66, None, Pop1, Push1, Sequential);

    // Conversion
    CONV_I1 = ("conv.i1", 0x67, None, Pop1, Push1, Sequential);
    CONV_I2 = ("conv.i2", 0x68, None, Pop1, Push1, Sequential);
    CONV_I4 = ("conv.i4", 0x69, None, Pop1, Push1, Sequential);
    CONV_I8 = ("conv.i8", 0x6A, None, Pop1, Push1, Sequential);
    CONV_R4 = ("conv.r4", 0x6B, None, Pop1, Push1, Sequential);
    CONV_R8 = ("conv.r8", 0x6C, None, Pop1, Push1, Sequential);
    CONV_U4 = ("conv.u4", 0x6D, None, Pop1, Push1, Sequential);
    CONV_U8 = ("conv.u8", 0x6E, None, Pop1, Push1, Sequential);

    // Object model
    CALLVIRT = ("callvirt", 0x6F, Token, Var, Var, Call);
    CPOBJ = ("cpobj", 0x70, Token, Pop2, Push0, Sequential);
    LDOBJ = ("ldobj", 0x71, Token, Pop1, Push1, Sequential);
    LDSTR = ("ldstr", 0x72, Token, Pop0, Push1, Sequential);
    NEWOBJ = ("newobj", 0x73, Token, Var, Push1, Call);
    CASTCLASS = ("castclass", 0x74, Token, Pop1, Push1, Sequential);
    ISINST = ("isinst", 0x75, Token, Pop1, Push1, Sequential);
    CONV_R_UN = ("conv.r.un", 0x76, None, Pop1, Push1, Sequential);
    UNBOX = ("unbox", 0x79, Token, Pop1, Push1, Sequential);
    THROW = ("throw", 0x7A, None, Pop1, Push0, Throw);
    LDFLD = ("ldfld", 0x7B, Token, Pop1, Push1, Sequential);
    LDFLDA = ("ldflda", 0x7C, Token, Pop1, Push1, Sequential);
    STFLD = ("stfld", 0x7D, Token, Pop2, Push0, Sequential);
    LDSFLD = ("ldsfld", 0x7E, Token, Pop0, Push1, Sequential);
    LDSFLDA = ("ldsflda", 0x7F, Token, Pop0, Push1, Sequential);
    STSFLD = ("stsfld", 0x80, Token, Pop1, Push0, Sequential);
    STOBJ = ("stobj", 0x81, Token, Pop2, Push0, Sequential);

    // Overflow conversion (unsigned source)
    CONV_OVF_I1_UN = ("conv.ovf.i1.un", 0x82, None, Pop1, Push1, Sequential);
    CONV_OVF_I2_UN = ("conv.ovf.i2.un", 0x83, None, Pop1, Push1, Sequential);
    CONV_OVF_I4_UN = ("conv.ovf.i4.un", 0x84, None, Pop1, Push1, Sequential);
    CONV_OVF_I8_UN = ("conv.ovf.i8.un", 0x85, None, Pop1, Push1, Sequential);
    CONV_OVF_U1_UN = ("conv.ovf.u1.un", 0x86, None, Pop1, Push1, Sequential);
    CONV_OVF_U2_UN = ("conv.ovf.u2.un", 0x87, None, Pop1, Push1, Sequential);
    CONV_OVF_U4_UN = ("conv.ovf.u4.un", 0x88, None, Pop1, Push1, Sequential);
    CONV_OVF_U8_UN = ("conv.ovf.u8.un", 0x89, None, Pop1, Push1, Sequential);
    CONV_OVF_I_UN = ("conv.ovf.i.un", 0x8A, None, Pop1, Push1, Sequential);
    CONV_OVF_U_UN = ("conv.ovf.u.un", 0x8B, None, Pop1, Push1, Sequential);

    // Boxing / arrays
    BOX = ("box", 0x8C, Token, Pop1, Push1, Sequential);
    NEWARR = ("newarr", 0x8D, Token, Pop1, Push1, Sequential);
    LDLEN = ("ldlen", 0x8E, None, Pop1, Push1, Sequential);
    LDELEMA = ("ldelema", 0x8F, Token, Pop2, Push1, Sequential);
    LDELEM_I1 = ("ldelem.i1", 0x90, None, Pop2, Push1, Sequential);
    LDELEM_U1 = ("ldelem.u1", 0x91, None, Pop2, Push1, Sequential);
    LDELEM_I2 = ("ldelem.i2", 0x92, None, Pop2, Push1, Sequential);
    LDELEM_U2 = ("ldelem.u2", 0x93, None, Pop2, Push1, Sequential);
    LDELEM_I4 = ("ldelem.i4", 0x94, None, Pop2, Push1, Sequential);
    LDELEM_U4 = ("ldelem.u4", 0x95, None, Pop2, Push1, Sequential);
    LDELEM_I8 = ("ldelem.i8", 0x96, None, Pop2, Push1, Sequential);
    LDELEM_I = ("ldelem.i", 0x97, None, Pop2, Push1, Sequential);
    LDELEM_R4 = ("ldelem.r4", 0x98, None, Pop2, Push1, Sequential);
    LDELEM_R8 = ("ldelem.r8", 0x99, None, Pop2, Push1, Sequential);
    LDELEM_REF = ("ldelem.ref", 0x9A, None, Pop2, Push1, Sequential);
    STELEM_I = ("stelem.i", 0x9B, None, Pop3, Push0, Sequential);
    STELEM_I1 = ("stelem.i1", 0x9C, None, Pop3, Push0, Sequential);
    STELEM_I2 = ("stelem.i2", 0x9D, None, Pop3, Push0, Sequential);
    STELEM_I4 = ("stelem.i4", 0x9E, None, Pop3, Push0, Sequential);
    STELEM_I8 = ("stelem.i8", 0x9F, None, Pop3, Push0, Sequential);
    STELEM_R4 = ("stelem.r4", 0xA0, None, Pop3, Push0, Sequential);
    STELEM_R8 = ("stelem.r8", 0xA1, None, Pop3, Push0, Sequential);
    STELEM_REF = ("stelem.ref", 0xA2, None, Pop3, Push0, Sequential);
    LDELEM = ("ldelem", 0xA3, Token, Pop2, Push1, Sequential);
    STELEM = ("stelem", 0xA4, Token, Pop3, Push0, Sequential);
    UNBOX_ANY = ("unbox.any", 0xA5, Token, Pop1, Push1, Sequential);

    // Overflow conversion
    CONV_OVF_I1 = ("conv.ovf.i1", 0xB3, None, Pop1, Push1, Sequential);
    CONV_OVF_U1 = ("conv.ovf.u1", 0xB4, None, Pop1, Push1, Sequential);
    CONV_OVF_I2 = ("conv.ovf.i2", 0xB5, None, Pop1, Push1, Sequential);
    CONV_OVF_U2 = ("conv.ovf.u2", 0xB6, None, Pop1, Push1, Sequential);
    CONV_OVF_I4 = ("conv.ovf.i4", 0xB7, None, Pop1, Push1, Sequential);
    CONV_OVF_U4 = ("conv.ovf.u4", 0xB8, None, Pop1, Push1, Sequential);
    CONV_OVF_I8 = ("conv.ovf.i8", 0xB9, None, Pop1, Push1, Sequential);
    CONV_OVF_U8 = ("conv.ovf.u8", 0xBA, None, Pop1, Push1, Sequential);

    // Typed references
    REFANYVAL = ("refanyval", 0xC2, Token, Pop1, Push1, Sequential);
    CKFINITE = ("ckfinite", 0xC3, None, Pop1, Push1, Sequential);
    MKREFANY = ("mkrefany", 0xC6, Token, Pop1, Push1, Sequential);

    LDTOKEN = ("ldtoken", 0xD0, Token, Pop0, Push1, Sequential);
    CONV_U2 = ("conv.u2", 0xD1, None, Pop1, Push1, Sequential);
    CONV_U1 = ("conv.u1", 0xD2, None, Pop1, Push1, Sequential);
    CONV_I = ("conv.i", 0xD3, None, Pop1, Push1, Sequential);
    CONV_OVF_I = ("conv.ovf.i", 0xD4, None, Pop1, Push1, Sequential);
    CONV_OVF_U = ("conv.ovf.u", 0xD5, None, Pop1, Push1, Sequential);
    ADD_OVF = ("add.ovf", 0xD6, None, Pop2, Push1, Sequential);
    ADD_OVF_UN = ("add.ovf.un", 0xD7, None, Pop2, Push1, Sequential);
    MUL_OVF = ("mul.ovf", 0xD8, None, Pop2, Push1, Sequential);
    MUL_OVF_UN = ("mul.ovf.un", 0xD9, None, Pop2, Push1, Sequential);
    SUB_OVF = ("sub.ovf", 0xDA, None, Pop2, Push1, Sequential);
    SUB_OVF_UN = ("sub.ovf.un", 0xDB, None, Pop2, Push1, Sequential);

    // Protected regions
    ENDFINALLY = ("endfinally", 0xDC, None, Pop0, Push0, EndFinally);
    LEAVE = ("leave", 0xDD, Int32, Pop0, Push0, Leave);
    LEAVE_S = ("leave.s", 0xDE, Int8, Pop0, Push0, Leave);
    STIND_I = ("stind.i", 0xDF, None, Pop2, Push0, Sequential);
    CONV_U = ("conv.u", 0xE0, None, Pop1, Push1, Sequential);

    // Two-byte opcodes (0xFE prefix)
    ARGLIST = ("arglist", 0xFE00, None, Pop0, Push1, Sequential);
    CEQ = ("ceq", 0xFE01, None, Pop2, Push1, Sequential);
    CGT = ("cgt", 0xFE02, None, Pop2, Push1, Sequential);
    CGT_UN = ("cgt.un", 0xFE03, None, Pop2, Push1, Sequential);
    CLT = ("clt", 0xFE04, None, Pop2, Push1, Sequential);
    CLT_UN = ("clt.un", 0xFE05, None, Pop2, Push1, Sequential);
    LDFTN = ("ldftn", 0xFE06, Token, Pop0, Push1, Sequential);
    LDVIRTFTN = ("ldvirtftn", 0xFE07, Token, Pop1, Push1, Sequential);
    LDARG = ("ldarg", 0xFE09, UInt16, Pop0, Push1, Sequential);
    LDARGA = ("ldarga", 0xFE0A, UInt16, Pop0, Push1, Sequential);
    STARG = ("starg", 0xFE0B, UInt16, Pop1, Push0, Sequential);
    LDLOC = ("ldloc", 0xFE0C, UInt16, Pop0, Push1, Sequential);
    LDLOCA = ("ldloca", 0xFE0D, UInt16, Pop0, Push1, Sequential);
    STLOC = ("stloc", 0xFE0E, UInt16, Pop1, Push0, Sequential);
    LOCALLOC = ("localloc", 0xFE0F, None, Pop1, Push1, Sequential);
    ENDFILTER = ("endfilter", 0xFE11, None, Pop1, Push0, EndFinally);
    UNALIGNED = ("unaligned.", 0xFE12, UInt8, Pop0, Push0, Meta);
    VOLATILE = ("volatile.", 0xFE13, None, Pop0, Push0, Meta);
    TAIL = ("tail.", 0xFE14, None, Pop0, Push0, Meta);
    INITOBJ = ("initobj", 0xFE15, Token, Pop1, Push0, Sequential);
    CONSTRAINED = ("constrained.", 0xFE16, Token, Pop0, Push0, Meta);
    CPBLK = ("cpblk", 0xFE17, None, Pop3, Push0, Sequential);
    INITBLK = ("initblk", 0xFE18, None, Pop3, Push0, Sequential);
    NO = ("no.", 0xFE19, UInt8, Pop0, Push0, Meta);
    RETHROW = ("rethrow", 0xFE1A, None, Pop0, Push0, Throw);
    SIZEOF = ("sizeof", 0xFE1C, Token, Pop0, Push1, Sequential);
    REFANYTYPE = ("refanytype", 0xFE1D, None, Pop1, Push1, Sequential);
    READONLY = ("readonly.", 0xFE1E, None, Pop0, Push0, Meta);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_has_unique_names_and_values() {
        let names: HashSet<_> = OPCODES.iter().map(OpCode::name).collect();
        let values: HashSet<_> = OPCODES.iter().map(OpCode::value).collect();
        assert_eq!(names.len(), OPCODES.len());
        assert_eq!(values.len(), OPCODES.len());
    }

    #[test]
    fn test_lookup_round_trip() {
        for op in OPCODES {
            assert_eq!(OpCode::from_mnemonic(op.name()), Some(*op));
            assert_eq!(OpCode::from_value(op.value()), Some(*op));
        }
        assert_eq!(OpCode::from_mnemonic("bogus"), None);
        assert_eq!(OpCode::from_value(0x24), None);
    }

    #[test]
    fn test_parse_mnemonic() {
        assert_eq!("ldarg.0".parse::<OpCode>().ok(), Some(LDARG_0));
        assert!(matches!(
            "ldarg.9".parse::<OpCode>(),
            Err(Error::InvalidMnemonic(name)) if name == "ldarg.9"
        ));
    }

    #[test]
    fn test_opcode_sizes() {
        assert_eq!(NOP.size(), 1);
        assert_eq!(CONV_U.size(), 1);
        assert_eq!(ARGLIST.size(), 2);
        assert_eq!(READONLY.size(), 2);
    }

    #[test]
    fn test_branch_pairing_is_bidirectional() {
        for (short, long) in SHORT_BRANCHES.iter().zip(LONG_BRANCHES.iter()) {
            assert_eq!(short.long_form(), Some(*long));
            assert_eq!(long.short_form(), Some(*short));
            assert_eq!(short.short_form(), Some(*short));
            assert_eq!(long.long_form(), Some(*long));
            assert_eq!(short.operand_type(), OperandType::Int8);
            assert_eq!(long.operand_type(), OperandType::Int32);
            assert_eq!(short.stack_effect(), long.stack_effect());
            assert_eq!(short.flow(), long.flow());
        }
    }

    #[test]
    fn test_non_branches_have_no_pair() {
        assert_eq!(ADD.short_form(), None);
        assert_eq!(SWITCH.long_form(), None);
        assert_eq!(LDC_I4_S.long_form(), None);
    }

    #[test]
    fn test_every_branch_is_paired() {
        for op in OPCODES.iter().filter(|op| op.is_branch()) {
            assert!(op.short_form().is_some(), "{} has no short form", op);
            assert!(op.long_form().is_some(), "{} has no long form", op);
        }
    }

    #[test]
    fn test_stack_effects() {
        assert_eq!(ADD.stack_effect(), (StackPop::Pop2, StackPush::Push1));
        assert_eq!(DUP.stack_effect(), (StackPop::Pop1, StackPush::Push2));
        assert_eq!(STELEM_REF.stack_effect(), (StackPop::Pop3, StackPush::Push0));
        assert!(CALL.has_variable_stack_effect());
        assert!(NEWOBJ.has_variable_stack_effect());
        assert!(RET.has_variable_stack_effect());
        assert!(!JMP.has_variable_stack_effect());
    }
}
