//! Operand types, immediates and per-opcode metadata enums.
//!
//! These types describe what an opcode expects after its encoding bytes ([`OperandType`]),
//! what a caller actually supplies ([`Operand`], [`Immediate`]), and how the opcode behaves
//! for stack and control-flow accounting ([`StackPop`], [`StackPush`], [`FlowType`]).
//!
//! # Usage Examples
//!
//! ```rust
//! use dotemit::assembly::{Immediate, Operand, OperandType};
//!
//! let operand: Operand = 42i32.into();
//! assert!(matches!(operand, Operand::Immediate(Immediate::Int32(42))));
//! assert!(OperandType::Int32.accepts(&operand));
//! assert!(!OperandType::Int8.accepts(&operand));
//! ```

use crate::Token;

/// Types of inline operands for CIL instructions.
///
/// Branch opcodes are described with [`OperandType::Int8`] (short form) or
/// [`OperandType::Int32`] (long form); their [`FlowType`] tells them apart from plain
/// immediates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// No operand present
    None,
    /// Signed 8-bit integer
    Int8,
    /// Unsigned 8-bit integer
    UInt8,
    /// Unsigned 16-bit integer
    UInt16,
    /// Signed 32-bit integer
    Int32,
    /// Signed 64-bit integer
    Int64,
    /// 32-bit IEEE 754 float
    Float32,
    /// 64-bit IEEE 754 float
    Float64,
    /// Metadata token
    Token,
    /// Switch jump table (count followed by 4-byte entries)
    Switch,
}

impl OperandType {
    /// Returns the size in bytes of this operand type.
    ///
    /// Returns `None` for the variable-sized switch table.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dotemit::assembly::OperandType;
    ///
    /// assert_eq!(OperandType::None.size(), Some(0));
    /// assert_eq!(OperandType::Token.size(), Some(4));
    /// assert_eq!(OperandType::Switch.size(), None);
    /// ```
    #[must_use]
    pub const fn size(&self) -> Option<usize> {
        match self {
            OperandType::None => Some(0),
            OperandType::Int8 | OperandType::UInt8 => Some(1),
            OperandType::UInt16 => Some(2),
            OperandType::Int32 | OperandType::Float32 | OperandType::Token => Some(4),
            OperandType::Int64 | OperandType::Float64 => Some(8),
            OperandType::Switch => None,
        }
    }

    /// Whether `operand` can be encoded for this operand type.
    ///
    /// Integer immediates are accepted when their width matches, independent of
    /// signedness. Floats and tokens must match exactly.
    #[must_use]
    pub fn accepts(&self, operand: &Operand) -> bool {
        match (self, operand) {
            (OperandType::Token, Operand::Token(_)) => true,
            (OperandType::Float32, Operand::Immediate(Immediate::Float32(_))) => true,
            (OperandType::Float64, Operand::Immediate(Immediate::Float64(_))) => true,
            (
                OperandType::Int8 | OperandType::UInt8,
                Operand::Immediate(Immediate::Int8(_) | Immediate::UInt8(_)),
            ) => true,
            (OperandType::UInt16, Operand::Immediate(Immediate::Int16(_) | Immediate::UInt16(_))) => {
                true
            }
            (OperandType::Int32, Operand::Immediate(Immediate::Int32(_) | Immediate::UInt32(_))) => {
                true
            }
            (OperandType::Int64, Operand::Immediate(Immediate::Int64(_) | Immediate::UInt64(_))) => {
                true
            }
            _ => false,
        }
    }

    /// Name used in operand mismatch errors.
    pub(crate) const fn name(&self) -> &'static str {
        match self {
            OperandType::None => "None",
            OperandType::Int8 => "Int8",
            OperandType::UInt8 => "UInt8",
            OperandType::UInt16 => "UInt16",
            OperandType::Int32 => "Int32",
            OperandType::Int64 => "Int64",
            OperandType::Float32 => "Float32",
            OperandType::Float64 => "Float64",
            OperandType::Token => "Token",
            OperandType::Switch => "Switch",
        }
    }
}

/// An immediate value encoded directly in the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Immediate {
    /// Signed 8-bit integer
    Int8(i8),
    /// Unsigned 8-bit integer
    UInt8(u8),
    /// Signed 16-bit integer
    Int16(i16),
    /// Unsigned 16-bit integer
    UInt16(u16),
    /// Signed 32-bit integer
    Int32(i32),
    /// Unsigned 32-bit integer
    UInt32(u32),
    /// Signed 64-bit integer
    Int64(i64),
    /// Unsigned 64-bit integer
    UInt64(u64),
    /// 32-bit IEEE 754 float
    Float32(f32),
    /// 64-bit IEEE 754 float
    Float64(f64),
}

/// An inline operand supplied to the emitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    /// Immediate value (constant embedded in instruction)
    Immediate(Immediate),
    /// Resolved metadata token, written verbatim
    Token(Token),
}

macro_rules! impl_operand_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Operand {
                fn from(value: $ty) -> Self {
                    Operand::Immediate(Immediate::$variant(value))
                }
            }
        )*
    };
}

impl_operand_from! {
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
}

impl From<Immediate> for Operand {
    fn from(value: Immediate) -> Self {
        Operand::Immediate(value)
    }
}

impl From<Token> for Operand {
    fn from(value: Token) -> Self {
        Operand::Token(value)
    }
}

/// How an instruction affects control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Normal execution continues to next instruction
    Sequential,
    /// Conditional branch to another location
    ConditionalBranch,
    /// Always branches to another location (unconditional jump)
    UnconditionalBranch,
    /// Call to another method
    Call,
    /// Returns from current method
    Return,
    /// Multi-way branch (switch statement)
    Switch,
    /// Exception throwing
    Throw,
    /// End of finally block
    EndFinally,
    /// Leave protected region (try/catch/finally)
    Leave,
    /// Prefix modifying the following instruction
    Meta,
}

impl FlowType {
    /// Whether this flow type takes a branch target operand.
    #[must_use]
    pub const fn is_branch(&self) -> bool {
        matches!(
            self,
            FlowType::ConditionalBranch | FlowType::UnconditionalBranch | FlowType::Leave
        )
    }

    /// Whether execution never falls through to the next instruction.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            FlowType::UnconditionalBranch
                | FlowType::Return
                | FlowType::Throw
                | FlowType::EndFinally
                | FlowType::Leave
        )
    }
}

/// Number of values an opcode pops from the evaluation stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackPop {
    /// Pops nothing
    Pop0,
    /// Pops one value
    Pop1,
    /// Pops two values
    Pop2,
    /// Pops three values (`stelem.*`, `cpblk`, `initblk`)
    Pop3,
    /// Depends on the call site (call-like opcodes and `ret`)
    Var,
}

impl StackPop {
    /// Fixed pop count, or `None` for [`StackPop::Var`].
    #[must_use]
    pub const fn count(&self) -> Option<u32> {
        match self {
            StackPop::Pop0 => Some(0),
            StackPop::Pop1 => Some(1),
            StackPop::Pop2 => Some(2),
            StackPop::Pop3 => Some(3),
            StackPop::Var => None,
        }
    }
}

/// Number of values an opcode pushes onto the evaluation stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackPush {
    /// Pushes nothing
    Push0,
    /// Pushes one value
    Push1,
    /// Pushes two values (`dup`)
    Push2,
    /// Depends on the call site (call-like opcodes)
    Var,
}

impl StackPush {
    /// Fixed push count, or `None` for [`StackPush::Var`].
    #[must_use]
    pub const fn count(&self) -> Option<u32> {
        match self {
            StackPush::Push0 => Some(0),
            StackPush::Push1 => Some(1),
            StackPush::Push2 => Some(2),
            StackPush::Var => None,
        }
    }
}
