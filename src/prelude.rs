//! # dotemit Prelude
//!
//! This module provides a convenient prelude for the most commonly used types from the
//! dotemit library. Import it to get quick access to everything needed to assemble a
//! method body.
//!
//! ```rust
//! use dotemit::prelude::*;
//!
//! let mut emitter = InstructionEmitter::new();
//! emitter.emit(opcodes::NOP)?;
//! emitter.emit_ret(false)?;
//! let (code, _) = emitter.finalize()?;
//! assert_eq!(code, vec![0x00, 0x2A]);
//! # Ok::<(), dotemit::Error>(())
//! ```

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotemit operations
pub use crate::Error;

/// The result type used throughout dotemit
pub use crate::Result;

/// Metadata token type for operands referencing metadata
pub use crate::Token;

// ================================================================================================
// Emission
// ================================================================================================

/// Instruction emitter and its configuration
pub use crate::assembly::{EmitterConfig, InstructionEmitter, Label, Local};

/// Closure-style method body construction
pub use crate::assembly::{MethodBody, MethodBodyBuilder};

// ================================================================================================
// Opcodes and Operands
// ================================================================================================

/// The opcode table
pub use crate::assembly::opcodes;

/// Opcode descriptor and instruction classification
pub use crate::assembly::{FlowType, Immediate, OpCode, Operand, OperandType, StackPop, StackPush};
