//! CIL method body assembly.
//!
//! This module turns a sequence of emit calls into a finished CIL method body: the encoded
//! bytecode with every branch displacement resolved, plus the maximum evaluation stack depth
//! the method header needs. It works in a single pass; no instruction is ever re-encoded
//! after it was written, only 4-byte branch placeholders are patched.
//!
//! # Key Components
//!
//! - [`crate::assembly::InstructionEmitter`] - The façade code generators drive
//! - [`crate::assembly::MethodBodyBuilder`] - Closure-style builder producing a [`crate::assembly::MethodBody`]
//! - [`crate::assembly::CodeBuffer`] - Growable little-endian byte buffer with 4-byte patching
//! - [`crate::assembly::StackTracker`] - Abstract stack height and high-water mark
//! - [`crate::assembly::LabelTable`] - Label arena with pending branch references
//! - [`crate::assembly::opcodes`] - The ECMA-335 opcode table with stack effects and flow types
//!
//! # Usage Examples
//!
//! ```rust
//! use dotemit::assembly::{opcodes, InstructionEmitter};
//!
//! // return a > b ? a : b;
//! let mut emitter = InstructionEmitter::new();
//! let take_b = emitter.declare_label();
//!
//! emitter.emit_ldarg(0)?;
//! emitter.emit_ldarg(1)?;
//! emitter.emit_branch(opcodes::BLE, take_b)?;
//! emitter.emit_ldarg(0)?;
//! emitter.emit_ret(true)?;
//! emitter.mark_label(take_b)?;
//! emitter.emit_ldarg(1)?;
//! emitter.emit_ret(true)?;
//!
//! let (code, max_stack) = emitter.finalize()?;
//! assert_eq!(code, vec![0x02, 0x03, 0x3E, 0x02, 0x00, 0x00, 0x00, 0x02, 0x2A, 0x03, 0x2A]);
//! assert_eq!(max_stack, 2);
//! # Ok::<(), dotemit::Error>(())
//! ```
//!
//! # Thread Safety
//!
//! An emitter is a single-writer object. All of its state is owned, so it is [`Send`] and
//! independent emitters can run on separate threads. The opcode table is immutable static
//! data shared by all of them.

mod buffer;
mod builder;
mod config;
mod emitter;
mod instruction;
mod labels;
pub mod opcodes;
mod stack;

pub use buffer::{CodeBuffer, DEFAULT_CAPACITY};
pub use builder::{MethodBody, MethodBodyBuilder};
pub use config::EmitterConfig;
pub use emitter::{InstructionEmitter, Local};
pub use instruction::{FlowType, Immediate, Operand, OperandType, StackPop, StackPush};
pub use labels::{Label, LabelRecord, LabelTable, PendingRef};
pub use opcodes::OpCode;
pub use stack::StackTracker;
