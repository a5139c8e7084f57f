// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # dotemit
//!
//! A single-pass assembler for CIL (ECMA-335) method bodies.
//!
//! Code generators that target the .NET runtime describe a method as a stream of emit calls:
//! opcodes, immediates, resolved metadata tokens and symbolic labels. `dotemit` encodes that
//! stream into bytecode, resolves every branch displacement, and computes the maximum
//! evaluation stack depth the method header requires.
//!
//! ## Features
//!
//! - **Complete opcode table** - Every ECMA-335 opcode with encoding, operand type, stack effect and flow type
//! - **Symbolic labels** - Forward and backward branches, including `switch` tables, with backpatching
//! - **Compact encoding** - Short branch forms for backward jumps, compact `ldarg`/`ldloc`/`ldc.i4` variants
//! - **Stack depth tracking** - `max_stack` is computed while emitting, underflows are reported immediately
//!
//! ## Quick Start
//!
//! ```rust
//! use dotemit::prelude::*;
//!
//! // static int Abs(int x) => x < 0 ? -x : x;
//! let body = MethodBodyBuilder::new()
//!     .implementation(|asm| {
//!         let positive = asm.declare_label();
//!         asm.emit_ldarg(0)?;
//!         asm.emit_ldc_i4(0)?;
//!         asm.emit_branch(opcodes::BGE, positive)?;
//!         asm.emit_ldarg(0)?;
//!         asm.emit(opcodes::NEG)?;
//!         asm.emit_ret(true)?;
//!         asm.mark_label(positive)?;
//!         asm.emit_ldarg(0)?;
//!         asm.emit_ret(true)
//!     })
//!     .build()?;
//!
//! assert_eq!(body.max_stack, 2);
//! # Ok::<(), dotemit::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`](Result), with [`Error`] describing which part
//! of the emitter's contract was violated. Errors are not recoverable for the method body in
//! progress; discard the emitter and report the bug in the generating code.
//!
//! ## Logging
//!
//! The crate logs through the [`log`](https://docs.rs/log) facade: label resolution and
//! patching at `trace` level, finished method bodies at `debug` level. Install any logger in
//! the application to see them.

#[macro_use]
pub(crate) mod error;
mod token;

/// Convenient re-exports of the most commonly used types.
pub mod prelude;

/// CIL method body assembly: opcodes, labels, stack tracking and the instruction emitter.
pub mod assembly;

/// `dotemit` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust
/// use dotemit::{assembly::InstructionEmitter, Result};
///
/// fn empty_body() -> Result<Vec<u8>> {
///     let mut emitter = InstructionEmitter::new();
///     emitter.emit_ret(false)?;
///     Ok(emitter.finalize()?.0)
/// }
/// # assert_eq!(empty_body().unwrap(), vec![0x2A]);
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `dotemit` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

/// Resolved metadata token, written verbatim into the instruction stream.
pub use token::Token;
