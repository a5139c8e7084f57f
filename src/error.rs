use thiserror::Error;

use crate::assembly::Label;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every variant describes a violation of the emitter's calling contract: a bug in the code
/// generator driving the [`crate::assembly::InstructionEmitter`], not a transient condition.
/// None of them are retried internally, and the method body under construction should be
/// discarded once one is returned.
///
/// # Error Categories
///
/// ## Label Errors
/// - [`Error::UnknownLabel`] - A label handle that was never declared
/// - [`Error::LabelAlreadyMarked`] - A label marked a second time
/// - [`Error::UnresolvedLabel`] - A declared label that was never marked, reported by `finalize`
///
/// ## Instruction Errors
/// - [`Error::StackUnderflow`] - An opcode popped more values than the stack holds
/// - [`Error::InvalidBranch`] - A branch or switch emitted through the wrong entry point
/// - [`Error::WrongOperandType`] / [`Error::UnexpectedOperand`] - Operand does not match the opcode
/// - [`Error::VariableStackEffect`] - A call-like opcode emitted without an explicit stack effect
/// - [`Error::InvalidMnemonic`] - Mnemonic lookup failed
///
/// ## Buffer Errors
/// - [`Error::OutOfBounds`] - A patch outside of the written code region
/// - [`Error::Malformed`] - Internal size limits exceeded
///
/// # Examples
///
/// ```rust
/// use dotemit::{assembly::InstructionEmitter, Error};
///
/// let mut emitter = InstructionEmitter::new();
/// let label = emitter.declare_label();
///
/// match emitter.finalize() {
///     Err(Error::UnresolvedLabel(l)) => assert_eq!(l, label),
///     other => panic!("unexpected result: {:?}", other),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A label handle was used that this emitter never declared.
    ///
    /// Labels are indices into the emitter's own label table, so a handle taken from a
    /// different emitter instance typically triggers this.
    #[error("Unknown label - {0}")]
    UnknownLabel(Label),

    /// `mark_label` was called a second time for the same label.
    ///
    /// A label's offset is fixed forever once it has been marked.
    #[error("Label has already been marked - {0}")]
    LabelAlreadyMarked(Label),

    /// A declared label was never marked.
    ///
    /// Raised by `finalize` only. Any branch to this label would still carry its
    /// zero placeholder displacement.
    #[error("Label was declared but never marked - {0}")]
    UnresolvedLabel(Label),

    /// An opcode would drive the abstract evaluation stack below zero.
    ///
    /// # Fields
    ///
    /// * `opcode` - Mnemonic of the offending instruction
    /// * `height` - Stack height before the instruction
    /// * `pops` - Number of values the instruction pops
    #[error("Stack underflow at '{opcode}': height {height}, pops {pops}")]
    StackUnderflow {
        /// Mnemonic of the instruction that underflowed
        opcode: &'static str,
        /// Stack height before the instruction was applied
        height: u32,
        /// Number of values the instruction tried to pop
        pops: u32,
    },

    /// A branch instruction was malformed or emitted through the wrong API.
    #[error("Invalid branch - {0}")]
    InvalidBranch(String),

    /// The operand supplied does not match the operand type of the opcode.
    #[error("Wrong operand type - expected {expected}")]
    WrongOperandType {
        /// The operand type the opcode expects
        expected: String,
    },

    /// An operand was supplied to an opcode that takes none.
    #[error("Unexpected operand for an instruction without operand")]
    UnexpectedOperand,

    /// The opcode has a call-site dependent stack effect.
    ///
    /// `call`, `callvirt`, `calli`, `newobj` and `ret` pop (and push) a number of
    /// values that depends on the target signature. They must be emitted through
    /// `emit_call` or `emit_ret`, which take the stack effect from the caller.
    #[error("Opcode '{0}' has a variable stack effect, use emit_call or emit_ret")]
    VariableStackEffect(&'static str),

    /// A mnemonic could not be resolved to an opcode.
    #[error("Invalid mnemonic - {0}")]
    InvalidMnemonic(String),

    /// An access outside of the written code region was attempted.
    #[error("Out of Bound access would have occurred!")]
    OutOfBounds,

    /// The method body exceeds an encoding limit.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what went wrong
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },
}
