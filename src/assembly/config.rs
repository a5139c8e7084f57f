//! Emitter configuration.

use crate::assembly::buffer::DEFAULT_CAPACITY;

/// Configuration for an [`crate::assembly::InstructionEmitter`].
///
/// Neither option changes the meaning of the emitted code, only its size and the
/// allocation pattern while assembling it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitterConfig {
    /// Bytes reserved for the instruction buffer up front (default: 64)
    pub initial_capacity: usize,

    /// Encode backward branches in short form when the displacement fits a signed byte
    /// (default: true). Forward branches are always long form.
    pub short_backward_branches: bool,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            short_backward_branches: true,
        }
    }
}

impl EmitterConfig {
    /// Smallest encoding the single-pass emitter can produce.
    #[must_use]
    pub fn compact() -> Self {
        Self::default()
    }

    /// Every branch in long form, so each branch instruction has a fixed size.
    ///
    /// Useful when a caller computes instruction offsets on its own.
    #[must_use]
    pub fn long_branches() -> Self {
        Self {
            short_backward_branches: false,
            ..Self::default()
        }
    }

    /// Set the initial buffer capacity.
    #[must_use]
    pub fn with_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }
}
