//! Abstract evaluation-stack height tracking.
//!
//! [`StackTracker`] counts values, not types. It is enough to compute the `max_stack` value
//! a method header needs without executing the code, and to catch code generators that pop
//! values they never pushed.
//!
//! Code following an unconditional transfer (`br`, `leave`, `ret`, `throw`, ...) is
//! unreachable until the next label is marked. The height there carries no meaning, so
//! underflows are not reported and the height clamps at zero.

use crate::{Error, Result};

/// Running stack height and high-water mark for one method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackTracker {
    height: u32,
    max_height: u32,
    reachable: bool,
}

impl StackTracker {
    /// Create a tracker for an empty stack at method entry.
    #[must_use]
    pub fn new() -> Self {
        StackTracker {
            height: 0,
            max_height: 0,
            reachable: true,
        }
    }

    /// Apply an instruction's stack effect.
    ///
    /// `opcode` names the instruction in the error.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StackUnderflow`] if `pops` exceeds the current height in
    /// reachable code. The tracker is left unchanged in that case.
    pub fn apply(&mut self, opcode: &'static str, pops: u32, pushes: u32) -> Result<()> {
        let remaining = match self.height.checked_sub(pops) {
            Some(remaining) => remaining,
            None if self.reachable => {
                return Err(Error::StackUnderflow {
                    opcode,
                    height: self.height,
                    pops,
                })
            }
            None => 0,
        };

        self.height = remaining.saturating_add(pushes);
        self.max_height = self.max_height.max(self.height);
        Ok(())
    }

    /// Current abstract stack height.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Highest height observed so far.
    #[must_use]
    pub fn max_height(&self) -> u32 {
        self.max_height
    }

    /// Whether the current position can be reached by falling through.
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    /// Mark the following code as unreachable.
    pub fn set_unreachable(&mut self) {
        self.reachable = false;
    }

    /// Continue at a join point with the merged height of all incoming edges.
    ///
    /// Makes the code reachable again and raises the high-water mark if needed.
    pub fn resume_at(&mut self, height: u32) {
        self.height = height;
        self.reachable = true;
        self.max_height = self.max_height.max(height);
    }
}

impl Default for StackTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_height_and_high_water_mark() -> Result<()> {
        let mut stack = StackTracker::new();
        stack.apply("ldc.i4.1", 0, 1)?;
        stack.apply("ldc.i4.2", 0, 1)?;
        stack.apply("dup", 1, 2)?;
        assert_eq!(stack.height(), 3);
        stack.apply("add", 2, 1)?;
        stack.apply("add", 2, 1)?;
        assert_eq!(stack.height(), 1);
        assert_eq!(stack.max_height(), 3);
        Ok(())
    }

    #[test]
    fn test_underflow_in_reachable_code() {
        let mut stack = StackTracker::new();
        stack.apply("ldc.i4.0", 0, 1).unwrap();
        let err = stack.apply("add", 2, 1).unwrap_err();
        assert!(matches!(
            err,
            Error::StackUnderflow {
                opcode: "add",
                height: 1,
                pops: 2
            }
        ));
        assert_eq!(stack.height(), 1);
    }

    #[test]
    fn test_unreachable_code_clamps() -> Result<()> {
        let mut stack = StackTracker::new();
        stack.set_unreachable();
        stack.apply("pop", 1, 0)?;
        assert_eq!(stack.height(), 0);
        assert!(!stack.is_reachable());

        stack.resume_at(2);
        assert!(stack.is_reachable());
        assert_eq!(stack.height(), 2);
        assert_eq!(stack.max_height(), 2);
        Ok(())
    }
}
