//! Method body builder.
//!
//! [`MethodBodyBuilder`] owns one [`InstructionEmitter`] for the duration of a build. Callers
//! describe the locals and hand over a closure that drives the emitter; the builder runs it,
//! finalizes the code and returns a [`MethodBody`].

use log::debug;

use crate::{
    assembly::{config::EmitterConfig, emitter::InstructionEmitter},
    Result, Token,
};

/// Type alias for method body implementation closures
type ImplementationFn = Box<dyn FnOnce(&mut InstructionEmitter) -> Result<()>>;

/// A finished method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody {
    /// CIL bytecode with all branch displacements resolved
    pub code: Vec<u8>,
    /// Maximum evaluation stack depth
    pub max_stack: u32,
    /// Types of the local variables, in index order
    pub locals: Vec<Token>,
}

/// Builder for creating method body implementations.
///
/// # Examples
///
/// ```rust
/// use dotemit::{assembly::{opcodes, MethodBodyBuilder}, Token};
///
/// let body = MethodBodyBuilder::new()
///     .local(Token::new(0x0100_0001))
///     .implementation(|asm| {
///         asm.emit_ldarg(0)?;
///         asm.emit_ldarg(1)?;
///         asm.emit(opcodes::ADD)?;
///         asm.emit_stloc(0u16)?;
///         asm.emit_ldloc(0u16)?;
///         asm.emit_ret(true)
///     })
///     .build()?;
///
/// assert_eq!(body.code, vec![0x02, 0x03, 0x58, 0x0A, 0x06, 0x2A]);
/// assert_eq!(body.max_stack, 2);
/// assert_eq!(body.locals.len(), 1);
/// # Ok::<(), dotemit::Error>(())
/// ```
pub struct MethodBodyBuilder {
    /// Emitter configuration
    config: EmitterConfig,

    /// Maximum stack depth (None = computed)
    max_stack: Option<u32>,

    /// Local variable types
    locals: Vec<Token>,

    /// The implementation closure
    implementation: Option<ImplementationFn>,
}

impl MethodBodyBuilder {
    /// Create a new method body builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: EmitterConfig::default(),
            max_stack: None,
            locals: Vec::new(),
            implementation: None,
        }
    }

    /// Use a specific emitter configuration.
    #[must_use]
    pub fn config(mut self, config: EmitterConfig) -> Self {
        self.config = config;
        self
    }

    /// Request a minimum maximum-stack value.
    ///
    /// The computed depth wins if it is larger.
    #[must_use]
    pub fn max_stack(mut self, stack_size: u32) -> Self {
        self.max_stack = Some(stack_size);
        self
    }

    /// Add a local variable. Locals are numbered in the order they are added.
    #[must_use]
    pub fn local(mut self, local_type: Token) -> Self {
        self.locals.push(local_type);
        self
    }

    /// Set the method implementation.
    #[must_use]
    pub fn implementation<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut InstructionEmitter) -> Result<()> + 'static,
    {
        self.implementation = Some(Box::new(f));
        self
    }

    /// Run the implementation and finalize the method body.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if no implementation was provided, and any error
    /// the implementation or [`InstructionEmitter::finalize`] returns.
    pub fn build(self) -> Result<MethodBody> {
        let MethodBodyBuilder {
            config,
            max_stack,
            locals,
            implementation,
        } = self;

        let implementation = implementation
            .ok_or_else(|| malformed_error!("Method body implementation is required"))?;

        let mut emitter = InstructionEmitter::with_config(config);
        for local_type in locals {
            emitter.declare_local(local_type)?;
        }
        implementation(&mut emitter)?;

        let (code, computed_max_stack) = emitter.finalize()?;
        let max_stack = max_stack.map_or(computed_max_stack, |requested| {
            requested.max(computed_max_stack)
        });

        debug!(
            "built method body: {} bytes, max stack {} (computed {}), {} locals",
            code.len(),
            max_stack,
            computed_max_stack,
            emitter.locals().len()
        );
        Ok(MethodBody {
            code,
            max_stack,
            locals: emitter.locals().to_vec(),
        })
    }
}

impl Default for MethodBodyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assembly::opcodes, Error};

    #[test]
    fn test_method_body_builder_basic() -> Result<()> {
        let body = MethodBodyBuilder::new()
            .implementation(|asm| {
                asm.emit_ldarg(0)?;
                asm.emit_ret(true)
            })
            .build()?;

        assert_eq!(body.code, vec![0x02, 0x2A]);
        assert_eq!(body.max_stack, 1);
        assert!(body.locals.is_empty());
        Ok(())
    }

    #[test]
    fn test_method_body_builder_with_max_stack() -> Result<()> {
        let body = MethodBodyBuilder::new()
            .max_stack(10)
            .implementation(|asm| {
                asm.emit_ldarg(0)?;
                asm.emit_ret(true)
            })
            .build()?;
        assert_eq!(body.max_stack, 10);

        let body = MethodBodyBuilder::new()
            .max_stack(1)
            .implementation(|asm| {
                asm.emit_ldc_i4(1)?;
                asm.emit_ldc_i4(2)?;
                asm.emit(opcodes::ADD)?;
                asm.emit_ret(true)
            })
            .build()?;
        assert_eq!(body.max_stack, 2);
        Ok(())
    }

    #[test]
    fn test_method_body_builder_locals() -> Result<()> {
        let int32 = Token::new(0x0100_0001);
        let string = Token::new(0x0100_0002);
        let body = MethodBodyBuilder::new()
            .local(int32)
            .local(string)
            .implementation(|asm| {
                asm.emit_ldc_i4(7)?;
                asm.emit_stloc(1u16)?;
                asm.emit_ret(false)
            })
            .build()?;

        assert_eq!(body.locals, vec![int32, string]);
        assert_eq!(body.code, vec![0x1D, 0x0B, 0x2A]);
        Ok(())
    }

    #[test]
    fn test_method_body_builder_no_implementation_fails() {
        let result = MethodBodyBuilder::new().build();
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_method_body_builder_propagates_errors() {
        let result = MethodBodyBuilder::new()
            .implementation(|asm| {
                let label = asm.declare_label();
                asm.emit_branch(opcodes::BR, label)
            })
            .build();
        assert!(matches!(result, Err(Error::UnresolvedLabel(_))));

        let result = MethodBodyBuilder::new()
            .implementation(|asm| asm.emit(opcodes::POP))
            .build();
        assert!(matches!(result, Err(Error::StackUnderflow { .. })));
    }
}
