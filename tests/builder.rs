//! Integration tests for the method body builder.
//!
//! Each test assembles a small but realistic method the way a compiler back end would and
//! checks the resulting bytes, max stack value and locals.

use dotemit::prelude::*;

/// static int Sum(int n) { int total = 0; for (int i = 0; i < n; i++) total += i; return total; }
#[test]
fn test_counting_loop() -> Result<()> {
    let int32 = Token::new(0x0100_0001);
    let body = MethodBodyBuilder::new()
        .local(int32)
        .local(int32)
        .implementation(|asm| {
            let check = asm.declare_label();
            let top = asm.declare_label();

            asm.emit_ldc_i4(0)?;
            asm.emit_stloc(0u16)?;
            asm.emit_ldc_i4(0)?;
            asm.emit_stloc(1u16)?;
            asm.emit_branch(opcodes::BR, check)?;

            asm.mark_label(top)?;
            asm.emit_ldloc(0u16)?;
            asm.emit_ldloc(1u16)?;
            asm.emit(opcodes::ADD)?;
            asm.emit_stloc(0u16)?;
            asm.emit_ldloc(1u16)?;
            asm.emit_ldc_i4(1)?;
            asm.emit(opcodes::ADD)?;
            asm.emit_stloc(1u16)?;

            asm.mark_label(check)?;
            asm.emit_ldloc(1u16)?;
            asm.emit_ldarg(0)?;
            asm.emit_branch(opcodes::BLT, top)?;

            asm.emit_ldloc(0u16)?;
            asm.emit_ret(true)
        })
        .build()?;

    assert_eq!(
        body.code,
        vec![
            0x16, 0x0A, 0x16, 0x0B, // total = 0; i = 0
            0x38, 0x08, 0x00, 0x00, 0x00, // br check
            0x06, 0x07, 0x58, 0x0A, // total += i
            0x07, 0x17, 0x58, 0x0B, // i++
            0x07, 0x02, 0x32, 0xF4, // check: blt.s top
            0x06, 0x2A,
        ]
    );
    assert_eq!(body.max_stack, 2);
    assert_eq!(body.locals, vec![int32, int32]);
    Ok(())
}

/// Instance method calling a virtual getter and constructing an object.
#[test]
fn test_calls_and_object_creation() -> Result<()> {
    let getter = Token::new(0x0A00_0011);
    let ctor = Token::new(0x0A00_0012);
    let body = MethodBodyBuilder::new()
        .implementation(move |asm| {
            asm.emit_ldarg(0)?;
            asm.emit_call(opcodes::CALLVIRT, getter, 1, true)?;
            asm.emit_with(opcodes::LDSTR, Token::new(0x7000_0001))?;
            asm.emit_call(opcodes::NEWOBJ, ctor, 2, true)?;
            asm.emit_ret(true)
        })
        .build()?;

    assert_eq!(body.code.len(), 1 + 5 + 5 + 5 + 1);
    assert_eq!(body.code[1], 0x6F);
    assert_eq!(body.code[11], 0x73);
    assert_eq!(body.max_stack, 2);
    Ok(())
}

#[test]
fn test_config_is_forwarded() -> Result<()> {
    let build = |config: EmitterConfig| {
        MethodBodyBuilder::new()
            .config(config)
            .implementation(|asm| {
                let head = asm.declare_label();
                asm.mark_label(head)?;
                asm.emit_ldarg(0)?;
                asm.emit_branch(opcodes::BRTRUE, head)?;
                asm.emit_ret(false)
            })
            .build()
    };

    let compact = build(EmitterConfig::compact())?;
    let long = build(EmitterConfig::long_branches().with_capacity(4))?;
    assert_eq!(compact.code, vec![0x02, 0x2D, 0xFD, 0x2A]);
    assert_eq!(long.code, vec![0x02, 0x3A, 0xFA, 0xFF, 0xFF, 0xFF, 0x2A]);
    Ok(())
}

#[test]
fn test_errors_abort_the_build() {
    let result = MethodBodyBuilder::new()
        .implementation(|asm| {
            let label = asm.declare_label();
            asm.mark_label(label)?;
            asm.mark_label(label)
        })
        .build();
    assert!(matches!(result, Err(Error::LabelAlreadyMarked(_))));

    let result = MethodBodyBuilder::new()
        .implementation(|asm| asm.emit_ldloc(0u16))
        .build();
    assert!(matches!(result, Err(Error::Malformed { .. })));
}
