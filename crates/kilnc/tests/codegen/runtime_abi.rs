use anyhow::Result;
use inkwell::context::Context;

use kilnc::LowerSession;
use kilnc::codegen::value::TypedValue;
use kilnc::config::LowerConfig;
use kilnc::error::LowerError;
use kilnc::runtime_functions::{AbiKind, AbiReturn, RuntimeOp, RuntimeSignature};
use kilnc::types::KType;

use crate::common;

#[test]
fn abi_module_declares_exact_signatures() -> Result<()> {
    let context = Context::create();
    let session = common::session(&context)?;
    let ir = session.emit_runtime_abi()?;

    assert!(ir.contains("declare i64 @kiln_rt_map_lookup(i64, i64, i64, i1)"), "{}", ir);
    assert!(ir.contains("declare void @kiln_rt_map_delete(i64, i64, i64)"), "{}", ir);
    assert!(
        ir.contains("declare { i64, i64, i64 } @kiln_rt_map_next(i64, i64, i64)"),
        "{}",
        ir
    );
    assert!(ir.contains("declare void @kiln_rt_chan_send(i64, i64)"), "{}", ir);
    assert!(ir.contains("declare void @kiln_rt_chan_recv(i64, i64)"), "{}", ir);
    assert_eq!(session.codegen.runtime_registry().len(), 5);
    Ok(())
}

#[test]
fn word_width_and_prefix_follow_target() -> Result<()> {
    let context = Context::create();
    let config = LowerConfig {
        runtime_prefix: "rt32_".to_string(),
        target_triple: Some("i686-unknown-linux-gnu".to_string()),
        ..Default::default()
    };
    let session = common::session_with(&context, config)?;
    assert_eq!(session.codegen.word_t.get_bit_width(), 32);
    let ir = session.emit_runtime_abi()?;

    assert!(ir.contains("declare i32 @rt32_map_lookup(i32, i32, i32, i1)"), "{}", ir);
    assert!(
        ir.contains("declare { i32, i32, i32 } @rt32_map_next(i32, i32, i32)"),
        "{}",
        ir
    );
    assert!(ir.contains("target triple = \"i686-unknown-linux-gnu\""), "{}", ir);
    assert!(ir.contains("target datalayout = "), "{}", ir);
    assert!(!ir.contains("kiln_rt_"), "{}", ir);
    Ok(())
}

#[test]
fn matching_pointer_bits_is_accepted() -> Result<()> {
    let context = Context::create();
    let config = LowerConfig {
        pointer_bits: Some(32),
        target_triple: Some("i686-unknown-linux-gnu".to_string()),
        ..Default::default()
    };
    let session = common::session_with(&context, config)?;
    assert_eq!(session.codegen.word_t.get_bit_width(), 32);
    Ok(())
}

#[test]
fn pointer_bits_narrower_than_target_is_rejected() {
    let context = Context::create();
    let config = LowerConfig {
        pointer_bits: Some(32),
        target_triple: Some("x86_64-unknown-linux-gnu".to_string()),
        ..Default::default()
    };
    let err = LowerSession::new(&context, "narrow", config)
        .err()
        .expect("32-bit words on a 64-bit target");
    assert!(matches!(err, LowerError::Config(_)), "{}", err);
    assert!(err.to_string().contains("64-bit pointers"), "{}", err);
}

#[test]
fn host_word_is_pointer_sized() -> Result<()> {
    let context = Context::create();
    let session = common::session(&context)?;
    assert_eq!(
        session.codegen.word_t.get_bit_width() as usize,
        std::mem::size_of::<usize>() * 8
    );
    Ok(())
}

#[test]
fn unknown_target_is_a_config_error() {
    let context = Context::create();
    let config = LowerConfig {
        target_triple: Some("nosuchcpu-unknown-none".to_string()),
        ..Default::default()
    };
    let err = LowerSession::new(&context, "unknown", config)
        .err()
        .expect("unknown target");
    assert!(matches!(err, LowerError::Config(_)), "{}", err);
}

#[test]
fn repeated_lowering_declares_each_entry_point_once() -> Result<()> {
    let context = Context::create();
    let session = common::session(&context)?;
    let cg = &session.codegen;

    let map_ty = KType::map(KType::i64(), KType::i64());
    let fn_type = cg.i64_t.fn_type(&[cg.ptr_t.into(), cg.i64_t.into()], false);
    let f = common::begin_function(cg, "lookups", fn_type);
    let map = TypedValue::from_register(map_ty, f.get_nth_param(0).expect("map param"));
    let key = TypedValue::from_register(KType::i64(), f.get_nth_param(1).expect("key param"));

    let first = cg.runtime_function(RuntimeOp::MapLookup)?;
    for _ in 0..4 {
        cg.map_lookup(&map, &key, false)?;
        cg.map_lookup(&map, &key, true)?;
        cg.map_delete(&map, &key)?;
    }
    assert_eq!(cg.runtime_function(RuntimeOp::MapLookup)?, first);
    cg.builder.build_return(Some(&cg.i64_t.const_zero()))?;

    let ir = session.finish()?;
    assert_eq!(ir.matches("declare i64 @kiln_rt_map_lookup").count(), 1, "{}", ir);
    assert_eq!(ir.matches("declare void @kiln_rt_map_delete").count(), 1, "{}", ir);
    assert_eq!(ir.matches("call i64 @kiln_rt_map_lookup").count(), 8, "{}", ir);
    assert_eq!(
        cg.runtime_registry().names(),
        vec!["kiln_rt_map_delete", "kiln_rt_map_lookup"]
    );
    Ok(())
}

#[test]
fn conflicting_redeclaration_names_the_entry_point() -> Result<()> {
    let context = Context::create();
    let session = common::session(&context)?;
    let cg = &session.codegen;
    cg.runtime_function(RuntimeOp::ChanRecv)?;

    let wrong = RuntimeSignature::new(&[AbiKind::Word], AbiReturn::Word);
    let err = cg
        .runtime_registry()
        .declare(&context, &cg.module, cg.word_t, "kiln_rt_chan_recv", &wrong)
        .expect_err("signature conflict");
    assert!(matches!(err, LowerError::SignatureConflict { .. }));
    assert!(err.to_string().contains("kiln_rt_chan_recv"));
    assert!(err.is_internal());
    Ok(())
}
