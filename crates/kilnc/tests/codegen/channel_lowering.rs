use anyhow::Result;
use inkwell::context::Context;

use kilnc::codegen::value::TypedValue;
use kilnc::error::LowerError;
use kilnc::types::KType;

use crate::common;

#[test]
fn send_spills_register_value_before_the_call() -> Result<()> {
    let context = Context::create();
    let session = common::session(&context)?;
    let cg = &session.codegen;

    let fn_type = cg
        .context
        .void_type()
        .fn_type(&[cg.ptr_t.into(), cg.i64_t.into()], false);
    let f = common::begin_function(cg, "send", fn_type);
    let chan = TypedValue::from_register(KType::chan(KType::i64()), f.get_nth_param(0).expect("chan"));
    let value = TypedValue::from_register(KType::i64(), f.get_nth_param(1).expect("value"));
    cg.chan_send(&chan, &value)?;
    cg.builder.build_return(None)?;

    let ir = common::function_ir(&session.finish()?, "send");
    let alloca_at = ir.find("alloca i64").expect("spill slot");
    let store_at = ir.find("store i64 %1, ptr").expect("spill store");
    let call_at = ir.find("call void @kiln_rt_chan_send(").expect("send call");
    assert!(alloca_at < store_at && store_at < call_at, "{}", ir);
    Ok(())
}

#[test]
fn recv_loads_from_a_fresh_slot() -> Result<()> {
    let context = Context::create();
    let session = common::session(&context)?;
    let cg = &session.codegen;

    let fn_type = cg.context.f64_type().fn_type(&[cg.ptr_t.into()], false);
    let f = common::begin_function(cg, "recv", fn_type);
    let chan = TypedValue::from_register(KType::chan(KType::f64()), f.get_nth_param(0).expect("chan"));
    let got = cg.chan_recv(&chan)?;
    assert_eq!(got.ty(), &KType::f64());
    cg.builder.build_return(Some(&cg.register_of(&got)?))?;

    let ir = common::function_ir(&session.finish()?, "recv");
    assert!(ir.contains("%recv.slot = alloca double"), "{}", ir);
    let call_at = ir.find("call void @kiln_rt_chan_recv(").expect("recv call");
    let load_at = ir.find("load double, ptr %recv.slot").expect("load");
    assert!(call_at < load_at, "{}", ir);
    Ok(())
}

#[test]
fn send_statement_converts_to_element_type() -> Result<()> {
    let context = Context::create();
    let session = common::session(&context)?;
    let cg = &session.codegen;

    let i32_t = cg.context.i32_type();
    let fn_type = cg
        .context
        .void_type()
        .fn_type(&[cg.ptr_t.into(), i32_t.into()], false);
    let f = common::begin_function(cg, "send_narrow", fn_type);
    let chan = TypedValue::from_register(KType::chan(KType::i64()), f.get_nth_param(0).expect("chan"));
    let value = TypedValue::from_register(KType::int(32, true), f.get_nth_param(1).expect("value"));
    cg.lower_send_stmt(&chan, &value)?;
    cg.builder.build_return(None)?;

    let ir = common::function_ir(&session.finish()?, "send_narrow");
    assert!(ir.contains("sext i32 %1 to i64"), "{}", ir);
    assert!(ir.contains("call void @kiln_rt_chan_send("), "{}", ir);
    Ok(())
}

#[test]
fn send_of_wrong_element_type_is_rejected() -> Result<()> {
    let context = Context::create();
    let session = common::session(&context)?;
    let cg = &session.codegen;

    let fn_type = cg.context.void_type().fn_type(&[cg.ptr_t.into()], false);
    let f = common::begin_function(cg, "bad_send", fn_type);
    let chan = TypedValue::from_register(KType::chan(KType::i64()), f.get_nth_param(0).expect("chan"));
    let value = TypedValue::from_register(KType::Bool, cg.bool_t.const_int(1, false));
    assert!(matches!(
        cg.chan_send(&chan, &value),
        Err(LowerError::TypeMismatch { context: "channel send", .. })
    ));
    Ok(())
}

#[test]
fn channel_operations_on_maps_are_rejected() -> Result<()> {
    let context = Context::create();
    let session = common::session(&context)?;
    let cg = &session.codegen;

    let fn_type = cg.context.void_type().fn_type(&[cg.ptr_t.into()], false);
    let f = common::begin_function(cg, "not_a_chan", fn_type);
    let map = TypedValue::from_register(
        KType::map(KType::i64(), KType::i64()),
        f.get_nth_param(0).expect("map"),
    );
    let err = cg.chan_recv(&map).expect_err("not a channel");
    assert!(matches!(err, LowerError::NotAggregate { expected: "channel", .. }));
    assert!(err.to_string().contains("map[i64]i64"), "{}", err);
    Ok(())
}
