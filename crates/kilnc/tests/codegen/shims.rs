use anyhow::Result;
use inkwell::context::Context;

use kilnc::error::LowerError;
use kilnc::shims::{ShimBuilder, shim_name, shim_ops};
use kilnc::types::{AggregateType, KType};

use crate::common;

#[test]
fn shims_are_emitted_once_per_type() -> Result<()> {
    let context = Context::create();
    let session = common::session(&context)?;
    let cg = &session.codegen;
    let ty: AggregateType = "map[str]f64".parse()?;

    let shims = ShimBuilder::new(cg);
    let first = shims.emit(&ty)?;
    let again = shims.emit(&ty)?;
    assert_eq!(first, again);
    assert_eq!(first.len(), shim_ops(&ty).len());
    for op in shim_ops(&ty) {
        assert!(cg.module.get_function(&shim_name(&ty, op)).is_some(), "{}", op);
    }
    session.verify()?;
    Ok(())
}

#[test]
fn failed_shim_body_leaves_no_function_behind() -> Result<()> {
    let context = Context::create();
    let session = common::session(&context)?;
    let cg = &session.codegen;
    let bad = AggregateType::map(KType::map(KType::i64(), KType::i64()), KType::Bool);

    let shims = ShimBuilder::new(cg);
    assert!(shims.emit(&bad).is_err());
    assert!(cg.module.get_function(&shim_name(&bad, "get")).is_none());
    session.verify()?;

    // a retry fails the same way instead of returning a half-built shim
    assert!(shims.emit(&bad).is_err());
    assert!(cg.module.get_function(&shim_name(&bad, "get")).is_none());
    Ok(())
}

#[test]
fn existing_function_with_other_type_is_a_conflict() -> Result<()> {
    let context = Context::create();
    let session = common::session(&context)?;
    let cg = &session.codegen;
    let ty = AggregateType::chan(KType::i64());

    let wrong = cg.context.void_type().fn_type(&[], false);
    cg.module.add_function(&shim_name(&ty, "send"), wrong, None);

    let err = ShimBuilder::new(cg).emit(&ty).expect_err("send shim type differs");
    assert!(matches!(err, LowerError::SignatureConflict { .. }), "{}", err);
    assert!(err.to_string().contains("kiln.chan.i64.send"), "{}", err);
    Ok(())
}
