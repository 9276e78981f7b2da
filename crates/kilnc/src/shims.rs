//! Typed wrapper functions over the untyped runtime ABI.
//!
//! For an aggregate type `T` the builder emits externally visible functions
//! named `kiln.<mangle T>.<op>`:
//!
//! | op | map signature | channel signature |
//! |---|---|---|
//! | `get` | `(ptr m, K k) -> V` | |
//! | `has` | `(ptr m, K k) -> word` | |
//! | `set` | `(ptr m, K k, V v) -> void` | |
//! | `delete` | `(ptr m, K k) -> void` | |
//! | `count` | `(ptr m) -> word` | |
//! | `send` | | `(ptr c, T v) -> void` |
//! | `recv` | | `(ptr c) -> T` |
//!
//! Each body is built from the same lowering routines the front-end uses,
//! so the shims double as an executable check of those routines.

use inkwell::module::Linkage;
use inkwell::types::{BasicType, BasicTypeEnum, FunctionType};
use inkwell::values::{BasicValueEnum, FunctionValue};
use tracing::debug;

use crate::codegen::CodeGen;
use crate::codegen::value::TypedValue;
use crate::constants;
use crate::error::{LowerError, LowerResult};
use crate::types::{AggregateType, KType, MapType};

/// Name of shim `op` for aggregate type `ty`.
pub fn shim_name(ty: &AggregateType, op: &str) -> String {
    format!("{}{}.{}", constants::SHIM_PREFIX, ty.mangle(), op)
}

/// Shim operations emitted for `ty`, in emission order.
pub fn shim_ops(ty: &AggregateType) -> &'static [&'static str] {
    match ty {
        AggregateType::Map(_) => &["get", "has", "set", "delete", "count"],
        AggregateType::Chan(_) => &["send", "recv"],
    }
}

pub struct ShimBuilder<'a, 'ctx> {
    cg: &'a CodeGen<'ctx>,
}

impl<'a, 'ctx> ShimBuilder<'a, 'ctx> {
    pub fn new(cg: &'a CodeGen<'ctx>) -> Self {
        ShimBuilder { cg }
    }

    /// Emits every shim for `ty`. Shims that already exist are returned as
    /// they are.
    pub fn emit(&self, ty: &AggregateType) -> LowerResult<Vec<FunctionValue<'ctx>>> {
        // keep the caller's insertion point
        let saved = self.cg.builder.get_insert_block();
        let result = match ty {
            AggregateType::Map(m) => self.emit_map(ty, m),
            AggregateType::Chan(_) => self.emit_chan(ty),
        };
        if let Some(bb) = saved {
            self.cg.builder.position_at_end(bb);
        }
        result
    }

    fn emit_map(&self, ty: &AggregateType, m: &MapType) -> LowerResult<Vec<FunctionValue<'ctx>>> {
        let cg = self.cg;
        let map_kt = ty.to_ktype();
        let key_kt = m.key.as_ref();
        let elt_kt = m.elt.as_ref();
        let ptr: BasicTypeEnum<'ctx> = cg.ptr_t.into();
        let key_t = cg.storage_type(key_kt);
        let elt_t = cg.storage_type(elt_kt);

        let get = self.define(ty, "get", elt_t.fn_type(&[ptr.into(), key_t.into()], false), |f| {
            let (map, key) = self.map_and_key(f, &map_kt, key_kt)?;
            let addr = cg.map_lookup(&map, &key, false)?;
            let value = cg.load(&addr, "elem")?;
            cg.builder.build_return(Some(&cg.register_of(&value)?))?;
            Ok(())
        })?;

        let has = self.define(ty, "has", cg.word_t.fn_type(&[ptr.into(), key_t.into()], false), |f| {
            let (map, key) = self.map_and_key(f, &map_kt, key_kt)?;
            let (_, found) = cg.map_lookup_with_presence(&map, &key)?;
            let as_word = cg.builder.build_int_z_extend(found, cg.word_t, "has")?;
            cg.builder.build_return(Some(&as_word))?;
            Ok(())
        })?;

        let set_t = cg
            .context
            .void_type()
            .fn_type(&[ptr.into(), key_t.into(), elt_t.into()], false);
        let set = self.define(ty, "set", set_t, |f| {
            let (map, key) = self.map_and_key(f, &map_kt, key_kt)?;
            let value = TypedValue::from_register(elt_kt.clone(), self.param(f, 2)?);
            cg.map_store(&map, &key, &value)?;
            cg.builder.build_return(None)?;
            Ok(())
        })?;

        let delete_t = cg.context.void_type().fn_type(&[ptr.into(), key_t.into()], false);
        let delete = self.define(ty, "delete", delete_t, |f| {
            let (map, key) = self.map_and_key(f, &map_kt, key_kt)?;
            cg.map_delete(&map, &key)?;
            cg.builder.build_return(None)?;
            Ok(())
        })?;

        let count = self.define(ty, "count", cg.word_t.fn_type(&[ptr.into()], false), |f| {
            let map = TypedValue::from_register(map_kt.clone(), self.param(f, 0)?);
            let counter = cg.alloca_in_entry(&cg.word_ktype(), "count")?;
            cg.builder.build_store(counter.ptr, cg.word_t.const_zero())?;
            cg.lower_map_range(&map, |cg, _entry| {
                let n = cg.load(&counter, "n")?;
                let n = cg.register_of(&n)?.into_int_value();
                let n1 = cg
                    .builder
                    .build_int_add(n, cg.word_t.const_int(1, false), "n1")?;
                cg.builder.build_store(counter.ptr, n1)?;
                Ok(())
            })?;
            let total = cg.load(&counter, "total")?;
            cg.builder.build_return(Some(&cg.register_of(&total)?))?;
            Ok(())
        })?;

        Ok(vec![get, has, set, delete, count])
    }

    fn emit_chan(&self, ty: &AggregateType) -> LowerResult<Vec<FunctionValue<'ctx>>> {
        let cg = self.cg;
        let chan_kt = ty.to_ktype();
        let elt_kt = ty.elt();
        let ptr: BasicTypeEnum<'ctx> = cg.ptr_t.into();
        let elt_t = cg.storage_type(elt_kt);

        let send_t = cg
            .context
            .void_type()
            .fn_type(&[ptr.into(), elt_t.into()], false);
        let send = self.define(ty, "send", send_t, |f| {
            let chan = TypedValue::from_register(chan_kt.clone(), self.param(f, 0)?);
            let value = TypedValue::from_register(elt_kt.clone(), self.param(f, 1)?);
            cg.chan_send(&chan, &value)?;
            cg.builder.build_return(None)?;
            Ok(())
        })?;

        let recv = self.define(ty, "recv", elt_t.fn_type(&[ptr.into()], false), |f| {
            let chan = TypedValue::from_register(chan_kt.clone(), self.param(f, 0)?);
            let value = cg.chan_recv(&chan)?;
            cg.builder.build_return(Some(&cg.register_of(&value)?))?;
            Ok(())
        })?;

        Ok(vec![send, recv])
    }

    fn define<F>(
        &self,
        ty: &AggregateType,
        op: &str,
        fn_type: FunctionType<'ctx>,
        body: F,
    ) -> LowerResult<FunctionValue<'ctx>>
    where
        F: FnOnce(FunctionValue<'ctx>) -> LowerResult<()>,
    {
        let name = shim_name(ty, op);
        if let Some(existing) = self.cg.module.get_function(&name) {
            if existing.get_type() != fn_type {
                return Err(LowerError::SignatureConflict {
                    name,
                    existing: existing.get_type().print_to_string().to_string(),
                    requested: fn_type.print_to_string().to_string(),
                });
            }
            return Ok(existing);
        }
        let function = self
            .cg
            .module
            .add_function(&name, fn_type, Some(Linkage::External));
        let entry = self.cg.context.append_basic_block(function, "entry");
        self.cg.builder.position_at_end(entry);
        if let Err(e) = body(function) {
            self.cg.builder.clear_insertion_position();
            // SAFETY: the function was added above and nothing else refers to it
            unsafe { function.delete() };
            return Err(e);
        }
        debug!(shim = %name, "emitted typed shim");
        Ok(function)
    }

    fn param(&self, f: FunctionValue<'ctx>, index: u32) -> LowerResult<BasicValueEnum<'ctx>> {
        f.get_nth_param(index).ok_or_else(|| LowerError::TypeMismatch {
            context: "shim parameters",
            expected: format!("at least {} parameters", index + 1),
            found: format!("{}", f.count_params()),
        })
    }

    fn map_and_key(
        &self,
        f: FunctionValue<'ctx>,
        map_kt: &KType,
        key_kt: &KType,
    ) -> LowerResult<(TypedValue<'ctx>, TypedValue<'ctx>)> {
        Ok((
            TypedValue::from_register(map_kt.clone(), self.param(f, 0)?),
            TypedValue::from_register(key_kt.clone(), self.param(f, 1)?),
        ))
    }
}
