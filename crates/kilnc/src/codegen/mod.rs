//! Top-level codegen module
//!
//! This module provides the `CodeGen` structure which holds the LLVM
//! `Context`, `Module` and `Builder` for one compilation unit, together with
//! the per-unit caches the aggregate lowering relies on. The lowering is
//! organized across submodules:
//! - `value` : typed values, typed addresses and the word/address boundary
//! - `materialize` : stable addresses for register values
//! - `runtime_decls` : the runtime symbol registry
//! - `descriptors` : type descriptors and zero-value sentinels
//! - `maps` : map lookup, delete and iteration
//! - `channels` : channel send and receive
//!
//! `CodeGen` borrows inkwell values that are bound to one thread, so it is
//! neither `Send` nor `Sync`. Each unit gets its own registry and caches;
//! parallel compilation means one `CodeGen` per unit.

use std::cell::RefCell;
use std::collections::HashMap;

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::targets::{
    CodeModel, InitializationConfig, RelocMode, Target, TargetData, TargetMachine, TargetTriple,
};
use inkwell::{AddressSpace, OptimizationLevel};
use tracing::debug;
use inkwell::types::{IntType, PointerType};
use inkwell::values::{FunctionValue, GlobalValue};

use crate::config::LowerConfig;
use crate::error::{LowerError, LowerResult};
use crate::runtime_functions::RuntimeOp;
use crate::types::{AggregateType, KType};

pub mod channels;
pub mod descriptors;
pub mod maps;
pub mod materialize;
pub mod runtime_decls;
pub mod value;

use descriptors::TypeDescriptor;
use runtime_decls::RuntimeRegistry;

pub struct CodeGen<'ctx> {
    pub context: &'ctx Context,
    pub module: Module<'ctx>,
    pub builder: Builder<'ctx>,
    /// Address-sized integer used for every handle and address at the
    /// runtime boundary
    pub word_t: IntType<'ctx>,
    pub i64_t: IntType<'ctx>,
    pub bool_t: IntType<'ctx>,
    pub ptr_t: PointerType<'ctx>,
    pub runtime_prefix: String,
    pub(crate) runtime: RuntimeRegistry<'ctx>,
    pub(crate) descriptors: RefCell<HashMap<AggregateType, TypeDescriptor<'ctx>>>,
    pub(crate) zero_values: RefCell<HashMap<KType, GlobalValue<'ctx>>>,
}

impl<'ctx> CodeGen<'ctx> {
    /// Creates an empty module for the configured target.
    ///
    /// The boundary word takes the target's pointer width and the module
    /// takes the target's data layout. A configured `pointer_bits` that
    /// disagrees with the target is a configuration error.
    pub fn new(context: &'ctx Context, module_name: &str, config: &LowerConfig) -> LowerResult<Self> {
        let module = context.create_module(module_name);
        let triple = match &config.target_triple {
            Some(t) => TargetTriple::create(t),
            None => TargetMachine::get_default_triple(),
        };
        let triple_name = triple.as_str().to_string_lossy().into_owned();
        let target_data = target_data_for(&triple, &triple_name)?;
        let target_bits = target_data.get_pointer_byte_size(None) * 8;
        if let Some(bits) = config.pointer_bits
            && bits != target_bits
        {
            return Err(LowerError::Config(format!(
                "pointer_bits = {} does not match the {}-bit pointers of target `{}`",
                bits, target_bits, triple_name
            )));
        }
        module.set_triple(&triple);
        module.set_data_layout(&target_data.get_data_layout());
        debug!(triple = %triple_name, word_bits = target_bits, "configured target");

        Ok(CodeGen {
            context,
            module,
            builder: context.create_builder(),
            word_t: context.custom_width_int_type(target_bits),
            i64_t: context.i64_type(),
            bool_t: context.bool_type(),
            ptr_t: context.ptr_type(AddressSpace::default()),
            runtime_prefix: config.runtime_prefix.clone(),
            runtime: RuntimeRegistry::new(),
            descriptors: RefCell::new(HashMap::new()),
            zero_values: RefCell::new(HashMap::new()),
        })
    }

    /// Declared call target for a runtime operation, created on first use.
    pub fn runtime_function(&self, op: RuntimeOp) -> LowerResult<FunctionValue<'ctx>> {
        self.runtime.declare(
            self.context,
            &self.module,
            self.word_t,
            &op.symbol(&self.runtime_prefix),
            &op.signature(),
        )
    }

    pub fn runtime_registry(&self) -> &RuntimeRegistry<'ctx> {
        &self.runtime
    }

    /// Static type of the word, for cursor and counter slots.
    pub fn word_ktype(&self) -> KType {
        KType::int(self.word_t.get_bit_width(), false)
    }

    /// Function that owns the builder's insertion block.
    pub fn current_function(&self) -> LowerResult<FunctionValue<'ctx>> {
        self.builder
            .get_insert_block()
            .and_then(|bb| bb.get_parent())
            .ok_or(LowerError::NoInsertionPoint)
    }

    pub fn verify(&self) -> LowerResult<()> {
        self.module
            .verify()
            .map_err(|e| LowerError::Verify(e.to_string()))
    }

    pub fn print_ir(&self) -> String {
        self.module.print_to_string().to_string()
    }
}

/// Data layout of `triple`, from a target machine built for it.
fn target_data_for(triple: &TargetTriple, name: &str) -> LowerResult<TargetData> {
    Target::initialize_all(&InitializationConfig::default());
    let target = Target::from_triple(triple).map_err(|e| {
        LowerError::Config(format!("unsupported target `{}`: {}", name, e))
    })?;
    let machine = target
        .create_target_machine(
            triple,
            "",
            "",
            OptimizationLevel::Default,
            RelocMode::Default,
            CodeModel::Default,
        )
        .ok_or_else(|| {
            LowerError::Config(format!("failed to create a target machine for `{}`", name))
        })?;
    Ok(machine.get_target_data())
}
