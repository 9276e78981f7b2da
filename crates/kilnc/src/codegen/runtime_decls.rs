//! Runtime function declarations.
//!
//! `RuntimeRegistry` maps a runtime symbol name to its declared call target.
//! The first request for a name adds an external declaration to the module;
//! every later request returns the same `FunctionValue`. A request with a
//! different signature is a lowering bug and fails with
//! [`LowerError::SignatureConflict`] instead of producing a second symbol.
//!
//! The registry lives inside one `CodeGen` and is never shared between
//! units. `RefCell` is enough: a `CodeGen` cannot cross threads.

use std::cell::RefCell;
use std::collections::HashMap;

use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::types::IntType;
use inkwell::values::{BasicMetadataValueEnum, BasicValueEnum, FunctionValue};
use tracing::{debug, trace};

use crate::codegen::CodeGen;
use crate::error::{LowerError, LowerResult};
use crate::runtime_functions::{RuntimeOp, RuntimeSignature};

#[derive(Debug, Clone)]
struct RegistryEntry<'ctx> {
    function: FunctionValue<'ctx>,
    signature: RuntimeSignature,
}

#[derive(Debug, Default)]
pub struct RuntimeRegistry<'ctx> {
    entries: RefCell<HashMap<String, RegistryEntry<'ctx>>>,
}

impl<'ctx> RuntimeRegistry<'ctx> {
    pub fn new() -> Self {
        RuntimeRegistry {
            entries: RefCell::new(HashMap::new()),
        }
    }

    /// Returns the call target for `name`, declaring it with `signature` on
    /// first use.
    ///
    /// A function of the same name that already exists in the module (added
    /// by someone other than this registry) is adopted if its type matches.
    pub fn declare(
        &self,
        context: &'ctx Context,
        module: &Module<'ctx>,
        word: IntType<'ctx>,
        name: &str,
        signature: &RuntimeSignature,
    ) -> LowerResult<FunctionValue<'ctx>> {
        if let Some(entry) = self.entries.borrow().get(name) {
            if entry.signature != *signature {
                return Err(LowerError::SignatureConflict {
                    name: name.to_string(),
                    existing: entry.signature.to_string(),
                    requested: signature.to_string(),
                });
            }
            trace!(symbol = name, "runtime entry point cache hit");
            return Ok(entry.function);
        }

        let fn_type = signature.fn_type(context, word);
        let function = match module.get_function(name) {
            Some(existing) if existing.get_type() == fn_type => existing,
            Some(existing) => {
                return Err(LowerError::SignatureConflict {
                    name: name.to_string(),
                    existing: existing.get_type().print_to_string().to_string(),
                    requested: fn_type.print_to_string().to_string(),
                });
            }
            None => module.add_function(name, fn_type, Some(Linkage::External)),
        };
        debug!(symbol = name, signature = %signature, "declared runtime entry point");

        self.entries.borrow_mut().insert(
            name.to_string(),
            RegistryEntry {
                function,
                signature: signature.clone(),
            },
        );
        Ok(function)
    }

    pub fn get(&self, name: &str) -> Option<FunctionValue<'ctx>> {
        self.entries.borrow().get(name).map(|e| e.function)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Declared names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

impl<'ctx> CodeGen<'ctx> {
    /// Emits one call to a runtime entry point.
    pub(crate) fn call_runtime(
        &self,
        op: RuntimeOp,
        args: &[BasicMetadataValueEnum<'ctx>],
        name: &str,
    ) -> LowerResult<Option<BasicValueEnum<'ctx>>> {
        let function = self.runtime_function(op)?;
        let call = self.builder.build_call(function, args, name)?;
        Ok(call.try_as_basic_value().left())
    }

    /// Emits one call to a runtime entry point that must return a value.
    pub(crate) fn call_runtime_value(
        &self,
        op: RuntimeOp,
        args: &[BasicMetadataValueEnum<'ctx>],
        name: &str,
    ) -> LowerResult<BasicValueEnum<'ctx>> {
        self.call_runtime(op, args, name)?
            .ok_or_else(|| LowerError::MissingReturn {
                name: op.symbol(&self.runtime_prefix),
            })
    }
}
