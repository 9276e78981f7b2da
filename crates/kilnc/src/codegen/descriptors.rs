//! Type descriptors and zero-value sentinels.
//!
//! A descriptor is an internal constant global `kiln.typedesc.<mangle>`
//! holding six `i64` fields (see [`crate::constants::descriptor_fields`]):
//! kind, key size, key alignment, key strategy, element size and element
//! alignment. Sizes and alignments are LLVM constant expressions, so the
//! record follows whatever data layout the module is finally compiled with.
//!
//! Both descriptors and zero sentinels are created once per distinct type
//! per unit. A global of the expected name that already exists in the
//! module is reused, so independently lowered fragments agree on identity,
//! but only when it has the expected type and an initializer.

use inkwell::AddressSpace;
use inkwell::module::Linkage;
use inkwell::types::{AnyType, AnyTypeEnum, BasicType, BasicTypeEnum, StructType};
use inkwell::values::{BasicValueEnum, GlobalValue, IntValue, PointerValue};
use tracing::{debug, trace};

use crate::codegen::CodeGen;
use crate::constants::{self, descriptor_fields, kind};
use crate::error::{LowerError, LowerResult};
use crate::types::{AggregateType, KType};

/// Runtime-visible handle for an aggregate type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeDescriptor<'ctx> {
    global: GlobalValue<'ctx>,
}

impl<'ctx> TypeDescriptor<'ctx> {
    pub fn global(&self) -> GlobalValue<'ctx> {
        self.global
    }

    pub fn as_pointer(&self) -> PointerValue<'ctx> {
        self.global.as_pointer_value()
    }

    pub fn name(&self) -> String {
        self.global.get_name().to_string_lossy().into_owned()
    }
}

/// Symbol name of the descriptor for `ty`.
pub fn descriptor_symbol(ty: &AggregateType) -> String {
    format!("{}{}", constants::DESCRIPTOR_PREFIX, ty.mangle())
}

/// Symbol name of the zero sentinel for `ty`.
pub fn zero_symbol(ty: &KType) -> String {
    format!("{}{}", constants::ZERO_PREFIX, ty.mangle())
}

impl<'ctx> CodeGen<'ctx> {
    /// Layout of every descriptor record: `{i64 x 6}`.
    pub fn descriptor_record_type(&self) -> StructType<'ctx> {
        let fields: Vec<BasicTypeEnum<'ctx>> = (0..descriptor_fields::COUNT)
            .map(|_| self.i64_t.into())
            .collect();
        self.context.struct_type(&fields, false)
    }

    /// Descriptor for `ty`. Same type, same global.
    pub fn descriptor_for(&self, ty: &AggregateType) -> LowerResult<TypeDescriptor<'ctx>> {
        if let Some(desc) = self.descriptors.borrow().get(ty) {
            trace!(ty = %ty, "descriptor cache hit");
            return Ok(*desc);
        }

        let name = descriptor_symbol(ty);
        let record = self.descriptor_record_type();
        let global = match self.module.get_global(&name) {
            Some(existing) => self.adopt_global(existing, &name, record.as_any_type_enum())?,
            None => {
                let init = record.const_named_struct(&self.descriptor_fields(ty)?);
                let global = self
                    .module
                    .add_global(record, Some(AddressSpace::default()), &name);
                global.set_initializer(&init);
                global.set_constant(true);
                global.set_linkage(Linkage::Internal);
                debug!(ty = %ty, symbol = %name, "created type descriptor");
                global
            }
        };

        let desc = TypeDescriptor { global };
        self.descriptors.borrow_mut().insert(ty.clone(), desc);
        Ok(desc)
    }

    /// Descriptor address as a word, ready to pass to the runtime.
    pub fn descriptor_word(&self, ty: &AggregateType) -> LowerResult<IntValue<'ctx>> {
        let desc = self.descriptor_for(ty)?;
        self.address_to_word(desc.as_pointer(), "desc")
    }

    fn descriptor_fields(&self, ty: &AggregateType) -> LowerResult<Vec<BasicValueEnum<'ctx>>> {
        let zero = self.i64_t.const_zero();
        let (kind_word, key_size, key_align) = match ty.key() {
            Some(key) => {
                let key_t = self.storage_type(key);
                (kind::MAP, self.size_of(key, key_t)?, self.align_of(key, key_t)?)
            }
            None => (kind::CHAN, zero, zero),
        };
        let strategy = ty.key_strategy()?.as_word();
        let elt_t = self.storage_type(ty.elt());

        let mut fields = [zero; descriptor_fields::COUNT as usize];
        fields[descriptor_fields::KIND as usize] = self.i64_t.const_int(kind_word, false);
        fields[descriptor_fields::KEY_SIZE as usize] = key_size;
        fields[descriptor_fields::KEY_ALIGN as usize] = key_align;
        fields[descriptor_fields::KEY_STRATEGY as usize] = self.i64_t.const_int(strategy, false);
        fields[descriptor_fields::ELEM_SIZE as usize] = self.size_of(ty.elt(), elt_t)?;
        fields[descriptor_fields::ELEM_ALIGN as usize] = self.align_of(ty.elt(), elt_t)?;
        Ok(fields.iter().map(|f| (*f).into()).collect())
    }

    fn size_of(&self, ty: &KType, llvm_ty: BasicTypeEnum<'ctx>) -> LowerResult<IntValue<'ctx>> {
        llvm_ty.size_of().ok_or_else(|| LowerError::UnsizedType {
            ty: ty.to_string(),
        })
    }

    fn align_of(&self, ty: &KType, llvm_ty: BasicTypeEnum<'ctx>) -> LowerResult<IntValue<'ctx>> {
        match llvm_ty {
            BasicTypeEnum::IntType(t) => Ok(t.get_alignment()),
            BasicTypeEnum::FloatType(t) => Ok(t.get_alignment()),
            BasicTypeEnum::PointerType(t) => Ok(t.get_alignment()),
            BasicTypeEnum::StructType(t) => Ok(t.get_alignment()),
            BasicTypeEnum::ArrayType(t) => Ok(t.get_alignment()),
            #[allow(unreachable_patterns)]
            _ => Err(LowerError::UnsizedType { ty: ty.to_string() }),
        }
    }

    /// Address of the zero-initialized constant of type `ty`.
    ///
    /// One sentinel per distinct element type per unit.
    pub fn zero_value_for(&self, ty: &KType) -> LowerResult<PointerValue<'ctx>> {
        if let Some(global) = self.zero_values.borrow().get(ty) {
            return Ok(global.as_pointer_value());
        }

        let name = zero_symbol(ty);
        let storage = self.storage_type(ty);
        let global = match self.module.get_global(&name) {
            Some(existing) => self.adopt_global(existing, &name, storage.as_any_type_enum())?,
            None => {
                let global = self
                    .module
                    .add_global(storage, Some(AddressSpace::default()), &name);
                global.set_initializer(&storage.const_zero());
                global.set_constant(true);
                global.set_linkage(Linkage::Internal);
                debug!(ty = %ty, symbol = %name, "created zero sentinel");
                global
            }
        };

        self.zero_values.borrow_mut().insert(ty.clone(), global);
        Ok(global.as_pointer_value())
    }

    /// Checks a pre-existing global before it stands in for a generated one.
    fn adopt_global(
        &self,
        existing: GlobalValue<'ctx>,
        name: &str,
        expected: AnyTypeEnum<'ctx>,
    ) -> LowerResult<GlobalValue<'ctx>> {
        let found = existing.get_value_type();
        let defined = existing.get_initializer().is_some();
        if found != expected || !defined {
            let shape = found.print_to_string().to_string();
            return Err(LowerError::GlobalConflict {
                name: name.to_string(),
                existing: if defined {
                    shape
                } else {
                    format!("a declaration of {}", shape)
                },
                requested: expected.print_to_string().to_string(),
            });
        }
        trace!(symbol = name, "adopted existing global");
        Ok(existing)
    }
}
