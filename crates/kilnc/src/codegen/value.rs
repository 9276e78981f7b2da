//! Typed values and typed addresses.
//!
//! Inside code generation every address is a `PointerValue` tagged with the
//! static type stored there. Untyped words only exist at the runtime call
//! boundary, produced by [`CodeGen::address_to_word`] and turned back by
//! [`CodeGen::word_to_address`], once per value in each direction.

use inkwell::types::{AnyType, BasicTypeEnum};
use inkwell::values::{BasicValue, BasicValueEnum, IntValue, PointerValue};

use crate::codegen::CodeGen;
use crate::error::{LowerError, LowerResult};
use crate::types::KType;

/// Pointer to storage holding a value of `ty`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address<'ctx> {
    pub ptr: PointerValue<'ctx>,
    pub ty: KType,
}

impl<'ctx> Address<'ctx> {
    pub fn new(ptr: PointerValue<'ctx>, ty: KType) -> Self {
        Address { ptr, ty }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Form<'ctx> {
    Register(BasicValueEnum<'ctx>),
    Memory(PointerValue<'ctx>),
    /// Both forms; loading from the pointer yields the register
    Both(BasicValueEnum<'ctx>, PointerValue<'ctx>),
}

/// A value of static type `ty`, held in a register, in memory, or both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedValue<'ctx> {
    ty: KType,
    form: Form<'ctx>,
}

impl<'ctx> TypedValue<'ctx> {
    pub fn from_register(ty: KType, value: impl BasicValue<'ctx>) -> Self {
        TypedValue {
            ty,
            form: Form::Register(value.as_basic_value_enum()),
        }
    }

    pub fn from_address(addr: Address<'ctx>) -> Self {
        TypedValue {
            ty: addr.ty,
            form: Form::Memory(addr.ptr),
        }
    }

    /// The caller guarantees `ptr` currently holds `value`.
    pub fn with_both(ty: KType, value: impl BasicValue<'ctx>, ptr: PointerValue<'ctx>) -> Self {
        TypedValue {
            ty,
            form: Form::Both(value.as_basic_value_enum(), ptr),
        }
    }

    pub fn ty(&self) -> &KType {
        &self.ty
    }

    pub fn register(&self) -> Option<BasicValueEnum<'ctx>> {
        match self.form {
            Form::Register(v) | Form::Both(v, _) => Some(v),
            Form::Memory(_) => None,
        }
    }

    pub fn address(&self) -> Option<Address<'ctx>> {
        match self.form {
            Form::Memory(p) | Form::Both(_, p) => Some(Address::new(p, self.ty.clone())),
            Form::Register(_) => None,
        }
    }
}

impl<'ctx> CodeGen<'ctx> {
    pub fn storage_type(&self, ty: &KType) -> BasicTypeEnum<'ctx> {
        ty.storage_type(self)
    }

    pub fn load(&self, addr: &Address<'ctx>, name: &str) -> LowerResult<TypedValue<'ctx>> {
        let value = self
            .builder
            .build_load(self.storage_type(&addr.ty), addr.ptr, name)?;
        Ok(TypedValue::from_register(addr.ty.clone(), value))
    }

    pub fn store(&self, addr: &Address<'ctx>, value: &TypedValue<'ctx>) -> LowerResult<()> {
        if *value.ty() != addr.ty {
            return Err(LowerError::TypeMismatch {
                context: "store",
                expected: addr.ty.to_string(),
                found: value.ty().to_string(),
            });
        }
        let reg = self.register_of(value)?;
        self.builder.build_store(addr.ptr, reg)?;
        Ok(())
    }

    /// Register form of `value`, loading it if it only lives in memory.
    pub fn register_of(&self, value: &TypedValue<'ctx>) -> LowerResult<BasicValueEnum<'ctx>> {
        match value.form {
            Form::Register(v) | Form::Both(v, _) => Ok(v),
            Form::Memory(ptr) => Ok(self
                .builder
                .build_load(self.storage_type(value.ty()), ptr, "spilled")?),
        }
    }

    pub fn address_to_word(&self, ptr: PointerValue<'ctx>, name: &str) -> LowerResult<IntValue<'ctx>> {
        Ok(self.builder.build_ptr_to_int(ptr, self.word_t, name)?)
    }

    pub fn word_to_address(
        &self,
        word: IntValue<'ctx>,
        ty: KType,
        name: &str,
    ) -> LowerResult<Address<'ctx>> {
        let ptr = self.builder.build_int_to_ptr(word, self.ptr_t, name)?;
        Ok(Address::new(ptr, ty))
    }

    /// Runtime handle of a map or channel value as a word.
    ///
    /// Handles are normally `ptr` registers; a value that is already a word
    /// passes through unchanged.
    pub fn handle_word(&self, value: &TypedValue<'ctx>, name: &str) -> LowerResult<IntValue<'ctx>> {
        match self.register_of(value)? {
            BasicValueEnum::PointerValue(p) => self.address_to_word(p, name),
            BasicValueEnum::IntValue(i) if i.get_type() == self.word_t => Ok(i),
            other => Err(LowerError::TypeMismatch {
                context: "aggregate handle",
                expected: "ptr or word".to_string(),
                found: other.get_type().print_to_string().to_string(),
            }),
        }
    }

    /// Converts a numeric value to `to`, as an assignment would.
    ///
    /// Integers widen or truncate (sign-extending signed sources), floats
    /// extend or truncate. Anything else must already have type `to`.
    pub fn convert_value(&self, value: &TypedValue<'ctx>, to: &KType) -> LowerResult<TypedValue<'ctx>> {
        if value.ty() == to {
            return Ok(value.clone());
        }
        let target = self.storage_type(to);
        let reg = self.register_of(value)?;
        let converted: BasicValueEnum<'ctx> = match (value.ty(), to) {
            (from, KType::Int { .. }) if from.is_integer() => {
                let signed = matches!(from, KType::Int { signed: true, .. });
                self.builder
                    .build_int_cast_sign_flag(
                        reg.into_int_value(),
                        target.into_int_type(),
                        signed,
                        "conv",
                    )?
                    .into()
            }
            (from, to) if from.is_float() && to.is_float() => self
                .builder
                .build_float_cast(reg.into_float_value(), target.into_float_type(), "conv")?
                .into(),
            _ => {
                return Err(LowerError::TypeMismatch {
                    context: "conversion",
                    expected: to.to_string(),
                    found: value.ty().to_string(),
                });
            }
        };
        Ok(TypedValue::from_register(to.clone(), converted))
    }
}
