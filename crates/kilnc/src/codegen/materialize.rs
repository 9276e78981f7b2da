//! Addressable value materialization.
//!
//! The runtime only ever receives addresses. A value that already lives in
//! memory is passed by its existing address; a register value is spilled to
//! a fresh stack slot first.
//!
//! Slots are reserved in the entry block of the current function so a spill
//! inside a loop does not grow the frame on every iteration. The store that
//! fills the slot is emitted at the current position.

use tracing::trace;

use crate::codegen::CodeGen;
use crate::codegen::value::{Address, TypedValue};
use crate::error::{LowerError, LowerResult};
use crate::types::KType;

impl<'ctx> CodeGen<'ctx> {
    /// Stable address holding `value`, valid at least until the end of the
    /// current function.
    pub fn address_of(&self, value: &TypedValue<'ctx>) -> LowerResult<Address<'ctx>> {
        if let Some(addr) = value.address() {
            return Ok(addr);
        }
        let slot = self.alloca_in_entry(value.ty(), "spill")?;
        trace!(ty = %value.ty(), "spilled register value to stack");
        self.store(&slot, value)?;
        Ok(slot)
    }

    /// Reserves an uninitialized stack slot for `ty` in the entry block.
    pub fn alloca_in_entry(&self, ty: &KType, name: &str) -> LowerResult<Address<'ctx>> {
        let function = self.current_function()?;
        let entry = function
            .get_first_basic_block()
            .ok_or(LowerError::NoInsertionPoint)?;

        let entry_builder = self.context.create_builder();
        match entry.get_first_instruction() {
            Some(first) => entry_builder.position_before(&first),
            None => entry_builder.position_at_end(entry),
        }
        let ptr = entry_builder.build_alloca(self.storage_type(ty), name)?;
        Ok(Address::new(ptr, ty.clone()))
    }
}
