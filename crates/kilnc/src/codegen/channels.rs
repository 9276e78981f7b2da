//! Channel operation lowering.
//!
//! Send and receive are a single runtime call each. Blocking, buffering and
//! rendezvous are entirely the runtime's business; this layer never polls
//! or retries.

use crate::codegen::CodeGen;
use crate::codegen::value::TypedValue;
use crate::error::{LowerError, LowerResult};
use crate::runtime_functions::RuntimeOp;
use crate::types::{ChanType, KType};

impl<'ctx> CodeGen<'ctx> {
    fn chan_type_of(&self, chan: &TypedValue<'ctx>, operation: &'static str) -> LowerResult<ChanType> {
        match chan.ty() {
            KType::Chan(c) => Ok(c.clone()),
            other => Err(LowerError::NotAggregate {
                operation,
                expected: "channel",
                found: other.to_string(),
            }),
        }
    }

    /// Sends `value`, which must already have the channel's element type.
    /// A register value is spilled so the runtime can copy from memory.
    pub fn chan_send(&self, chan: &TypedValue<'ctx>, value: &TypedValue<'ctx>) -> LowerResult<()> {
        let chan_ty = self.chan_type_of(chan, "channel send")?;
        if value.ty() != chan_ty.elt.as_ref() {
            return Err(LowerError::TypeMismatch {
                context: "channel send",
                expected: chan_ty.elt.to_string(),
                found: value.ty().to_string(),
            });
        }
        let handle = self.handle_word(chan, "chan")?;
        let addr = self.address_of(value)?;
        let value_word = self.address_to_word(addr.ptr, "send.value")?;
        self.call_runtime(RuntimeOp::ChanSend, &[handle.into(), value_word.into()], "")?;
        Ok(())
    }

    /// Receives into a fresh stack slot and returns the loaded element.
    pub fn chan_recv(&self, chan: &TypedValue<'ctx>) -> LowerResult<TypedValue<'ctx>> {
        let chan_ty = self.chan_type_of(chan, "channel receive")?;
        let dest = self.alloca_in_entry(&chan_ty.elt, "recv.slot")?;
        let handle = self.handle_word(chan, "chan")?;
        let dest_word = self.address_to_word(dest.ptr, "recv.dest")?;
        self.call_runtime(RuntimeOp::ChanRecv, &[handle.into(), dest_word.into()], "")?;
        self.load(&dest, "recv")
    }

    /// Statement-level `c <- v`: converts `v` to the element type as an
    /// assignment would, then sends it.
    pub fn lower_send_stmt(&self, chan: &TypedValue<'ctx>, value: &TypedValue<'ctx>) -> LowerResult<()> {
        let chan_ty = self.chan_type_of(chan, "channel send")?;
        let converted = self.convert_value(value, &chan_ty.elt)?;
        self.chan_send(chan, &converted)
    }
}
