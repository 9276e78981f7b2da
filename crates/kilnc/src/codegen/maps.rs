//! Map operation lowering.
//!
//! Every operation here is one runtime call framed by the same steps:
//! resolve the map's descriptor, materialize the key, turn handles and
//! addresses into words, call, and reinterpret the returned words as typed
//! addresses.
//!
//! Misses, repeated deletes and end of iteration are ordinary values:
//! - a non-inserting lookup that misses yields the element type's zero
//!   sentinel instead of null, chosen with a `select` so callers never branch;
//! - deleting an absent key is left to the runtime as a no-op;
//! - map-next signals the end by returning a null key address, exposed as
//!   the `done` predicate of [`MapNext`].

use inkwell::IntPredicate;
use inkwell::values::IntValue;

use crate::codegen::CodeGen;
use crate::codegen::value::{Address, TypedValue};
use crate::constants::{self, map_next_fields};
use crate::error::{LowerError, LowerResult};
use crate::runtime_functions::RuntimeOp;
use crate::types::{AggregateType, KType, MapType};

/// Position in a map's enumeration order.
///
/// `Start` is the "not yet begun" token; every cursor after it is whatever
/// the runtime returned. The end of iteration is not a cursor state known at
/// compile time: it is the runtime predicate [`MapNext::done`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationCursor<'ctx> {
    Start,
    InProgress(IntValue<'ctx>),
}

impl<'ctx> IterationCursor<'ctx> {
    fn word(&self, cg: &CodeGen<'ctx>) -> IntValue<'ctx> {
        match self {
            IterationCursor::Start => cg.word_t.const_int(constants::CURSOR_START, false),
            IterationCursor::InProgress(w) => *w,
        }
    }
}

/// Result of one map-next call.
#[derive(Debug, Clone)]
pub struct MapNext<'ctx> {
    pub cursor: IterationCursor<'ctx>,
    /// Address of the current key; only meaningful while `done` is false
    pub key: Address<'ctx>,
    /// Address of the current element; only meaningful while `done` is false
    pub value: Address<'ctx>,
    /// `i1` that is true once the enumeration is exhausted
    pub done: IntValue<'ctx>,
}

/// Key and element addresses handed to a range loop body.
#[derive(Debug, Clone)]
pub struct MapEntry<'ctx> {
    pub key: Address<'ctx>,
    pub value: Address<'ctx>,
}

impl<'ctx> CodeGen<'ctx> {
    fn map_type_of(&self, map: &TypedValue<'ctx>, operation: &'static str) -> LowerResult<MapType> {
        match map.ty() {
            KType::Map(m) => Ok(m.clone()),
            other => Err(LowerError::NotAggregate {
                operation,
                expected: "map",
                found: other.to_string(),
            }),
        }
    }

    fn check_key(&self, map_ty: &MapType, key: &TypedValue<'ctx>) -> LowerResult<()> {
        if key.ty() != map_ty.key.as_ref() {
            return Err(LowerError::TypeMismatch {
                context: "map key",
                expected: map_ty.key.to_string(),
                found: key.ty().to_string(),
            });
        }
        Ok(())
    }

    /// Shared prefix of lookup and delete: descriptor, handle, key word.
    fn map_call_args(
        &self,
        map: &TypedValue<'ctx>,
        key: &TypedValue<'ctx>,
        operation: &'static str,
    ) -> LowerResult<(MapType, [IntValue<'ctx>; 3])> {
        let map_ty = self.map_type_of(map, operation)?;
        self.check_key(&map_ty, key)?;
        let desc = self.descriptor_word(&AggregateType::Map(map_ty.clone()))?;
        let handle = self.handle_word(map, "map")?;
        let key_addr = self.address_of(key)?;
        let key_word = self.address_to_word(key_addr.ptr, "key")?;
        Ok((map_ty, [desc, handle, key_word]))
    }

    /// Raw map-lookup: the slot address, null on a miss when not inserting.
    fn map_lookup_raw(
        &self,
        map: &TypedValue<'ctx>,
        key: &TypedValue<'ctx>,
        insert: bool,
    ) -> LowerResult<Address<'ctx>> {
        let (map_ty, [desc, handle, key_word]) = self.map_call_args(map, key, "map lookup")?;
        let flag = self.bool_t.const_int(insert as u64, false);
        let raw = self.call_runtime_value(
            RuntimeOp::MapLookup,
            &[desc.into(), handle.into(), key_word.into(), flag.into()],
            "slot",
        )?;
        self.word_to_address(raw.into_int_value(), (*map_ty.elt).clone(), "slot.ptr")
    }

    /// Address of the element for `key`.
    ///
    /// With `insert` the runtime creates a zeroed slot for an absent key and
    /// the result is that slot. Without it, a miss yields the address of the
    /// element type's zero sentinel, which must only be read.
    pub fn map_lookup(
        &self,
        map: &TypedValue<'ctx>,
        key: &TypedValue<'ctx>,
        insert: bool,
    ) -> LowerResult<Address<'ctx>> {
        let slot = self.map_lookup_raw(map, key, insert)?;
        if insert {
            return Ok(slot);
        }
        let found = self.builder.build_is_not_null(slot.ptr, "found")?;
        self.select_or_zero(slot, found)
    }

    /// Comma-ok lookup: the element address (zero sentinel on a miss) and an
    /// `i1` that is true when the key is present.
    pub fn map_lookup_with_presence(
        &self,
        map: &TypedValue<'ctx>,
        key: &TypedValue<'ctx>,
    ) -> LowerResult<(Address<'ctx>, IntValue<'ctx>)> {
        let slot = self.map_lookup_raw(map, key, false)?;
        let found = self.builder.build_is_not_null(slot.ptr, "found")?;
        Ok((self.select_or_zero(slot, found)?, found))
    }

    fn select_or_zero(&self, slot: Address<'ctx>, found: IntValue<'ctx>) -> LowerResult<Address<'ctx>> {
        let zero = self.zero_value_for(&slot.ty)?;
        let chosen = self
            .builder
            .build_select(found, slot.ptr, zero, "elem.or.zero")?
            .into_pointer_value();
        Ok(Address::new(chosen, slot.ty))
    }

    /// `m[k] = v`: inserting lookup, then a store into the slot.
    pub fn map_store(
        &self,
        map: &TypedValue<'ctx>,
        key: &TypedValue<'ctx>,
        value: &TypedValue<'ctx>,
    ) -> LowerResult<()> {
        let map_ty = self.map_type_of(map, "map store")?;
        if value.ty() != map_ty.elt.as_ref() {
            return Err(LowerError::TypeMismatch {
                context: "map element",
                expected: map_ty.elt.to_string(),
                found: value.ty().to_string(),
            });
        }
        let slot = self.map_lookup(map, key, true)?;
        self.store(&slot, value)
    }

    /// Removes `key`. Absent keys are a no-op in the runtime.
    pub fn map_delete(&self, map: &TypedValue<'ctx>, key: &TypedValue<'ctx>) -> LowerResult<()> {
        let (_, [desc, handle, key_word]) = self.map_call_args(map, key, "map delete")?;
        self.call_runtime(
            RuntimeOp::MapDelete,
            &[desc.into(), handle.into(), key_word.into()],
            "",
        )?;
        Ok(())
    }

    /// One step of enumeration from `cursor`.
    ///
    /// The returned key and element words are reinterpreted as typed
    /// addresses; that is a compile-time relabelling only.
    pub fn map_next(
        &self,
        map: &TypedValue<'ctx>,
        cursor: IterationCursor<'ctx>,
    ) -> LowerResult<MapNext<'ctx>> {
        let map_ty = self.map_type_of(map, "map iteration")?;
        let desc = self.descriptor_word(&AggregateType::Map(map_ty.clone()))?;
        let handle = self.handle_word(map, "map")?;
        let result = self
            .call_runtime_value(
                RuntimeOp::MapNext,
                &[desc.into(), handle.into(), cursor.word(self).into()],
                "next",
            )?
            .into_struct_value();

        let next_cursor = self
            .builder
            .build_extract_value(result, map_next_fields::CURSOR, "next.cursor")?
            .into_int_value();
        let key_word = self
            .builder
            .build_extract_value(result, map_next_fields::KEY, "next.key")?
            .into_int_value();
        let value_word = self
            .builder
            .build_extract_value(result, map_next_fields::VALUE, "next.value")?
            .into_int_value();

        let done = self.builder.build_int_compare(
            IntPredicate::EQ,
            key_word,
            self.word_t.const_zero(),
            "next.done",
        )?;
        Ok(MapNext {
            cursor: IterationCursor::InProgress(next_cursor),
            key: self.word_to_address(key_word, (*map_ty.key).clone(), "key.ptr")?,
            value: self.word_to_address(value_word, (*map_ty.elt).clone(), "value.ptr")?,
            done,
        })
    }

    /// Emits `for k, v := range m { body }`.
    ///
    /// The cursor lives in an entry-block slot initialised to the start
    /// token. The body runs with the builder positioned in the loop body and
    /// may add blocks of its own; if it leaves its final block open, control
    /// returns to the loop header. On return the builder sits in the exit
    /// block.
    pub fn lower_map_range<F>(&self, map: &TypedValue<'ctx>, mut body: F) -> LowerResult<()>
    where
        F: FnMut(&CodeGen<'ctx>, MapEntry<'ctx>) -> LowerResult<()>,
    {
        self.map_type_of(map, "map range")?;
        let function = self.current_function()?;

        let cursor_slot = self.alloca_in_entry(&self.word_ktype(), "range.cursor")?;
        let start = IterationCursor::Start.word(self);
        self.builder.build_store(cursor_slot.ptr, start)?;

        let header = self.context.append_basic_block(function, "range.header");
        let body_bb = self.context.append_basic_block(function, "range.body");
        let exit = self.context.append_basic_block(function, "range.exit");
        self.builder.build_unconditional_branch(header)?;

        self.builder.position_at_end(header);
        let cursor = self.load(&cursor_slot, "range.cur")?;
        let cursor_word = self.register_of(&cursor)?.into_int_value();
        let next = self.map_next(map, IterationCursor::InProgress(cursor_word))?;
        if let IterationCursor::InProgress(w) = next.cursor {
            self.builder.build_store(cursor_slot.ptr, w)?;
        }
        self.builder
            .build_conditional_branch(next.done, exit, body_bb)?;

        self.builder.position_at_end(body_bb);
        body(
            self,
            MapEntry {
                key: next.key,
                value: next.value,
            },
        )?;
        if let Some(bb) = self.builder.get_insert_block()
            && bb.get_terminator().is_none()
        {
            self.builder.build_unconditional_branch(header)?;
        }

        self.builder.position_at_end(exit);
        Ok(())
    }
}
