//! Runtime function names and signatures
//!
//! This module centralizes the runtime entry points the aggregate lowering
//! calls. Every handle and address crosses the boundary as an address-sized
//! integer ("word"); the only other parameter kind is the 1-bit insert flag
//! of map-lookup.
//!
//! The full symbol is the configured prefix followed by the base name, so
//! with the default prefix `map_lookup` becomes `kiln_rt_map_lookup`.

use std::fmt;

use inkwell::context::Context;
use inkwell::types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum, FunctionType, IntType};

/// Base names of runtime entry points (before prefixing)
pub mod names {
    /// `map_lookup(word desc, word map, word key_addr, i1 insert) -> word slot_addr`
    pub const MAP_LOOKUP: &str = "map_lookup";

    /// `map_delete(word desc, word map, word key_addr) -> void`
    pub const MAP_DELETE: &str = "map_delete";

    /// `map_next(word desc, word map, word cursor) -> {word cursor, word key_addr, word val_addr}`
    pub const MAP_NEXT: &str = "map_next";

    /// `chan_send(word chan, word value_addr) -> void`
    pub const CHAN_SEND: &str = "chan_send";

    /// `chan_recv(word chan, word dest_addr) -> void`
    pub const CHAN_RECV: &str = "chan_recv";
}

/// Kind of a single runtime parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbiKind {
    /// Address-sized integer
    Word,
    /// 1-bit flag
    Flag,
}

/// Kind of a runtime return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbiReturn {
    Void,
    Word,
    /// Anonymous struct of `n` words, returned by value
    Words(u32),
}

/// Ordered parameter kinds plus a return kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuntimeSignature {
    pub params: Vec<AbiKind>,
    pub ret: AbiReturn,
}

impl RuntimeSignature {
    pub fn new(params: &[AbiKind], ret: AbiReturn) -> Self {
        RuntimeSignature {
            params: params.to_vec(),
            ret,
        }
    }

    /// LLVM function type for this signature with the given word type.
    pub fn fn_type<'ctx>(&self, context: &'ctx Context, word: IntType<'ctx>) -> FunctionType<'ctx> {
        let params: Vec<BasicMetadataTypeEnum<'ctx>> = self
            .params
            .iter()
            .map(|kind| match kind {
                AbiKind::Word => word.into(),
                AbiKind::Flag => context.bool_type().into(),
            })
            .collect();
        match self.ret {
            AbiReturn::Void => context.void_type().fn_type(&params, false),
            AbiReturn::Word => word.fn_type(&params, false),
            AbiReturn::Words(n) => {
                let fields: Vec<BasicTypeEnum<'ctx>> = (0..n).map(|_| word.into()).collect();
                context.struct_type(&fields, false).fn_type(&params, false)
            }
        }
    }
}

impl fmt::Display for AbiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiKind::Word => write!(f, "word"),
            AbiKind::Flag => write!(f, "i1"),
        }
    }
}

impl fmt::Display for RuntimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ") -> ")?;
        match self.ret {
            AbiReturn::Void => write!(f, "void"),
            AbiReturn::Word => write!(f, "word"),
            AbiReturn::Words(n) => {
                write!(f, "{{")?;
                for i in 0..n {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "word")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// The runtime operations the lowering can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeOp {
    MapLookup,
    MapDelete,
    MapNext,
    ChanSend,
    ChanRecv,
}

impl RuntimeOp {
    pub const ALL: [RuntimeOp; 5] = [
        RuntimeOp::MapLookup,
        RuntimeOp::MapDelete,
        RuntimeOp::MapNext,
        RuntimeOp::ChanSend,
        RuntimeOp::ChanRecv,
    ];

    pub fn base_name(self) -> &'static str {
        match self {
            RuntimeOp::MapLookup => names::MAP_LOOKUP,
            RuntimeOp::MapDelete => names::MAP_DELETE,
            RuntimeOp::MapNext => names::MAP_NEXT,
            RuntimeOp::ChanSend => names::CHAN_SEND,
            RuntimeOp::ChanRecv => names::CHAN_RECV,
        }
    }

    /// The one authoritative signature of this operation.
    pub fn signature(self) -> RuntimeSignature {
        use AbiKind::{Flag, Word};
        match self {
            RuntimeOp::MapLookup => RuntimeSignature::new(&[Word, Word, Word, Flag], AbiReturn::Word),
            RuntimeOp::MapDelete => RuntimeSignature::new(&[Word, Word, Word], AbiReturn::Void),
            RuntimeOp::MapNext => RuntimeSignature::new(&[Word, Word, Word], AbiReturn::Words(3)),
            RuntimeOp::ChanSend => RuntimeSignature::new(&[Word, Word], AbiReturn::Void),
            RuntimeOp::ChanRecv => RuntimeSignature::new(&[Word, Word], AbiReturn::Void),
        }
    }

    pub fn is_map_op(self) -> bool {
        matches!(
            self,
            RuntimeOp::MapLookup | RuntimeOp::MapDelete | RuntimeOp::MapNext
        )
    }

    pub fn symbol(self, prefix: &str) -> String {
        format!("{}{}", prefix, self.base_name())
    }
}
