//! Static types seen by the aggregate lowering.
//!
//! `KType` is the compact type model the front-end hands to this layer. It
//! only has to say enough to size, load and store keys and elements, and to
//! pick a hashing strategy for map keys. Maps and channels are reference
//! types; their values are opaque runtime handles.
//!
//! Types also have a textual form used by the CLI and the fuzz target:
//!
//! ```text
//! bool  i8 i16 i32 i64  u8 u16 u32 u64  f32 f64  str
//! *T    [N]T    {T, U, ...}    map[K]V    chan T
//! ```

use std::fmt;
use std::str::FromStr;

use inkwell::types::{BasicType, BasicTypeEnum};

use crate::codegen::CodeGen;
use crate::error::{LowerError, LowerResult};

/// Nesting limit for the textual parser
const MAX_TYPE_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KType {
    Bool,
    Int { bits: u32, signed: bool },
    Float { bits: u32 },
    /// `{ptr, word}` string header; the bytes live elsewhere
    Str,
    Pointer(Box<KType>),
    Array(Box<KType>, u32),
    Struct(Vec<KType>),
    Map(MapType),
    Chan(ChanType),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MapType {
    pub key: Box<KType>,
    pub elt: Box<KType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChanType {
    pub elt: Box<KType>,
}

/// A map or channel type. Interned by the front-end; compared structurally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AggregateType {
    Map(MapType),
    Chan(ChanType),
}

/// How the runtime compares and hashes map keys.
///
/// Stored in the descriptor record as its discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum KeyStrategy {
    /// No key (channel descriptors)
    None = 0,
    /// Bitwise compare and hash over the key's bytes
    Memory = 1,
    /// IEEE compare: `+0 == -0`, NaN never equal to anything
    Float = 2,
    /// Compare string contents, not headers
    String = 3,
    /// Field-wise, because some component is a float or string or the
    /// layout may contain padding
    Composite = 4,
}

impl KeyStrategy {
    pub fn as_word(self) -> u64 {
        self as u64
    }

    pub fn name(self) -> &'static str {
        match self {
            KeyStrategy::None => "none",
            KeyStrategy::Memory => "memory",
            KeyStrategy::Float => "float",
            KeyStrategy::String => "string",
            KeyStrategy::Composite => "composite",
        }
    }
}

impl KType {
    pub fn i64() -> Self {
        KType::Int {
            bits: 64,
            signed: true,
        }
    }

    pub fn int(bits: u32, signed: bool) -> Self {
        KType::Int { bits, signed }
    }

    pub fn f64() -> Self {
        KType::Float { bits: 64 }
    }

    pub fn pointer(to: KType) -> Self {
        KType::Pointer(Box::new(to))
    }

    pub fn map(key: KType, elt: KType) -> Self {
        KType::Map(MapType {
            key: Box::new(key),
            elt: Box::new(elt),
        })
    }

    pub fn chan(elt: KType) -> Self {
        KType::Chan(ChanType { elt: Box::new(elt) })
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, KType::Int { .. } | KType::Bool)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, KType::Float { .. })
    }

    pub fn as_aggregate(&self) -> Option<AggregateType> {
        match self {
            KType::Map(m) => Some(AggregateType::Map(m.clone())),
            KType::Chan(c) => Some(AggregateType::Chan(c.clone())),
            _ => None,
        }
    }

    /// LLVM type used to hold a value of this type in registers and memory.
    pub fn storage_type<'ctx>(&self, cg: &CodeGen<'ctx>) -> BasicTypeEnum<'ctx> {
        match self {
            KType::Bool => cg.bool_t.into(),
            KType::Int { bits, .. } => cg.context.custom_width_int_type(*bits).into(),
            KType::Float { bits: 32 } => cg.context.f32_type().into(),
            KType::Float { .. } => cg.context.f64_type().into(),
            KType::Str => cg
                .context
                .struct_type(&[cg.ptr_t.into(), cg.word_t.into()], false)
                .into(),
            KType::Pointer(_) | KType::Map(_) | KType::Chan(_) => cg.ptr_t.into(),
            KType::Array(elem, len) => elem.storage_type(cg).array_type(*len).into(),
            KType::Struct(fields) => {
                let tys: Vec<BasicTypeEnum<'ctx>> =
                    fields.iter().map(|f| f.storage_type(cg)).collect();
                cg.context.struct_type(&tys, false).into()
            }
        }
    }

    /// Identifier-safe, injective name used in global symbol names.
    ///
    /// Every constructor is prefix-coded and counts its children, so two
    /// distinct types never share a mangling.
    pub fn mangle(&self) -> String {
        match self {
            KType::Bool => "bool".to_string(),
            KType::Int { bits, signed } => {
                format!("{}{}", if *signed { 'i' } else { 'u' }, bits)
            }
            KType::Float { bits } => format!("f{}", bits),
            KType::Str => "str".to_string(),
            KType::Pointer(to) => format!("p.{}", to.mangle()),
            KType::Array(elem, len) => format!("a{}.{}", len, elem.mangle()),
            KType::Struct(fields) => {
                let mut out = format!("t{}", fields.len());
                for f in fields {
                    out.push('.');
                    out.push_str(&f.mangle());
                }
                out
            }
            KType::Map(m) => format!("map.{}.{}", m.key.mangle(), m.elt.mangle()),
            KType::Chan(c) => format!("chan.{}", c.elt.mangle()),
        }
    }

    /// Hashing strategy when this type is used as a map key.
    ///
    /// Maps are not comparable and cannot be keys.
    pub fn key_strategy(&self) -> LowerResult<KeyStrategy> {
        match self {
            KType::Bool | KType::Int { .. } | KType::Pointer(_) | KType::Chan(_) => {
                Ok(KeyStrategy::Memory)
            }
            KType::Float { .. } => Ok(KeyStrategy::Float),
            KType::Str => Ok(KeyStrategy::String),
            KType::Array(elem, _) => match elem.key_strategy()? {
                KeyStrategy::Memory => Ok(KeyStrategy::Memory),
                _ => Ok(KeyStrategy::Composite),
            },
            KType::Struct(fields) => {
                let mut all_memory = true;
                for f in fields {
                    all_memory &= f.key_strategy()? == KeyStrategy::Memory;
                }
                // more than one field may leave padding bytes between them
                if all_memory && fields.len() <= 1 {
                    Ok(KeyStrategy::Memory)
                } else {
                    Ok(KeyStrategy::Composite)
                }
            }
            KType::Map(_) => Err(LowerError::TypeMismatch {
                context: "map key",
                expected: "a comparable type".to_string(),
                found: self.to_string(),
            }),
        }
    }
}

impl MapType {
    pub fn new(key: KType, elt: KType) -> Self {
        MapType {
            key: Box::new(key),
            elt: Box::new(elt),
        }
    }
}

impl ChanType {
    pub fn new(elt: KType) -> Self {
        ChanType { elt: Box::new(elt) }
    }
}

impl AggregateType {
    pub fn map(key: KType, elt: KType) -> Self {
        AggregateType::Map(MapType::new(key, elt))
    }

    pub fn chan(elt: KType) -> Self {
        AggregateType::Chan(ChanType::new(elt))
    }

    pub fn elt(&self) -> &KType {
        match self {
            AggregateType::Map(m) => &m.elt,
            AggregateType::Chan(c) => &c.elt,
        }
    }

    pub fn key(&self) -> Option<&KType> {
        match self {
            AggregateType::Map(m) => Some(&m.key),
            AggregateType::Chan(_) => None,
        }
    }

    pub fn to_ktype(&self) -> KType {
        match self {
            AggregateType::Map(m) => KType::Map(m.clone()),
            AggregateType::Chan(c) => KType::Chan(c.clone()),
        }
    }

    pub fn mangle(&self) -> String {
        self.to_ktype().mangle()
    }

    pub fn key_strategy(&self) -> LowerResult<KeyStrategy> {
        match self.key() {
            Some(key) => key.key_strategy(),
            None => Ok(KeyStrategy::None),
        }
    }
}

impl fmt::Display for KType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KType::Bool => write!(f, "bool"),
            KType::Int { bits, signed } => {
                write!(f, "{}{}", if *signed { 'i' } else { 'u' }, bits)
            }
            KType::Float { bits } => write!(f, "f{}", bits),
            KType::Str => write!(f, "str"),
            KType::Pointer(to) => write!(f, "*{}", to),
            KType::Array(elem, len) => write!(f, "[{}]{}", len, elem),
            KType::Struct(fields) => {
                write!(f, "{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                write!(f, "}}")
            }
            KType::Map(m) => write!(f, "map[{}]{}", m.key, m.elt),
            KType::Chan(c) => write!(f, "chan {}", c.elt),
        }
    }
}

impl fmt::Display for AggregateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_ktype())
    }
}

impl FromStr for KType {
    type Err = LowerError;

    fn from_str(s: &str) -> LowerResult<Self> {
        let mut parser = TypeParser {
            input: s,
            pos: 0,
            depth: 0,
        };
        let ty = parser.parse_type()?;
        parser.skip_ws();
        if parser.pos != s.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(ty)
    }
}

impl FromStr for AggregateType {
    type Err = LowerError;

    fn from_str(s: &str) -> LowerResult<Self> {
        let ty: KType = s.parse()?;
        ty.as_aggregate().ok_or_else(|| LowerError::TypeSyntax {
            input: s.to_string(),
            message: format!("`{}` is not a map or channel type", ty),
        })
    }
}

struct TypeParser<'s> {
    input: &'s str,
    pos: usize,
    depth: usize,
}

impl TypeParser<'_> {
    fn error(&self, message: impl Into<String>) -> LowerError {
        LowerError::TypeSyntax {
            input: self.input.to_string(),
            message: format!("{} at offset {}", message.into(), self.pos),
        }
    }

    fn rest(&self) -> &str {
        &self.input[self.pos..]
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.rest().starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> LowerResult<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{}`", c)))
        }
    }

    fn word(&mut self) -> &str {
        self.skip_ws();
        let start = self.pos;
        let len = self
            .rest()
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(self.rest().len());
        self.pos += len;
        &self.input[start..start + len]
    }

    fn number(&mut self) -> LowerResult<u32> {
        let digits = self.word().to_string();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(self.error("expected an array length"));
        }
        digits
            .parse()
            .map_err(|_| self.error(format!("array length `{}` is too large", digits)))
    }

    fn parse_type(&mut self) -> LowerResult<KType> {
        self.depth += 1;
        if self.depth > MAX_TYPE_DEPTH {
            return Err(self.error("type is nested too deeply"));
        }
        let ty = self.parse_type_inner();
        self.depth -= 1;
        ty
    }

    fn parse_type_inner(&mut self) -> LowerResult<KType> {
        if self.eat('*') {
            return Ok(KType::pointer(self.parse_type()?));
        }
        if self.eat('[') {
            let len = self.number()?;
            self.expect(']')?;
            return Ok(KType::Array(Box::new(self.parse_type()?), len));
        }
        if self.eat('{') {
            let mut fields = Vec::new();
            if !self.eat('}') {
                loop {
                    fields.push(self.parse_type()?);
                    if self.eat('}') {
                        break;
                    }
                    self.expect(',')?;
                }
            }
            return Ok(KType::Struct(fields));
        }

        let start = self.pos;
        let word = self.word().to_string();
        match word.as_str() {
            "bool" => Ok(KType::Bool),
            "str" => Ok(KType::Str),
            "i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" | "u64" => {
                let bits = word[1..].parse().map_err(|_| self.error("bad int width"))?;
                Ok(KType::int(bits, word.starts_with('i')))
            }
            "f32" => Ok(KType::Float { bits: 32 }),
            "f64" => Ok(KType::Float { bits: 64 }),
            "map" => {
                self.expect('[')?;
                let key = self.parse_type()?;
                self.expect(']')?;
                let elt = self.parse_type()?;
                key.key_strategy().map_err(|_| {
                    self.error(format!("map key type `{}` is not comparable", key))
                })?;
                Ok(KType::map(key, elt))
            }
            "chan" => Ok(KType::chan(self.parse_type()?)),
            "" => Err(self.error("expected a type")),
            other => {
                let message = format!("unknown type `{}`", other);
                self.pos = start;
                Err(self.error(message))
            }
        }
    }
}
