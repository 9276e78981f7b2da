//! Error types for aggregate lowering.
//!
//! Every fallible lowering routine returns `LowerResult<T>`. Almost all of
//! these errors are internal-consistency failures: the front-end handed this
//! layer something it should never produce (a key of the wrong type, a map
//! operation on a channel) or two lowering routines disagree about a runtime
//! signature. None of them describe a condition of the generated program;
//! absent keys, repeated deletes and end of iteration are ordinary values.

use inkwell::builder::BuilderError;

/// Result type alias for all fallible lowering operations
pub type LowerResult<T> = std::result::Result<T, LowerError>;

#[derive(Debug, thiserror::Error)]
pub enum LowerError {
    /// A runtime entry point was requested twice in one unit with different
    /// signatures. Compilation must stop.
    #[error(
        "runtime entry point `{name}` redeclared with a conflicting signature (declared as {existing}, requested {requested})"
    )]
    SignatureConflict {
        name: String,
        existing: String,
        requested: String,
    },

    /// A descriptor or zero-sentinel name is already taken in the module by
    /// a global of another type, or by a declaration without a value
    #[error("global `{name}` already exists as {existing}, expected a defined {requested}")]
    GlobalConflict {
        name: String,
        existing: String,
        requested: String,
    },

    /// A key or element does not have the static type the aggregate expects
    #[error("type mismatch in {context}: expected {expected}, found {found}")]
    TypeMismatch {
        context: &'static str,
        expected: String,
        found: String,
    },

    /// Map operation on a non-map, or channel operation on a non-channel
    #[error("{operation} requires a {expected} operand, found {found}")]
    NotAggregate {
        operation: &'static str,
        expected: &'static str,
        found: String,
    },

    /// The builder has no insertion block, so no stack slot can be reserved
    #[error("builder is not positioned inside a function")]
    NoInsertionPoint,

    /// A runtime call that must produce a value produced none
    #[error("call to runtime entry point `{name}` produced no value")]
    MissingReturn { name: String },

    /// The type has no storage size (cannot appear in a descriptor)
    #[error("type {ty} has no storage size")]
    UnsizedType { ty: String },

    #[error("LLVM builder error: {0}")]
    Builder(#[from] BuilderError),

    #[error("module verification failed: {0}")]
    Verify(String),

    #[error("invalid type `{input}`: {message}")]
    TypeSyntax { input: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl LowerError {
    /// True for errors that indicate a bug in a caller of the lowering layer
    /// rather than bad user input.
    pub fn is_internal(&self) -> bool {
        !matches!(self, LowerError::TypeSyntax { .. } | LowerError::Config(_))
    }

    /// Short hint printed under the main diagnostic line.
    pub fn note(&self) -> Option<&'static str> {
        match self {
            LowerError::SignatureConflict { .. } => Some(
                "every runtime entry point has exactly one signature per compilation unit; two lowering routines disagree",
            ),
            LowerError::GlobalConflict { .. } => Some(
                "names under `kiln.typedesc.` and `kiln.zero.` are reserved for lowering",
            ),
            LowerError::TypeMismatch { .. } | LowerError::NotAggregate { .. } => {
                Some("the front-end must convert operands before lowering aggregate operations")
            }
            LowerError::TypeSyntax { .. } => Some(
                "types are written as bool, i8..i64, u8..u64, f32, f64, str, *T, [N]T, {T, U}, map[K]V or chan T",
            ),
            _ => None,
        }
    }
}
