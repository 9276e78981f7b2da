//! Compiler constants for descriptor layout and global naming
//!
//! Everything the runtime reads out of emitted globals is pinned down here so
//! the lowering code and any runtime implementation agree on one layout.

/// Name prefix of type descriptor globals: `kiln.typedesc.<mangle>`
pub const DESCRIPTOR_PREFIX: &str = "kiln.typedesc.";

/// Name prefix of zero-value sentinel globals: `kiln.zero.<mangle>`
pub const ZERO_PREFIX: &str = "kiln.zero.";

/// Name prefix of typed shim functions: `kiln.<mangle>.<op>`
pub const SHIM_PREFIX: &str = "kiln.";

/// Cursor word passed to map-next before the first call
///
/// The runtime treats zero as "not yet begun"; every cursor it hands back
/// is opaque to the lowering.
pub const CURSOR_START: u64 = 0;

/// Descriptor `kind` field values
pub mod kind {
    pub const MAP: u64 = 1;
    pub const CHAN: u64 = 2;
}

/// Descriptor record field indices
///
/// Every field is an `i64` regardless of the target's address width.
pub mod descriptor_fields {
    pub const KIND: u32 = 0;
    pub const KEY_SIZE: u32 = 1;
    pub const KEY_ALIGN: u32 = 2;
    pub const KEY_STRATEGY: u32 = 3;
    pub const ELEM_SIZE: u32 = 4;
    pub const ELEM_ALIGN: u32 = 5;

    /// Number of fields in a descriptor record
    pub const COUNT: u32 = 6;
}

/// Indices into the `{cursor, key, value}` aggregate returned by map-next
pub mod map_next_fields {
    pub const CURSOR: u32 = 0;
    pub const KEY: u32 = 1;
    pub const VALUE: u32 = 2;
}
