//! Environment variable names and accessors.
//!
//! Every environment variable the crate reads is named here; nothing else
//! calls `std::env::var` directly.

pub mod names {
    /// Runtime symbol prefix: `KILN_RUNTIME_PREFIX`
    pub const RUNTIME_PREFIX: &str = "KILN_RUNTIME_PREFIX";

    /// Address-sized integer width at the runtime boundary: `KILN_POINTER_BITS`
    pub const POINTER_BITS: &str = "KILN_POINTER_BITS";

    /// Target triple for emitted modules: `KILN_TARGET_TRIPLE`
    pub const TARGET_TRIPLE: &str = "KILN_TARGET_TRIPLE";

    /// Run the LLVM verifier before output: `KILN_VERIFY` ("0" disables)
    pub const VERIFY: &str = "KILN_VERIFY";

    /// Log filter for the binary: `KILN_LOG` (tracing `EnvFilter` syntax)
    pub const LOG: &str = "KILN_LOG";
}

pub fn get_runtime_prefix() -> Option<String> {
    std::env::var(names::RUNTIME_PREFIX).ok()
}

pub fn get_pointer_bits() -> Option<String> {
    std::env::var(names::POINTER_BITS).ok()
}

pub fn get_target_triple() -> Option<String> {
    std::env::var(names::TARGET_TRIPLE).ok()
}

/// Returns `None` when unset, otherwise whether verification stays enabled.
pub fn get_verify() -> Option<bool> {
    std::env::var(names::VERIFY)
        .ok()
        .map(|v| !matches!(v.trim(), "0" | "false" | "no" | "off"))
}

/// Log filter directive, `warn` when unset.
pub fn get_log_filter() -> String {
    std::env::var(names::LOG).unwrap_or_else(|_| "warn".to_string())
}
