//! Lowering configuration.
//!
//! Settings come from three layers, later ones winning: built-in defaults,
//! an optional TOML file (`kiln.toml` in the working directory, or an
//! explicit path), and `KILN_*` environment variables (see [`crate::env`]).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LowerError, LowerResult};

/// File consulted when no explicit config path is given
pub const DEFAULT_CONFIG_FILE: &str = "kiln.toml";

/// Default prefix of runtime entry point symbols
pub const DEFAULT_RUNTIME_PREFIX: &str = "kiln_rt_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LowerConfig {
    /// Prefix of runtime symbol names (`<prefix>map_lookup`, ...)
    pub runtime_prefix: String,
    /// Expected pointer width of the target. The boundary word always takes
    /// the target's width; a value here that disagrees is rejected.
    pub pointer_bits: Option<u32>,
    /// Target triple for emitted modules; host triple when unset
    pub target_triple: Option<String>,
    /// Run the LLVM verifier before printing a module
    pub verify: bool,
}

impl Default for LowerConfig {
    fn default() -> Self {
        Self {
            runtime_prefix: DEFAULT_RUNTIME_PREFIX.to_string(),
            pointer_bits: None,
            target_triple: None,
            verify: true,
        }
    }
}

/// Values read from the environment, kept separate so tests can apply them
/// without touching the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub runtime_prefix: Option<String>,
    pub pointer_bits: Option<String>,
    pub target_triple: Option<String>,
    pub verify: Option<bool>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            runtime_prefix: crate::env::get_runtime_prefix(),
            pointer_bits: crate::env::get_pointer_bits(),
            target_triple: crate::env::get_target_triple(),
            verify: crate::env::get_verify(),
        }
    }
}

impl LowerConfig {
    /// Loads defaults, then `path` (or `kiln.toml` if present), then the
    /// environment, and validates the result.
    pub fn load(path: Option<&Path>) -> LowerResult<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(EnvOverrides::from_env())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> LowerResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LowerError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| LowerError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> LowerResult<Self> {
        toml::from_str(content).map_err(|e| LowerError::Config(e.message().to_string()))
    }

    pub fn apply_overrides(&mut self, overrides: EnvOverrides) -> LowerResult<()> {
        if let Some(prefix) = overrides.runtime_prefix {
            self.runtime_prefix = prefix;
        }
        if let Some(bits) = overrides.pointer_bits {
            let parsed: u32 = bits.trim().parse().map_err(|_| {
                LowerError::Config(format!(
                    "{} must be an integer, got `{}`",
                    crate::env::names::POINTER_BITS,
                    bits
                ))
            })?;
            self.pointer_bits = Some(parsed);
        }
        if let Some(triple) = overrides.target_triple {
            self.target_triple = Some(triple);
        }
        if let Some(verify) = overrides.verify {
            self.verify = verify;
        }
        Ok(())
    }

    pub fn validate(&self) -> LowerResult<()> {
        if let Some(bits) = self.pointer_bits
            && bits != 32
            && bits != 64
        {
            return Err(LowerError::Config(format!(
                "pointer_bits must be 32 or 64, got {}",
                bits
            )));
        }
        let mut chars = self.runtime_prefix.chars();
        let starts_ok = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !starts_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(LowerError::Config(format!(
                "runtime_prefix must be a non-empty C identifier prefix, got `{}`",
                self.runtime_prefix
            )));
        }
        Ok(())
    }
}
