pub mod codegen;
pub mod config;
pub mod constants;
pub mod diagnostics;
pub mod env;
pub mod error;
pub mod runtime_functions;
pub mod shims;
pub mod types;

use inkwell::context::Context;
use tracing::debug;

use crate::codegen::CodeGen;
use crate::config::LowerConfig;
use crate::error::LowerResult;
use crate::runtime_functions::RuntimeOp;
use crate::shims::ShimBuilder;
use crate::types::AggregateType;

/// One compilation unit of aggregate lowering.
///
/// A session owns the unit's `CodeGen`, and with it the only runtime symbol
/// registry and descriptor cache for the unit. Sessions are not `Send`;
/// compiling units in parallel means one session (and one `Context`) per
/// thread.
pub struct LowerSession<'ctx> {
    pub config: LowerConfig,
    pub codegen: CodeGen<'ctx>,
}

impl<'ctx> LowerSession<'ctx> {
    /// Validates `config` and creates an empty module named `module_name`
    /// for the configured target.
    pub fn new(context: &'ctx Context, module_name: &str, config: LowerConfig) -> LowerResult<Self> {
        config.validate()?;
        let codegen = CodeGen::new(context, module_name, &config)?;
        debug!(
            module = module_name,
            prefix = %config.runtime_prefix,
            word_bits = codegen.word_t.get_bit_width(),
            "started lowering session"
        );
        Ok(LowerSession { config, codegen })
    }

    /// Declares every runtime entry point through the registry and returns
    /// the module text.
    pub fn emit_runtime_abi(&self) -> LowerResult<String> {
        for op in RuntimeOp::ALL {
            self.codegen.runtime_function(op)?;
        }
        self.finish()
    }

    /// Emits typed shims for each type in `types`.
    pub fn emit_shims(&self, types: &[AggregateType]) -> LowerResult<()> {
        let shims = ShimBuilder::new(&self.codegen);
        for ty in types {
            shims.emit(ty)?;
        }
        Ok(())
    }

    pub fn verify(&self) -> LowerResult<()> {
        self.codegen.verify()
    }

    pub fn print_ir(&self) -> String {
        self.codegen.print_ir()
    }

    /// Verifies the module when configured to, then returns its text.
    pub fn finish(&self) -> LowerResult<String> {
        if self.config.verify {
            self.verify()?;
        }
        Ok(self.print_ir())
    }
}
