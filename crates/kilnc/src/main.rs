//! Command-line driver for the kiln aggregate lowering.
//!
//! ```bash
//! # Reference declarations of every runtime entry point
//! kilnc abi -o runtime_abi.ll
//!
//! # Typed wrappers for a map and a channel type
//! kilnc shims --type 'map[i64]i64' --type 'chan str'
//!
//! # Descriptor symbol and key strategy of a type
//! kilnc describe --type 'map[str]f64'
//! ```
//!
//! Settings come from `kiln.toml` (or `--config`) and `KILN_*` environment
//! variables; `KILN_LOG` controls log output on stderr.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use inkwell::context::Context;
use tracing_subscriber::EnvFilter;

use kilnc::LowerSession;
use kilnc::codegen::descriptors::descriptor_symbol;
use kilnc::config::LowerConfig;
use kilnc::diagnostics::{Diagnostic, emit_diagnostic, report_and_bail};
use kilnc::error::LowerError;
use kilnc::runtime_functions::RuntimeOp;
use kilnc::shims::{shim_name, shim_ops};
use kilnc::types::AggregateType;

#[derive(Parser)]
#[command(name = "kilnc", about = "Kiln aggregate lowering", version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file (defaults to ./kiln.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Emit an LLVM module declaring every runtime entry point
    Abi {
        /// Write the module here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Emit typed wrapper functions for map and channel types
    Shims {
        /// Aggregate type, e.g. 'map[i64]str' or 'chan f64'
        #[arg(long = "type", value_name = "TYPE", required = true)]
        types: Vec<String>,

        /// Write the module here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Print descriptor and shim names for aggregate types
    Describe {
        #[arg(long = "type", value_name = "TYPE", required = true)]
        types: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    if let Err(e) = run(cli) {
        // lowering errors were already rendered as diagnostics
        if e.downcast_ref::<LowerError>().is_none() {
            eprintln!("error: {:#}", e);
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match LowerConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            let mut diag = Diagnostic::from(&e);
            if let Some(path) = &cli.config {
                diag = diag.with_file(path.display().to_string());
            }
            emit_diagnostic(&diag);
            return Err(e.into());
        }
    };

    match cli.command {
        Command::Abi { output } => emit_abi(config, output.as_deref()),
        Command::Shims { types, output } => emit_shims(config, &types, output.as_deref()),
        Command::Describe { types } => describe(&config, &types),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_new(kilnc::env::get_log_filter())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_types(sources: &[String]) -> Result<Vec<AggregateType>> {
    let mut types = Vec::with_capacity(sources.len());
    for src in sources {
        match src.parse::<AggregateType>() {
            Ok(ty) => types.push(ty),
            Err(e) => return report_and_bail(e),
        }
    }
    Ok(types)
}

fn emit_abi(config: LowerConfig, output: Option<&Path>) -> Result<()> {
    let context = Context::create();
    let session = match LowerSession::new(&context, "kiln_runtime_abi", config) {
        Ok(s) => s,
        Err(e) => return report_and_bail(e),
    };
    match session.emit_runtime_abi() {
        Ok(ir) => write_output(&ir, output),
        Err(e) => report_and_bail(e),
    }
}

fn emit_shims(config: LowerConfig, sources: &[String], output: Option<&Path>) -> Result<()> {
    let types = parse_types(sources)?;
    let context = Context::create();
    let session = match LowerSession::new(&context, "kiln_shims", config) {
        Ok(s) => s,
        Err(e) => return report_and_bail(e),
    };
    let ir = session
        .emit_shims(&types)
        .and_then(|_| session.finish());
    match ir {
        Ok(ir) => write_output(&ir, output),
        Err(e) => report_and_bail(e),
    }
}

fn describe(config: &LowerConfig, sources: &[String]) -> Result<()> {
    for ty in parse_types(sources)? {
        let strategy = match ty.key_strategy() {
            Ok(s) => s,
            Err(e) => return report_and_bail(e),
        };
        println!("{}", ty);
        println!("  mangled:    {}", ty.mangle());
        println!("  descriptor: {}", descriptor_symbol(&ty));
        println!("  key:        {}", strategy.name());
        let shims: Vec<String> = shim_ops(&ty).iter().map(|op| shim_name(&ty, op)).collect();
        println!("  shims:      {}", shims.join(", "));
        let runtime: Vec<String> = RuntimeOp::ALL
            .iter()
            .filter(|op| op.is_map_op() == matches!(ty, AggregateType::Map(_)))
            .map(|op| op.symbol(&config.runtime_prefix))
            .collect();
        println!("  runtime:    {}", runtime.join(", "));
    }
    Ok(())
}

fn write_output(ir: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, ir)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            print!("{}", ir);
            Ok(())
        }
    }
}
