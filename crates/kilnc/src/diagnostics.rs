//! Diagnostic reporting for the kiln lowering layer.
//!
//! Lowering errors are rendered rustc-style on stderr:
//!
//! ```text
//! error[internal]: runtime entry point `kiln_rt_map_next` redeclared with a conflicting signature ...
//! note: every runtime entry point has exactly one signature per compilation unit; ...
//! ```
//!
//! Output goes through a process-wide switch so tests can silence it with
//! [`suppress`].

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::LowerError;

static DIAGNOSTICS_ENABLED: AtomicBool = AtomicBool::new(true);

const RED: &str = "\x1b[31m";
const BLUE: &str = "\x1b[34m";
const RESET: &str = "\x1b[0m";

/// Structured diagnostic decoupled from the error that produced it.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Optional code shown in brackets after `error`
    pub code: Option<&'static str>,
    /// Optional file the diagnostic refers to (a config file, an output path)
    pub file: Option<String>,
    /// Optional hint
    pub note: Option<String>,
}

impl Diagnostic {
    pub fn simple(msg: impl Into<String>) -> Self {
        Diagnostic {
            message: msg.into(),
            code: None,
            file: None,
            note: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

impl From<&LowerError> for Diagnostic {
    fn from(err: &LowerError) -> Self {
        Diagnostic {
            message: err.to_string(),
            code: err.is_internal().then_some("internal"),
            file: None,
            note: err.note().map(str::to_string),
        }
    }
}

/// Prints a compact diagnostic to stderr.
pub fn report_error(file: Option<&str>, code: Option<&str>, message: &str, note: Option<&str>) {
    match code {
        Some(code) => eprintln!("{}error[{}]{}: {}", RED, code, RESET, message),
        None => eprintln!("{}error{}: {}", RED, RESET, message),
    }
    if let Some(path) = file {
        eprintln!("  --> {}", sanitize_file_path(path));
    }
    if let Some(note) = note {
        eprintln!("{}note{}: {}", BLUE, RESET, note);
    }
}

/// Emits a diagnostic unless output is currently suppressed.
pub fn emit_diagnostic(d: &Diagnostic) {
    if DIAGNOSTICS_ENABLED.load(Ordering::SeqCst) {
        report_error(d.file.as_deref(), d.code, &d.message, d.note.as_deref());
    }
}

/// Renders a lowering error and turns it into an `anyhow::Error` so the
/// binary can bail with `?`.
pub fn report_and_bail<T>(err: LowerError) -> anyhow::Result<T> {
    emit_diagnostic(&Diagnostic::from(&err));
    Err(anyhow::Error::new(err))
}

// Only the file name is shown; absolute paths leak machine layout into logs.
fn sanitize_file_path(path: &str) -> String {
    std::path::Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file")
        .to_string()
}

/// Silences diagnostic output until the returned guard is dropped.
///
/// ```rust
/// let _guard = kilnc::diagnostics::suppress();
/// // nothing is printed here
/// ```
pub fn suppress() -> SuppressGuard {
    let prev = DIAGNOSTICS_ENABLED.swap(false, Ordering::SeqCst);
    SuppressGuard { prev }
}

/// Restores the previous diagnostic state on drop.
pub struct SuppressGuard {
    prev: bool,
}

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        DIAGNOSTICS_ENABLED.store(self.prev, Ordering::SeqCst);
    }
}
