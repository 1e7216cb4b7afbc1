//! Component §3/§6 — Diagnostics: the structured `Output` list the driver
//! appends to, plus an optional `colored`-based pretty-printer in the manner
//! of the teacher's `warning()` / `print_warning_summary()` pair.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use colored::Colorize;
use serde::Serialize;

use crate::location::Location;

/// Mirrors `simplecpp::Output::Type`: every distinct class of thing the
/// engine can report, in increasing order of severity within "non-fatal".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    Warning,
    PortabilityBackslash,
    UnhandledCharError,
    MissingHeader,
    ExplicitIncludeNotFound,
    FileNotFound,
    IncludeNestedTooDeeply,
    SyntaxError,
    DuiError,
    Error,
}

impl DiagnosticKind {
    /// Whether this kind aborts the run outright, matching spec.md §7's
    /// propagation policy table.
    pub fn is_fatal(self) -> bool {
        matches!(self, DiagnosticKind::SyntaxError | DiagnosticKind::Error)
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::PortabilityBackslash => "portability (backslash)",
            DiagnosticKind::UnhandledCharError => "unhandled character",
            DiagnosticKind::MissingHeader => "missing header",
            DiagnosticKind::ExplicitIncludeNotFound => "explicit include not found",
            DiagnosticKind::FileNotFound => "file not found",
            DiagnosticKind::IncludeNestedTooDeeply => "include nested too deeply",
            DiagnosticKind::SyntaxError => "syntax error",
            DiagnosticKind::DuiError => "invalid configuration",
            DiagnosticKind::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// One recorded item of output. Unlike [`crate::error::PpError`] this never
/// unwinds — the driver appends one and keeps going (unless `kind.is_fatal()`
/// tells it to stop per §7).
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    #[serde(skip)]
    pub location: Option<Location>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, location: Option<Location>, message: impl Into<String>) -> Diagnostic {
        Diagnostic { kind, location, message: message.into() }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{}:{}:{}: {}: {}", loc.file(), loc.line, loc.col, self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

pub type OutputList = Vec<Diagnostic>;

/// One recorded use of a macro at expansion time (§6 Output).
#[derive(Debug, Clone, Serialize)]
pub struct MacroUsage {
    pub macro_name: String,
    pub use_location: Location,
    pub macro_location: Location,
}

/// One recorded `#if`/`#elif` evaluation (§6 Output).
#[derive(Debug, Clone, Serialize)]
pub struct IfCond {
    pub location: Location,
    pub expression: String,
    pub result: bool,
}

impl Serialize for Location {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("{}:{}:{}", self.file(), self.line, self.col))
    }
}

static WARNINGS_PRINTED: AtomicUsize = AtomicUsize::new(0);
static ERRORS_PRINTED: AtomicUsize = AtomicUsize::new(0);

/// Pretty-prints one diagnostic to stderr, colored by severity. Mirrors the
/// teacher's `warning!`/`error!` console helpers; purely a convenience for
/// hosts that don't want to write their own renderer.
pub fn print_diagnostic(d: &Diagnostic) {
    let prefix = if d.kind.is_fatal() {
        ERRORS_PRINTED.fetch_add(1, AtomicOrdering::Relaxed);
        "error".red().bold()
    } else {
        WARNINGS_PRINTED.fetch_add(1, AtomicOrdering::Relaxed);
        "warning".yellow().bold()
    };
    eprintln!("{}: {}", prefix, d);
}

pub fn print_diagnostics(list: &[Diagnostic]) {
    for d in list {
        print_diagnostic(d);
    }
}

/// Summary line in the manner of `print_warning_summary()`. Uses the
/// process-wide counters accumulated by [`print_diagnostic`].
pub fn print_summary() {
    let warnings = WARNINGS_PRINTED.load(AtomicOrdering::Relaxed);
    let errors = ERRORS_PRINTED.load(AtomicOrdering::Relaxed);
    if warnings > 0 || errors > 0 {
        eprintln!(
            "{} warning(s), {} error(s) generated.",
            warnings.to_string().yellow(),
            errors.to_string().red()
        );
    }
}
