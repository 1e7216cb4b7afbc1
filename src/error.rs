//! Crate-wide error type and small context-prepending helpers.
#![macro_use]

use std::fmt;
use std::fmt::Display;
use std::io;

use crate::diagnostics::DiagnosticKind;
use crate::location::Location;

/// Something that went wrong while reading, tokenizing, expanding or
/// evaluating. Unlike [`crate::diagnostics::Diagnostic`] (which is always
/// recorded and never unwinds the call stack) a `PpError` is a genuine early
/// return: the driver decides, per spec.md's propagation policy, whether to
/// turn it into a diagnostic and skip the current directive or to clear the
/// output and stop.
#[derive(Debug, Clone)]
pub struct PpError {
    pub kind: DiagnosticKind,
    pub location: Option<Location>,
    pub message: String,
}

impl PpError {
    pub fn new(kind: DiagnosticKind, location: Option<Location>, message: impl Into<String>) -> Self {
        PpError { kind, location, message: message.into() }
    }
}

impl fmt::Display for PpError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for PpError {}

impl From<io::Error> for PpError {
    fn from(e: io::Error) -> Self {
        PpError::new(DiagnosticKind::FileNotFound, None, e.to_string())
    }
}

#[macro_export]
macro_rules! pp_error {
    ($kind:expr, $loc:expr, $($arg:tt)*) => {
        $crate::error::PpError::new($kind, $loc, format!($($arg)*))
    }
}

pub trait ErrorExt<T> {
    fn prepend_error<M: AsRef<str> + Display>(self, msg: M) -> Result<T, PpError>;
}

impl<T> ErrorExt<T> for Result<T, PpError> {
    fn prepend_error<M: AsRef<str> + Display>(self, msg: M) -> Result<T, PpError> {
        match self {
            Ok(t) => Ok(t),
            Err(e) => Err(PpError::new(e.kind, e.location.clone(), format!("{}\n{}", msg, e.message))),
        }
    }
}
