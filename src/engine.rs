//! The public facade tying components A–K together behind one entry
//! point, mirroring `simplecpp::load` + `simplecpp::preprocess` folded
//! into the single `Engine::preprocess` / `Engine::preprocess_source` pair.

use std::path::Path;

use crate::diagnostics::{Diagnostic, IfCond, MacroUsage};
use crate::driver::{Driver, Dui};
use crate::error::PpError;
use crate::location::FileTable;
use crate::tokenlist::Arena;

/// Everything a host needs out of one preprocessing run: the resulting
/// text plus the side-channel diagnostics/usage logs described in §6.
pub struct PreprocessResult {
    pub text: String,
    pub diagnostics: Vec<Diagnostic>,
    pub macro_usages: Vec<MacroUsage>,
    pub if_conds: Vec<IfCond>,
}

pub struct Engine;

impl Engine {
    /// Preprocesses the file at `path` with the given configuration.
    pub fn preprocess(path: &Path, dui: &Dui) -> Result<PreprocessResult, PpError> {
        let arena = Arena::new();
        let files = FileTable::new();
        let mut driver = Driver::new(arena, files, dui);
        let output = driver.run(path);
        Self::finish(driver, output)
    }

    /// Preprocesses an in-memory buffer labelled `label` (used as its
    /// `__FILE__`/diagnostic file name) with the given configuration.
    pub fn preprocess_source(label: &str, source: &str, dui: &Dui) -> Result<PreprocessResult, PpError> {
        let arena = Arena::new();
        let files = FileTable::new();
        let mut driver = Driver::new(arena, files, dui);
        let output = driver.run_source(label, source);
        Self::finish(driver, output)
    }

    /// A fatal error (`#error`, a malformed `#define`, an unresolvable
    /// `#if` expression, ...) clears any partial output per spec.md §7's
    /// propagation policy — the caller gets the error and nothing else.
    fn finish(driver: Driver, output: Result<crate::tokenlist::TokenList, PpError>) -> Result<PreprocessResult, PpError> {
        let tokens = output?;
        Ok(PreprocessResult {
            text: tokens.stringify(),
            diagnostics: driver.diagnostics,
            macro_usages: driver.macro_usages,
            if_conds: driver.if_conds,
        })
    }
}
