//! A standalone C/C++ preprocessor and token engine: tokenization with
//! source-location fidelity, conditional compilation, object-like and
//! function-like/variadic macro expansion, stringizing, token pasting,
//! `#include` resolution and `__has_include`, and the standard predefined
//! macros. No CLI front-end, downstream static-analysis checks, or
//! directory globbing — hosts embed [`engine::Engine`] and render
//! diagnostics themselves.

pub mod charstream;
pub mod diagnostics;
pub mod driver;
pub mod engine;
pub mod error;
pub mod eval;
pub mod filecache;
pub mod include;
pub mod location;
pub mod macromap;
pub mod macros;
pub mod pathutil;
pub mod rawreader;
pub mod token;
pub mod tokenlist;

pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use driver::Dui;
pub use engine::{Engine, PreprocessResult};
pub use error::PpError;
