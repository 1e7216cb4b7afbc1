//! Component K — Preprocessor Driver: the directive/conditional state
//! machine that turns a raw token stream into the preprocessed output,
//! per spec.md §4.K.

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::Deserialize;

use crate::charstream::{BufferStream, FileStream, Stream};
use crate::diagnostics::{Diagnostic, DiagnosticKind, IfCond, MacroUsage};
use crate::error::PpError;
use crate::eval;
use crate::filecache::{FileData, FileDataCache};
use crate::include::{IncludeKind, IncludeResolver};
use crate::location::{FileIndex, FileTable, Location};
use crate::macromap::MacroMap;
use crate::macros::Macro;
use crate::pathutil::{default_path_service, PathService};
use crate::rawreader::RawReader;
use crate::tokenlist::{Arena, TokenId, TokenList};

/// Driver User Interface — the knobs a host configures before a run (§6).
/// Derives `Deserialize` so it can come straight off a JSON/TOML config
/// file, in the manner of the teacher's docopt-parsed `Args`.
#[derive(Debug, Clone, Deserialize)]
pub struct Dui {
    #[serde(default)]
    pub defines: Vec<String>,
    #[serde(default)]
    pub undefines: Vec<String>,
    #[serde(default)]
    pub include_paths: Vec<String>,
    #[serde(default)]
    pub std: Option<String>,
    /// Forced-include file paths processed before the main source, in
    /// order, as if each had been `#include`d at the top of the file.
    #[serde(default)]
    pub includes: Vec<String>,
    /// Forces the include resolver's known-missing cache to reset before
    /// this run starts.
    #[serde(default)]
    pub clear_include_cache: bool,
    #[serde(default = "default_max_include_depth")]
    pub max_include_depth: u32,
}

fn default_max_include_depth() -> u32 {
    400
}

impl Default for Dui {
    fn default() -> Dui {
        Dui {
            defines: Vec::new(),
            undefines: Vec::new(),
            include_paths: Vec::new(),
            std: None,
            includes: Vec::new(),
            clear_include_cache: false,
            max_include_depth: 400,
        }
    }
}

impl Dui {
    /// §6's std-selector table: every recognized spelling maps to the
    /// `__STDC_VERSION__` or `__cplusplus` value the driver seeds.
    fn std_cplusplus(&self) -> Option<&'static str> {
        match self.std.as_deref() {
            Some("c++98") | Some("c++03") | Some("gnu++98") | Some("gnu++03") => Some("199711L"),
            Some("c++11") | Some("gnu++11") | Some("c++0x") | Some("gnu++0x") => Some("201103L"),
            Some("c++14") | Some("c++1y") | Some("gnu++14") | Some("gnu++1y") => Some("201402L"),
            Some("c++17") | Some("c++1z") | Some("gnu++17") | Some("gnu++1z") => Some("201703L"),
            Some("c++20") | Some("c++2a") | Some("gnu++20") | Some("gnu++2a") => Some("202002L"),
            Some("c++23") | Some("c++2b") | Some("gnu++23") | Some("gnu++2b") => Some("202100L"),
            _ => None,
        }
    }

    fn std_c(&self) -> Option<&'static str> {
        match self.std.as_deref() {
            Some("c99") | Some("c9x") | Some("iso9899:1999") | Some("gnu99") | Some("gnu9x") => Some("199901L"),
            Some("c11") | Some("c1x") | Some("iso9899:2011") | Some("gnu11") | Some("gnu1x") => Some("201112L"),
            Some("c17") | Some("c18") | Some("iso9899:2017") | Some("gnu17") | Some("gnu18") => Some("201710L"),
            Some("c2x") | Some("gnu2x") => Some("202000L"),
            _ => None,
        }
    }

    /// `__has_include` is only recognized when the selector starts with
    /// `c++` and names C++17 or later (spec.md §6 — `gnu++`-prefixed
    /// selectors don't count, matching the table's literal wording).
    fn has_include_enabled(&self) -> bool {
        matches!(
            self.std.as_deref(),
            Some("c++17") | Some("c++1z") | Some("c++20") | Some("c++2a") | Some("c++23") | Some("c++2b")
        )
    }
}

/// One level of `#if`/`#ifdef`/`#ifndef` ... `#endif` nesting, per spec.md's
/// three-state design: `True` is the live branch, `ElseIsTrue` means no
/// branch in this chain has matched yet (a later `#elif`/`#else` still
/// could), `AlwaysFalse` means either a branch already matched or an
/// enclosing level is inactive — nothing at this level ever evaluates or
/// emits again.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum IfState {
    True,
    ElseIsTrue,
    AlwaysFalse,
}

pub struct Driver {
    pub arena: Rc<RefCell<Arena>>,
    pub files: Rc<FileTable>,
    pub macros: MacroMap,
    pub diagnostics: Vec<Diagnostic>,
    pub macro_usages: Vec<MacroUsage>,
    pub if_conds: Vec<IfCond>,
    if_stack: Vec<IfState>,
    pragma_once: HashSet<PathBuf>,
    file_cache: FileDataCache,
    include_resolver: IncludeResolver,
    include_depth: u32,
    path_service: Box<dyn PathService>,
    /// Token ids marking where each currently-open `#include`'s spliced-in
    /// content ends (the cursor `process` resumes at once it's exhausted).
    /// Pushed in nesting order, so the depth unwinds LIFO as the flat
    /// stream's cursor reaches each boundary in turn — this is what lets a
    /// single spliced `TokenList` stand in for spec.md's `includeStack` of
    /// resume points without tracking a real call stack.
    include_boundaries: Vec<Option<TokenId>>,
    max_include_depth: u32,
    std_cplusplus: Option<&'static str>,
    std_c: Option<&'static str>,
    has_include_enabled: bool,
    forced_includes: Vec<String>,
}

impl Driver {
    pub fn new(arena: Rc<RefCell<Arena>>, files: Rc<FileTable>, dui: &Dui) -> Driver {
        let mut macros = MacroMap::new();
        let mut diagnostics = Vec::new();
        for def in &dui.defines {
            match seed_define(&mut macros, def, Rc::clone(&arena), Rc::clone(&files)) {
                Ok(diags) => diagnostics.extend(diags),
                Err(e) => diagnostics.push(Diagnostic::new(DiagnosticKind::DuiError, None, format!("invalid command-line define '{}': {}", def, e))),
            }
        }
        for name in &dui.undefines {
            macros.erase(name);
        }
        let search_dirs = dui.include_paths.iter().map(PathBuf::from).collect();
        let include_resolver = IncludeResolver::new(search_dirs);
        if dui.clear_include_cache {
            include_resolver.clear_negative_cache();
        }
        Driver {
            arena,
            files,
            macros,
            diagnostics,
            macro_usages: Vec::new(),
            if_conds: Vec::new(),
            if_stack: Vec::new(),
            pragma_once: HashSet::new(),
            file_cache: FileDataCache::new(),
            include_resolver,
            include_depth: 0,
            path_service: Box::new(default_path_service()),
            include_boundaries: Vec::new(),
            max_include_depth: dui.max_include_depth,
            std_cplusplus: dui.std_cplusplus(),
            std_c: dui.std_c(),
            has_include_enabled: dui.has_include_enabled(),
            forced_includes: dui.includes.clone(),
        }
    }

    /// Loads each `dui.includes` entry (in order) and splices its tokens
    /// in front of `stream`, as if forced-included at the top of the file.
    /// A forced include that can't be opened is `explicitIncludeNotFound`,
    /// not fatal — the rest of the run still proceeds.
    fn prepend_forced_includes(&mut self, stream: &mut TokenList) -> Result<(), PpError> {
        for path in self.forced_includes.clone().iter().rev() {
            match self.load_file(Path::new(path)) {
                Ok(tokens) => {
                    if !tokens.is_empty() {
                        let front = stream.front();
                        stream.splice_before(front, tokens);
                    }
                }
                Err(_) => {
                    self.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::ExplicitIncludeNotFound,
                        None,
                        format!("'{}' not found (forced include)", path),
                    ));
                }
            }
        }
        Ok(())
    }

    fn active(&self) -> bool {
        self.if_stack.last().map_or(true, |s| *s == IfState::True)
    }

    /// Tokenizes `path` (or reuses the cached tokenization) and runs the
    /// full directive loop over it, producing the preprocessed output.
    pub fn run(&mut self, path: &Path) -> Result<TokenList, PpError> {
        let raw = self.load_file(path)?;
        let mut stream = raw.clone_into(Rc::clone(&self.arena), Rc::clone(&self.files));
        self.prepend_forced_includes(&mut stream)?;
        let mut output = TokenList::new(Rc::clone(&self.arena), Rc::clone(&self.files));
        self.process(&mut stream, &mut output)?;
        if !self.if_stack.is_empty() {
            return Err(PpError::new(DiagnosticKind::SyntaxError, None, "unterminated #if/#ifdef/#ifndef".to_string()));
        }
        Ok(output)
    }

    /// Runs the full directive loop over an in-memory source buffer rather
    /// than a real file — used by hosts preprocessing a string and by the
    /// test suite, which otherwise has to round-trip through `tempfile` for
    /// every case.
    pub fn run_source(&mut self, label: &str, source: &str) -> Result<TokenList, PpError> {
        let file_index = self.files.intern(label);
        let mut stream = BufferStream::new(source.as_bytes());
        let (mut tokens, diags) = tokenize(&mut stream, Rc::clone(&self.arena), Rc::clone(&self.files), file_index)?;
        self.diagnostics.extend(diags);
        tokens.remove_comments();
        tokens.combine_operators();
        self.prepend_forced_includes(&mut tokens)?;

        let mut output = TokenList::new(Rc::clone(&self.arena), Rc::clone(&self.files));
        self.process(&mut tokens, &mut output)?;
        if !self.if_stack.is_empty() {
            return Err(PpError::new(DiagnosticKind::SyntaxError, None, "unterminated #if/#ifdef/#ifndef".to_string()));
        }
        Ok(output)
    }

    /// Loads and tokenizes `path`, using the file cache when possible.
    fn load_file(&mut self, path: &Path) -> Result<TokenList, PpError> {
        let key = path.to_string_lossy().to_string();
        if let Some(cached) = self.file_cache.get_by_identity(self.path_service.as_ref(), path) {
            return Ok(cached.tokens.clone_into(Rc::clone(&self.arena), Rc::clone(&self.files)));
        }

        let file_index = self.files.intern(&key);
        let mut file_stream = FileStream::open(path).map_err(|e| PpError::new(DiagnosticKind::FileNotFound, None, format!("{}: {}", key, e)))?;
        let (mut tokens, diags) = tokenize(&mut file_stream, Rc::clone(&self.arena), Rc::clone(&self.files), file_index)?;
        self.diagnostics.extend(diags);
        tokens.remove_comments();
        tokens.combine_operators();

        let stored = tokens.clone_into(Rc::clone(&self.arena), Rc::clone(&self.files));
        let identity = self.path_service.identity(path).ok();
        self.file_cache.insert(key, FileData { filename: path.to_string_lossy().to_string(), tokens: stored }, identity);
        Ok(tokens)
    }

    /// Consumes `stream` line-chunk by line-chunk: directive lines update
    /// driver state, non-directive runs are macro-expanded (when the
    /// current `#if` nesting is live) and appended to `output`.
    fn process(&mut self, stream: &mut TokenList, output: &mut TokenList) -> Result<(), PpError> {
        let mut cursor = stream.front();
        loop {
            while self.include_boundaries.last().map_or(false, |b| *b == cursor) {
                self.include_boundaries.pop();
                self.include_depth -= 1;
            }
            let start = match cursor {
                Some(s) => s,
                None => break,
            };
            if is_line_start(stream, start) && stream.str_at(start) == "#" {
                let end = line_end(stream, start);
                let next_cursor = stream.next_of(end);
                let directive = stream.take_range(start, end);
                let resume = self.handle_directive(directive, stream, next_cursor)?;
                cursor = resume;
            } else {
                let mut end = start;
                let mut probe = stream.next_of(start);
                while let Some(p) = probe {
                    if is_line_start(stream, p) && stream.str_at(p) == "#" {
                        break;
                    }
                    end = p;
                    probe = stream.next_of(p);
                }
                let next_cursor = stream.next_of(end);
                let mut chunk = stream.take_range(start, end);
                if self.active() {
                    self.macros.expand_all(
                        &mut chunk,
                        Rc::clone(&self.arena),
                        Rc::clone(&self.files),
                        chunk_file_index(&chunk),
                        self.std_cplusplus,
                        self.std_c,
                        &mut self.macro_usages,
                        &mut self.diagnostics,
                    )?;
                    output.append(chunk);
                }
                cursor = next_cursor;
            }
        }
        Ok(())
    }

    /// Handles one directive line, already detached from `stream`, and
    /// returns the cursor `process` should resume from — normally
    /// `next_cursor`, but the first spliced-in token when `#include`
    /// injects a header's content.
    fn handle_directive(&mut self, mut line: TokenList, stream: &mut TokenList, next_cursor: Option<TokenId>) -> Result<Option<TokenId>, PpError> {
        let hash = line.front().expect("directive line always starts with '#'");
        let loc = line.location_at(hash);
        let kw_id = match line.next_of(hash) {
            Some(id) => id,
            None => return Ok(next_cursor), // null directive: bare '#'
        };
        let kw = line.str_at(kw_id);
        let rest_start = line.next_of(kw_id);
        let rest = match rest_start {
            Some(s) => Some(line.take_range(s, line.back().unwrap())),
            None => None,
        };

        match kw.as_str() {
            "define" => {
                if self.active() {
                    let rest = rest.unwrap_or_else(|| TokenList::new(Rc::clone(&self.arena), Rc::clone(&self.files)));
                    match Macro::parse_define(&rest, loc) {
                        Ok(m) => self.macros.insert(m),
                        Err(e) => return Err(e),
                    }
                }
            }
            "undef" => {
                if self.active() {
                    if let Some(rest) = rest {
                        if let Some(name_id) = rest.front() {
                            self.macros.erase(&rest.str_at(name_id));
                        }
                    }
                }
            }
            "include" => {
                if self.active() {
                    return self.handle_include(rest, &loc, stream, next_cursor);
                }
            }
            "ifdef" | "ifndef" => {
                let name = rest.as_ref().and_then(|r| r.front()).map(|id| rest.as_ref().unwrap().str_at(id));
                let next_state = if !self.active() {
                    IfState::AlwaysFalse
                } else {
                    let defined = name.as_deref().map_or(false, |n| {
                        self.macros.is_defined(n) || (n == "__has_include" && self.has_include_enabled)
                    });
                    let want = kw == "ifdef";
                    if defined == want {
                        IfState::True
                    } else {
                        IfState::ElseIsTrue
                    }
                };
                self.if_stack.push(next_state);
            }
            "if" => {
                let next_state = if !self.active() {
                    IfState::AlwaysFalse
                } else {
                    let mut expr = rest.unwrap_or_else(|| TokenList::new(Rc::clone(&self.arena), Rc::clone(&self.files)));
                    let cond = self.evaluate_condition(&mut expr, &loc)?;
                    if cond {
                        IfState::True
                    } else {
                        IfState::ElseIsTrue
                    }
                };
                self.if_stack.push(next_state);
            }
            "elif" => {
                let top = self
                    .if_stack
                    .last()
                    .copied()
                    .ok_or_else(|| PpError::new(DiagnosticKind::SyntaxError, Some(loc.clone()), "#elif without #if".to_string()))?;
                let new_top = match top {
                    IfState::True => IfState::AlwaysFalse,
                    IfState::AlwaysFalse => IfState::AlwaysFalse,
                    IfState::ElseIsTrue => {
                        let mut expr = rest.unwrap_or_else(|| TokenList::new(Rc::clone(&self.arena), Rc::clone(&self.files)));
                        if self.evaluate_condition(&mut expr, &loc)? {
                            IfState::True
                        } else {
                            IfState::ElseIsTrue
                        }
                    }
                };
                *self.if_stack.last_mut().unwrap() = new_top;
            }
            "else" => {
                let top = self
                    .if_stack
                    .last()
                    .copied()
                    .ok_or_else(|| PpError::new(DiagnosticKind::SyntaxError, Some(loc.clone()), "#else without #if".to_string()))?;
                let new_top = match top {
                    IfState::True => IfState::AlwaysFalse,
                    IfState::AlwaysFalse => IfState::AlwaysFalse,
                    IfState::ElseIsTrue => IfState::True,
                };
                *self.if_stack.last_mut().unwrap() = new_top;
            }
            "endif" => {
                self.if_stack
                    .pop()
                    .ok_or_else(|| PpError::new(DiagnosticKind::SyntaxError, Some(loc.clone()), "#endif without #if".to_string()))?;
            }
            "error" => {
                if self.active() {
                    let msg = rest.map(|r| r.stringify_raw()).unwrap_or_default();
                    return Err(PpError::new(DiagnosticKind::Error, Some(loc), format!("#error {}", msg)));
                }
            }
            "warning" => {
                if self.active() {
                    let msg = rest.map(|r| r.stringify_raw()).unwrap_or_default();
                    self.diagnostics.push(Diagnostic::new(DiagnosticKind::Warning, Some(loc), format!("#warning {}", msg)));
                }
            }
            "pragma" => {
                if self.active() {
                    if let Some(rest) = rest {
                        if rest.front().map(|id| rest.str_at(id)) == Some("once".to_string()) {
                            self.pragma_once.insert(PathBuf::from(loc.file()));
                        }
                    }
                }
            }
            _ => {
                self.diagnostics.push(Diagnostic::new(DiagnosticKind::Warning, Some(loc), format!("unknown directive '#{}'", kw)));
            }
        }

        Ok(next_cursor)
    }

    fn evaluate_condition(&mut self, expr: &mut TokenList, loc: &Location) -> Result<bool, PpError> {
        let current_file = PathBuf::from(loc.file());
        let resolver = &self.include_resolver;
        let has_include = |header: &str, quoted: bool| {
            let kind = if quoted { IncludeKind::Quoted } else { IncludeKind::Angle };
            resolver.has_include(&current_file, header, kind)
        };
        let result = eval::evaluate(
            expr,
            &self.macros,
            Rc::clone(&self.arena),
            Rc::clone(&self.files),
            loc.file_index,
            self.std_cplusplus,
            self.std_c,
            &has_include,
            self.has_include_enabled,
            &mut self.macro_usages,
            &mut self.diagnostics,
        )?;
        self.if_conds.push(IfCond { location: loc.clone(), expression: expr.stringify_raw(), result });
        Ok(result)
    }

    fn handle_include(&mut self, rest: Option<TokenList>, loc: &Location, stream: &mut TokenList, next_cursor: Option<TokenId>) -> Result<Option<TokenId>, PpError> {
        let rest = match rest {
            Some(r) => r,
            None => {
                self.diagnostics.push(Diagnostic::new(DiagnosticKind::SyntaxError, Some(loc.clone()), "#include with no header name".to_string()));
                return Ok(next_cursor);
            }
        };
        let text = rest.stringify_raw();
        let (header, kind) = if let Some(inner) = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
            (inner.to_string(), IncludeKind::Quoted)
        } else if let Some(inner) = text.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
            (inner.to_string(), IncludeKind::Angle)
        } else {
            self.diagnostics.push(Diagnostic::new(DiagnosticKind::SyntaxError, Some(loc.clone()), format!("malformed #include: {}", text)));
            return Ok(next_cursor);
        };

        // Depth overflow is recorded and the include is skipped, not
        // fatal — the affected directive is dropped, preprocessing of the
        // rest of the file continues (spec.md §7).
        if self.include_depth >= self.max_include_depth {
            self.diagnostics.push(Diagnostic::new(
                DiagnosticKind::IncludeNestedTooDeeply,
                Some(loc.clone()),
                format!("'{}' nested too deeply (limit {})", header, self.max_include_depth),
            ));
            return Ok(next_cursor);
        }

        let including_file = PathBuf::from(loc.file());
        let resolved = match self.include_resolver.resolve(&including_file, &header, kind) {
            Some(p) => p,
            None => {
                self.diagnostics.push(Diagnostic::new(DiagnosticKind::MissingHeader, Some(loc.clone()), format!("'{}' not found", header)));
                return Ok(next_cursor);
            }
        };

        if self.pragma_once.contains(&resolved) {
            return Ok(next_cursor);
        }

        let included_raw = self.load_file(&resolved)?;
        if included_raw.is_empty() {
            return Ok(next_cursor);
        }

        self.include_depth += 1;
        self.include_boundaries.push(next_cursor);
        let resume = stream.splice_before(next_cursor, included_raw);
        Ok(resume)
    }
}

fn is_line_start(list: &TokenList, id: TokenId) -> bool {
    match list.prev_of(id) {
        None => true,
        Some(p) => !list.location_at(p).sameline(&list.location_at(id)),
    }
}

fn line_end(list: &TokenList, start: TokenId) -> TokenId {
    let mut end = start;
    let mut probe = list.next_of(start);
    while let Some(p) = probe {
        if is_line_start(list, p) {
            break;
        }
        end = p;
        probe = list.next_of(p);
    }
    end
}

fn chunk_file_index(chunk: &TokenList) -> FileIndex {
    chunk.front().map(|id| chunk.location_at(id).file_index).unwrap_or(0)
}

fn tokenize(stream: &mut dyn Stream, arena: Rc<RefCell<Arena>>, files: Rc<FileTable>, file_index: FileIndex) -> Result<(TokenList, Vec<Diagnostic>), PpError> {
    let mut reader = RawReader::new(stream, Rc::clone(&files), file_index);
    let tokens = reader.read_into(arena, files)?;
    Ok((tokens, reader.diagnostics))
}

/// Parses one `dui.defines` entry (`NAME`, `NAME=value`, or
/// `NAME(params)=body`, per spec.md §6) into a [`Macro`] by rewriting it as
/// a `#define` line's tail and running it through [`Macro::parse_define`] —
/// the same parser a source-level `#define` uses, so command-line
/// function-like/variadic macros get identical treatment.
fn seed_define(macros: &mut MacroMap, def: &str, arena: Rc<RefCell<Arena>>, files: Rc<FileTable>) -> Result<Vec<Diagnostic>, PpError> {
    let file_index = files.intern("<command-line>");
    let mut loc = Location::new(Rc::clone(&files));
    loc.file_index = file_index;

    let text = match def.split_once('=') {
        Some((name_part, value)) => format!("{} {}", name_part, value),
        None => format!("{} 1", def),
    };

    let mut stream = BufferStream::from_decoded(&text);
    let (tokens, diags) = tokenize(&mut stream, arena, Rc::clone(&files), file_index)?;
    let m = Macro::parse_define(&tokens, loc)?;
    macros.insert(m);
    Ok(diags)
}

pub fn default_resolver_path_service() -> impl PathService {
    default_path_service()
}
