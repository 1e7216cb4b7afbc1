//! Component G — MacroMap: the set of currently-defined macros, plus the
//! scan-and-substitute driver that walks a [`TokenList`] looking for macro
//! uses and replaces them in place.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::diagnostics::{Diagnostic, DiagnosticKind, MacroUsage};
use crate::error::PpError;
use crate::location::{FileIndex, FileTable, Location};
use crate::macros::{expand_predefined, Macro};
use crate::token::Token;
use crate::tokenlist::{Arena, TokenId, TokenList};

#[derive(Default)]
pub struct MacroMap {
    macros: HashMap<Rc<str>, Macro>,
    counter: RefCell<u64>,
}

impl MacroMap {
    pub fn new() -> MacroMap {
        MacroMap::default()
    }

    pub fn find(&self, name: &str) -> Option<&Macro> {
        self.macros.get(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn insert(&mut self, m: Macro) {
        self.macros.insert(Rc::clone(&m.name), m);
    }

    pub fn erase(&mut self, name: &str) {
        self.macros.remove(name);
    }

    /// Repeatedly scans `list` for macro uses and substitutes them in
    /// place, pre-expanding function-like arguments first, until no macro
    /// name remains unexpanded (or an unresolvable argument list aborts the
    /// whole directive with a [`PpError`]).
    pub fn expand_all(
        &self,
        list: &mut TokenList,
        arena: Rc<RefCell<Arena>>,
        files: Rc<FileTable>,
        file_index: FileIndex,
        std_cplusplus: Option<&str>,
        std_c: Option<&str>,
        usages: &mut Vec<MacroUsage>,
        warnings: &mut Vec<Diagnostic>,
    ) -> Result<(), PpError> {
        let active = HashSet::new();
        self.expand_range(list, arena, files, file_index, std_cplusplus, std_c, usages, warnings, &active)
    }

    fn expand_range(
        &self,
        list: &mut TokenList,
        arena: Rc<RefCell<Arena>>,
        files: Rc<FileTable>,
        file_index: FileIndex,
        std_cplusplus: Option<&str>,
        std_c: Option<&str>,
        usages: &mut Vec<MacroUsage>,
        warnings: &mut Vec<Diagnostic>,
        active: &HashSet<Rc<str>>,
    ) -> Result<(), PpError> {
        let mut id = list.front();
        while let Some(cur) = id {
            let (text, is_name) = list.with_token(cur, |t| (t.str().to_string(), t.is_name()));

            if !is_name {
                id = list.next_of(cur);
                continue;
            }

            // Hygiene: a token produced by expanding macro M is never
            // re-expanded as a use of M, tracked by name rather than by
            // macro-object identity (spec.md §9).
            let blocked = active.contains(text.as_str()) || list.with_token(cur, |t| t.macro_origin.iter().any(|o| active.contains(o)));
            if blocked {
                id = list.next_of(cur);
                continue;
            }

            if let Some(predef) = expand_predefined(&text, &list.location_at(cur), self.counter_cell(), file_index, &files, std_cplusplus, std_c) {
                list.with_token_mut(cur, |t| t.set_str(predef));
                id = list.next_of(cur);
                continue;
            }

            let m = match self.find(&text) {
                Some(m) => m.clone(),
                None => {
                    id = list.next_of(cur);
                    continue;
                }
            };

            let call_loc = list.location_at(cur);

            if m.function_like {
                let open = list.next_of(cur);
                let opens_call = open.map_or(false, |o| list.str_at(o) == "(");
                if !opens_call {
                    id = list.next_of(cur);
                    continue;
                }
                let (args, close_id) = match self.collect_arguments(list, open.unwrap()) {
                    Some(v) => v,
                    None => {
                        warnings.push(Diagnostic::new(
                            DiagnosticKind::SyntaxError,
                            Some(call_loc.clone()),
                            format!("unterminated argument list invoking macro '{}'", m.name),
                        ));
                        id = list.next_of(cur);
                        continue;
                    }
                };

                if !m.variadic && args.len() != m.params.len() && !(args.len() == 1 && m.params.is_empty() && args[0].is_empty()) {
                    warnings.push(Diagnostic::new(
                        DiagnosticKind::SyntaxError,
                        Some(call_loc.clone()),
                        format!("macro '{}' invoked with {} argument(s), expected {}", m.name, args.len(), m.params.len()),
                    ));
                    id = list.next_of(cur);
                    continue;
                }

                let mut next_active = active.clone();
                next_active.insert(Rc::clone(&m.name));

                // `#` and `##` need the argument exactly as written; plain
                // substitution needs it macro-expanded. Keep both: clone
                // before expanding in place.
                let raw_args: Vec<TokenList> = args.iter().map(|a| a.clone_into(Rc::clone(&arena), Rc::clone(&files))).collect();
                let mut expanded_args = Vec::with_capacity(args.len());
                for mut arg in args {
                    // Arguments come from the call site, not from `m`'s own
                    // replacement list, so `m.name` isn't blue for them yet:
                    // pre-expand with the incoming `active` set, not
                    // `next_active` (which would wrongly block a recursive
                    // self-reference inside an argument, e.g. `f(f(1))`).
                    self.expand_range(&mut arg, Rc::clone(&arena), Rc::clone(&files), file_index, std_cplusplus, std_c, usages, warnings, active)?;
                    expanded_args.push(arg);
                }

                let mut replacement = m.expand(&raw_args, &expanded_args, &call_loc, Rc::clone(&arena), Rc::clone(&files), &next_active)?;
                self.expand_range(&mut replacement, Rc::clone(&arena), Rc::clone(&files), file_index, std_cplusplus, std_c, usages, warnings, &next_active)?;

                usages.push(MacroUsage { macro_name: m.name.to_string(), use_location: call_loc, macro_location: m.location.clone() });

                let resume = list.next_of(close_id);
                self.splice_replacement(list, cur, close_id, replacement);
                id = resume;
            } else {
                let mut next_active = active.clone();
                next_active.insert(Rc::clone(&m.name));
                let mut replacement = m.expand(&[], &[], &call_loc, Rc::clone(&arena), Rc::clone(&files), &next_active)?;
                self.expand_range(&mut replacement, Rc::clone(&arena), Rc::clone(&files), file_index, std_cplusplus, std_c, usages, warnings, &next_active)?;

                usages.push(MacroUsage { macro_name: m.name.to_string(), use_location: call_loc, macro_location: m.location.clone() });

                let resume = list.next_of(cur);
                self.splice_replacement(list, cur, cur, replacement);
                id = resume;
            }
        }
        Ok(())
    }

    /// Collects the comma-separated, paren-balanced argument list starting
    /// at the `(` token `open` (inclusive), returning each argument as its
    /// own `TokenList` (empty for `()`), and the id of the matching `)`.
    fn collect_arguments(&self, list: &mut TokenList, open: TokenId) -> Option<(Vec<TokenList>, TokenId)> {
        let mut depth = 0i32;
        let mut close = None;
        let mut commas = Vec::new();
        let mut id = Some(open);
        while let Some(cur) = id {
            let text = list.str_at(cur);
            if text == "(" {
                depth += 1;
            } else if text == ")" {
                depth -= 1;
                if depth == 0 {
                    close = Some(cur);
                    break;
                }
            } else if text == "," && depth == 1 {
                commas.push(cur);
            }
            id = list.next_of(cur);
        }
        let close = close?;

        let mut args = Vec::new();
        let mut bounds = Vec::new();
        let mut start = list.next_of(open);
        for &c in &commas {
            bounds.push((start, list.prev_of(c)));
            start = list.next_of(c);
        }
        bounds.push((start, list.prev_of(close)));

        for (from, to) in bounds {
            match (from, to) {
                (Some(f), Some(t)) => args.push(list.take_range(f, t)),
                _ => args.push(TokenList::new(list.arena(), Rc::clone(&list.files))),
            }
        }

        for &c in &commas {
            list.delete(c);
        }

        Some((args, close))
    }

    /// Removes `[from, to]` (the macro name, or name-through-close-paren
    /// for a function-like call) and splices `replacement` into its place.
    fn splice_replacement(&self, list: &mut TokenList, from: TokenId, to: TokenId, replacement: TokenList) {
        let after = list.next_of(to);
        let mut cursor = Some(from);
        while let Some(cur) = cursor {
            let next = list.next_of(cur);
            list.delete(cur);
            if cur == to {
                break;
            }
            cursor = next;
        }
        list.splice_before(after, replacement);
    }

    fn counter_cell(&self) -> &RefCell<u64> {
        &self.counter
    }
}

/// `defined X` / `defined(X)` evaluation for `#if`/`#elif`, kept here
/// rather than in `eval.rs` since it needs direct map access and must run
/// *before* ordinary macro substitution touches the expression.
pub fn replace_defined(list: &mut TokenList, map: &MacroMap) {
    let mut id = list.front();
    while let Some(cur) = id {
        if list.str_at(cur) != "defined" {
            id = list.next_of(cur);
            continue;
        }
        let next = list.next_of(cur);
        let (name_id, close_paren) = match next {
            Some(n) if list.str_at(n) == "(" => {
                let inner = list.next_of(n);
                (inner, list.next_of(inner.unwrap_or(n)))
            }
            Some(n) => (Some(n), None),
            None => (None, None),
        };
        let name_id = match name_id {
            Some(n) => n,
            None => {
                id = list.next_of(cur);
                continue;
            }
        };
        let defined = map.is_defined(&list.str_at(name_id));
        list.with_token_mut(cur, |t| t.set_str(if defined { "1" } else { "0" }.to_string()));

        let end = close_paren.unwrap_or(list.next_of(name_id).unwrap_or(name_id));
        let mut to_delete = list.next_of(cur);
        while let Some(d) = to_delete {
            let next = list.next_of(d);
            list.delete(d);
            if d == end || d == name_id && close_paren.is_none() {
                break;
            }
            to_delete = next;
        }
        id = list.next_of(cur);
    }
}
