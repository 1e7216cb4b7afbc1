//! Component F — Macro: parsing `#define`, function-like/variadic argument
//! binding, `#`/`##`, and expansion with name-keyed hygiene.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::diagnostics::DiagnosticKind;
use crate::error::PpError;
use crate::location::{FileIndex, FileTable, Location};
use crate::token::Token;
use crate::tokenlist::{Arena, TokenId, TokenList};

#[derive(Clone)]
pub struct Macro {
    pub name: Rc<str>,
    pub function_like: bool,
    pub variadic: bool,
    pub params: Vec<Rc<str>>,
    pub replacement: Vec<Token>,
    pub location: Location,
}

impl Macro {
    /// Parses the tokens following `#define` (name, optional parameter
    /// list, replacement list) into a `Macro`. `rest` must not include the
    /// `#define` tokens themselves.
    pub fn parse_define(rest: &TokenList, location: Location) -> Result<Macro, PpError> {
        let name_id = rest.front().ok_or_else(|| define_error(&location, "#define with no macro name"))?;
        let name_text = rest.str_at(name_id);
        if !rest.with_token(name_id, |t| t.is_name()) {
            return Err(define_error(&location, &format!("'{}' is not a valid macro name", name_text)));
        }
        let name: Rc<str> = Rc::from(name_text.as_str());

        let mut cursor = rest.next_of(name_id);
        let mut params = Vec::new();
        let mut variadic = false;
        let function_like = match cursor {
            Some(id) if rest.str_at(id) == "(" && !rest.with_token(id, |t| t.whitespace_ahead) => {
                cursor = rest.next_of(id);
                loop {
                    let id = match cursor {
                        Some(id) => id,
                        None => return Err(define_error(&location, "unterminated macro parameter list")),
                    };
                    let text = rest.str_at(id);
                    if text == ")" {
                        cursor = rest.next_of(id);
                        break;
                    }
                    if text == "," {
                        cursor = rest.next_of(id);
                        continue;
                    }
                    if text == "..." {
                        variadic = true;
                        cursor = rest.next_of(id);
                        continue;
                    }
                    if !rest.with_token(id, |t| t.is_name()) {
                        return Err(define_error(&location, "malformed macro parameter list"));
                    }
                    params.push(Rc::from(text.as_str()));
                    cursor = rest.next_of(id);
                }
                true
            }
            _ => false,
        };

        if variadic {
            params.push(Rc::from("__VA_ARGS__"));
        }

        let mut replacement = Vec::new();
        let mut id = cursor;
        let mut first = true;
        while let Some(cur) = id {
            rest.with_token(cur, |t| {
                let mut tok = t.clone();
                if first {
                    tok.whitespace_ahead = false;
                }
                replacement.push(tok);
            });
            first = false;
            id = rest.next_of(cur);
        }

        if let Some(first_tok) = replacement.first() {
            if first_tok.str() == "##" || first_tok.str() == "#" && function_like == false {
                return Err(define_error(&location, "'##' cannot appear at the start of a macro replacement"));
            }
        }
        if let Some(last_tok) = replacement.last() {
            if last_tok.str() == "##" {
                return Err(define_error(&location, "'##' cannot appear at the end of a macro replacement"));
            }
        }

        Ok(Macro { name, function_like, variadic, params, replacement, location })
    }

    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.as_ref() == name)
    }

    /// Expands one use of this macro. `raw_args` holds each actual argument
    /// exactly as written (used by `#` stringizing and as the operand of
    /// `##`, both of which must not see macro-expanded argument text);
    /// `expanded_args` holds the same arguments after the caller has
    /// pre-expanded them (used by plain, non-`#`/`##`-adjacent parameter
    /// substitution). Both are empty for an object-like macro. `active` is
    /// the set of macro names currently being expanded on this call stack,
    /// used to suppress self-recursive re-expansion (hygiene, per spec.md
    /// §9 — name-keyed, not pointer-keyed).
    pub fn expand(
        &self,
        raw_args: &[TokenList],
        expanded_args: &[TokenList],
        call_loc: &Location,
        arena: Rc<RefCell<Arena>>,
        files: Rc<FileTable>,
        active: &HashSet<Rc<str>>,
    ) -> Result<TokenList, PpError> {
        let mut out = TokenList::new(Rc::clone(&arena), Rc::clone(&files));
        let mut i = 0usize;
        while i < self.replacement.len() {
            let tok = &self.replacement[i];

            if tok.str() == "#" && self.function_like {
                let param_tok = self
                    .replacement
                    .get(i + 1)
                    .ok_or_else(|| define_error(call_loc, "'#' not followed by a macro parameter"))?;
                let idx = self
                    .param_index(param_tok.str())
                    .ok_or_else(|| define_error(call_loc, "'#' not followed by a macro parameter"))?;
                let text = stringize(raw_args.get(idx));
                let mut t = Token::new(text, call_loc.clone());
                t.whitespace_ahead = tok.whitespace_ahead;
                t.add_macro_origin(Rc::clone(&self.name));
                out.push_back(t);
                i += 2;
                continue;
            }

            if let Some(idx) = self.param_index(tok.str()) {
                let followed_by_paste = self.replacement.get(i + 1).map_or(false, |n| n.str() == "##");
                let preceded_by_paste = i > 0 && self.replacement[i - 1].str() == "##";

                if preceded_by_paste || followed_by_paste {
                    append_raw(&mut out, raw_args.get(idx), tok.whitespace_ahead);
                } else {
                    append_expanded(&mut out, expanded_args.get(idx), tok.whitespace_ahead, call_loc, Rc::clone(&arena), Rc::clone(&files), active)?;
                }
                i += 1;
                continue;
            }

            if tok.str() == "##" {
                // GNU `, ## __VA_ARGS__` idiom: when the right-hand operand is
                // the trailing variadic parameter, this is not a textual paste
                // but comma elision — the preceding comma survives only when
                // the caller actually supplied variadic arguments.
                let rhs_is_trailing_variadic = self.variadic
                    && self.replacement.get(i + 1).map_or(false, |rhs| self.param_index(rhs.str()) == Some(self.params.len() - 1));
                let lhs_is_comma = out.back().map_or(false, |last| out.str_at(last) == ",");
                if rhs_is_trailing_variadic && lhs_is_comma {
                    let idx = self.params.len() - 1;
                    if raw_args.get(idx).map_or(true, |a| a.is_empty()) {
                        let last = out.back().unwrap();
                        out.delete(last);
                    } else {
                        append_expanded(&mut out, expanded_args.get(idx), false, call_loc, Rc::clone(&arena), Rc::clone(&files), active)?;
                    }
                    i += 2;
                    continue;
                }

                paste_onto(&mut out, &self.replacement, &mut i, &self.params, raw_args, call_loc)?;
                continue;
            }

            let mut t = tok.clone();
            t.location = call_loc.clone();
            t.add_macro_origin(Rc::clone(&self.name));
            out.push_back(t);
            i += 1;
        }
        Ok(out)
    }
}

fn stringize(arg: Option<&TokenList>) -> String {
    let mut s = String::from("\"");
    if let Some(arg) = arg {
        let mut first = true;
        for id in arg.iter() {
            let (text, ws) = arg.with_token(id, |t| (t.str().to_string(), t.whitespace_ahead));
            if !first && ws {
                s.push(' ');
            }
            first = false;
            if text.contains('"') || text.contains('\'') {
                for c in text.chars() {
                    if c == '"' || c == '\\' {
                        s.push('\\');
                    }
                    s.push(c);
                }
            } else {
                s.push_str(&text);
            }
        }
    }
    s.push('"');
    s
}

fn append_raw(out: &mut TokenList, arg: Option<&TokenList>, ws: bool) {
    let arg = match arg {
        Some(a) => a,
        None => return,
    };
    let mut first = true;
    for id in arg.iter() {
        let mut t = arg.with_token(id, |t| t.clone());
        if first {
            t.whitespace_ahead = ws;
        }
        first = false;
        out.push_back(t);
    }
}

fn append_expanded(
    out: &mut TokenList,
    arg: Option<&TokenList>,
    ws: bool,
    call_loc: &Location,
    arena: Rc<RefCell<Arena>>,
    files: Rc<FileTable>,
    active: &HashSet<Rc<str>>,
) -> Result<(), PpError> {
    let arg = match arg {
        Some(a) => a,
        None => return Ok(()),
    };
    let _ = (call_loc, arena, files, active);
    // Argument pre-expansion is driven by the macro map in `macromap.rs`
    // (it alone knows which macros are currently defined); here we only
    // splice the already-expanded argument list in, preserving the leading
    // whitespace flag of the parameter token it replaces.
    append_raw(out, Some(arg), ws);
    Ok(())
}

/// Handles one `lhs ## rhs` in a replacement list: `rhs` is looked up in
/// `params` directly (not via `Macro::param_index`, since at this point we
/// only have the raw replacement slice) so that a parameter on the
/// right-hand side of `##` pastes its *unexpanded* argument text, per the
/// rule that `##` operands never expand before pasting.
fn paste_onto(
    out: &mut TokenList,
    replacement: &[Token],
    i: &mut usize,
    params: &[Rc<str>],
    args: &[TokenList],
    call_loc: &Location,
) -> Result<(), PpError> {
    let rhs = replacement.get(*i + 1).ok_or_else(|| define_error(call_loc, "'##' has no right-hand operand"))?;
    let lhs_id = out.back().ok_or_else(|| define_error(call_loc, "'##' has no left-hand operand"))?;
    let lhs_text = out.str_at(lhs_id);

    let rhs_text = match params.iter().position(|p| p.as_ref() == rhs.str()) {
        Some(idx) => args.get(idx).map(|a| a.stringify_raw()).unwrap_or_default(),
        None => rhs.str().to_string(),
    };

    out.with_token_mut(lhs_id, |t| t.set_str(format!("{}{}", lhs_text, rhs_text)));
    *i += 2;
    Ok(())
}

fn define_error(loc: &Location, message: &str) -> PpError {
    PpError::new(DiagnosticKind::SyntaxError, Some(loc.clone()), message.to_string())
}

/// Predefined, non-user-definable macros (spec.md §4.F): computed on use
/// rather than stored in the macro map.
pub fn expand_predefined(
    name: &str,
    call_loc: &Location,
    counter: &RefCell<u64>,
    file_index: FileIndex,
    files: &FileTable,
    std_cplusplus: Option<&str>,
    std_c: Option<&str>,
) -> Option<String> {
    match name {
        "__FILE__" => Some(format!("\"{}\"", files.name(file_index))),
        "__LINE__" => Some(call_loc.line.to_string()),
        "__COUNTER__" => {
            let mut c = counter.borrow_mut();
            let v = *c;
            *c += 1;
            Some(v.to_string())
        }
        "__DATE__" => Some(format!("\"{}\"", time::now().strftime("%b %e %Y").unwrap())),
        "__TIME__" => Some(format!("\"{}\"", time::now().strftime("%H:%M:%S").unwrap())),
        "__cplusplus" => std_cplusplus.map(|s| s.to_string()),
        "__STDC_VERSION__" => std_c.map(|s| s.to_string()),
        _ => None,
    }
}

impl TokenList {
    /// Raw (unexpanded) text of the whole list, space-joined per
    /// `whitespace_ahead`, with no `#line` markers — used when `##` pastes
    /// onto a macro parameter, which must not expand before pasting.
    pub fn stringify_raw(&self) -> String {
        let mut s = String::new();
        let mut first = true;
        for id in self.iter() {
            let (text, ws) = self.with_token(id, |t| (t.str().to_string(), t.whitespace_ahead));
            if !first && ws {
                s.push(' ');
            }
            first = false;
            s.push_str(&text);
        }
        s
    }
}
