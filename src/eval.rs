//! Component H — Expression Evaluator: `#if`/`#elif` constant-expression
//! evaluation. Runs `defined`, `__has_include`, macro expansion, character
//! literals and `sizeof` in that order, then folds what's left with
//! [`crate::tokenlist::TokenList::const_fold`].

use std::cell::RefCell;
use std::rc::Rc;

use crate::diagnostics::{Diagnostic, MacroUsage};
use crate::error::PpError;
use crate::location::{FileIndex, FileTable};
use crate::macromap::{replace_defined, MacroMap};
use crate::tokenlist::{Arena, TokenList};

/// `sizeof(char)` and friends inside `#if` — spec.md says "at least this
/// set"; widths fixed to a 64-bit host (documented as an Open Question
/// decision in DESIGN.md).
pub fn size_of_type(name: &str) -> Option<u64> {
    let trimmed = name.trim();
    if let Some(base) = trimmed.strip_suffix('*') {
        return size_of_type(base.trim()).map(|_| 8).or(Some(8));
    }
    match trimmed {
        "char" | "signed char" | "unsigned char" | "_Bool" | "bool" => Some(1),
        "short" | "short int" | "unsigned short" => Some(2),
        "int" | "unsigned int" | "signed" | "unsigned" => Some(4),
        "long" | "long int" | "unsigned long" => Some(8),
        "long long" | "long long int" | "unsigned long long" => Some(8),
        "float" => Some(4),
        "double" => Some(8),
        "long double" => Some(16),
        _ => None,
    }
}

/// Converts a character-literal token's text (`'a'`, `'\n'`, `'\x41'`, a
/// multi-char literal) to the integer value it has inside a constant
/// expression, per spec.md §4.H.
pub fn character_literal_to_i64(text: &str) -> Result<i64, PpError> {
    let inner = text.trim_start_matches(['u', 'U', 'L']).trim_matches('\'');
    let mut chars = inner.chars().peekable();
    let mut value: i64 = 0;
    let mut any = false;
    while let Some(c) = chars.next() {
        any = true;
        let byte = if c == '\\' {
            match chars.next() {
                Some('n') => b'\n' as i64,
                Some('t') => b'\t' as i64,
                Some('r') => b'\r' as i64,
                Some('0') => 0,
                Some('a') => 7,
                Some('b') => 8,
                Some('f') => 12,
                Some('v') => 11,
                Some('\\') => b'\\' as i64,
                Some('\'') => b'\'' as i64,
                Some('"') => b'"' as i64,
                Some('?') => b'?' as i64,
                Some('x') => {
                    let mut hex = String::new();
                    while let Some(&h) = chars.peek() {
                        if h.is_ascii_hexdigit() {
                            hex.push(h);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    i64::from_str_radix(&hex, 16).unwrap_or(0)
                }
                Some(other) => other as i64,
                None => 0,
            }
        } else {
            c as i64
        };
        value = (value << 8) | (byte & 0xFF);
    }
    if !any {
        return Err(PpError::new(
            crate::diagnostics::DiagnosticKind::SyntaxError,
            None,
            "empty character literal".to_string(),
        ));
    }
    Ok(value)
}

fn replace_character_literals(list: &mut TokenList) -> Result<(), PpError> {
    let mut id = list.front();
    while let Some(cur) = id {
        let text = list.str_at(cur);
        if text.contains('\'') {
            let value = character_literal_to_i64(&text)?;
            list.with_token_mut(cur, |t| t.set_str(value.to_string()));
        }
        id = list.next_of(cur);
    }
    Ok(())
}

fn replace_sizeof(list: &mut TokenList) -> Result<(), PpError> {
    let mut id = list.front();
    while let Some(cur) = id {
        if list.str_at(cur) == "sizeof" {
            if let Some(open) = list.next_of(cur) {
                if list.str_at(open) == "(" {
                    let mut name = String::new();
                    let mut inner = list.next_of(open);
                    let mut close = None;
                    while let Some(i) = inner {
                        let t = list.str_at(i);
                        if t == ")" {
                            close = Some(i);
                            break;
                        }
                        if !name.is_empty() {
                            name.push(' ');
                        }
                        name.push_str(&t);
                        inner = list.next_of(i);
                    }
                    if let (Some(close), Some(size)) = (close, size_of_type(&name)) {
                        list.with_token_mut(cur, |t| t.set_str(size.to_string()));
                        let mut d = list.next_of(cur);
                        while let Some(n) = d {
                            let next = list.next_of(n);
                            list.delete(n);
                            if n == close {
                                break;
                            }
                            d = next;
                        }
                    }
                }
            }
        }
        id = list.next_of(cur);
    }
    Ok(())
}

/// The C++ alternative operator keywords (spec.md §4.H step 4): these name
/// tokens stand for the symbolic operator below, not for an unresolved
/// identifier, and must survive to `const_fold` as that operator rather
/// than being zeroed.
const ALTERNATIVE_OPERATORS: &[(&str, &str)] =
    &[("and", "&&"), ("or", "||"), ("bitand", "&"), ("bitor", "|"), ("not", "!"), ("not_eq", "!="), ("xor", "^"), ("compl", "~")];

/// Any identifier surviving macro substitution (not a keyword the folder
/// understands) evaluates to `0` inside `#if`, per the C standard's rule
/// for unresolved identifiers in constant expressions.
fn zero_remaining_identifiers(list: &mut TokenList) {
    let mut id = list.front();
    while let Some(cur) = id {
        if list.with_token(cur, |t| t.is_name()) {
            let text = list.str_at(cur);
            if let Some(&(_, op)) = ALTERNATIVE_OPERATORS.iter().find(|(name, _)| *name == text) {
                list.with_token_mut(cur, |t| t.set_str(op.to_string()));
            } else {
                let value = if text == "true" { "1" } else { "0" };
                list.with_token_mut(cur, |t| t.set_str(value.to_string()));
            }
        }
        id = list.next_of(cur);
    }
}

/// Rewrites `__has_include(<path>)` / `__has_include("path")` to `1`/`0`
/// using the host-supplied resolver predicate, before ordinary macro
/// expansion runs (so a macro can't hide the directive from us).
pub fn replace_has_include(list: &mut TokenList, resolve: &dyn Fn(&str, bool) -> bool) {
    let mut id = list.front();
    while let Some(cur) = id {
        if list.str_at(cur) != "__has_include" {
            id = list.next_of(cur);
            continue;
        }
        let open = match list.next_of(cur) {
            Some(o) if list.str_at(o) == "(" => o,
            _ => {
                id = list.next_of(cur);
                continue;
            }
        };
        let header = match list.next_of(open) {
            Some(h) => h,
            None => {
                id = list.next_of(cur);
                continue;
            }
        };
        let text = list.str_at(header);
        let (path, quoted) = if let Some(p) = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
            (p.to_string(), true)
        } else {
            (text.trim_start_matches('<').trim_end_matches('>').to_string(), false)
        };
        let found = resolve(&path, quoted);
        list.with_token_mut(cur, |t| t.set_str(if found { "1" } else { "0" }.to_string()));

        let mut d = list.next_of(cur);
        loop {
            let cur_del = match d {
                Some(c) => c,
                None => break,
            };
            let next = list.next_of(cur_del);
            let was_close = list.str_at(cur_del) == ")";
            list.delete(cur_del);
            if was_close {
                break;
            }
            d = next;
        }
        id = list.next_of(cur);
    }
}

/// Evaluates a `#if`/`#elif` expression list to a boolean, per spec.md
/// §4.H's preparation-pass order.
#[allow(clippy::too_many_arguments)]
pub fn evaluate(
    expr: &mut TokenList,
    macros: &MacroMap,
    arena: Rc<RefCell<Arena>>,
    files: Rc<FileTable>,
    file_index: FileIndex,
    std_cplusplus: Option<&str>,
    std_c: Option<&str>,
    has_include: &dyn Fn(&str, bool) -> bool,
    has_include_enabled: bool,
    usages: &mut Vec<MacroUsage>,
    warnings: &mut Vec<Diagnostic>,
) -> Result<bool, PpError> {
    if has_include_enabled {
        replace_has_include(expr, has_include);
    }
    replace_defined(expr, macros);
    macros.expand_all(expr, arena, files, file_index, std_cplusplus, std_c, usages, warnings)?;
    replace_character_literals(expr)?;
    replace_sizeof(expr)?;
    zero_remaining_identifiers(expr);
    expr.combine_operators();

    if expr.is_empty() {
        return Err(PpError::new(
            crate::diagnostics::DiagnosticKind::SyntaxError,
            None,
            "empty expression in #if/#elif".to_string(),
        ));
    }

    let value = expr.const_fold()?;
    Ok(value != 0)
}
