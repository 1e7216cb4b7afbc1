//! Component D — TokenList: the arena-backed doubly-linked token list
//! described in spec.md §9's design note. Every `TokenList` created during
//! one `Engine::preprocess` call shares one [`Arena`] via `Rc<RefCell<_>>`;
//! deleting a token returns its slot to a free list rather than shifting
//! the rest of the list.

use std::cell::RefCell;
use std::rc::Rc;

use crate::location::{FileTable, Location};
use crate::token::Token;

/// Index into an [`Arena`]. Never reused while the arena that issued it is
/// still alive — slots only get reused across distinct `Engine` runs, each
/// of which starts with a fresh arena.
pub type TokenId = u32;

struct Slot {
    token: Token,
    prev: Option<TokenId>,
    next: Option<TokenId>,
}

#[derive(Default)]
pub struct Arena {
    slots: Vec<Option<Slot>>,
    free: Vec<TokenId>,
}

impl Arena {
    pub fn new() -> Rc<RefCell<Arena>> {
        Rc::new(RefCell::new(Arena::default()))
    }

    fn alloc(&mut self, token: Token) -> TokenId {
        let slot = Slot { token, prev: None, next: None };
        if let Some(id) = self.free.pop() {
            self.slots[id as usize] = Some(slot);
            id
        } else {
            self.slots.push(Some(slot));
            (self.slots.len() - 1) as TokenId
        }
    }

    fn dealloc(&mut self, id: TokenId) {
        self.slots[id as usize] = None;
        self.free.push(id);
    }

    fn slot(&self, id: TokenId) -> &Slot {
        self.slots[id as usize].as_ref().expect("dangling TokenId")
    }

    fn slot_mut(&mut self, id: TokenId) -> &mut Slot {
        self.slots[id as usize].as_mut().expect("dangling TokenId")
    }
}

/// A doubly-linked run of tokens into one shared [`Arena`]. Cheap to clone
/// the *handle* (`Rc::clone` on the arena); splicing tokens between lists
/// only rewrites a handful of `prev`/`next` links, never copies token data.
pub struct TokenList {
    arena: Rc<RefCell<Arena>>,
    front: Option<TokenId>,
    back: Option<TokenId>,
    pub files: Rc<FileTable>,
}

impl TokenList {
    pub fn new(arena: Rc<RefCell<Arena>>, files: Rc<FileTable>) -> TokenList {
        TokenList { arena, front: None, back: None, files }
    }

    pub fn arena(&self) -> Rc<RefCell<Arena>> {
        Rc::clone(&self.arena)
    }

    pub fn is_empty(&self) -> bool {
        self.front.is_none()
    }

    pub fn front(&self) -> Option<TokenId> {
        self.front
    }

    pub fn back(&self) -> Option<TokenId> {
        self.back
    }

    pub fn next_of(&self, id: TokenId) -> Option<TokenId> {
        self.arena.borrow().slot(id).next
    }

    pub fn prev_of(&self, id: TokenId) -> Option<TokenId> {
        self.arena.borrow().slot(id).prev
    }

    pub fn with_token<R>(&self, id: TokenId, f: impl FnOnce(&Token) -> R) -> R {
        f(&self.arena.borrow().slot(id).token)
    }

    pub fn with_token_mut<R>(&self, id: TokenId, f: impl FnOnce(&mut Token) -> R) -> R {
        f(&mut self.arena.borrow_mut().slot_mut(id).token)
    }

    pub fn str_at(&self, id: TokenId) -> String {
        self.with_token(id, |t| t.str().to_string())
    }

    pub fn location_at(&self, id: TokenId) -> Location {
        self.with_token(id, |t| t.location.clone())
    }

    pub fn push_back(&mut self, token: Token) -> TokenId {
        let id = self.arena.borrow_mut().alloc(token);
        self.link_back(id);
        id
    }

    fn link_back(&mut self, id: TokenId) {
        let mut arena = self.arena.borrow_mut();
        arena.slot_mut(id).prev = self.back;
        arena.slot_mut(id).next = None;
        if let Some(back) = self.back {
            arena.slot_mut(back).next = Some(id);
        } else {
            self.front = Some(id);
        }
        drop(arena);
        self.back = Some(id);
    }

    /// Inserts a freshly-allocated token right after `after`, used by `##`
    /// pasting and `#` stringizing which both replace one or more tokens
    /// with exactly one new one.
    pub fn insert_after(&mut self, after: TokenId, token: Token) -> TokenId {
        let id = self.arena.borrow_mut().alloc(token);
        let next = {
            let mut arena = self.arena.borrow_mut();
            let next = arena.slot(after).next;
            arena.slot_mut(after).next = Some(id);
            arena.slot_mut(id).prev = Some(after);
            arena.slot_mut(id).next = next;
            next
        };
        if let Some(next) = next {
            self.arena.borrow_mut().slot_mut(next).prev = Some(id);
        } else {
            self.back = Some(id);
        }
        id
    }

    /// Unlinks and frees `id`, returning the token that followed it (if
    /// any) so callers can keep walking without re-deriving a cursor.
    pub fn delete(&mut self, id: TokenId) -> Option<TokenId> {
        let (prev, next) = {
            let arena = self.arena.borrow();
            let slot = arena.slot(id);
            (slot.prev, slot.next)
        };
        {
            let mut arena = self.arena.borrow_mut();
            match prev {
                Some(p) => arena.slot_mut(p).next = next,
                None => {}
            }
            match next {
                Some(n) => arena.slot_mut(n).prev = prev,
                None => {}
            }
        }
        if self.front == Some(id) {
            self.front = next;
        }
        if self.back == Some(id) {
            self.back = prev;
        }
        self.arena.borrow_mut().dealloc(id);
        next
    }

    pub fn clear(&mut self) {
        let mut cursor = self.front;
        while let Some(id) = cursor {
            let next = self.arena.borrow().slot(id).next;
            self.arena.borrow_mut().dealloc(id);
            cursor = next;
        }
        self.front = None;
        self.back = None;
    }

    /// Splices `[from, to]` (inclusive) out of this list into a brand-new
    /// one sharing the same arena — used to lift macro arguments and
    /// `#if`/`#elif` expressions out of the main token stream without
    /// copying token data.
    pub fn take_range(&mut self, from: TokenId, to: TokenId) -> TokenList {
        let before = self.arena.borrow().slot(from).prev;
        let after = self.arena.borrow().slot(to).next;

        {
            let mut arena = self.arena.borrow_mut();
            if let Some(b) = before {
                arena.slot_mut(b).next = after;
            }
            if let Some(a) = after {
                arena.slot_mut(a).prev = before;
            }
            arena.slot_mut(from).prev = None;
            arena.slot_mut(to).next = None;
        }

        if self.front == Some(from) {
            self.front = after;
        }
        if self.back == Some(to) {
            self.back = before;
        }

        TokenList { arena: Rc::clone(&self.arena), front: Some(from), back: Some(to), files: Rc::clone(&self.files) }
    }

    pub fn iter(&self) -> TokenIter {
        TokenIter { arena: Rc::clone(&self.arena), cursor: self.front }
    }

    /// Concatenates token text with single spaces wherever
    /// `whitespace_ahead` says so, and prefixes a `#line` directive whenever
    /// the running line/file differs from the previous token's, per
    /// spec.md's "primary serialization contract" note.
    pub fn stringify(&self) -> String {
        let mut out = String::new();
        let mut last_loc: Option<Location> = None;
        for id in self.iter() {
            let (text, loc, ws) = self.with_token(id, |t| (t.str().to_string(), t.location.clone(), t.whitespace_ahead));
            match &last_loc {
                Some(prev) if prev.sameline(&loc) => {
                    if ws {
                        out.push(' ');
                    }
                }
                Some(prev) if prev.file_index == loc.file_index => {
                    let advance = loc.line.saturating_sub(prev.line).max(1);
                    for _ in 0..advance {
                        out.push('\n');
                    }
                }
                Some(_) => out.push_str(&line_directive(&loc)),
                None => {}
            }
            out.push_str(&text);
            last_loc = Some(loc);
        }
        out
    }

    /// Fuses adjacent single-character operator tokens into the compound
    /// operators the raw reader deliberately leaves apart (`.` `.` `.` into
    /// `...`, `=` `=` into `==`, and so on), skipping pairs that straddle
    /// whitespace. A small paren-depth watch suppresses the `&` `=` fusion
    /// while inside what looks like a function-declaration parameter list,
    /// where `T &x` followed by `= default` must not become `T &=x`.
    pub fn combine_operators(&mut self) {
        self.merge_numeric_literals();

        let mut depth = 0i32;
        let mut in_params = false;
        let mut id = self.front;
        while let Some(cur) = id {
            let (text, is_op) = self.with_token(cur, |t| (t.str().to_string(), t.is_op()));
            if text == "(" {
                depth += 1;
            } else if text == ")" {
                depth -= 1;
                in_params = depth == 0;
            }

            if !is_op {
                id = self.next_of(cur);
                continue;
            }

            let next = self.next_of(cur);
            let fused = next.and_then(|n| {
                let (ntext, nws) = self.with_token(n, |t| (t.str().to_string(), t.whitespace_ahead));
                if nws {
                    return None;
                }
                let combo = format!("{}{}", text, ntext);
                if combo == "&=" && in_params {
                    return None;
                }
                if (combo == "++" || combo == "--") && self.adjoins_a_number(cur, n) {
                    return None;
                }
                if KNOWN_OPERATORS.contains(&combo.as_str()) {
                    Some((n, combo))
                } else {
                    None
                }
            });

            if let Some((n, combo)) = fused {
                self.with_token_mut(cur, |t| t.set_str(combo));
                self.delete(n);
                continue;
            }
            id = self.next_of(cur);
        }

        // Second pass: three-character operators built from the two-character ones above.
        let mut id = self.front;
        while let Some(cur) = id {
            let text = self.str_at(cur);
            let next = self.next_of(cur);
            let fused = next.and_then(|n| {
                let (ntext, nws) = self.with_token(n, |t| (t.str().to_string(), t.whitespace_ahead));
                if nws {
                    return None;
                }
                let combo = format!("{}{}", text, ntext);
                if KNOWN_OPERATORS.contains(&combo.as_str()) {
                    Some((n, combo))
                } else {
                    None
                }
            });
            if let Some((n, combo)) = fused {
                self.with_token_mut(cur, |t| t.set_str(combo));
                self.delete(n);
                continue;
            }
            id = self.next_of(cur);
        }
    }

    /// `++`/`--` fuse only when neither adjoining token is a number, so
    /// `1+ +2` (two unary `+`s around a number) doesn't turn into `1` `++`
    /// `2` (spec.md §4.D).
    fn adjoins_a_number(&self, first: TokenId, second: TokenId) -> bool {
        let before_is_num = self.prev_of(first).map_or(false, |p| self.with_token(p, |t| t.is_number()));
        let after_is_num = self.next_of(second).map_or(false, |n| self.with_token(n, |t| t.is_number()));
        before_is_num || after_is_num
    }

    /// Fuses an adjacent number/`.`/exponent-sign run into one literal
    /// token: `.`+digits (a leading-dot float the raw reader's
    /// digit-initial number scan never starts), and a trailing `.` that
    /// follows a bare integer. Also handles the degenerate case of three
    /// bare `.` tokens fusing into `...`, since ordinary `.` `.` `.` never
    /// matches the compound-operator table below.
    fn merge_numeric_literals(&mut self) {
        let mut id = self.front;
        while let Some(cur) = id {
            let starts = self.with_token(cur, |t| t.is_number() || t.str() == ".");
            if !starts {
                id = self.next_of(cur);
                continue;
            }
            loop {
                let next = match self.next_of(cur) {
                    Some(n) => n,
                    None => break,
                };
                let (ntext, nws) = self.with_token(next, |t| (t.str().to_string(), t.whitespace_ahead));
                if nws {
                    break;
                }
                let cur_text = self.str_at(cur);
                let is_exponent_sign = matches!(ntext.as_str(), "+" | "-")
                    && matches!(cur_text.chars().last(), Some('e') | Some('E') | Some('p') | Some('P'));
                let absorbs = ntext == "." || ntext.chars().all(|c| c.is_ascii_digit()) || is_exponent_sign;
                if !absorbs {
                    break;
                }
                let combined = format!("{}{}", cur_text, ntext);
                self.with_token_mut(cur, |t| t.set_str(combined));
                self.delete(next);
            }
            id = self.next_of(cur);
        }
    }

    /// Evaluates this list as a `#if`/`#elif` constant expression: innermost
    /// parentheses fold first (recursively), then each precedence tier runs
    /// left-to-right over the remaining flat list until one number token is
    /// left. Returns that number, or a [`PpError`] for malformed expressions
    /// or division/modulo by zero.
    pub fn const_fold(&mut self) -> Result<i64, crate::error::PpError> {
        self.fold_parens()?;
        fold_unary(self)?;
        fold_binary(self, &["*", "/", "%"])?;
        fold_binary(self, &["+", "-"])?;
        fold_binary(self, &["<<", ">>"])?;
        fold_binary(self, &["<", ">", "<=", ">="])?;
        fold_binary(self, &["==", "!="])?;
        fold_binary(self, &["&"])?;
        fold_binary(self, &["^"])?;
        fold_binary(self, &["|"])?;
        fold_binary(self, &["&&"])?;
        fold_binary(self, &["||"])?;
        fold_ternary(self)?;

        match self.front {
            Some(id) if self.front == self.back => parse_int(&self.str_at(id), &self.location_at(id)),
            _ => Err(syntax_error(self, "could not reduce expression to a single value")),
        }
    }

    fn fold_parens(&mut self) -> Result<(), crate::error::PpError> {
        loop {
            let mut open = None;
            let mut close = None;
            let mut id = self.front;
            while let Some(cur) = id {
                let text = self.str_at(cur);
                if text == "(" {
                    open = Some(cur);
                    close = None;
                } else if text == ")" && open.is_some() && close.is_none() {
                    close = Some(cur);
                    break;
                }
                id = self.next_of(cur);
            }
            let (open, close) = match (open, close) {
                (Some(o), Some(c)) => (o, c),
                _ => return Ok(()),
            };

            let before = self.prev_of(open);
            let inner_from = self.next_of(open);
            let inner_to = self.prev_of(close);

            let value = if let (Some(from), Some(to)) = (inner_from, inner_to) {
                let mut inner = self.take_range(from, to);
                inner.const_fold()?
            } else {
                0
            };

            self.delete(open);
            self.delete(close);

            let loc = self.with_token(before.unwrap_or(close), |t| t.location.clone());
            let num = Token::new(value.to_string(), loc);
            match before {
                Some(b) => {
                    self.insert_after(b, num);
                }
                None => {
                    let mut fresh = TokenList::new(self.arena(), Rc::clone(&self.files));
                    fresh.push_back(num);
                    self.splice_front(fresh);
                }
            }
        }
    }

    /// Prepends `other`'s tokens in front of `self`, consuming `other`.
    fn splice_front(&mut self, mut other: TokenList) {
        if other.is_empty() {
            return;
        }
        if let Some(self_front) = self.front {
            let other_back = other.back.unwrap();
            {
                let mut arena = self.arena.borrow_mut();
                arena.slot_mut(other_back).next = Some(self_front);
                arena.slot_mut(self_front).prev = Some(other_back);
            }
            self.front = other.front;
        } else {
            self.front = other.front;
            self.back = other.back;
        }
        other.front = None;
        other.back = None;
    }
}

const KNOWN_OPERATORS: &[&str] = &[
    "==", "!=", "<=", ">=", "&&", "||", "::", "->", "++", "--", "<<", ">>", "+=", "-=", "*=", "/=", "%=", "&=", "|=",
    "^=", "...", "<<=", ">>=",
];

fn fold_unary(list: &mut TokenList) -> Result<(), crate::error::PpError> {
    let mut id = list.front;
    while let Some(cur) = id {
        let text = list.str_at(cur);
        let prev = list.prev_of(cur);
        let starts_unary = matches!(text.as_str(), "-" | "+" | "!" | "~")
            && prev.map_or(true, |p| {
                let t = list.str_at(p);
                t == "(" || is_binary_op(&t)
            });
        if starts_unary {
            if let Some(next) = list.next_of(cur) {
                if list.with_token(next, |t| t.is_number()) {
                    let n = parse_int(&list.str_at(next), &list.location_at(next))?;
                    let value = match text.as_str() {
                        "-" => -n,
                        "+" => n,
                        "!" => i64::from(n == 0),
                        "~" => !n,
                        _ => unreachable!(),
                    };
                    let loc = list.location_at(cur);
                    list.with_token_mut(next, |t| t.set_str(value.to_string()));
                    list.with_token_mut(next, |t| t.location = loc);
                    list.delete(cur);
                    id = Some(next);
                    continue;
                }
            }
        }
        id = list.next_of(cur);
    }
    Ok(())
}

fn is_binary_op(text: &str) -> bool {
    matches!(
        text,
        "+" | "-" | "*" | "/" | "%" | "<<" | ">>" | "<" | ">" | "<=" | ">=" | "==" | "!=" | "&" | "^" | "|" | "&&" | "||" | "?" | ":"
    )
}

fn fold_binary(list: &mut TokenList, ops: &[&str]) -> Result<(), crate::error::PpError> {
    let mut id = list.front;
    while let Some(cur) = id {
        let text = list.str_at(cur);
        if ops.contains(&text.as_str()) {
            let prev = list.prev_of(cur);
            let next = list.next_of(cur);
            if let (Some(p), Some(n)) = (prev, next) {
                if list.with_token(p, |t| t.is_number()) && list.with_token(n, |t| t.is_number()) {
                    let lhs = parse_int(&list.str_at(p), &list.location_at(p))?;
                    let rhs = parse_int(&list.str_at(n), &list.location_at(n))?;
                    let value = apply_binary(&text, lhs, rhs, list, cur)?;
                    list.with_token_mut(p, |t| t.set_str(value.to_string()));
                    list.delete(cur);
                    list.delete(n);
                    id = Some(p);
                    continue;
                }
            }
        }
        id = list.next_of(cur);
    }
    Ok(())
}

fn apply_binary(op: &str, lhs: i64, rhs: i64, list: &TokenList, at: TokenId) -> Result<i64, crate::error::PpError> {
    Ok(match op {
        "*" => lhs.wrapping_mul(rhs),
        "/" => {
            if rhs == 0 {
                return Err(syntax_error(list, "division by zero in #if expression"));
            }
            lhs / rhs
        }
        "%" => {
            if rhs == 0 {
                return Err(syntax_error(list, "modulo by zero in #if expression"));
            }
            lhs % rhs
        }
        "+" => lhs.wrapping_add(rhs),
        "-" => lhs.wrapping_sub(rhs),
        "<<" => lhs.wrapping_shl(rhs as u32),
        ">>" => lhs.wrapping_shr(rhs as u32),
        "<" => i64::from(lhs < rhs),
        ">" => i64::from(lhs > rhs),
        "<=" => i64::from(lhs <= rhs),
        ">=" => i64::from(lhs >= rhs),
        "==" => i64::from(lhs == rhs),
        "!=" => i64::from(lhs != rhs),
        "&" => lhs & rhs,
        "^" => lhs ^ rhs,
        "|" => lhs | rhs,
        "&&" => i64::from(lhs != 0 && rhs != 0),
        "||" => i64::from(lhs != 0 || rhs != 0),
        _ => {
            let _ = at;
            return Err(syntax_error(list, &format!("unsupported operator '{}' in #if expression", op)));
        }
    })
}

fn fold_ternary(list: &mut TokenList) -> Result<(), crate::error::PpError> {
    loop {
        let mut q = None;
        let mut colon = None;
        let mut id = list.front;
        while let Some(cur) = id {
            let text = list.str_at(cur);
            if text == "?" && q.is_none() {
                q = Some(cur);
            } else if text == ":" && q.is_some() && colon.is_none() {
                colon = Some(cur);
                break;
            }
            id = list.next_of(cur);
        }
        let (q, colon) = match (q, colon) {
            (Some(q), Some(c)) => (q, c),
            _ => return Ok(()),
        };

        let cond_id = list.prev_of(q).ok_or_else(|| syntax_error(list, "malformed ?: in #if expression"))?;
        let then_id = list.next_of(q).ok_or_else(|| syntax_error(list, "malformed ?: in #if expression"))?;
        let else_id = list.next_of(colon).ok_or_else(|| syntax_error(list, "malformed ?: in #if expression"))?;

        let cond = parse_int(&list.str_at(cond_id), &list.location_at(cond_id))?;
        let then_v = parse_int(&list.str_at(then_id), &list.location_at(then_id))?;
        let else_v = parse_int(&list.str_at(else_id), &list.location_at(else_id))?;
        let value = if cond != 0 { then_v } else { else_v };

        list.with_token_mut(cond_id, |t| t.set_str(value.to_string()));
        list.delete(q);
        list.delete(then_id);
        list.delete(colon);
        list.delete(else_id);
    }
}

fn parse_int(text: &str, loc: &Location) -> Result<i64, crate::error::PpError> {
    let trimmed = text.trim_end_matches(|c| matches!(c, 'u' | 'U' | 'l' | 'L'));
    let parsed = if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else if trimmed.len() > 1 && trimmed.starts_with('0') && trimmed.chars().all(|c| c.is_digit(8)) {
        i64::from_str_radix(&trimmed[1..], 8)
    } else {
        trimmed.parse::<i64>()
    };
    parsed.map_err(|_| {
        crate::error::PpError::new(
            crate::diagnostics::DiagnosticKind::SyntaxError,
            Some(loc.clone()),
            format!("'{}' is not an integer constant", text),
        )
    })
}

fn syntax_error(list: &TokenList, message: &str) -> crate::error::PpError {
    let loc = list.front.map(|id| list.location_at(id));
    crate::error::PpError::new(crate::diagnostics::DiagnosticKind::SyntaxError, loc, message.to_string())
}

impl TokenList {
    /// Moves every token of `other` onto the back of `self`, consuming it.
    pub fn append(&mut self, other: TokenList) {
        self.splice_before(None, other);
    }

    /// Splices `other`'s tokens in immediately before `before` (or onto the
    /// back of `self` if `before` is `None`), consuming `other`. Returns
    /// the id of the first spliced-in token, or `before` unchanged if
    /// `other` was empty — the id a driver loop should resume scanning
    /// from.
    pub fn splice_before(&mut self, before: Option<TokenId>, mut other: TokenList) -> Option<TokenId> {
        let (other_front, other_back) = match (other.front, other.back) {
            (Some(f), Some(b)) => (f, b),
            _ => return before,
        };

        match before {
            Some(b) => {
                let prev = self.prev_of(b);
                {
                    let mut arena = self.arena.borrow_mut();
                    arena.slot_mut(other_back).next = Some(b);
                    arena.slot_mut(b).prev = Some(other_back);
                    arena.slot_mut(other_front).prev = prev;
                }
                match prev {
                    Some(p) => self.arena.borrow_mut().slot_mut(p).next = Some(other_front),
                    None => self.front = Some(other_front),
                }
            }
            None => {
                match self.back {
                    Some(b) => {
                        let mut arena = self.arena.borrow_mut();
                        arena.slot_mut(b).next = Some(other_front);
                        arena.slot_mut(other_front).prev = Some(b);
                    }
                    None => self.front = Some(other_front),
                }
                self.back = Some(other_back);
            }
        }

        other.front = None;
        other.back = None;
        Some(other_front)
    }

    /// Deep-copies every token into a fresh list backed by `arena` (which
    /// may or may not be the same arena `self` uses). Used to splice a
    /// cached, already-tokenized file's content into a fresh run without
    /// letting two `TokenList`s fight over the same linkage.
    pub fn clone_into(&self, arena: Rc<RefCell<Arena>>, files: Rc<FileTable>) -> TokenList {
        let mut out = TokenList::new(arena, files);
        for id in self.iter() {
            let tok = self.with_token(id, |t| t.clone());
            out.push_back(tok);
        }
        out
    }

    /// Drops every comment token, carrying the whitespace-ahead flag of a
    /// removed comment onto whatever follows it so stringify still inserts
    /// the separating space a real preprocessor would leave behind.
    pub fn remove_comments(&mut self) {
        let mut id = self.front;
        while let Some(cur) = id {
            let (is_comment, ws) = self.with_token(cur, |t| (t.is_comment(), t.whitespace_ahead));
            let next = self.next_of(cur);
            if is_comment {
                if let Some(n) = next {
                    if ws {
                        self.with_token_mut(n, |t| t.whitespace_ahead = true);
                    }
                }
                self.delete(cur);
            }
            id = next;
        }
    }
}

pub struct TokenIter {
    arena: Rc<RefCell<Arena>>,
    cursor: Option<TokenId>,
}

impl Iterator for TokenIter {
    type Item = TokenId;

    fn next(&mut self) -> Option<TokenId> {
        let id = self.cursor?;
        self.cursor = self.arena.borrow().slot(id).next;
        Some(id)
    }
}

/// `#line <n> "<file>"` marker emitted by `stringify` whenever the file or
/// line of consecutive tokens diverges.
pub fn line_directive(loc: &Location) -> String {
    format!("\n#line {} \"{}\"\n", loc.line, loc.file())
}
