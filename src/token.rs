//! Component C — Token & Classification.

use std::rc::Rc;

use crate::location::Location;

/// Four mutually-informative (not mutually-exclusive at the bit level, but
/// exactly one is set by `classify`) flags derived from a token's text.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenFlags {
    pub name: bool,
    pub number: bool,
    pub comment: bool,
    pub op: bool,
}

/// Classifies token text the way the original reader does: a string or
/// character literal (including a `u`/`U`/`L`/`u8` prefix, with or without
/// `R`) is neither a name nor a number even though its prefix letters look
/// like one, so it's recognized by its embedded quote and, like a bare
/// `"..."` or `'...'` token, falls into the operator/punctuator bucket —
/// there is no dedicated literal flag. Otherwise identifiers start with `_`
/// or an alphabetic character, numbers start with a digit, `.digit`, or a
/// sign immediately followed by a digit (the shape a folded unary-negated
/// constant takes after `TokenList::const_fold` rewrites it in place),
/// `//`/`/*` marks a comment, anything else is an operator/punctuator.
pub fn classify(text: &str) -> TokenFlags {
    let mut flags = TokenFlags::default();
    if text.starts_with("//") || text.starts_with("/*") {
        flags.comment = true;
        return flags;
    }
    if text.contains('"') || text.contains('\'') {
        flags.op = true;
        return flags;
    }

    let mut chars = text.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return flags,
    };
    let second = chars.next();

    if first.is_ascii_digit()
        || ((first == '.' || first == '+' || first == '-') && second.map_or(false, |c| c.is_ascii_digit()))
    {
        flags.number = true;
    } else if first == '_' || first.is_alphabetic() {
        flags.name = true;
    } else {
        flags.op = true;
    }
    flags
}

/// One lexical token. Linkage to its neighbours lives in
/// [`crate::tokenlist::TokenList`], not here — a `Token` only knows its own
/// text, origin and the set of macros responsible for it.
#[derive(Clone)]
pub struct Token {
    text: String,
    pub location: Location,
    pub whitespace_ahead: bool,
    /// Names of the macros whose expansion produced this token, used for
    /// the "don't re-expand inside your own replacement" hygiene rule.
    /// Name-keyed, per spec.md §9, not instance-identity-keyed.
    pub macro_origin: Vec<Rc<str>>,
    /// Set only on the token that is itself a macro *use site* (the name
    /// token consumed to trigger expansion), for §6 macro-usage reporting.
    pub macro_name: Option<Rc<str>>,
    pub flags: TokenFlags,
}

impl Token {
    pub fn new(text: impl Into<String>, location: Location) -> Token {
        let text = text.into();
        let flags = classify(&text);
        Token {
            text,
            location,
            whitespace_ahead: false,
            macro_origin: Vec::new(),
            macro_name: None,
            flags,
        }
    }

    pub fn str(&self) -> &str {
        &self.text
    }

    /// Replaces the text and refreshes the classification flags — the
    /// pasted-token (`##`) and stringized (`#`) paths both need this.
    pub fn set_str(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.flags = classify(&self.text);
    }

    pub fn is_name(&self) -> bool {
        self.flags.name
    }

    pub fn is_number(&self) -> bool {
        self.flags.number
    }

    pub fn is_comment(&self) -> bool {
        self.flags.comment
    }

    pub fn is_op(&self) -> bool {
        self.flags.op
    }

    pub fn is_op_char(&self, c: char) -> bool {
        self.flags.op && self.text.chars().count() == 1 && self.text.starts_with(c)
    }

    pub fn has_macro_origin(&self, name: &str) -> bool {
        self.macro_origin.iter().any(|m| m.as_ref() == name)
    }

    pub fn add_macro_origin(&mut self, name: Rc<str>) {
        if !self.has_macro_origin(&name) {
            self.macro_origin.push(name);
        }
    }
}
