//! Component E — Raw Reader: turns a decoded [`crate::charstream::Stream`]
//! into a flat [`TokenList`] of raw tokens (identifiers, numbers, string and
//! character literals, comments, single-character operators). Multi-
//! character operators are fused afterwards by
//! [`crate::tokenlist::TokenList::combine_operators`].

use std::rc::Rc;

use crate::charstream::Stream;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error::PpError;
use crate::location::{FileTable, Location};
use crate::token::Token;
use crate::tokenlist::{Arena, TokenList};

pub struct RawReader<'s> {
    stream: &'s mut dyn Stream,
    loc: Location,
    peeked: Option<u8>,
    /// Non-fatal findings (currently just `portabilityBackslash`) collected
    /// while tokenizing; the driver folds these into the run's diagnostics.
    pub diagnostics: Vec<Diagnostic>,
}

impl<'s> RawReader<'s> {
    pub fn new(stream: &'s mut dyn Stream, files: Rc<FileTable>, file_index: crate::location::FileIndex) -> RawReader<'s> {
        let mut loc = Location::new(files);
        loc.file_index = file_index;
        loc.col = 1;
        RawReader { stream, loc, peeked: None, diagnostics: Vec::new() }
    }

    fn peek(&mut self) -> Option<u8> {
        if self.peeked.is_none() {
            self.peeked = self.stream.next_byte();
        }
        self.peeked
    }

    fn peek2(&mut self) -> Option<u8> {
        // best-effort one-byte-further lookahead; used only for `//`, `/*`, `R"`.
        self.stream.peek_byte()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.peeked = None;
        let s = (b as char).to_string();
        self.loc.adjust(&s);
        Some(b)
    }

    /// A non-ASCII byte anywhere in the decoded stream — whether genuine
    /// 8-bit source or the `0xFF` sentinel a UTF-16 source's non-ASCII code
    /// unit decodes to (spec.md §4.B) — is unrepresentable to this engine
    /// and aborts tokenization of the whole file (spec.md §4.E/§7).
    fn checked_peek(&mut self) -> Result<Option<u8>, PpError> {
        match self.peek() {
            Some(b) if b >= 0x80 => Err(PpError::new(DiagnosticKind::UnhandledCharError, Some(self.loc.clone()), "non-ASCII byte in source".to_string())),
            other => Ok(other),
        }
    }

    /// Tokenizes the whole stream into a list. A non-ASCII byte or an
    /// unterminated string/character literal or block comment clears
    /// whatever has been read so far and returns the error (spec.md §7:
    /// "clear the current raw-token output and abort tokenization of that
    /// file").
    pub fn read_into(&mut self, arena: Rc<std::cell::RefCell<Arena>>, files: Rc<FileTable>) -> Result<TokenList, PpError> {
        let mut list = TokenList::new(arena, files);
        let mut whitespace_ahead = false;

        loop {
            let b = match self.checked_peek()? {
                Some(b) => b,
                None => break,
            };

            if b == b' ' || b == b'\t' {
                self.advance();
                whitespace_ahead = true;
                continue;
            }
            if b == b'\n' {
                self.advance();
                whitespace_ahead = true;
                continue;
            }
            if b < 0x20 {
                // Any other control byte (spec.md §4.E #1) stands in for a space.
                self.advance();
                whitespace_ahead = true;
                continue;
            }
            if b == b'\\' {
                let bs_loc = self.loc.clone();
                self.advance();
                let mut spaces = 0u32;
                while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
                    self.advance();
                    spaces += 1;
                }
                if self.peek() == Some(b'\n') {
                    // line splice: swallow backslash, any intervening spaces
                    // and the newline, no token produced. A backslash not
                    // immediately before the newline is non-portable
                    // (spec.md §4.E #2) but still honored.
                    self.advance();
                    if spaces > 0 {
                        self.diagnostics.push(Diagnostic::new(
                            DiagnosticKind::PortabilityBackslash,
                            Some(bs_loc),
                            "backslash and newline separated by whitespace".to_string(),
                        ));
                    }
                    whitespace_ahead = true;
                    continue;
                }
                // Not a continuation: the backslash is its own token, and
                // the spaces we already consumed count as ordinary
                // inter-token whitespace for whatever follows.
                let mut token = Token::new("\\".to_string(), bs_loc);
                token.whitespace_ahead = whitespace_ahead;
                list.push_back(token);
                whitespace_ahead = spaces > 0;
                continue;
            }

            let start_loc = self.loc.clone();
            let text = if b == b'/' && self.peek2() == Some(b'/') {
                self.read_line_comment()?
            } else if b == b'/' && self.peek2() == Some(b'*') {
                self.read_block_comment()?
            } else if b == b'"' {
                self.read_quoted(b'"')?
            } else if b == b'\'' {
                self.read_quoted(b'\'')?
            } else if (b as char).is_ascii_digit() {
                self.read_number()?
            } else if (b as char).is_alphabetic() || b == b'_' {
                self.read_identifier_or_rawstring()?
            } else {
                self.advance();
                (b as char).to_string()
            };

            let mut token = Token::new(text, start_loc);
            token.whitespace_ahead = whitespace_ahead;
            list.push_back(token);
            whitespace_ahead = false;
        }

        Ok(list)
    }

    /// Comment bodies are kept verbatim (spec.md §4.E #5) and are always
    /// stripped before output, so a non-ASCII byte inside one is read
    /// through the unchecked [`Self::peek`] rather than aborting; only the
    /// token's opening `//` is checked for non-ASCII by `read_into`.
    fn read_line_comment(&mut self) -> Result<String, PpError> {
        let mut bytes = Vec::new();
        while let Some(b) = self.peek() {
            if b == b'\n' {
                break;
            }
            bytes.push(b);
            self.advance();
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn read_block_comment(&mut self) -> Result<String, PpError> {
        let start = self.loc.clone();
        let mut bytes = Vec::new();
        bytes.push(b'/');
        self.advance();
        bytes.push(b'*');
        self.advance();
        loop {
            match self.peek() {
                None => return Err(unterminated(&start, "block comment")),
                Some(b'*') => {
                    bytes.push(b'*');
                    self.advance();
                    if self.peek() == Some(b'/') {
                        bytes.push(b'/');
                        self.advance();
                        break;
                    }
                }
                Some(b) => {
                    bytes.push(b);
                    self.advance();
                }
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// String/char-literal bodies are kept verbatim too — `"café"` is valid
    /// UTF-8 input and must round-trip through stringizing untouched, so
    /// this reads the body bytes unchecked and reassembles them with
    /// `from_utf8_lossy` rather than converting byte-by-byte (which would
    /// split multi-byte UTF-8 sequences across bogus `char`s).
    fn read_quoted(&mut self, quote: u8) -> Result<String, PpError> {
        let start = self.loc.clone();
        let mut bytes = Vec::new();
        bytes.push(quote);
        self.advance();
        loop {
            match self.peek() {
                None => return Err(unterminated(&start, if quote == b'"' { "string literal" } else { "character literal" })),
                Some(b'\n') => return Err(unterminated(&start, if quote == b'"' { "string literal" } else { "character literal" })),
                Some(b) if b == quote => {
                    bytes.push(b);
                    self.advance();
                    break;
                }
                Some(b'\\') => {
                    bytes.push(b'\\');
                    self.advance();
                    if let Some(esc) = self.peek() {
                        bytes.push(esc);
                        self.advance();
                    }
                }
                Some(b) => {
                    bytes.push(b);
                    self.advance();
                }
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn read_number(&mut self) -> Result<String, PpError> {
        let mut s = String::new();
        while let Some(b) = self.checked_peek()? {
            let c = b as char;
            if c.is_alphanumeric() || c == '.' || c == '_' {
                s.push(c);
                self.advance();
            } else if (c == '+' || c == '-') && s.to_lowercase().ends_with('e') {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        Ok(s)
    }

    fn read_identifier_or_rawstring(&mut self) -> Result<String, PpError> {
        let start = self.loc.clone();
        let mut s = String::new();
        while let Some(b) = self.checked_peek()? {
            let c = b as char;
            if c.is_alphanumeric() || c == '_' {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }

        // C++ string/char-literal prefixes (`u8`, `u`, `U`, `L`), with or
        // without a following `R` for the raw-string form, fuse onto the
        // literal that follows into one token (spec.md §4.E #5).
        const PLAIN_PREFIXES: &[&str] = &["u8", "u", "U", "L"];
        const RAW_PREFIXES: &[&str] = &["u8R", "uR", "UR", "LR", "R"];

        if RAW_PREFIXES.contains(&s.as_str()) && self.checked_peek()? == Some(b'"') {
            self.read_raw_string_tail(&start, &mut s)?;
        } else if PLAIN_PREFIXES.contains(&s.as_str()) {
            match self.checked_peek()? {
                Some(b'"') => s.push_str(&self.read_quoted(b'"')?),
                Some(b'\'') => s.push_str(&self.read_quoted(b'\'')?),
                _ => {}
            }
        }
        Ok(s)
    }

    /// Consumes `"delim(...)delim"` once `s` already holds the prefix (`R`,
    /// `u8R`, ...) and the opening quote has been peeked but not consumed.
    fn read_raw_string_tail(&mut self, start: &Location, s: &mut String) -> Result<(), PpError> {
        s.push('"');
        self.advance();
        let mut delim = String::new();
        while let Some(b) = self.peek() {
            if b == b'(' {
                break;
            }
            delim.push(b as char);
            s.push(b as char);
            self.advance();
        }
        if self.peek() != Some(b'(') {
            return Err(unterminated(start, "raw string literal"));
        }
        s.push('(');
        self.advance();
        let terminator = format!("){}\"", delim).into_bytes();
        let mut body = Vec::new();
        loop {
            match self.peek() {
                None => return Err(unterminated(start, "raw string literal")),
                Some(_) => {
                    let b = self.advance().unwrap();
                    body.push(b);
                    if body.ends_with(terminator.as_slice()) {
                        break;
                    }
                }
            }
        }
        s.push_str(&String::from_utf8_lossy(&body));
        Ok(())
    }
}

fn unterminated(loc: &Location, what: &str) -> PpError {
    PpError::new(DiagnosticKind::SyntaxError, Some(loc.clone()), format!("unterminated {}", what))
}
