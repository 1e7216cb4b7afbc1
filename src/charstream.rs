//! Component B — Character Stream: BOM detection, UTF-16 decoding and
//! newline normalization, feeding the raw reader (component E) a plain byte
//! stream it never has to think about encoding again.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// A decoded, newline-normalized byte source. Implementors hand out bytes
/// one at a time; everything upstream of this trait works in terms of
/// already-normalized `\n`-only, UTF-8 (or single-byte sentinel) content.
pub trait Stream {
    fn next_byte(&mut self) -> Option<u8>;
    fn peek_byte(&mut self) -> Option<u8>;
}

/// In-memory stream, used both for genuine buffer sources and for the
/// synthetic re-tokenizations the macro expander and `#if` evaluator need.
pub struct BufferStream {
    data: Vec<u8>,
    pos: usize,
}

impl BufferStream {
    pub fn new(raw: &[u8]) -> BufferStream {
        BufferStream { data: decode(raw), pos: 0 }
    }

    /// Wraps already-decoded content (e.g. macro-expansion output) without
    /// running BOM/UTF-16 detection again.
    pub fn from_decoded(text: &str) -> BufferStream {
        BufferStream { data: text.as_bytes().to_vec(), pos: 0 }
    }
}

impl Stream for BufferStream {
    fn next_byte(&mut self) -> Option<u8> {
        let b = self.data.get(self.pos).copied();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    fn peek_byte(&mut self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }
}

/// Filesystem-backed stream used for real `#include` targets.
pub struct FileStream {
    inner: BufferStream,
}

impl FileStream {
    pub fn open(path: &Path) -> io::Result<FileStream> {
        let mut file = File::open(path)?;
        let mut raw = Vec::new();
        file.read_to_end(&mut raw)?;
        Ok(FileStream { inner: BufferStream::new(&raw) })
    }
}

impl Stream for FileStream {
    fn next_byte(&mut self) -> Option<u8> {
        self.inner.next_byte()
    }

    fn peek_byte(&mut self) -> Option<u8> {
        self.inner.peek_byte()
    }
}

/// Sentinel byte the raw reader treats as "unhandled character" (spec.md
/// §4.B): a UTF-16 code unit that can't be expressed as a single decoded
/// byte without a real UTF-8 multi-byte sequence falls back to this rather
/// than silently corrupting column accounting.
pub const UNHANDLED_CHAR: u8 = 0xFF;

fn decode(raw: &[u8]) -> Vec<u8> {
    if let Some(rest) = raw.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        normalize_newlines(rest)
    } else if raw.len() >= 2 && raw[0] == 0xFF && raw[1] == 0xFE {
        utf16_to_utf8(&raw[2..], Endian::Little)
    } else if raw.len() >= 2 && raw[0] == 0xFE && raw[1] == 0xFF {
        utf16_to_utf8(&raw[2..], Endian::Big)
    } else {
        normalize_newlines(raw)
    }
}

enum Endian {
    Little,
    Big,
}

/// Assembles 16-bit code units per the detected endianness; any unit ≥ 0x80
/// (including both halves of a surrogate pair) is reported as the
/// [`UNHANDLED_CHAR`] sentinel rather than re-encoded to UTF-8, per spec.md
/// §4.B #2 — a UTF-16 source's non-ASCII content is meant to reach the raw
/// reader as something it refuses, not as transparently-decoded text.
fn utf16_to_utf8(raw: &[u8], endian: Endian) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len() / 2);
    let mut chunks = raw.chunks_exact(2);
    for chunk in &mut chunks {
        let unit = match endian {
            Endian::Little => LittleEndian::read_u16(chunk),
            Endian::Big => BigEndian::read_u16(chunk),
        };
        out.push(if unit < 0x80 { unit as u8 } else { UNHANDLED_CHAR });
    }
    normalize_newlines(&out)
}

fn normalize_newlines(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'\r' => {
                out.push(b'\n');
                if i + 1 < raw.len() && raw[i + 1] == b'\n' {
                    i += 1;
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_utf8_bom() {
        let mut raw = vec![0xEF, 0xBB, 0xBF];
        raw.extend_from_slice(b"int x;");
        let mut s = BufferStream::new(&raw);
        let mut got = Vec::new();
        while let Some(b) = s.next_byte() {
            got.push(b);
        }
        assert_eq!(got, b"int x;");
    }

    #[test]
    fn decodes_utf16_le() {
        let mut raw = vec![0xFF, 0xFE];
        for b in "ab".encode_utf16() {
            raw.extend_from_slice(&b.to_le_bytes());
        }
        let mut s = BufferStream::new(&raw);
        let mut got = Vec::new();
        while let Some(b) = s.next_byte() {
            got.push(b);
        }
        assert_eq!(got, b"ab");
    }

    #[test]
    fn utf16_non_ascii_unit_becomes_unhandled_sentinel() {
        let mut raw = vec![0xFF, 0xFE];
        for b in "a\u{e9}b".encode_utf16() {
            raw.extend_from_slice(&b.to_le_bytes());
        }
        let mut s = BufferStream::new(&raw);
        let mut got = Vec::new();
        while let Some(b) = s.next_byte() {
            got.push(b);
        }
        assert_eq!(got, vec![b'a', UNHANDLED_CHAR, b'b']);
    }

    #[test]
    fn normalizes_crlf_and_lone_cr() {
        let mut s = BufferStream::new(b"a\r\nb\rc");
        let mut got = Vec::new();
        while let Some(b) = s.next_byte() {
            got.push(b);
        }
        assert_eq!(got, b"a\nb\nc");
    }
}
