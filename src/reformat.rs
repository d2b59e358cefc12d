//! Validation and re-layout of JSON text.
//!
//! [`valid`], [`compact`] and [`indent`] operate on text, not on typed values.
//! The encoder also uses them on the output of marshal hooks and on
//! [`crate::RawJson`] payloads, which must be spliced into the surrounding
//! layout.

use crate::error::Result;
use crate::escape;
use crate::scanner::{Scanner, TokenSink};

/// Reports whether `data` is exactly one JSON value, optionally surrounded by whitespace.
pub fn valid(data: &[u8]) -> bool {
    check_valid(data).is_ok()
}

pub(crate) fn check_valid(data: &[u8]) -> Result<()> {
    let mut scanner = Scanner::new(data);
    scanner.skip_value(0)?;
    scanner.finish()
}

/// Appends `src` to `dst` with insignificant whitespace removed.
///
/// On error `dst` is left as it was.
pub fn compact(dst: &mut Vec<u8>, src: &[u8]) -> Result<()> {
    compact_into(dst, src, false)
}

/// Appends `src` to `dst` with one element or member per line.
///
/// Every line after the first starts with `prefix` followed by one `unit` per
/// nesting level. Empty containers stay on one line. On error `dst` is left as it was.
pub fn indent(dst: &mut Vec<u8>, src: &[u8], prefix: &str, unit: &str) -> Result<()> {
    indent_into(dst, src, prefix.as_bytes(), unit.as_bytes(), 0, false)
}

pub(crate) fn compact_into(dst: &mut Vec<u8>, src: &[u8], escape_html: bool) -> Result<()> {
    let mark = dst.len();
    let mut sink = Compact { out: dst, escape_html };
    run(src, &mut sink).map_err(|err| {
        dst.truncate(mark);
        err
    })
}

/// Like [`indent`], but the value starts `level` levels deep.
pub(crate) fn indent_into(
    dst: &mut Vec<u8>,
    src: &[u8],
    prefix: &[u8],
    unit: &[u8],
    level: usize,
    escape_html: bool,
) -> Result<()> {
    let mark = dst.len();
    let mut sink = Indent {
        out: dst,
        prefix,
        unit,
        level,
        escape_html,
    };
    run(src, &mut sink).map_err(|err| {
        dst.truncate(mark);
        err
    })
}

fn run<S: TokenSink>(src: &[u8], sink: &mut S) -> Result<()> {
    let mut scanner = Scanner::new(src);
    scanner.walk_value(0, sink)?;
    scanner.finish()
}

struct Compact<'a> {
    out: &'a mut Vec<u8>,
    escape_html: bool,
}

impl TokenSink for Compact<'_> {
    fn open(&mut self, bracket: u8) {
        self.out.push(bracket);
    }

    fn close(&mut self, bracket: u8) {
        self.out.push(bracket);
    }

    fn empty(&mut self, text: &'static [u8]) {
        self.out.extend_from_slice(text);
    }

    fn comma(&mut self) {
        self.out.push(b',');
    }

    fn colon(&mut self) {
        self.out.push(b':');
    }

    fn scalar(&mut self, raw: &[u8], is_string: bool) {
        if is_string && self.escape_html {
            copy_html_escaped(self.out, raw);
        } else {
            self.out.extend_from_slice(raw);
        }
    }
}

struct Indent<'a> {
    out: &'a mut Vec<u8>,
    prefix: &'a [u8],
    unit: &'a [u8],
    level: usize,
    escape_html: bool,
}

impl Indent<'_> {
    fn newline(&mut self) {
        self.out.push(b'\n');
        self.out.extend_from_slice(self.prefix);
        for _ in 0..self.level {
            self.out.extend_from_slice(self.unit);
        }
    }
}

impl TokenSink for Indent<'_> {
    fn open(&mut self, bracket: u8) {
        self.out.push(bracket);
        self.level += 1;
        self.newline();
    }

    fn close(&mut self, bracket: u8) {
        self.level = self.level.saturating_sub(1);
        self.newline();
        self.out.push(bracket);
    }

    fn empty(&mut self, text: &'static [u8]) {
        self.out.extend_from_slice(text);
    }

    fn comma(&mut self) {
        self.out.push(b',');
        self.newline();
    }

    fn colon(&mut self) {
        self.out.extend_from_slice(b": ");
    }

    fn scalar(&mut self, raw: &[u8], is_string: bool) {
        if is_string && self.escape_html {
            copy_html_escaped(self.out, raw);
        } else {
            self.out.extend_from_slice(raw);
        }
    }
}

/// Copies an already valid string token, escaping `<`, `>`, `&`, U+2028 and U+2029.
fn copy_html_escaped(out: &mut Vec<u8>, raw: &[u8]) {
    let mut start = 0;
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b @ (b'<' | b'>' | b'&') => {
                out.extend_from_slice(&raw[start..i]);
                escape::write_escaped_byte(out, b);
                i += 1;
                start = i;
            }
            0xE2 if raw.len() > i + 2 && raw[i + 1] == 0x80 && (raw[i + 2] & 0xFE) == 0xA8 => {
                out.extend_from_slice(&raw[start..i]);
                out.extend_from_slice(b"\\u202");
                out.push(if raw[i + 2] == 0xA8 { b'8' } else { b'9' });
                i += 3;
                start = i;
            }
            _ => i += 1,
        }
    }
    out.extend_from_slice(&raw[start..]);
}
