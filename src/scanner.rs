//! Byte-level JSON tokenizer.
//!
//! The decoder VM, the reformatters and the stream reader all read input
//! through [`Scanner`]. Nothing here recurses: nested values are walked with an
//! explicit stack of expected closers, so hostile nesting costs heap, not
//! native stack, and is cut off at [`MAX_DECODE_DEPTH`].

use crate::constants::MAX_DECODE_DEPTH;
use crate::error::{JsonError, Result};

const REPLACEMENT: char = '\u{FFFD}';

/// Receives the structural events of a value walked by [`Scanner::walk_value`].
pub(crate) trait TokenSink {
    /// `{` or `[` of a non-empty container.
    fn open(&mut self, _bracket: u8) {}
    /// `}` or `]` of a non-empty container.
    fn close(&mut self, _bracket: u8) {}
    /// `{}` or `[]`.
    fn empty(&mut self, _text: &'static [u8]) {}
    /// Separator between elements or members.
    fn comma(&mut self) {}
    /// Separator between a key and its value.
    fn colon(&mut self) {}
    /// A string (quotes included), number or literal, verbatim.
    fn scalar(&mut self, _raw: &[u8], _is_string: bool) {}
}

impl TokenSink for () {}

/// Cursor over a complete JSON input buffer.
#[derive(Debug, Clone)]
pub(crate) struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    pub fn at(input: &'a [u8], pos: usize) -> Self {
        Self { input, pos }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn input(&self) -> &'a [u8] {
        self.input
    }

    pub fn skip_ws(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.input.get(self.pos) {
            self.pos += 1;
        }
    }

    /// Byte at the cursor, without skipping whitespace.
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Skips whitespace and returns the byte at the cursor.
    pub fn next_token(&mut self) -> Option<u8> {
        self.skip_ws();
        self.peek()
    }

    pub fn bump(&mut self) {
        self.pos += 1;
    }

    /// Skips whitespace and consumes `b` if it is next.
    pub fn eat(&mut self, b: u8) -> bool {
        if self.next_token() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Skips whitespace and consumes `b`, failing otherwise.
    pub fn expect(&mut self, b: u8, context: &str) -> Result<()> {
        if self.eat(b) {
            Ok(())
        } else {
            Err(self.unexpected(context))
        }
    }

    pub fn unexpected_end(&self) -> JsonError {
        JsonError::syntax("unexpected end of JSON input", self.input.len())
    }

    /// Error for the byte at the cursor.
    pub fn unexpected(&self, context: &str) -> JsonError {
        match self.peek() {
            None => self.unexpected_end(),
            Some(b) => JsonError::syntax(
                format!("invalid character {} {context}", describe_byte(b)),
                self.pos,
            ),
        }
    }

    /// Fails with [`JsonError::MaxDepthExceeded`] when `depth` is past the ceiling.
    pub fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > MAX_DECODE_DEPTH {
            return Err(JsonError::MaxDepthExceeded {
                limit: MAX_DECODE_DEPTH,
                offset: self.pos,
            });
        }
        Ok(())
    }

    /// Consumes `true`, `false` or `null`; the cursor is on its first byte.
    pub fn literal(&mut self, word: &'static [u8]) -> Result<()> {
        for &expected in word {
            match self.peek() {
                Some(b) if b == expected => self.pos += 1,
                _ => return Err(self.unexpected("in literal")),
            }
        }
        Ok(())
    }

    /// Consumes a number and returns its span. The cursor is on its first byte.
    pub fn number_span(&mut self) -> Result<(usize, usize)> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        match self.peek() {
            Some(b'0') => self.pos += 1,
            Some(b'1'..=b'9') => self.digits(),
            _ => return Err(self.unexpected("in numeric literal")),
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            self.required_digits()?;
        }
        if let Some(b'e' | b'E') = self.peek() {
            self.pos += 1;
            if let Some(b'+' | b'-') = self.peek() {
                self.pos += 1;
            }
            self.required_digits()?;
        }
        Ok((start, self.pos))
    }

    fn digits(&mut self) {
        while let Some(b'0'..=b'9') = self.peek() {
            self.pos += 1;
        }
    }

    fn required_digits(&mut self) -> Result<()> {
        match self.peek() {
            Some(b'0'..=b'9') => {
                self.digits();
                Ok(())
            }
            _ => Err(self.unexpected("in numeric literal")),
        }
    }

    /// Consumes a string and returns its span, quotes included.
    pub fn string_span(&mut self) -> Result<(usize, usize)> {
        let start = self.pos;
        self.pos += 1;
        loop {
            let Some(b) = self.peek() else {
                return Err(self.unexpected_end());
            };
            match b {
                b'"' => {
                    self.pos += 1;
                    return Ok((start, self.pos));
                }
                b'\\' => {
                    self.pos += 1;
                    match self.peek() {
                        Some(b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't') => self.pos += 1,
                        Some(b'u') => {
                            self.pos += 1;
                            self.hex4()?;
                        }
                        _ => return Err(self.unexpected("in string escape code")),
                    }
                }
                0x00..=0x1F => return Err(self.unexpected("in string literal")),
                _ => self.pos += 1,
            }
        }
    }

    /// Consumes a string, appending its unescaped contents to `out`.
    ///
    /// Invalid UTF-8 and unpaired surrogate escapes become U+FFFD.
    pub fn string_into(&mut self, out: &mut String) -> Result<()> {
        self.pos += 1;
        let mut seg = self.pos;
        loop {
            let Some(b) = self.peek() else {
                return Err(self.unexpected_end());
            };
            match b {
                b'"' => {
                    push_lossy(out, &self.input[seg..self.pos]);
                    self.pos += 1;
                    return Ok(());
                }
                b'\\' => {
                    push_lossy(out, &self.input[seg..self.pos]);
                    self.pos += 1;
                    self.escape_into(out)?;
                    seg = self.pos;
                }
                0x00..=0x1F => return Err(self.unexpected("in string literal")),
                _ => self.pos += 1,
            }
        }
    }

    fn escape_into(&mut self, out: &mut String) -> Result<()> {
        let c = match self.peek() {
            Some(b'"') => '"',
            Some(b'\\') => '\\',
            Some(b'/') => '/',
            Some(b'b') => '\u{8}',
            Some(b'f') => '\u{c}',
            Some(b'n') => '\n',
            Some(b'r') => '\r',
            Some(b't') => '\t',
            Some(b'u') => {
                self.pos += 1;
                let unit = self.hex4()?;
                out.push(self.code_point(unit)?);
                return Ok(());
            }
            _ => return Err(self.unexpected("in string escape code")),
        };
        self.pos += 1;
        out.push(c);
        Ok(())
    }

    fn code_point(&mut self, unit: u32) -> Result<char> {
        match unit {
            0xD800..=0xDBFF => {
                if self.input[self.pos..].starts_with(b"\\u") {
                    let save = self.pos;
                    self.pos += 2;
                    let low = self.hex4()?;
                    if (0xDC00..=0xDFFF).contains(&low) {
                        let combined = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                        return Ok(char::from_u32(combined).unwrap_or(REPLACEMENT));
                    }
                    // Not a low surrogate: decode it on its own.
                    self.pos = save;
                }
                Ok(REPLACEMENT)
            }
            0xDC00..=0xDFFF => Ok(REPLACEMENT),
            _ => Ok(char::from_u32(unit).unwrap_or(REPLACEMENT)),
        }
    }

    fn hex4(&mut self) -> Result<u32> {
        let mut value = 0u32;
        for _ in 0..4 {
            let digit = match self.peek() {
                Some(b @ b'0'..=b'9') => b - b'0',
                Some(b @ b'a'..=b'f') => b - b'a' + 10,
                Some(b @ b'A'..=b'F') => b - b'A' + 10,
                _ => return Err(self.unexpected("in \\u hexadecimal character escape")),
            };
            value = value * 16 + u32::from(digit);
            self.pos += 1;
        }
        Ok(value)
    }

    /// Skips one value and returns its span.
    ///
    /// `depth` is the nesting depth the value sits at; containers inside it
    /// count from there.
    pub fn skip_value(&mut self, depth: usize) -> Result<(usize, usize)> {
        self.walk_value(depth, &mut ())
    }

    /// Walks one value, reporting its structure to `sink`, and returns its span.
    pub fn walk_value<S: TokenSink>(&mut self, depth: usize, sink: &mut S) -> Result<(usize, usize)> {
        self.skip_ws();
        let start = self.pos;
        let mut closers: Vec<u8> = Vec::new();
        loop {
            // A value is expected at the cursor.
            match self.next_token() {
                None => return Err(self.unexpected_end()),
                Some(open @ (b'{' | b'[')) => {
                    self.check_depth(depth + closers.len() + 1)?;
                    self.pos += 1;
                    let close = if open == b'{' { b'}' } else { b']' };
                    if self.next_token() == Some(close) {
                        self.pos += 1;
                        sink.empty(if open == b'{' { b"{}" } else { b"[]" });
                    } else {
                        sink.open(open);
                        closers.push(close);
                        if open == b'{' {
                            self.member_key(sink)?;
                        }
                        continue;
                    }
                }
                Some(b'"') => {
                    let (s, e) = self.string_span()?;
                    sink.scalar(&self.input[s..e], true);
                }
                Some(b't') => self.scalar_literal(b"true", sink)?,
                Some(b'f') => self.scalar_literal(b"false", sink)?,
                Some(b'n') => self.scalar_literal(b"null", sink)?,
                Some(b'-' | b'0'..=b'9') => {
                    let (s, e) = self.number_span()?;
                    sink.scalar(&self.input[s..e], false);
                }
                Some(_) => return Err(self.unexpected("looking for beginning of value")),
            }

            // A value just ended: close finished containers or move to the next slot.
            loop {
                let Some(&close) = closers.last() else {
                    return Ok((start, self.pos));
                };
                match self.next_token() {
                    Some(b',') => {
                        self.pos += 1;
                        sink.comma();
                        if close == b'}' {
                            self.member_key(sink)?;
                        }
                        break;
                    }
                    Some(b) if b == close => {
                        self.pos += 1;
                        closers.pop();
                        sink.close(close);
                    }
                    _ => {
                        let context = if close == b'}' {
                            "after object key:value pair"
                        } else {
                            "after array element"
                        };
                        return Err(self.unexpected(context));
                    }
                }
            }
        }
    }

    fn member_key<S: TokenSink>(&mut self, sink: &mut S) -> Result<()> {
        if self.next_token() != Some(b'"') {
            return Err(self.unexpected("looking for beginning of object key string"));
        }
        let (s, e) = self.string_span()?;
        sink.scalar(&self.input[s..e], true);
        self.expect(b':', "after object key")?;
        sink.colon();
        Ok(())
    }

    fn scalar_literal<S: TokenSink>(&mut self, word: &'static [u8], sink: &mut S) -> Result<()> {
        self.literal(word)?;
        sink.scalar(word, false);
        Ok(())
    }

    /// Fails unless only whitespace remains.
    pub fn finish(&mut self) -> Result<()> {
        self.skip_ws();
        if self.pos < self.input.len() {
            return Err(self.unexpected("after top-level value"));
        }
        Ok(())
    }
}

fn push_lossy(out: &mut String, bytes: &[u8]) {
    match std::str::from_utf8(bytes) {
        Ok(s) => out.push_str(s),
        Err(_) => out.push_str(&String::from_utf8_lossy(bytes)),
    }
}

pub(crate) fn describe_byte(b: u8) -> String {
    match b {
        b'\'' => "'\\''".to_owned(),
        b'"' => "'\"'".to_owned(),
        0x20..=0x7E => format!("'{}'", b as char),
        _ => format!("0x{b:02x}"),
    }
}
