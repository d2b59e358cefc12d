//! Rendering of JSON scalars: escaped strings, integers and floats.
//!
//! Output is byte-compatible with the reference codec: lowercase `\u00XX`
//! escapes, `\b \f \n \r \t` short forms, U+2028/U+2029 always escaped, and
//! floats in shortest round-trip form switching to exponent notation outside
//! `[1e-6, 1e21)`.

use std::fmt::Write as _;

const HEX: &[u8; 16] = b"0123456789abcdef";

/// 256-entry table: 0 = copy verbatim, 1 = always escape, 2 = escape only in HTML mode.
static ESCAPE: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 0x20 {
        table[i] = 1;
        i += 1;
    }
    table[b'"' as usize] = 1;
    table[b'\\' as usize] = 1;
    table[b'<' as usize] = 2;
    table[b'>' as usize] = 2;
    table[b'&' as usize] = 2;
    table
};

/// Appends `s` as a quoted JSON string.
pub fn write_str(out: &mut Vec<u8>, s: &str, escape_html: bool) {
    out.reserve(s.len() + 2);
    out.push(b'"');
    write_str_body(out, s, escape_html);
    out.push(b'"');
}

/// Appends the escaped contents of `s` without quotes.
pub fn write_str_body(out: &mut Vec<u8>, s: &str, escape_html: bool) {
    write_body_bytes(out, s.as_bytes(), escape_html);
}

/// Appends UTF-8 `bytes` as a quoted JSON string.
pub(crate) fn write_bytes_quoted(out: &mut Vec<u8>, bytes: &[u8], escape_html: bool) {
    out.reserve(bytes.len() + 2);
    out.push(b'"');
    write_body_bytes(out, bytes, escape_html);
    out.push(b'"');
}

fn write_body_bytes(out: &mut Vec<u8>, bytes: &[u8], escape_html: bool) {
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let class = ESCAPE[b as usize];
        if class == 1 || (class == 2 && escape_html) {
            out.extend_from_slice(&bytes[start..i]);
            write_escaped_byte(out, b);
            i += 1;
            start = i;
            continue;
        }
        // U+2028 and U+2029 encode as E2 80 A8 / E2 80 A9.
        if b == 0xE2 && i + 2 < bytes.len() && bytes[i + 1] == 0x80 && (bytes[i + 2] & 0xFE) == 0xA8 {
            out.extend_from_slice(&bytes[start..i]);
            out.extend_from_slice(b"\\u202");
            out.push(HEX[(bytes[i + 2] & 0x0F) as usize]);
            i += 3;
            start = i;
            continue;
        }
        i += 1;
    }
    out.extend_from_slice(&bytes[start..]);
}

pub(crate) fn write_escaped_byte(out: &mut Vec<u8>, b: u8) {
    match b {
        b'"' => out.extend_from_slice(b"\\\""),
        b'\\' => out.extend_from_slice(b"\\\\"),
        0x08 => out.extend_from_slice(b"\\b"),
        0x0C => out.extend_from_slice(b"\\f"),
        b'\n' => out.extend_from_slice(b"\\n"),
        b'\r' => out.extend_from_slice(b"\\r"),
        b'\t' => out.extend_from_slice(b"\\t"),
        _ => {
            out.extend_from_slice(b"\\u00");
            out.push(HEX[(b >> 4) as usize]);
            out.push(HEX[(b & 0x0F) as usize]);
        }
    }
}

/// Appends a signed integer in decimal.
pub fn write_i64(out: &mut Vec<u8>, v: i64) {
    if v < 0 {
        out.push(b'-');
    }
    write_u64(out, v.unsigned_abs());
}

/// Appends an unsigned integer in decimal.
pub fn write_u64(out: &mut Vec<u8>, mut v: u64) {
    let mut buf = [0u8; 20];
    let mut pos = buf.len();
    loop {
        pos -= 1;
        buf[pos] = b'0' + (v % 10) as u8;
        v /= 10;
        if v == 0 {
            break;
        }
    }
    out.extend_from_slice(&buf[pos..]);
}

/// Appends a finite `f64`. Returns `false`, writing nothing, for NaN and infinities.
pub fn write_f64(out: &mut Vec<u8>, v: f64) -> bool {
    if !v.is_finite() {
        return false;
    }
    let abs = v.abs();
    let exponent = abs != 0.0 && !(1e-6..1e21).contains(&abs);
    write_float(out, format_args!("{v}"), format_args!("{v:e}"), exponent);
    true
}

/// Appends a finite `f32` using 32-bit shortest digits.
pub fn write_f32(out: &mut Vec<u8>, v: f32) -> bool {
    if !v.is_finite() {
        return false;
    }
    let abs = v.abs();
    let exponent = abs != 0.0 && !(1e-6f32..1e21f32).contains(&abs);
    write_float(out, format_args!("{v}"), format_args!("{v:e}"), exponent);
    true
}

fn write_float(
    out: &mut Vec<u8>,
    plain: std::fmt::Arguments<'_>,
    scientific: std::fmt::Arguments<'_>,
    exponent: bool,
) {
    let mut buf = StackBuf::default();
    if !exponent {
        // Writing into a fixed buffer only fails on overflow; fall back to the heap then.
        if buf.write_fmt(plain).is_err() {
            out.extend_from_slice(plain.to_string().as_bytes());
        } else {
            out.extend_from_slice(buf.as_bytes());
        }
        return;
    }
    let text = if buf.write_fmt(scientific).is_ok() {
        buf.as_bytes().to_vec()
    } else {
        scientific.to_string().into_bytes()
    };
    // `1e21` -> `1e+21`; negative exponents already carry their sign.
    match text.iter().position(|&c| c == b'e') {
        Some(e) if text.get(e + 1) != Some(&b'-') => {
            out.extend_from_slice(&text[..=e]);
            out.push(b'+');
            out.extend_from_slice(&text[e + 1..]);
        }
        _ => out.extend_from_slice(&text),
    }
}

struct StackBuf {
    buf: [u8; 40],
    len: usize,
}

impl Default for StackBuf {
    fn default() -> Self {
        Self {
            buf: [0; 40],
            len: 0,
        }
    }
}

impl StackBuf {
    fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl std::fmt::Write for StackBuf {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        let end = self.len + s.len();
        if end > self.buf.len() {
            return Err(std::fmt::Error);
        }
        self.buf[self.len..end].copy_from_slice(s.as_bytes());
        self.len = end;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str, html: bool) -> String {
        let mut out = Vec::new();
        write_str(&mut out, text, html);
        String::from_utf8(out).unwrap()
    }

    fn f(v: f64) -> String {
        let mut out = Vec::new();
        assert!(write_f64(&mut out, v));
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn escapes_control_and_quote_characters() {
        assert_eq!(s("a\"b\\c\n\t\u{1}", false), r#""a\"b\\c\n\t\u0001""#);
        assert_eq!(s("\u{8}\u{c}", false), r#""\b\f""#);
    }

    #[test]
    fn html_escaping_is_toggleable() {
        assert_eq!(s("<a&b>", true), r#""\u003ca\u0026b\u003e""#);
        assert_eq!(s("<a&b>", false), r#""<a&b>""#);
    }

    #[test]
    fn line_separators_are_always_escaped() {
        assert_eq!(s("x\u{2028}y\u{2029}", false), r#""x\u2028y\u2029""#);
        assert_eq!(s("é✓", false), "\"é✓\"");
    }

    #[test]
    fn integers() {
        let mut out = Vec::new();
        write_i64(&mut out, i64::MIN);
        out.push(b' ');
        write_u64(&mut out, 0);
        out.push(b' ');
        write_u64(&mut out, u64::MAX);
        assert_eq!(out, b"-9223372036854775808 0 18446744073709551615");
    }

    #[test]
    fn floats_follow_reference_formatting() {
        assert_eq!(f(0.0), "0");
        assert_eq!(f(3.0), "3");
        assert_eq!(f(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(f(1e20), "100000000000000000000");
        assert_eq!(f(1e21), "1e+21");
        assert_eq!(f(1.5e-7), "1.5e-7");
        assert_eq!(f(0.000001), "0.000001");
        assert_eq!(f(-2.5e300), "-2.5e+300");
    }

    #[test]
    fn f32_uses_short_digits() {
        let mut out = Vec::new();
        assert!(write_f32(&mut out, 0.1));
        assert_eq!(out, b"0.1");
    }

    #[test]
    fn non_finite_floats_are_rejected() {
        let mut out = Vec::new();
        assert!(!write_f64(&mut out, f64::NAN));
        assert!(!write_f64(&mut out, f64::INFINITY));
        assert!(out.is_empty());
    }
}
