//! Dynamically shaped JSON values and the small value types with special encodings.
//!
//! [`Value`] plays the role of an untyped field: anything decodes into it and it
//! encodes back to the same JSON. [`Number`] keeps decimal text verbatim,
//! [`Bytes`] encodes as base64 and [`RawJson`] passes pre-encoded text through.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Deref, DerefMut, Index};
use std::str::FromStr;

use crate::error::{JsonError, Result};
use crate::escape;
use crate::scanner::Scanner;

/// A JSON number kept as its decimal text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Number(String);

impl Number {
    /// Renders a finite float the way the encoder would. `None` for NaN and infinities.
    pub fn from_f64(v: f64) -> Option<Self> {
        let mut out = Vec::new();
        if !escape::write_f64(&mut out, v) {
            return None;
        }
        String::from_utf8(out).ok().map(Number)
    }

    pub(crate) fn from_text_unchecked(text: String) -> Self {
        Number(text)
    }

    /// The number text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        self.0.parse().ok()
    }

    /// Parses as `i64`; `None` for fractions, exponents and out-of-range values.
    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }

    /// Parses as `u64`; `None` for negatives, fractions and out-of-range values.
    pub fn as_u64(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl FromStr for Number {
    type Err = JsonError;

    /// Accepts exactly the JSON number grammar.
    fn from_str(text: &str) -> Result<Self> {
        let mut scanner = Scanner::new(text.as_bytes());
        let (start, end) = scanner.number_span()?;
        if start != 0 || end != text.len() {
            return Err(JsonError::syntax(format!("invalid number literal {text:?}"), end));
        }
        Ok(Number(text.to_owned()))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! number_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Number {
                fn from(v: $ty) -> Self {
                    Number(v.to_string())
                }
            }
        )*
    };
}

number_from_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

/// Binary data, encoded as a standard base64 string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Bytes(pub Vec<u8>);

impl Deref for Bytes {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.0
    }
}

impl DerefMut for Bytes {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.0
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(v: Vec<u8>) -> Self {
        Bytes(v)
    }
}

/// Pre-encoded JSON text.
///
/// Encodes as the (validated, compacted) text it holds, or `null` when empty.
/// Decodes by capturing the raw text of the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawJson(pub Vec<u8>);

impl RawJson {
    /// Wraps text after checking it is a single JSON value.
    pub fn new(text: impl Into<Vec<u8>>) -> Result<Self> {
        let text = text.into();
        crate::reformat::check_valid(&text)?;
        Ok(RawJson(text))
    }

    /// The raw text.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Any JSON value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// `null`
    #[default]
    Null,
    /// `true` / `false`
    Bool(bool),
    /// Any number.
    Number(Number),
    /// A string.
    String(String),
    /// An array.
    Array(Vec<Value>),
    /// An object. Keys iterate in sorted order, matching encoded output.
    Object(BTreeMap<String, Value>),
}

static NULL: Value = Value::Null;

impl Value {
    /// `true` for `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The number, if this is one.
    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    /// The number as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        self.as_number().and_then(Number::as_f64)
    }

    /// The number as `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_number().and_then(Number::as_i64)
    }

    /// The elements, if this is an array.
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// The members, if this is an object.
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Object member lookup.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }
}

impl Index<&str> for Value {
    type Output = Value;

    /// Missing members and non-objects index to `null`.
    fn index(&self, key: &str) -> &Value {
        self.get(key).unwrap_or(&NULL)
    }
}

impl Index<usize> for Value {
    type Output = Value;

    /// Out-of-range positions and non-arrays index to `null`.
    fn index(&self, i: usize) -> &Value {
        self.as_array().and_then(|items| items.get(i)).unwrap_or(&NULL)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(v.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Object(map)
    }
}
