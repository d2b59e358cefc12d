//! Centralized error handling for opjson.
//!
//! Every failure the encoder, the decoder or the program cache can produce is a
//! variant of [`JsonError`]. The library never panics on bad input: malformed
//! text, type mismatches, unsupported shapes and runtime cycles all surface as
//! `Err` values returned to the immediate caller.
//!
//! ## Error Categories
//!
//! - **Target errors** ([`JsonError::InvalidTarget`]): the decode destination is missing
//!   or was compiled for another type.
//! - **Syntax errors** ([`JsonError::Syntax`]): the input is not well-formed JSON. Carries
//!   the byte offset where scanning stopped.
//! - **Shape errors** ([`JsonError::UnmarshalType`], [`JsonError::UnknownField`]): the JSON
//!   is well formed but does not fit the destination.
//! - **Representation errors** ([`JsonError::UnsupportedType`], [`JsonError::UnsupportedValue`]):
//!   the value exists in memory but has no JSON rendering (`NaN`, a `Mutex`, ...).
//! - **Safety ceilings** ([`JsonError::MaxDepthExceeded`], [`JsonError::CyclicValue`]).
//! - **Hook failures** ([`JsonError::Marshaler`], [`JsonError::Unmarshaler`]).
//! - **I/O** ([`JsonError::Io`], [`JsonError::EndOfStream`]): only produced by the stream
//!   and file entry points.
//!
//! `JsonError` is `Clone`; wrapped sources are held behind `Arc`.
//!
//! ## Usage
//!
//! ```rust
//! use opjson::JsonError;
//!
//! let err = opjson::from_slice::<Vec<u32>>(b"[1,2").unwrap_err();
//! match err {
//!     JsonError::Syntax { offset, .. } => assert_eq!(offset, 4),
//!     other => panic!("unexpected error: {other}"),
//! }
//! ```

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::Arc;

use thiserror::Error;

/// A specialized `Result` type for opjson operations.
pub type Result<T> = std::result::Result<T, JsonError>;

/// The error type returned by user hooks ([`crate::MarshalJson`], [`crate::UnmarshalJson`]).
pub type HookError = Box<dyn StdError + Send + Sync + 'static>;

/// The master error enum covering every failure domain.
#[derive(Debug, Clone, Error)]
pub enum JsonError {
    /// The decode destination cannot be written: it is null, or the program was
    /// compiled for a different type.
    #[error("invalid decode target `{type_name}`: {reason}")]
    InvalidTarget {
        /// Name of the destination type.
        type_name: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// Malformed JSON.
    #[error("syntax error at offset {offset}: {msg}")]
    Syntax {
        /// Human readable description.
        msg: String,
        /// Byte offset into the input.
        offset: usize,
    },

    /// A well-formed JSON value does not fit the destination.
    #[error("cannot decode JSON {value} into `{type_name}`{} at offset {offset}", field_suffix(.field))]
    UnmarshalType {
        /// The JSON value class that was found (`"string"`, `"number 300"`, ...).
        value: String,
        /// The destination type.
        type_name: &'static str,
        /// The struct field or map key being decoded, if any.
        field: Option<String>,
        /// Byte offset of the offending value.
        offset: usize,
    },

    /// A reachable type has no JSON representation.
    #[error("unsupported type `{type_name}`: {reason}")]
    UnsupportedType {
        /// The offending type.
        type_name: &'static str,
        /// Why it cannot be represented.
        reason: &'static str,
    },

    /// A value that exists in memory has no JSON rendering (`NaN`, infinities).
    #[error("unsupported value {value} of type `{type_name}`")]
    UnsupportedValue {
        /// Rendering of the value.
        value: String,
        /// Its type.
        type_name: &'static str,
    },

    /// Input nesting exceeded the decode ceiling.
    #[error("exceeded max nesting depth of {limit} at offset {offset}")]
    MaxDepthExceeded {
        /// The ceiling that was hit.
        limit: usize,
        /// Byte offset of the opening bracket that crossed it.
        offset: usize,
    },

    /// An object key matched no field while unknown fields are disallowed.
    #[error("unknown field \"{field}\" at offset {offset}")]
    UnknownField {
        /// The unmatched key.
        field: String,
        /// Byte offset of the key.
        offset: usize,
    },

    /// The pointer graph of the encoded value loops back on itself.
    #[error("encountered a cycle via `{type_name}`")]
    CyclicValue {
        /// Pointee type at which the cycle was detected.
        type_name: &'static str,
    },

    /// A marshal hook failed or returned invalid JSON.
    #[error("marshal hook of `{type_name}` failed: {source}")]
    Marshaler {
        /// Type whose hook failed.
        type_name: &'static str,
        /// Error produced by the hook.
        #[source]
        source: HookFailure,
    },

    /// An unmarshal hook failed.
    #[error("unmarshal hook of `{type_name}` failed: {source}")]
    Unmarshaler {
        /// Type whose hook failed.
        type_name: &'static str,
        /// Error produced by the hook.
        #[source]
        source: HookFailure,
    },

    /// Reading or writing an external source failed.
    #[error("I/O error: {0}")]
    Io(#[source] Arc<io::Error>),

    /// A stream decoder reached the end of its source between values.
    #[error("end of stream")]
    EndOfStream,
}

fn field_suffix(field: &Option<String>) -> String {
    match field {
        Some(name) => format!(" (field \"{name}\")"),
        None => String::new(),
    }
}

impl JsonError {
    pub(crate) fn syntax(msg: impl Into<String>, offset: usize) -> Self {
        JsonError::Syntax {
            msg: msg.into(),
            offset,
        }
    }

    /// Byte offset into the input, for errors raised while decoding.
    pub fn offset(&self) -> Option<usize> {
        match self {
            JsonError::Syntax { offset, .. }
            | JsonError::UnmarshalType { offset, .. }
            | JsonError::MaxDepthExceeded { offset, .. }
            | JsonError::UnknownField { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    /// Moves a buffer-relative offset by `base` bytes.
    pub(crate) fn shift_offset(mut self, base: usize) -> Self {
        match &mut self {
            JsonError::Syntax { offset, .. }
            | JsonError::UnmarshalType { offset, .. }
            | JsonError::MaxDepthExceeded { offset, .. }
            | JsonError::UnknownField { offset, .. } => *offset += base,
            _ => {}
        }
        self
    }
}

impl From<io::Error> for JsonError {
    fn from(err: io::Error) -> Self {
        JsonError::Io(Arc::new(err))
    }
}

/// Cloneable wrapper around the error a user hook returned.
#[derive(Clone)]
pub struct HookFailure(Arc<dyn StdError + Send + Sync + 'static>);

impl HookFailure {
    pub(crate) fn new(err: HookError) -> Self {
        Self(Arc::from(err))
    }

    pub(crate) fn from_json(err: JsonError) -> Self {
        Self(Arc::new(err))
    }

    /// The error as returned by the hook.
    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.0
    }
}

impl fmt::Debug for HookFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for HookFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl StdError for HookFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}
