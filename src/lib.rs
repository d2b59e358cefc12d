//! # opjson
//!
//! A JSON encoder and decoder that compiles every type into an opcode program
//! once and then replays that program against values in memory.
//!
//! ## Overview
//!
//! Reflection-driven codecs rediscover a type's shape on every call: which
//! fields it has, where they live, how each one is rendered. opjson does that
//! work once per type. The first time a type is seen it is described into a
//! graph of type descriptors, the graph is compiled into flat instruction
//! sequences, and the programs are cached. Every later call is a cache lookup
//! followed by a tight interpreter loop over raw field offsets.
//!
//! ### Key Features
//!
//! *   **Compiled Programs:** One encode program per layout (compact and indent) and one
//!     decode program per type. Recursive types compile to subroutines of their own program.
//! *   **O(1) Program Lookup:** Non-generic types own a static slot that is assigned a dense
//!     index on first use; resolving a program is an atomic load and two array reads.
//! *   **Pooled Contexts:** Per-call state (buffers, VM stacks, cycle-detection set) comes from
//!     a bounded free-list, so steady-state calls do not allocate bookkeeping.
//! *   **Flat Decoding:** The decoder is an explicit pushdown machine. Nesting up to
//!     [`constants::MAX_DECODE_DEPTH`] never touches the native stack.
//! *   **Reference Semantics:** Field omission (`omitempty`, `omitzero`), quoted scalars,
//!     embedded-field promotion, HTML escaping and float formatting follow the behaviour of
//!     the widely used reference JSON codec.
//!
//! ## Architecture
//!
//! ### The Pipeline
//!
//! ```text
//! Describe (types) -> TypeGraph -> compiler -> EncodeProgram / DecodeProgram -> ProgramCache
//!                                                                  |
//!                                         RuntimeContext (pooled) -+-> vm::encode / vm::decode
//! ```
//!
//! ## Core Concepts
//!
//! ### `Describe`
//!
//! The [`Describe`] trait is how a type explains its memory layout: field names, offsets,
//! nested types and options. `#[derive(JsonObject)]` implements it for structs; the crate
//! implements it for scalars, strings, std collections and smart pointers.
//!
//! ### Programs and the Cache
//!
//! The [`compiler`] turns a descriptor graph into an [`EncodeProgram`] or a
//! [`DecodeProgram`]. The [`ProgramCache`] hands out compiled programs, building each one at
//! most once.
//!
//! ### Runtime Contexts
//!
//! A [`RuntimeContext`] holds everything one call mutates. [`ContextGuard`] borrows one from
//! the pool and returns it, cleared, when dropped.
//!
//! ## Usage Patterns
//!
//! ### Basic Encoding and Decoding
//!
//! ```rust
//! use opjson::JsonObject;
//!
//! #[derive(Debug, Default, PartialEq, JsonObject)]
//! struct User {
//!     #[json(rename = "Name")]
//!     name: String,
//!     #[json(rename = "Age")]
//!     age: u32,
//!     #[json(omitempty)]
//!     email: Option<String>,
//! }
//!
//! let user = User { name: "Alice".into(), age: 30, email: None };
//! let json = opjson::to_vec(&user).unwrap();
//! assert_eq!(json, br#"{"Name":"Alice","Age":30}"#);
//!
//! let back: User = opjson::from_slice(&json).unwrap();
//! assert_eq!(back, user);
//! ```
//!
//! ### Configured Codecs
//!
//! ```rust
//! use opjson::{Codec, Config};
//!
//! let codec = Codec::new(Config::builder().indent("", "  ").escape_html(false).build());
//! let json = codec.to_vec(&vec!["<a>".to_string()]).unwrap();
//! assert_eq!(json, b"[\n  \"<a>\"\n]");
//! ```
//!
//! ### Dynamic Values
//!
//! ```rust
//! use opjson::Value;
//!
//! let v: Value = opjson::from_slice(br#"{"list": [1, "two", null]}"#).unwrap();
//! assert_eq!(v["list"][1].as_str(), Some("two"));
//! ```
//!
//! ### Safety and Error Handling
//!
//! * **Encapsulated Unsafe:** raw address arithmetic lives in the `ptr` module and the VMs.
//!   The offsets they trust come from `core::mem::offset_of!` via the derive macro.
//! * **No Panics:** No `unwrap()` or `panic!()` calls in the library (enforced by clippy lints).
//! * **Comprehensive Errors:** All failures correspond to a [`JsonError`] variant.
//! * **Bounded Work:** decode depth is capped and runtime reference cycles are reported
//!   as [`JsonError::CyclicValue`] instead of recursing forever.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// Lets the derive macro's `::opjson` paths resolve inside this crate's own tests.
extern crate self as opjson;

// --- PUBLIC API MODULES ---
pub mod api;
pub mod cache;
pub mod config;
pub mod describe;
pub mod error;
pub mod escape;
pub mod hooks;
pub mod reformat;
pub mod stream;
pub mod value;

// --- INTERNAL IMPLEMENTATION MODULES (Hidden from Docs) ---
#[doc(hidden)]
pub mod compiler;
#[doc(hidden)]
pub mod descriptor;
#[doc(hidden)]
pub mod ptr;
#[doc(hidden)]
pub mod runtime;
#[doc(hidden)]
pub mod vm;

// Private modules
mod describe_impls;
mod scanner;
mod zero;

// --- MACRO SUPPORT MODULES ---

/// Runtime utilities used by the derived code.
#[doc(hidden)]
pub mod rt;

// --- RE-EXPORTS ---

pub use api::{from_file, from_slice, from_slice_into, to_vec, to_vec_indent, Codec};
pub use cache::{compile, CacheStats, CompiledType, ProgramCache, TypeSlot};
pub use compiler::{DecodeProgram, EncodeProgram};
pub use config::{Config, ConfigBuilder, IndentConfig};
pub use describe::{Describe, MapKey};
pub use descriptor::{DescribeCx, FieldOptions, Kind};
pub use error::{HookError, HookFailure, JsonError, Result};
pub use hooks::{Hooks, IsZero, MarshalJson, UnmarshalJson};
pub use reformat::{compact, indent, valid};
pub use runtime::{acquire_context, release_context, ContextGuard, ContextLengths, RuntimeContext};
pub use stream::{StreamBuffer, StreamDecoder, StreamEncoder, StreamIter};
pub use value::{Bytes, Number, RawJson, Value};

// Re-export the derive macro so it is accessible as `opjson::JsonObject`
pub use opjson_derive::JsonObject;

/// Constants used throughout the library.
pub mod constants {
    /// Deepest nesting of arrays and objects the decoder accepts.
    pub const MAX_DECODE_DEPTH: usize = 10_000;

    /// Outputs up to this many bytes hand the pooled buffer itself to the
    /// caller; larger ones are copied out so the grown buffer stays pooled.
    pub const DETACH_THRESHOLD: usize = 1024;

    /// Capacity a pooled buffer may keep across calls.
    pub const MAX_RETAINED_CAPACITY: usize = 64 * 1024;

    /// Idle runtime contexts kept by the pool.
    pub const CONTEXT_POOL_CAPACITY: usize = 64;

    /// Idle map contexts kept by the pool.
    pub const MAP_CONTEXT_POOL_CAPACITY: usize = 256;

    /// Slots per lazily allocated segment of the dense program table.
    pub const SEGMENT_LEN: usize = 1024;

    /// Types the dense program table can hold (about 2 MiB of slots).
    pub const DENSE_SLOT_LIMIT: usize = 131_072;

    /// Bytes a stream decoder requests per read.
    pub const STREAM_CHUNK_SIZE: usize = 8 * 1024;
}
