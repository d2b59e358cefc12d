//! Defines the `Describe` trait: how a type explains its shape to the compiler.
//!
//! Describing a type produces a [`Kind`] and, recursively, descriptors for the
//! types it contains. `#[derive(JsonObject)]` implements the trait for structs;
//! the crate implements it for scalars, strings, std containers and smart
//! pointers.

#![allow(unsafe_code)]

use crate::cache::TypeSlot;
use crate::descriptor::{DescribeCx, Kind};
use crate::hooks::Hooks;

/// A type the codec can compile a program for.
///
/// `Default` supplies the zero value the decoder writes before filling a fresh
/// slot (a new `Vec` element, a map entry, an allocated pointee).
///
/// # Safety
///
/// The VM reads and writes values at the byte offsets reported by
/// [`Describe::describe`] and reinterprets them as the field types given there.
/// Implementations must report offsets obtained from `core::mem::offset_of!` and
/// the exact field types, which the derive macro guarantees.
pub unsafe trait Describe: Default + 'static {
    /// Describes the shape of `Self`, describing nested types through `cx`.
    fn describe(cx: &mut DescribeCx) -> Kind;

    /// Capability hooks bound for `Self`.
    fn hooks() -> Hooks {
        Hooks::NONE
    }

    /// Per-type registration slot for the dense program cache.
    ///
    /// Non-generic types return a `static` slot owned by the impl. Generic
    /// types share one function body across instantiations and return `None`,
    /// which routes them to the keyed fallback.
    fn type_slot() -> Option<&'static TypeSlot> {
        None
    }

    /// Name used in descriptors and error messages.
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A type usable as a JSON object key.
///
/// JSON keys are always strings; integer keys are written as their decimal
/// text and parsed back from it.
pub trait MapKey: Describe {
    /// Whether the key type's `Ord` agrees with bytewise order of its text.
    const TEXT_ORDERED: bool;

    /// Appends the unescaped key text.
    fn append_text(&self, out: &mut Vec<u8>);

    /// Parses unescaped key text.
    fn parse_text(text: &str) -> Option<Self>;
}
