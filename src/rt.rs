// src/rt.rs

//! Runtime utilities for generated code (Macros).
//! Do not use directly.

#![allow(unsafe_code)]

use std::fmt;

pub use crate::cache::TypeSlot;
pub use crate::describe::Describe;
pub use crate::descriptor::{DescribeCx, FieldOptions, Kind};
pub use crate::hooks::Hooks;

/// Field options as emitted by `#[json(...)]`.
pub const fn options(omit_empty: bool, omit_zero: bool, as_string: bool, flatten: bool) -> FieldOptions {
    FieldOptions {
        omit_empty,
        omit_zero,
        as_string,
        flatten,
    }
}

// --- UNSUPPORTED FIELD WRAPPER ---

/// Holds a value that has no JSON form, such as a raw or function pointer.
///
/// The struct carrying it still compiles. Encoding or decoding fails with
/// [`crate::JsonError::UnsupportedType`] only when the field is actually
/// reached, so an `omitempty` field that is `None` encodes fine.
pub struct Unsupported<T>(pub Option<T>);

impl<T> Default for Unsupported<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T> fmt::Debug for Unsupported<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.is_some() {
            "Unsupported(Some(..))"
        } else {
            "Unsupported(None)"
        })
    }
}

unsafe impl<T: 'static> Describe for Unsupported<T> {
    fn describe(_cx: &mut DescribeCx) -> Kind {
        Kind::Unsupported {
            reason: "field type has no JSON form",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::mem::offset_of;

    use super::*;
    use crate::error::JsonError;

    #[derive(Debug, Default)]
    struct Callback {
        id: u32,
        handler: Unsupported<fn(u32) -> u32>,
    }

    unsafe impl Describe for Callback {
        fn describe(cx: &mut DescribeCx) -> Kind {
            cx.struct_fields()
                .field::<u32>("id", "id", offset_of!(Callback, id), options(false, false, false, false))
                .field::<Unsupported<fn(u32) -> u32>>(
                    "handler",
                    "handler",
                    offset_of!(Callback, handler),
                    options(false, false, false, false),
                )
                .finish()
        }
    }

    #[test]
    fn unsupported_fields_fail_when_reached() {
        let value = Callback {
            id: 1,
            handler: Unsupported(Some(|x| x + 1)),
        };
        assert!(value.handler.0.is_some_and(|f| f(1) == 2));
        let err = crate::to_vec(&value).unwrap_err();
        assert!(matches!(err, JsonError::UnsupportedType { .. }));

        let err = crate::from_slice::<Callback>(br#"{"id":1,"handler":null}"#).unwrap_err();
        assert!(matches!(err, JsonError::UnsupportedType { .. }));

        // Keys that are never reached do not matter.
        let ok: Callback = crate::from_slice(br#"{"id":3}"#).unwrap();
        assert_eq!(ok.id, 3);
    }
}
