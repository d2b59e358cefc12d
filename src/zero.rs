//! The omission protocol behind `omitempty` and `omitzero`.
//!
//! Two predicates decide whether a field counts as absent:
//!
//! * [`is_empty`] is the shallow test: `false`, `0`, `""`, zero-length
//!   containers, null pointers and `null` values. A pointer whose pointee is a
//!   container is also empty when that container has no elements. Structs are
//!   never empty.
//! * [`is_zero`] is the deep test: a bound [`crate::IsZero`] hook wins, otherwise
//!   scalars compare against their zero bit pattern, structs and arrays are zero
//!   when every part is, and pointers are zero when null or pointing at a zero
//!   value. A `Vec` or map always exists, so it is never zero; wrap it in
//!   `Option` to get a nil state.
//!
//! Both run against raw addresses using the type graph, and neither recurses on
//! the native stack.

#![allow(unsafe_code)]

use crate::descriptor::{DescId, FieldOptions, FloatKind, IntKind, Kind, TypeGraph};
use crate::ptr::PtrConst;
use crate::value::{Bytes, Number, RawJson, Value};

/// Whether a field with `options` is left out of the encoded object.
///
/// # Safety
/// `ptr` must address a live value of the type described by `desc`.
pub(crate) unsafe fn is_absent(graph: &TypeGraph, desc: DescId, ptr: PtrConst, options: FieldOptions) -> bool {
    (options.omit_empty && is_empty(graph, desc, ptr)) || (options.omit_zero && is_zero(graph, desc, ptr))
}

/// Shallow emptiness test.
///
/// # Safety
/// `ptr` must address a live value of the type described by `desc`.
pub unsafe fn is_empty(graph: &TypeGraph, desc: DescId, ptr: PtrConst) -> bool {
    match &graph[desc].kind {
        Kind::Bool => !*ptr.get::<bool>(),
        Kind::Int(kind) => int_is_zero(*kind, ptr),
        Kind::Float(FloatKind::F32) => *ptr.get::<f32>() == 0.0,
        Kind::Float(FloatKind::F64) => *ptr.get::<f64>() == 0.0,
        Kind::Str => ptr.get::<String>().is_empty(),
        Kind::Bytes => ptr.get::<Bytes>().is_empty(),
        Kind::Number => ptr.get::<Number>().as_str().is_empty(),
        Kind::Raw => ptr.get::<RawJson>().0.is_empty(),
        Kind::Slice { vtable, .. } => (vtable.len)(ptr) == 0,
        Kind::Array { len, .. } => *len == 0,
        Kind::Map { vtable, .. } => (vtable.len)(ptr) == 0,
        Kind::Pointer { pointee, vtable } => match (vtable.get)(ptr) {
            None => true,
            Some(target) => match &graph[*pointee].kind {
                Kind::Slice { vtable, .. } => (vtable.len)(target) == 0,
                Kind::Map { vtable, .. } => (vtable.len)(target) == 0,
                Kind::Bytes => target.get::<Bytes>().is_empty(),
                _ => false,
            },
        },
        Kind::Interface => ptr.get::<Value>().is_null(),
        Kind::Struct { .. } | Kind::Opaque | Kind::Unsupported { .. } => false,
    }
}

/// Deep zero-value test.
///
/// # Safety
/// `ptr` must address a live value of the type described by `desc`.
pub unsafe fn is_zero(graph: &TypeGraph, desc: DescId, ptr: PtrConst) -> bool {
    // Composite values push their parts; the value is zero only if every part is.
    let mut pending: Vec<(DescId, PtrConst)> = Vec::new();
    let mut next = Some((desc, ptr));
    while let Some((desc, ptr)) = next.take().or_else(|| pending.pop()) {
        let node = &graph[desc];
        if let Some(hook) = node.hooks.is_zero {
            if hook(ptr) {
                continue;
            }
            return false;
        }
        let zero = match &node.kind {
            Kind::Bool => !*ptr.get::<bool>(),
            Kind::Int(kind) => int_is_zero(*kind, ptr),
            Kind::Float(FloatKind::F32) => ptr.get::<f32>().to_bits() == 0,
            Kind::Float(FloatKind::F64) => ptr.get::<f64>().to_bits() == 0,
            Kind::Str => ptr.get::<String>().is_empty(),
            Kind::Number => ptr.get::<Number>().as_str().is_empty(),
            Kind::Raw => ptr.get::<RawJson>().0.is_empty(),
            Kind::Bytes | Kind::Slice { .. } | Kind::Map { .. } => false,
            Kind::Array { elem, len, stride } => {
                for i in 0..*len {
                    pending.push((*elem, ptr.add(i * stride)));
                }
                true
            }
            Kind::Struct { fields } => {
                for field in fields {
                    pending.push((field.desc, ptr.add(field.offset)));
                }
                true
            }
            Kind::Pointer { pointee, vtable } => {
                if let Some(target) = (vtable.get)(ptr) {
                    next = Some((*pointee, target));
                }
                true
            }
            Kind::Interface => ptr.get::<Value>().is_null(),
            Kind::Opaque | Kind::Unsupported { .. } => false,
        };
        if !zero {
            return false;
        }
    }
    true
}

unsafe fn int_is_zero(kind: IntKind, ptr: PtrConst) -> bool {
    match kind.width() {
        1 => *ptr.get::<u8>() == 0,
        2 => *ptr.get::<u16>() == 0,
        4 => *ptr.get::<u32>() == 0,
        _ => *ptr.get::<u64>() == 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::Describe;
    use crate::descriptor::DescribeCx;
    use crate::hooks::{Hooks, IsZero};

    fn graph_of<T: Describe>() -> (TypeGraph, DescId) {
        let mut cx = DescribeCx::new();
        let root = cx.describe::<T>();
        (cx.finish(), root)
    }

    fn empty<T: Describe>(value: &T) -> bool {
        let (graph, root) = graph_of::<T>();
        unsafe { is_empty(&graph, root, PtrConst::from_ref(value)) }
    }

    fn zero<T: Describe>(value: &T) -> bool {
        let (graph, root) = graph_of::<T>();
        unsafe { is_zero(&graph, root, PtrConst::from_ref(value)) }
    }

    #[test]
    fn scalars() {
        assert!(empty(&0u16) && zero(&0u16));
        assert!(!empty(&7i64) && !zero(&7i64));
        assert!(empty(&String::new()));
        assert!(empty(&false) && !zero(&true));
    }

    #[test]
    fn negative_zero_is_empty_but_not_zero() {
        assert!(empty(&-0.0f64));
        assert!(!zero(&-0.0f64));
    }

    #[test]
    fn pointers() {
        assert!(empty(&None::<u8>) && zero(&None::<u8>));
        assert!(!empty(&Some(0u8)));
        assert!(zero(&Some(0u8)));
        assert!(!zero(&Some(3u8)));
    }

    #[test]
    fn containers() {
        assert!(empty(&Vec::<u8>::new()));
        assert!(!zero(&Vec::<u8>::new()));
        assert!(empty(&Some(Vec::<u8>::new())));
        assert!(!zero(&Some(Vec::<u8>::new())));
        assert!(zero(&None::<Vec<u8>>));
    }

    #[test]
    fn arrays_are_zero_elementwise() {
        assert!(zero(&[0u32; 4]));
        assert!(!zero(&[0u32, 0, 1, 0]));
        assert!(!empty(&[0u32; 4]));
    }

    #[derive(Default)]
    struct Stamp(i64);

    impl IsZero for Stamp {
        fn is_zero(&self) -> bool {
            self.0 <= 0
        }
    }

    unsafe impl Describe for Stamp {
        fn describe(_cx: &mut DescribeCx) -> Kind {
            Kind::Opaque
        }

        fn hooks() -> Hooks {
            Hooks::NONE.with_is_zero::<Self>()
        }
    }

    #[test]
    fn hook_overrides_structural_check() {
        assert!(zero(&Stamp(-5)));
        assert!(!zero(&Stamp(5)));
        assert!(!empty(&Stamp(0)));
    }
}
