//! `Describe` implementations for std types.
//!
//! Scalars and the crate's own value types are non-generic, so each impl owns a
//! `static` registration slot. Containers and pointers are generic and fall back
//! to keyed cache lookup when used as a root type.

#![allow(unsafe_code)]

use std::cell::{OnceCell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};
use std::mem::size_of;
use std::rc::Rc;
use std::sync::{Arc, Mutex, RwLock};

use crate::cache::TypeSlot;
use crate::describe::{Describe, MapKey};
use crate::descriptor::{
    DescribeCx, FloatKind, IntKind, KeyOrdering, Kind, MapVTable, PointerVTable, SliceVTable,
};
use crate::escape;
use crate::value::{Bytes, Number, RawJson, Value};

macro_rules! static_slot {
    () => {
        fn type_slot() -> Option<&'static TypeSlot> {
            static SLOT: TypeSlot = TypeSlot::new();
            Some(&SLOT)
        }
    };
}

macro_rules! describe_leaf {
    ($($ty:ty => $kind:expr),* $(,)?) => {
        $(
            unsafe impl Describe for $ty {
                fn describe(_cx: &mut DescribeCx) -> Kind {
                    $kind
                }

                static_slot!();
            }
        )*
    };
}

describe_leaf! {
    bool => Kind::Bool,
    i8 => Kind::Int(IntKind::I8),
    i16 => Kind::Int(IntKind::I16),
    i32 => Kind::Int(IntKind::I32),
    i64 => Kind::Int(IntKind::I64),
    isize => Kind::Int(IntKind::Isize),
    u8 => Kind::Int(IntKind::U8),
    u16 => Kind::Int(IntKind::U16),
    u32 => Kind::Int(IntKind::U32),
    u64 => Kind::Int(IntKind::U64),
    usize => Kind::Int(IntKind::Usize),
    f32 => Kind::Float(FloatKind::F32),
    f64 => Kind::Float(FloatKind::F64),
    String => Kind::Str,
    Bytes => Kind::Bytes,
    Number => Kind::Number,
    RawJson => Kind::Raw,
    Value => Kind::Interface,
}

impl MapKey for String {
    const TEXT_ORDERED: bool = true;

    fn append_text(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }

    fn parse_text(text: &str) -> Option<Self> {
        Some(text.to_owned())
    }
}

macro_rules! int_map_key {
    ($($ty:ty => $append:ident as $wide:ty),* $(,)?) => {
        $(
            impl MapKey for $ty {
                const TEXT_ORDERED: bool = false;

                fn append_text(&self, out: &mut Vec<u8>) {
                    escape::$append(out, *self as $wide);
                }

                fn parse_text(text: &str) -> Option<Self> {
                    text.parse().ok()
                }
            }
        )*
    };
}

int_map_key! {
    i8 => write_i64 as i64,
    i16 => write_i64 as i64,
    i32 => write_i64 as i64,
    i64 => write_i64 as i64,
    isize => write_i64 as i64,
    u8 => write_u64 as u64,
    u16 => write_u64 as u64,
    u32 => write_u64 as u64,
    u64 => write_u64 as u64,
    usize => write_u64 as u64,
}

unsafe impl<T: Describe> Describe for Vec<T> {
    fn describe(cx: &mut DescribeCx) -> Kind {
        Kind::Slice {
            elem: cx.describe::<T>(),
            stride: size_of::<T>(),
            vtable: SliceVTable::of_vec::<T>(),
        }
    }
}

unsafe impl<T: Describe, const N: usize> Describe for [T; N]
where
    [T; N]: Default,
{
    fn describe(cx: &mut DescribeCx) -> Kind {
        Kind::Array {
            elem: cx.describe::<T>(),
            len: N,
            stride: size_of::<T>(),
        }
    }
}

unsafe impl<K, V, S> Describe for HashMap<K, V, S>
where
    K: MapKey + Eq + Hash,
    V: Describe,
    S: BuildHasher + Default + 'static,
{
    fn describe(cx: &mut DescribeCx) -> Kind {
        Kind::Map {
            key: cx.describe::<K>(),
            value: cx.describe::<V>(),
            ordering: KeyOrdering::Sorted,
            vtable: MapVTable::of_hash_map::<K, V, S>(),
        }
    }
}

unsafe impl<K, V> Describe for BTreeMap<K, V>
where
    K: MapKey + Ord,
    V: Describe,
{
    fn describe(cx: &mut DescribeCx) -> Kind {
        Kind::Map {
            key: cx.describe::<K>(),
            value: cx.describe::<V>(),
            ordering: if K::TEXT_ORDERED {
                KeyOrdering::Natural
            } else {
                KeyOrdering::Sorted
            },
            vtable: MapVTable::of_btree_map::<K, V>(),
        }
    }
}

macro_rules! describe_pointer {
    ($($ty:ident => $vtable:ident),* $(,)?) => {
        $(
            unsafe impl<T: Describe> Describe for $ty<T> {
                fn describe(cx: &mut DescribeCx) -> Kind {
                    Kind::Pointer {
                        pointee: cx.describe::<T>(),
                        vtable: PointerVTable::$vtable::<T>(),
                    }
                }
            }
        )*
    };
}

describe_pointer! {
    Option => of_option,
    Box => of_box,
    Rc => of_rc,
    Arc => of_arc,
    OnceCell => of_once_cell,
}

macro_rules! describe_unsupported {
    ($($ty:ident => $reason:literal),* $(,)?) => {
        $(
            unsafe impl<T: Default + 'static> Describe for $ty<T> {
                fn describe(_cx: &mut DescribeCx) -> Kind {
                    Kind::Unsupported { reason: $reason }
                }
            }
        )*
    };
}

describe_unsupported! {
    Mutex => "a mutex cannot be read without locking",
    RwLock => "a lock cannot be read without acquiring it",
    RefCell => "a RefCell cannot be read without a borrow guard",
}
