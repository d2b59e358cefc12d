//! Type descriptors: the normalized shape of every type the codec handles.
//!
//! A [`TypeGraph`] is an arena of [`TypeDescriptor`]s addressed by [`DescId`].
//! It is built once per root type by [`DescribeCx`] walking the
//! [`crate::Describe`] implementations, and never changes afterwards, so
//! compiled programs can share it freely across threads.

/// Descriptor, kind and field definitions plus the `TypeGraph` arena.
pub mod core;
/// Defines the `DescId` type.
pub mod id;
/// Monomorphized container operations.
pub mod vtable;

mod builder;

pub use self::core::{
    FieldDescriptor, FieldOptions, FloatKind, IntKind, KeyOrdering, Kind, TypeDescriptor, TypeGraph,
};
pub use builder::{DescribeCx, StructBuilder};
pub use id::DescId;
pub use vtable::{MapVTable, PointerVTable, SliceVTable};
