use std::any::TypeId;
use std::fmt;

use super::id::DescId;
use super::vtable::{MapVTable, PointerVTable, SliceVTable};
use crate::hooks::Hooks;
use crate::ptr::PtrMut;

/// Width and signedness of an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntKind {
    /// `i8`
    I8,
    /// `i16`
    I16,
    /// `i32`
    I32,
    /// `i64`
    I64,
    /// `isize`
    Isize,
    /// `u8`
    U8,
    /// `u16`
    U16,
    /// `u32`
    U32,
    /// `u64`
    U64,
    /// `usize`
    Usize,
}

impl IntKind {
    /// Whether the integer is signed.
    pub fn signed(self) -> bool {
        matches!(
            self,
            IntKind::I8 | IntKind::I16 | IntKind::I32 | IntKind::I64 | IntKind::Isize
        )
    }

    /// Width in bytes.
    pub fn width(self) -> usize {
        match self {
            IntKind::I8 | IntKind::U8 => 1,
            IntKind::I16 | IntKind::U16 => 2,
            IntKind::I32 | IntKind::U32 => 4,
            IntKind::I64 | IntKind::U64 => 8,
            IntKind::Isize | IntKind::Usize => std::mem::size_of::<usize>(),
        }
    }
}

/// Width of a float.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatKind {
    /// `f32`
    F32,
    /// `f64`
    F64,
}

/// How map entries are ordered on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrdering {
    /// Entries are sorted bytewise by key text.
    Sorted,
    /// The container already iterates in key-text order.
    Natural,
}

/// Per-field options parsed from `#[json(...)]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldOptions {
    /// Omit nil pointers, empty containers and zero scalars.
    pub omit_empty: bool,
    /// Omit values equal to their zero value.
    pub omit_zero: bool,
    /// Encode scalars inside a JSON string.
    pub as_string: bool,
    /// Promote the fields of a nested struct into the parent object.
    pub flatten: bool,
}

/// One field of a struct descriptor.
#[derive(Clone)]
pub struct FieldDescriptor {
    /// Rust field name.
    pub name: &'static str,
    /// JSON object key.
    pub key: Box<str>,
    /// `"key":` with HTML-sensitive characters left as is.
    pub key_plain: Box<[u8]>,
    /// `"key":` with HTML-sensitive characters escaped.
    pub key_html: Box<[u8]>,
    /// Byte offset within the struct.
    pub offset: usize,
    /// Descriptor of the field type.
    pub desc: DescId,
    /// Field options.
    pub options: FieldOptions,
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("offset", &self.offset)
            .field("desc", &self.desc)
            .field("options", &self.options)
            .finish()
    }
}

/// The shape of a type.
#[derive(Clone)]
pub enum Kind {
    /// `bool`
    Bool,
    /// Integer of the given width.
    Int(IntKind),
    /// Float of the given width.
    Float(FloatKind),
    /// `String`
    Str,
    /// [`crate::Bytes`], base64 in JSON.
    Bytes,
    /// [`crate::Number`], decimal text kept verbatim.
    Number,
    /// [`crate::RawJson`], pre-encoded JSON text.
    Raw,
    /// `Vec<T>`
    Slice {
        /// Element descriptor.
        elem: DescId,
        /// Distance between elements.
        stride: usize,
        /// Container operations.
        vtable: SliceVTable,
    },
    /// `[T; N]`
    Array {
        /// Element descriptor.
        elem: DescId,
        /// Element count.
        len: usize,
        /// Distance between elements.
        stride: usize,
    },
    /// Keyed container.
    Map {
        /// Key descriptor.
        key: DescId,
        /// Value descriptor.
        value: DescId,
        /// Output ordering.
        ordering: KeyOrdering,
        /// Container operations.
        vtable: MapVTable,
    },
    /// Struct with named fields.
    Struct {
        /// Fields in declaration order.
        fields: Vec<FieldDescriptor>,
    },
    /// Single indirection (`Option`, `Box`, `Rc`, `Arc`, `OnceCell`).
    Pointer {
        /// Pointee descriptor.
        pointee: DescId,
        /// Pointer operations.
        vtable: PointerVTable,
    },
    /// [`crate::Value`], a dynamically shaped JSON value.
    Interface,
    /// A type whose JSON form comes only from its hooks.
    Opaque,
    /// No JSON representation. Raised only when reached at runtime.
    Unsupported {
        /// Why the type cannot be represented.
        reason: &'static str,
    },
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Bool => f.write_str("Bool"),
            Kind::Int(k) => write!(f, "Int({k:?})"),
            Kind::Float(k) => write!(f, "Float({k:?})"),
            Kind::Str => f.write_str("Str"),
            Kind::Bytes => f.write_str("Bytes"),
            Kind::Number => f.write_str("Number"),
            Kind::Raw => f.write_str("Raw"),
            Kind::Slice { elem, stride, .. } => write!(f, "Slice({elem}, stride {stride})"),
            Kind::Array { elem, len, .. } => write!(f, "Array({elem}; {len})"),
            Kind::Map {
                key,
                value,
                ordering,
                ..
            } => write!(f, "Map({key} => {value}, {ordering:?})"),
            Kind::Struct { fields } => f.debug_list().entries(fields).finish(),
            Kind::Pointer { pointee, vtable } => write!(
                f,
                "Pointer({pointee}, nullable: {}, shared: {})",
                vtable.nullable, vtable.shared
            ),
            Kind::Interface => f.write_str("Interface"),
            Kind::Opaque => f.write_str("Opaque"),
            Kind::Unsupported { reason } => write!(f, "Unsupported({reason})"),
        }
    }
}

/// Normalized description of one concrete type.
///
/// Immutable once the owning [`TypeGraph`] is built.
#[derive(Clone)]
pub struct TypeDescriptor {
    /// Identity of the described type.
    pub type_id: TypeId,
    /// `std::any::type_name` of the described type.
    pub name: &'static str,
    /// `size_of` the described type.
    pub size: usize,
    /// Shape.
    pub kind: Kind,
    /// Bound capability hooks.
    pub hooks: Hooks,
    /// Overwrites a value of this type with its default.
    pub reset: unsafe fn(PtrMut),
    /// Set when a field of some descendant refers back to this descriptor.
    pub recursive: bool,
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("kind", &self.kind)
            .field("recursive", &self.recursive)
            .finish()
    }
}

/// Arena holding every descriptor reachable from one root type.
#[derive(Debug, Default)]
pub struct TypeGraph {
    nodes: Vec<TypeDescriptor>,
}

impl TypeGraph {
    pub(crate) fn push(&mut self, desc: TypeDescriptor) -> DescId {
        let id = DescId::new(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(desc);
        id
    }

    pub(crate) fn get_mut(&mut self, id: DescId) -> Option<&mut TypeDescriptor> {
        self.nodes.get_mut(id.index())
    }

    /// Descriptor for `id`.
    ///
    /// Ids only come from the graph that issued them, so the lookup is in bounds.
    pub fn get(&self, id: DescId) -> &TypeDescriptor {
        &self.nodes[id.index()]
    }

    /// Number of descriptors.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the graph has no descriptors.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates every descriptor with its id.
    pub fn iter(&self) -> impl Iterator<Item = (DescId, &TypeDescriptor)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, d)| (DescId::new(i as u32), d))
    }
}

impl std::ops::Index<DescId> for TypeGraph {
    type Output = TypeDescriptor;

    fn index(&self, id: DescId) -> &TypeDescriptor {
        self.get(id)
    }
}
