use std::any::TypeId;
use std::collections::HashMap;

use tracing::trace;

use super::core::{FieldDescriptor, FieldOptions, Kind, TypeDescriptor, TypeGraph};
use super::id::DescId;
use super::vtable::reset_default;
use crate::describe::Describe;
use crate::escape;

/// Builds the [`TypeGraph`] for one root type.
///
/// Every distinct type is described once. Asking for a type whose description
/// is still in progress returns its id immediately, which is how self-referencing
/// types terminate: the nested reference becomes a back-reference to the
/// enclosing descriptor.
#[derive(Debug, Default)]
pub struct DescribeCx {
    graph: TypeGraph,
    ids: HashMap<TypeId, DescId>,
    in_progress: Vec<DescId>,
}

impl DescribeCx {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Describes `T` (once) and returns its id.
    pub fn describe<T: Describe>(&mut self) -> DescId {
        let type_id = TypeId::of::<T>();
        if let Some(&id) = self.ids.get(&type_id) {
            if self.in_progress.contains(&id) {
                if let Some(node) = self.graph.get_mut(id) {
                    node.recursive = true;
                }
            }
            return id;
        }

        let id = self.graph.push(TypeDescriptor {
            type_id,
            name: T::type_name(),
            size: std::mem::size_of::<T>(),
            kind: Kind::Unsupported {
                reason: "description in progress",
            },
            hooks: T::hooks(),
            reset: reset_default::<T>,
            recursive: false,
        });
        self.ids.insert(type_id, id);

        self.in_progress.push(id);
        let kind = T::describe(self);
        self.in_progress.pop();

        trace!(type_name = T::type_name(), %id, ?kind, "described type");
        if let Some(node) = self.graph.get_mut(id) {
            node.kind = kind;
        }
        id
    }

    /// Starts describing the fields of a struct.
    pub fn struct_fields(&mut self) -> StructBuilder<'_> {
        StructBuilder {
            cx: self,
            fields: Vec::new(),
        }
    }

    pub(crate) fn finish(self) -> TypeGraph {
        self.graph
    }
}

/// Collects the fields of a struct descriptor in declaration order.
#[derive(Debug)]
pub struct StructBuilder<'cx> {
    cx: &'cx mut DescribeCx,
    fields: Vec<FieldDescriptor>,
}

impl StructBuilder<'_> {
    /// Adds a field of type `F` stored at `offset`, serialized under `key`.
    pub fn field<F: Describe>(
        &mut self,
        name: &'static str,
        key: &str,
        offset: usize,
        options: FieldOptions,
    ) -> &mut Self {
        let desc = self.cx.describe::<F>();
        self.fields.push(FieldDescriptor {
            name,
            key: key.into(),
            key_plain: render_key(key, false),
            key_html: render_key(key, true),
            offset,
            desc,
            options,
        });
        self
    }

    /// Finishes the struct.
    pub fn finish(&mut self) -> Kind {
        Kind::Struct {
            fields: std::mem::take(&mut self.fields),
        }
    }
}

fn render_key(key: &str, escape_html: bool) -> Box<[u8]> {
    let mut out = Vec::with_capacity(key.len() + 3);
    escape::write_str(&mut out, key, escape_html);
    out.push(b':');
    out.into_boxed_slice()
}
