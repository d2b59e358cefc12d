use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::fields;
use super::opcode::{DecodeField, DecodeNode, DecodeOp, DecodeProgram};
use crate::descriptor::{DescId, Kind, TypeGraph};

/// Compiles the decode program for `root`.
///
/// Nodes are memoized per descriptor, so a recursive type refers back to the
/// node already being compiled.
pub(crate) fn compile_decode(graph: &Arc<TypeGraph>, root: DescId, type_id: TypeId) -> DecodeProgram {
    let mut c = DecodeCompiler {
        graph,
        nodes: Vec::new(),
        memo: HashMap::new(),
    };
    let root_node = c.node(root, false);
    debug!(
        type_name = graph[root].name,
        nodes = c.nodes.len(),
        "compiled decode program"
    );
    DecodeProgram {
        nodes: c.nodes,
        root: root_node,
        graph: Arc::clone(graph),
        type_id,
    }
}

struct DecodeCompiler<'g> {
    graph: &'g TypeGraph,
    nodes: Vec<DecodeNode>,
    memo: HashMap<(DescId, bool), u32>,
}

impl DecodeCompiler<'_> {
    fn node(&mut self, desc: DescId, quoted: bool) -> u32 {
        if let Some(&index) = self.memo.get(&(desc, quoted)) {
            return index;
        }
        let index = self.nodes.len() as u32;
        self.nodes.push(DecodeNode {
            op: DecodeOp::Unsupported {
                reason: "incomplete program",
            },
            desc,
        });
        self.memo.insert((desc, quoted), index);

        let op = self.op(desc, quoted);
        self.nodes[index as usize].op = op;
        index
    }

    fn op(&mut self, desc: DescId, quoted: bool) -> DecodeOp {
        let graph = self.graph;
        let node = &graph[desc];
        if let Some(hook) = node.hooks.unmarshal {
            return DecodeOp::Unmarshal { hook };
        }
        match &node.kind {
            Kind::Bool => DecodeOp::Bool { quoted },
            Kind::Int(kind) => DecodeOp::Int { kind: *kind, quoted },
            Kind::Float(kind) => DecodeOp::Float { kind: *kind, quoted },
            Kind::Str => DecodeOp::Str { quoted },
            Kind::Bytes => DecodeOp::Bytes,
            Kind::Number => DecodeOp::Number,
            Kind::Raw => DecodeOp::Raw,
            Kind::Interface => DecodeOp::Interface,
            Kind::Opaque => DecodeOp::Unsupported {
                reason: "type has no JSON form without an unmarshal hook",
            },
            Kind::Unsupported { reason } => DecodeOp::Unsupported { reason: *reason },
            Kind::Struct { .. } => {
                let resolved = fields::resolve(graph, desc);
                let mut out = Vec::with_capacity(resolved.len());
                let mut index = HashMap::with_capacity(resolved.len());
                for flat in resolved {
                    let field = flat.field;
                    let quoted = field.options.as_string && fields::quotable(graph, field.desc);
                    let node = self.node(field.desc, quoted);
                    index.insert(field.key.clone(), out.len() as u32);
                    out.push(DecodeField {
                        key: field.key.clone(),
                        hops: flat.hops.into_boxed_slice(),
                        offset: flat.offset,
                        node,
                    });
                }
                DecodeOp::Struct {
                    fields: out.into_boxed_slice(),
                    index,
                }
            }
            Kind::Slice { elem, vtable, .. } => DecodeOp::Slice {
                vtable: *vtable,
                elem: self.node(*elem, false),
            },
            Kind::Array { elem, len, stride } => DecodeOp::Array {
                len: *len,
                stride: *stride,
                elem: self.node(*elem, false),
            },
            Kind::Map { value, vtable, .. } => DecodeOp::Map {
                vtable: *vtable,
                value: self.node(*value, false),
            },
            Kind::Pointer { pointee, vtable } => DecodeOp::Pointer {
                vtable: *vtable,
                pointee: self.node(*pointee, quoted),
            },
        }
    }
}
