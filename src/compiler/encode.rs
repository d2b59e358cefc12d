use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::fields::{self, FlatField};
use super::opcode::{EncodeInstr, EncodeOp, EncodeProgram, EncodedKey};
use crate::descriptor::{DescId, Kind, TypeGraph};

/// Compiles the encode program for `root`.
///
/// Recursive types become subroutines appended after the main `End`; every
/// reference to one compiles to a `Call`.
pub(crate) fn compile_encode(
    graph: &Arc<TypeGraph>,
    root: DescId,
    type_id: TypeId,
    indent: bool,
) -> EncodeProgram {
    let mut c = EncodeCompiler {
        graph,
        ops: Vec::new(),
        keys: Vec::new(),
        routines: HashMap::new(),
        queue: Vec::new(),
        calls: Vec::new(),
    };
    c.value(root, 0, 0, false);
    c.emit(EncodeOp::End, 0, 0, root);

    while let Some(desc) = c.queue.pop() {
        let start = c.ops.len() as u32;
        c.routines.insert(desc, start);
        c.body(desc, 0, 0, false);
        c.emit(EncodeOp::Ret, 0, 0, desc);
    }
    for (pc, desc) in std::mem::take(&mut c.calls) {
        if let Some(&start) = c.routines.get(&desc) {
            c.ops[pc].jump = start;
        }
    }

    debug!(
        type_name = graph[root].name,
        indent,
        ops = c.ops.len(),
        subroutines = c.routines.len(),
        "compiled encode program"
    );
    EncodeProgram {
        ops: c.ops,
        keys: c.keys,
        graph: Arc::clone(graph),
        root,
        type_id,
        indent,
    }
}

struct EncodeCompiler<'g> {
    graph: &'g TypeGraph,
    ops: Vec<EncodeInstr>,
    keys: Vec<EncodedKey>,
    /// Entry point of each compiled subroutine.
    routines: HashMap<DescId, u32>,
    /// Subroutines referenced but not compiled yet.
    queue: Vec<DescId>,
    /// `Call` instructions waiting for their target.
    calls: Vec<(usize, DescId)>,
}

impl EncodeCompiler<'_> {
    fn emit(&mut self, op: EncodeOp, offset: usize, depth: usize, desc: DescId) -> usize {
        self.ops.push(EncodeInstr {
            op,
            offset,
            jump: 0,
            depth: depth as u32,
            desc,
        });
        self.ops.len() - 1
    }

    fn here(&self) -> u32 {
        self.ops.len() as u32
    }

    fn patch(&mut self, pc: usize, target: u32) {
        self.ops[pc].jump = target;
    }

    /// A value of `desc` at `offset` from the current base.
    fn value(&mut self, desc: DescId, offset: usize, depth: usize, quoted: bool) {
        let node = &self.graph[desc];
        if node.recursive && node.hooks.marshal.is_none() {
            let pc = self.emit(EncodeOp::Call, offset, depth, desc);
            self.calls.push((pc, desc));
            if !self.routines.contains_key(&desc) && !self.queue.contains(&desc) {
                self.queue.push(desc);
            }
            return;
        }
        self.body(desc, offset, depth, quoted);
    }

    fn body(&mut self, desc: DescId, offset: usize, depth: usize, quoted: bool) {
        let graph = self.graph;
        let node = &graph[desc];
        if let Some(hook) = node.hooks.marshal {
            self.emit(EncodeOp::Marshal { hook }, offset, depth, desc);
            return;
        }
        let op = match &node.kind {
            Kind::Bool => EncodeOp::Bool { quoted },
            Kind::Int(kind) => EncodeOp::Int { kind: *kind, quoted },
            Kind::Float(kind) => EncodeOp::Float { kind: *kind, quoted },
            Kind::Str => EncodeOp::Str { quoted },
            Kind::Bytes => EncodeOp::Bytes,
            Kind::Number => EncodeOp::Number { quoted },
            Kind::Raw => EncodeOp::Raw,
            Kind::Interface => EncodeOp::Interface,
            Kind::Opaque => EncodeOp::Unsupported {
                reason: "type has no JSON form without a marshal hook",
            },
            Kind::Unsupported { reason } => EncodeOp::Unsupported { reason: *reason },
            Kind::Struct { .. } => return self.object(desc, offset, depth),
            Kind::Pointer { pointee, vtable } => {
                let mut chain = vec![*vtable];
                let mut target = *pointee;
                while let Kind::Pointer { pointee, vtable } = &graph[target].kind {
                    let inner = &graph[target];
                    if inner.recursive || inner.hooks.marshal.is_some() {
                        break;
                    }
                    chain.push(*vtable);
                    target = *pointee;
                }
                let deref = self.emit(
                    EncodeOp::Deref {
                        chain: chain.into_boxed_slice(),
                    },
                    offset,
                    depth,
                    desc,
                );
                self.value(target, 0, depth, quoted);
                self.emit(EncodeOp::PopBase, 0, depth, desc);
                let after = self.here();
                self.patch(deref, after);
                return;
            }
            Kind::Slice { elem, stride, vtable } => {
                let start = self.emit(
                    EncodeOp::SliceStart {
                        vtable: *vtable,
                        stride: *stride,
                    },
                    offset,
                    depth,
                    desc,
                );
                return self.sequence(start, *elem, depth, desc);
            }
            Kind::Array { elem, len, stride } => {
                let start = self.emit(
                    EncodeOp::ArrayStart {
                        len: *len,
                        stride: *stride,
                    },
                    offset,
                    depth,
                    desc,
                );
                return self.sequence(start, *elem, depth, desc);
            }
            Kind::Map {
                value,
                ordering,
                vtable,
                ..
            } => {
                let start = self.emit(
                    EncodeOp::MapStart {
                        vtable: *vtable,
                        ordering: *ordering,
                    },
                    offset,
                    depth,
                    desc,
                );
                let body = self.here();
                self.value(*value, 0, depth + 1, false);
                let next = self.emit(EncodeOp::MapNext, 0, depth, desc);
                self.patch(next, body);
                self.emit(EncodeOp::MapEnd, 0, depth, desc);
                let after = self.here();
                self.patch(start, after);
                return;
            }
        };
        self.emit(op, offset, depth, desc);
    }

    fn sequence(&mut self, start: usize, elem: DescId, depth: usize, desc: DescId) {
        let body = self.here();
        self.value(elem, 0, depth + 1, false);
        let next = self.emit(EncodeOp::ElemNext, 0, depth, desc);
        self.patch(next, body);
        self.emit(EncodeOp::SeqEnd, 0, depth, desc);
        let after = self.here();
        self.patch(start, after);
    }

    fn object(&mut self, desc: DescId, offset: usize, depth: usize) {
        let graph = self.graph;
        self.emit(EncodeOp::ObjectStart, offset, depth, desc);
        for flat in fields::resolve(graph, desc) {
            self.field(&flat, offset, depth);
        }
        self.emit(EncodeOp::ObjectEnd, 0, depth, desc);
    }

    fn field(&mut self, flat: &FlatField<'_>, offset: usize, depth: usize) {
        let field = flat.field;
        let mut enters = Vec::with_capacity(flat.hops.len());
        for (i, hop) in flat.hops.iter().enumerate() {
            let at = if i == 0 { offset + hop.offset } else { hop.offset };
            enters.push(self.emit(EncodeOp::Enter { vtable: hop.vtable }, at, depth, field.desc));
        }
        let at = if flat.hops.is_empty() {
            offset + flat.offset
        } else {
            flat.offset
        };

        let options = field.options;
        let skip = (options.omit_empty || options.omit_zero)
            .then(|| self.emit(EncodeOp::SkipIfAbsent { options }, at, depth, field.desc));

        let index = self.keys.len() as u32;
        self.keys.push(EncodedKey {
            plain: field.key_plain.clone(),
            html: field.key_html.clone(),
        });
        self.emit(EncodeOp::Key { index }, 0, depth, field.desc);
        let quoted = options.as_string && fields::quotable(self.graph, field.desc);
        self.value(field.desc, at, depth + 1, quoted);

        if let Some(skip) = skip {
            let after = self.here();
            self.patch(skip, after);
        }
        for _ in &flat.hops {
            self.emit(EncodeOp::PopBase, 0, depth, field.desc);
        }
        // A null hop skips the field and the bases entered before it.
        let end = self.here();
        for (i, pc) in enters.into_iter().enumerate() {
            self.patch(pc, end - i as u32);
        }
    }
}
