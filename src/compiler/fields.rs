//! Struct field resolution: flattening and key conflicts.

use std::collections::HashMap;

use super::opcode::Hop;
use crate::descriptor::{DescId, FieldDescriptor, Kind, TypeGraph};

/// A field as it appears in the JSON object of a struct.
#[derive(Debug, Clone)]
pub(crate) struct FlatField<'g> {
    pub field: &'g FieldDescriptor,
    /// Pointers crossed by flattening. The first is relative to the struct, the
    /// rest to the previous pointee.
    pub hops: Vec<Hop>,
    /// Offset from the struct, or from the last hop's pointee.
    pub offset: usize,
    /// Number of flattened levels above the field.
    pub depth: usize,
}

/// Lists the JSON fields of the struct `desc` in declaration order.
///
/// Flattened fields are promoted into the parent. When several fields share a
/// key, the shallowest one wins; if more than one sits at that depth, the key
/// is dropped entirely.
pub(crate) fn resolve(graph: &TypeGraph, desc: DescId) -> Vec<FlatField<'_>> {
    let mut out = Vec::new();
    let mut path = vec![desc];
    collect(graph, desc, &mut Vec::new(), 0, 0, &mut path, &mut out);

    let mut best: HashMap<&str, (usize, usize)> = HashMap::new();
    for flat in &out {
        let entry = best.entry(&*flat.field.key).or_insert((flat.depth, 0));
        if flat.depth < entry.0 {
            *entry = (flat.depth, 1);
        } else if flat.depth == entry.0 {
            entry.1 += 1;
        }
    }
    out.retain(|flat| best.get(&*flat.field.key) == Some(&(flat.depth, 1)));
    out
}

fn collect<'g>(
    graph: &'g TypeGraph,
    desc: DescId,
    hops: &mut Vec<Hop>,
    offset: usize,
    depth: usize,
    path: &mut Vec<DescId>,
    out: &mut Vec<FlatField<'g>>,
) {
    let Kind::Struct { fields } = &graph[desc].kind else {
        return;
    };
    for field in fields {
        if field.options.flatten {
            if let Some((target, extra)) = flatten_target(graph, field.desc, offset + field.offset) {
                if !path.contains(&target) {
                    let mark = hops.len();
                    let inner_offset = if extra.is_empty() {
                        offset + field.offset
                    } else {
                        0
                    };
                    hops.extend(extra);
                    path.push(target);
                    collect(graph, target, hops, inner_offset, depth + 1, path, out);
                    path.pop();
                    hops.truncate(mark);
                }
                continue;
            }
        }
        out.push(FlatField {
            field,
            hops: hops.clone(),
            offset: offset + field.offset,
            depth,
        });
    }
}

/// The struct reached by flattening a field of type `desc`, and the pointers on
/// the way. `None` when the field is not a struct behind zero or more pointers.
fn flatten_target(graph: &TypeGraph, mut desc: DescId, offset: usize) -> Option<(DescId, Vec<Hop>)> {
    let mut hops = Vec::new();
    loop {
        let node = &graph[desc];
        if node.hooks.marshal.is_some() || node.hooks.unmarshal.is_some() {
            return None;
        }
        match &node.kind {
            Kind::Struct { .. } => return Some((desc, hops)),
            Kind::Pointer { pointee, vtable } => {
                let at = if hops.is_empty() { offset } else { 0 };
                hops.push(Hop {
                    offset: at,
                    vtable: *vtable,
                });
                desc = *pointee;
            }
            _ => return None,
        }
    }
}

/// Whether the `as_string` option applies to values of `desc`.
pub(crate) fn quotable(graph: &TypeGraph, mut desc: DescId) -> bool {
    loop {
        match &graph[desc].kind {
            Kind::Bool | Kind::Int(_) | Kind::Float(_) | Kind::Str | Kind::Number => return true,
            Kind::Pointer { pointee, .. } => desc = *pointee,
            _ => return false,
        }
    }
}
