//! The encode VM: executes an [`EncodeProgram`] against a value's address.

#![allow(unsafe_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::interface;
use super::layout::Layout;
use crate::compiler::{EncodeOp, EncodeProgram};
use crate::descriptor::{FloatKind, IntKind, KeyOrdering, TypeGraph};
use crate::error::{HookFailure, JsonError, Result};
use crate::escape;
use crate::ptr::PtrConst;
use crate::runtime::{MapContext, RuntimeContext};
use crate::value::{Bytes, Number, RawJson};
use crate::zero;

/// Saved VM state, restored when the matching closing instruction runs.
#[derive(Debug)]
pub(crate) enum EncFrame {
    /// Pushed by `Enter` and `Deref`; `tracked` addresses were added to the cycle set.
    Base { saved: PtrConst, tracked: u32 },
    Seq {
        saved: PtrConst,
        data: PtrConst,
        idx: usize,
        len: usize,
        stride: usize,
    },
    Map { saved: PtrConst, map: Box<MapContext> },
    Call { ret: u32, saved: PtrConst, base_indent: usize },
}

impl EncFrame {
    /// Hands any held map context back to its pool.
    pub(crate) fn release(self) {
        if let EncFrame::Map { map, .. } = self {
            MapContext::release(map);
        }
    }
}

fn malformed(program: &EncodeProgram) -> JsonError {
    JsonError::UnsupportedType {
        type_name: program.type_name(),
        reason: "malformed program",
    }
}

/// Runs `program` with `root` as the initial base, appending to `ctx.buf`.
///
/// # Safety
/// `root` must address a live value of the program's root type.
pub(crate) unsafe fn run<L: Layout>(program: &EncodeProgram, ctx: &mut RuntimeContext, root: PtrConst) -> Result<()> {
    let graph: &TypeGraph = &program.graph;
    let ops = &program.ops[..];
    let mut base = root;
    let mut pc = 0usize;

    loop {
        let Some(instr) = ops.get(pc) else {
            return Err(malformed(program));
        };
        pc += 1;
        let p = base.add(instr.offset);
        let depth = instr.depth as usize;

        match &instr.op {
            EncodeOp::Bool { quoted } => {
                quote(ctx, *quoted);
                let text: &[u8] = if *p.get::<bool>() { b"true" } else { b"false" };
                ctx.buf.extend_from_slice(text);
                quote(ctx, *quoted);
                L::value_end(ctx);
            }
            EncodeOp::Int { kind, quoted } => {
                quote(ctx, *quoted);
                write_int(&mut ctx.buf, *kind, p);
                quote(ctx, *quoted);
                L::value_end(ctx);
            }
            EncodeOp::Float { kind, quoted } => {
                quote(ctx, *quoted);
                let ok = match kind {
                    FloatKind::F32 => escape::write_f32(&mut ctx.buf, *p.get::<f32>()),
                    FloatKind::F64 => escape::write_f64(&mut ctx.buf, *p.get::<f64>()),
                };
                if !ok {
                    let value = match kind {
                        FloatKind::F32 => p.get::<f32>().to_string(),
                        FloatKind::F64 => p.get::<f64>().to_string(),
                    };
                    return Err(JsonError::UnsupportedValue {
                        value,
                        type_name: graph[instr.desc].name,
                    });
                }
                quote(ctx, *quoted);
                L::value_end(ctx);
            }
            EncodeOp::Str { quoted } => {
                let s = p.get::<String>();
                if *quoted {
                    ctx.hook_buf.clear();
                    escape::write_str(&mut ctx.hook_buf, s, ctx.escape_html);
                    escape::write_bytes_quoted(&mut ctx.buf, &ctx.hook_buf, false);
                    ctx.hook_buf.clear();
                } else {
                    escape::write_str(&mut ctx.buf, s, ctx.escape_html);
                }
                L::value_end(ctx);
            }
            EncodeOp::Bytes => {
                write_base64(&mut ctx.buf, p.get::<Bytes>(), graph[instr.desc].name)?;
                L::value_end(ctx);
            }
            EncodeOp::Number { quoted } => {
                quote(ctx, *quoted);
                interface::write_number(&mut ctx.buf, p.get::<Number>());
                quote(ctx, *quoted);
                L::value_end(ctx);
            }
            EncodeOp::Raw => {
                let raw = p.get::<RawJson>();
                if raw.as_bytes().is_empty() {
                    ctx.buf.extend_from_slice(b"null");
                } else {
                    L::splice(ctx, raw.as_bytes(), depth).map_err(|err| JsonError::Marshaler {
                        type_name: graph[instr.desc].name,
                        source: HookFailure::from_json(err),
                    })?;
                }
                L::value_end(ctx);
            }
            EncodeOp::Interface => interface::encode_value::<L>(ctx, p, depth)?,
            EncodeOp::Marshal { hook } => {
                let type_name = graph[instr.desc].name;
                let out = hook(p).map_err(|err| JsonError::Marshaler {
                    type_name,
                    source: HookFailure::new(err),
                })?;
                L::splice(ctx, &out, depth).map_err(|err| JsonError::Marshaler {
                    type_name,
                    source: HookFailure::from_json(err),
                })?;
                L::value_end(ctx);
            }
            EncodeOp::Unsupported { reason } => {
                return Err(JsonError::UnsupportedType {
                    type_name: graph[instr.desc].name,
                    reason: *reason,
                });
            }
            EncodeOp::ObjectStart => L::open_object(ctx),
            EncodeOp::Key { index } => {
                let Some(key) = program.keys.get(*index as usize) else {
                    return Err(malformed(program));
                };
                let text = if ctx.escape_html { &key.html } else { &key.plain };
                L::key(ctx, text, depth);
            }
            EncodeOp::ObjectEnd => L::close(ctx, b'}', depth),
            EncodeOp::SkipIfAbsent { options } => {
                if zero::is_absent(graph, instr.desc, p, *options) {
                    pc = instr.jump as usize;
                }
            }
            EncodeOp::Enter { vtable } => match (vtable.get)(p) {
                Some(target) => {
                    ctx.enc_frames.push(EncFrame::Base {
                        saved: base,
                        tracked: 0,
                    });
                    base = target;
                }
                None => pc = instr.jump as usize,
            },
            EncodeOp::Deref { chain } => {
                let mark = ctx.seen.len();
                let mut target = Some(p);
                for vtable in chain.iter() {
                    let Some(current) = target else { break };
                    target = (vtable.get)(current);
                    if let Some(next) = target {
                        if vtable.shared {
                            if !ctx.enter_shared(next.addr()) {
                                return Err(JsonError::CyclicValue {
                                    type_name: graph[instr.desc].name,
                                });
                            }
                        }
                    }
                }
                match target {
                    Some(target) => {
                        ctx.enc_frames.push(EncFrame::Base {
                            saved: base,
                            tracked: (ctx.seen.len() - mark) as u32,
                        });
                        base = target;
                    }
                    None => {
                        ctx.leave_shared(mark);
                        ctx.buf.extend_from_slice(b"null");
                        L::value_end(ctx);
                        pc = instr.jump as usize;
                    }
                }
            }
            EncodeOp::PopBase => match ctx.enc_frames.pop() {
                Some(EncFrame::Base { saved, tracked }) => {
                    base = saved;
                    let keep = ctx.seen.len().saturating_sub(tracked as usize);
                    ctx.leave_shared(keep);
                }
                Some(other) => {
                    other.release();
                    return Err(malformed(program));
                }
                None => return Err(malformed(program)),
            },
            EncodeOp::SliceStart { vtable, stride } => {
                let len = (vtable.len)(p);
                if len == 0 {
                    ctx.buf.extend_from_slice(b"[]");
                    L::value_end(ctx);
                    pc = instr.jump as usize;
                } else {
                    let data = (vtable.data)(p);
                    base = enter_seq(ctx, base, data, len, *stride);
                    L::open_array(ctx, depth);
                }
            }
            EncodeOp::ArrayStart { len, stride } => {
                if *len == 0 {
                    ctx.buf.extend_from_slice(b"[]");
                    L::value_end(ctx);
                    pc = instr.jump as usize;
                } else {
                    base = enter_seq(ctx, base, p, *len, *stride);
                    L::open_array(ctx, depth);
                }
            }
            EncodeOp::ElemNext => {
                let Some(EncFrame::Seq {
                    data, idx, len, stride, ..
                }) = ctx.enc_frames.last_mut()
                else {
                    return Err(malformed(program));
                };
                *idx += 1;
                if *idx < *len {
                    base = data.add(*idx * *stride);
                    L::elem_next(ctx, depth);
                    pc = instr.jump as usize;
                }
            }
            EncodeOp::SeqEnd => match ctx.enc_frames.pop() {
                Some(EncFrame::Seq { saved, .. }) => {
                    base = saved;
                    L::close(ctx, b']', depth);
                }
                Some(other) => {
                    other.release();
                    return Err(malformed(program));
                }
                None => return Err(malformed(program)),
            },
            EncodeOp::MapStart { vtable, ordering } => {
                let len = (vtable.len)(p);
                if len == 0 {
                    ctx.buf.extend_from_slice(b"{}");
                    L::value_end(ctx);
                    pc = instr.jump as usize;
                    continue;
                }
                let sorted = ctx.sort_map_keys && *ordering == KeyOrdering::Sorted;
                let mut map = MapContext::acquire(len, sorted);
                (vtable.collect)(p, &mut map);
                map.seal();
                let Some((key, value)) = map.entry() else {
                    MapContext::release(map);
                    return Err(malformed(program));
                };
                L::open_object(ctx);
                L::map_key(ctx, key, depth);
                ctx.enc_frames.push(EncFrame::Map { saved: base, map });
                base = value;
            }
            EncodeOp::MapNext => {
                let Some(EncFrame::Map { map, .. }) = ctx.enc_frames.last_mut() else {
                    return Err(malformed(program));
                };
                if map.advance() {
                    // The frame is popped while its key is written, then pushed back.
                    let Some(EncFrame::Map { saved, map }) = ctx.enc_frames.pop() else {
                        return Err(malformed(program));
                    };
                    let Some((key, value)) = map.entry() else {
                        MapContext::release(map);
                        return Err(malformed(program));
                    };
                    L::map_key(ctx, key, depth);
                    base = value;
                    ctx.enc_frames.push(EncFrame::Map { saved, map });
                    pc = instr.jump as usize;
                }
            }
            EncodeOp::MapEnd => match ctx.enc_frames.pop() {
                Some(EncFrame::Map { saved, map }) => {
                    MapContext::release(map);
                    base = saved;
                    L::close(ctx, b'}', depth);
                }
                Some(other) => {
                    other.release();
                    return Err(malformed(program));
                }
                None => return Err(malformed(program)),
            },
            EncodeOp::Call => {
                ctx.enc_frames.push(EncFrame::Call {
                    ret: pc as u32,
                    saved: base,
                    base_indent: ctx.base_indent,
                });
                ctx.base_indent += depth;
                base = p;
                pc = instr.jump as usize;
            }
            EncodeOp::Ret => match ctx.enc_frames.pop() {
                Some(EncFrame::Call {
                    ret,
                    saved,
                    base_indent,
                }) => {
                    pc = ret as usize;
                    base = saved;
                    ctx.base_indent = base_indent;
                }
                Some(other) => {
                    other.release();
                    return Err(malformed(program));
                }
                None => return Err(malformed(program)),
            },
            EncodeOp::End => {
                L::finish(ctx);
                return Ok(());
            }
        }
    }
}

fn quote(ctx: &mut RuntimeContext, quoted: bool) {
    if quoted {
        ctx.buf.push(b'"');
    }
}

fn enter_seq(ctx: &mut RuntimeContext, saved: PtrConst, data: PtrConst, len: usize, stride: usize) -> PtrConst {
    ctx.enc_frames.push(EncFrame::Seq {
        saved,
        data,
        idx: 0,
        len,
        stride,
    });
    data
}

unsafe fn write_int(buf: &mut Vec<u8>, kind: IntKind, p: PtrConst) {
    match kind {
        IntKind::I8 => escape::write_i64(buf, i64::from(*p.get::<i8>())),
        IntKind::I16 => escape::write_i64(buf, i64::from(*p.get::<i16>())),
        IntKind::I32 => escape::write_i64(buf, i64::from(*p.get::<i32>())),
        IntKind::I64 => escape::write_i64(buf, *p.get::<i64>()),
        IntKind::Isize => escape::write_i64(buf, *p.get::<isize>() as i64),
        IntKind::U8 => escape::write_u64(buf, u64::from(*p.get::<u8>())),
        IntKind::U16 => escape::write_u64(buf, u64::from(*p.get::<u16>())),
        IntKind::U32 => escape::write_u64(buf, u64::from(*p.get::<u32>())),
        IntKind::U64 => escape::write_u64(buf, *p.get::<u64>()),
        IntKind::Usize => escape::write_u64(buf, *p.get::<usize>() as u64),
    }
}

fn write_base64(buf: &mut Vec<u8>, bytes: &Bytes, type_name: &'static str) -> Result<()> {
    let too_long = || JsonError::UnsupportedValue {
        value: format!("{} bytes", bytes.len()),
        type_name,
    };
    let len = base64::encoded_len(bytes.len(), true).ok_or_else(too_long)?;
    buf.push(b'"');
    let start = buf.len();
    buf.resize(start + len, 0);
    STANDARD
        .encode_slice(&bytes[..], &mut buf[start..])
        .map_err(|_| too_long())?;
    buf.push(b'"');
    Ok(())
}
