//! The decode VM: walks a [`DecodeProgram`] over input text, writing into a
//! target's address.
//!
//! Containers push a frame instead of recursing, so nesting depth costs heap
//! and is bounded by the scanner's depth check.

#![allow(unsafe_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::interface;
use crate::compiler::{DecodeField, DecodeNode, DecodeOp, DecodeProgram};
use crate::descriptor::{FloatKind, IntKind, Kind};
use crate::error::{HookFailure, JsonError, Result};
use crate::ptr::PtrMut;
use crate::runtime::RuntimeContext;
use crate::scanner::Scanner;
use crate::value::{Bytes, Number, RawJson, Value};

/// An open container in the input.
#[derive(Debug)]
pub(crate) enum DecFrame {
    Struct { node: u32, base: PtrMut, first: bool },
    Slice { node: u32, target: PtrMut, first: bool },
    /// `seen` counts elements read so far, including ones past the end.
    Array { node: u32, base: PtrMut, seen: usize },
    Map { node: u32, target: PtrMut, first: bool },
}

/// Decodes one value at `pos` into `target`. Returns the position after it.
///
/// # Safety
/// `target` must address a live value of the program's root type that nothing
/// else borrows for the duration of the call.
pub(crate) unsafe fn run(
    program: &DecodeProgram,
    ctx: &mut RuntimeContext,
    input: &[u8],
    pos: usize,
    target: PtrMut,
) -> Result<usize> {
    let mut vm = DecodeVm {
        program,
        sc: Scanner::at(input, pos),
    };
    let floor = ctx.dec_frames.len();
    let result = vm.drive(ctx, floor, target);
    ctx.dec_frames.truncate(floor);
    result.map(|()| vm.sc.pos())
}

struct DecodeVm<'p, 'i> {
    program: &'p DecodeProgram,
    sc: Scanner<'i>,
}

impl<'p> DecodeVm<'p, '_> {
    fn node(&self, index: u32) -> &'p DecodeNode {
        &self.program.nodes[index as usize]
    }

    fn type_name(&self, index: u32) -> &'static str {
        self.program.graph[self.node(index).desc].name
    }

    unsafe fn drive(&mut self, ctx: &mut RuntimeContext, floor: usize, target: PtrMut) -> Result<()> {
        let mut next = Some((self.program.root, target));
        loop {
            if let Some((node, ptr)) = next.take() {
                self.value(ctx, node, ptr)?;
            }
            if ctx.dec_frames.len() == floor {
                return Ok(());
            }
            let Some(frame) = ctx.dec_frames.pop() else {
                return Ok(());
            };
            next = self.advance(ctx, frame)?;
        }
    }

    /// Moves an open container to its next child, or closes it.
    unsafe fn advance(&mut self, ctx: &mut RuntimeContext, frame: DecFrame) -> Result<Option<(u32, PtrMut)>> {
        let depth = ctx.dec_frames.len() + 1;
        match frame {
            DecFrame::Struct { node, base, first } => {
                if !self.member(first, b'}')? {
                    return Ok(None);
                }
                let key_offset = self.sc.pos();
                self.read_key(ctx)?;
                let DecodeOp::Struct { fields, index } = &self.node(node).op else {
                    return Err(self.malformed());
                };
                let found = index.get(ctx.field.as_str()).copied().or_else(|| {
                    fields
                        .iter()
                        .position(|f| f.key.eq_ignore_ascii_case(&ctx.field))
                        .map(|i| i as u32)
                });
                ctx.dec_frames.push(DecFrame::Struct {
                    node,
                    base,
                    first: false,
                });
                match found.and_then(|i| fields.get(i as usize)) {
                    Some(field) => {
                        let ptr = self.field_ptr(node, base, field)?;
                        Ok(Some((field.node, ptr)))
                    }
                    None if ctx.disallow_unknown_fields => Err(JsonError::UnknownField {
                        field: ctx.field.clone(),
                        offset: key_offset,
                    }),
                    None => {
                        self.sc.skip_value(depth)?;
                        Ok(None)
                    }
                }
            }
            DecFrame::Slice { node, target, first } => {
                if !self.member(first, b']')? {
                    return Ok(None);
                }
                let DecodeOp::Slice { vtable, elem } = &self.node(node).op else {
                    return Err(self.malformed());
                };
                let ptr = (vtable.push_default)(target);
                ctx.dec_frames.push(DecFrame::Slice {
                    node,
                    target,
                    first: false,
                });
                Ok(Some((*elem, ptr)))
            }
            DecFrame::Array { node, base, seen } => {
                let DecodeOp::Array { len, stride, elem } = &self.node(node).op else {
                    return Err(self.malformed());
                };
                if !self.member(seen == 0, b']')? {
                    // Elements the input did not mention are reset.
                    let reset = self.program.graph[self.node(*elem).desc].reset;
                    for i in seen.min(*len)..*len {
                        reset(base.add(i * stride));
                    }
                    return Ok(None);
                }
                ctx.dec_frames.push(DecFrame::Array {
                    node,
                    base,
                    seen: seen + 1,
                });
                if seen < *len {
                    Ok(Some((*elem, base.add(seen * stride))))
                } else {
                    self.sc.skip_value(depth)?;
                    Ok(None)
                }
            }
            DecFrame::Map { node, target, first } => {
                if !self.member(first, b'}')? {
                    return Ok(None);
                }
                let key_offset = self.sc.pos();
                self.read_key(ctx)?;
                let DecodeOp::Map { vtable, value } = &self.node(node).op else {
                    return Err(self.malformed());
                };
                let Some(ptr) = (vtable.entry)(target, &ctx.field) else {
                    return Err(JsonError::UnmarshalType {
                        value: format!("object key \"{}\"", ctx.field),
                        type_name: self.map_key_name(node),
                        field: Some(ctx.field.clone()),
                        offset: key_offset,
                    });
                };
                ctx.dec_frames.push(DecFrame::Map {
                    node,
                    target,
                    first: false,
                });
                Ok(Some((*value, ptr)))
            }
        }
    }

    /// Consumes the separator before the next member, or the closing bracket.
    /// Returns `false` when the container closed.
    fn member(&mut self, first: bool, close: u8) -> Result<bool> {
        if first {
            if self.sc.eat(close) {
                return Ok(false);
            }
            return Ok(true);
        }
        match self.sc.next_token() {
            Some(b',') => {
                self.sc.bump();
                Ok(true)
            }
            Some(b) if b == close => {
                self.sc.bump();
                Ok(false)
            }
            _ => Err(self.sc.unexpected(if close == b'}' {
                "after object key:value pair"
            } else {
                "after array element"
            })),
        }
    }

    fn read_key(&mut self, ctx: &mut RuntimeContext) -> Result<()> {
        if self.sc.next_token() != Some(b'"') {
            return Err(self.sc.unexpected("looking for beginning of object key string"));
        }
        ctx.field.clear();
        self.sc.string_into(&mut ctx.field)?;
        self.sc.expect(b':', "after object key")
    }

    unsafe fn field_ptr(&self, node: u32, base: PtrMut, field: &DecodeField) -> Result<PtrMut> {
        let mut ptr = base;
        for hop in field.hops.iter() {
            ptr = (hop.vtable.get_or_alloc)(ptr.add(hop.offset)).ok_or_else(|| JsonError::InvalidTarget {
                type_name: self.type_name(node),
                reason: "a flattened shared pointer is not uniquely owned",
            })?;
        }
        Ok(ptr.add(field.offset))
    }

    fn map_key_name(&self, node: u32) -> &'static str {
        let graph = &self.program.graph;
        match &graph[self.node(node).desc].kind {
            Kind::Map { key, .. } => graph[*key].name,
            _ => self.type_name(node),
        }
    }

    fn malformed(&self) -> JsonError {
        JsonError::UnsupportedType {
            type_name: self.program.type_name(),
            reason: "malformed program",
        }
    }

    fn mismatch(&self, ctx: &RuntimeContext, node: u32, value: String) -> JsonError {
        JsonError::UnmarshalType {
            value,
            type_name: self.type_name(node),
            field: (!ctx.field.is_empty()).then(|| ctx.field.clone()),
            offset: self.sc.pos(),
        }
    }

    /// Type error for the value starting at the cursor.
    fn unexpected_value(&self, ctx: &RuntimeContext, node: u32) -> JsonError {
        let class = match self.sc.peek() {
            Some(b'"') => "string",
            Some(b'{') => "object",
            Some(b'[') => "array",
            Some(b't' | b'f') => "bool",
            Some(b'-' | b'0'..=b'9') => "number",
            _ => return self.sc.unexpected("looking for beginning of value"),
        };
        self.mismatch(ctx, node, class.to_owned())
    }

    /// Decodes the value at the cursor into `ptr`. Containers push a frame and
    /// return with their first child still unread.
    unsafe fn value(&mut self, ctx: &mut RuntimeContext, mut node: u32, mut ptr: PtrMut) -> Result<()> {
        let depth = ctx.dec_frames.len();
        loop {
            let Some(tok) = self.sc.next_token() else {
                return Err(self.sc.unexpected_end());
            };
            let op = &self.node(node).op;

            if tok == b'n' && !matches!(op, DecodeOp::Unmarshal { .. } | DecodeOp::Raw | DecodeOp::Interface) {
                self.sc.literal(b"null")?;
                match op {
                    DecodeOp::Slice { vtable, .. } => (vtable.clear)(ptr),
                    DecodeOp::Map { vtable, .. } => (vtable.clear)(ptr),
                    DecodeOp::Pointer { vtable, .. } => (vtable.reset)(ptr),
                    DecodeOp::Array { len, stride, elem } => {
                        let reset = self.program.graph[self.node(*elem).desc].reset;
                        for i in 0..*len {
                            reset(ptr.add(i * stride));
                        }
                    }
                    DecodeOp::Unsupported { reason } => {
                        return Err(JsonError::UnsupportedType {
                            type_name: self.type_name(node),
                            reason: *reason,
                        });
                    }
                    _ => {}
                }
                return Ok(());
            }

            match op {
                DecodeOp::Bool { quoted } => {
                    let v = if *quoted {
                        let text = self.quoted_text(ctx, node)?;
                        match text.as_str() {
                            "true" => true,
                            "false" => false,
                            "null" => return Ok(()),
                            other => return Err(self.mismatch(ctx, node, format!("string \"{other}\""))),
                        }
                    } else {
                        match tok {
                            b't' => {
                                self.sc.literal(b"true")?;
                                true
                            }
                            b'f' => {
                                self.sc.literal(b"false")?;
                                false
                            }
                            _ => return Err(self.unexpected_value(ctx, node)),
                        }
                    };
                    *ptr.get_mut::<bool>() = v;
                }
                DecodeOp::Int { kind, quoted } => {
                    let start = self.sc.pos();
                    let text = self.number_text(ctx, node, *quoted)?;
                    if !write_int(*kind, ptr, &text) {
                        return Err(JsonError::UnmarshalType {
                            value: format!("number {text}"),
                            type_name: self.type_name(node),
                            field: (!ctx.field.is_empty()).then(|| ctx.field.clone()),
                            offset: start,
                        });
                    }
                }
                DecodeOp::Float { kind, quoted } => {
                    let start = self.sc.pos();
                    let text = self.number_text(ctx, node, *quoted)?;
                    let ok = match kind {
                        FloatKind::F32 => text
                            .parse::<f32>()
                            .ok()
                            .filter(|v| v.is_finite())
                            .map(|v| *ptr.get_mut::<f32>() = v)
                            .is_some(),
                        FloatKind::F64 => text
                            .parse::<f64>()
                            .ok()
                            .filter(|v| v.is_finite())
                            .map(|v| *ptr.get_mut::<f64>() = v)
                            .is_some(),
                    };
                    if !ok {
                        return Err(JsonError::UnmarshalType {
                            value: format!("number {text}"),
                            type_name: self.type_name(node),
                            field: (!ctx.field.is_empty()).then(|| ctx.field.clone()),
                            offset: start,
                        });
                    }
                }
                DecodeOp::Str { quoted } => {
                    if tok != b'"' {
                        return Err(self.unexpected_value(ctx, node));
                    }
                    let out = ptr.get_mut::<String>();
                    if *quoted {
                        let text = self.quoted_text(ctx, node)?;
                        if text == "null" {
                            return Ok(());
                        }
                        let mut inner = Scanner::new(text.as_bytes());
                        out.clear();
                        let parsed = if inner.peek() == Some(b'"') {
                            inner.string_into(out).and_then(|()| inner.finish())
                        } else {
                            Err(inner.unexpected("looking for beginning of value"))
                        };
                        if parsed.is_err() {
                            return Err(self.mismatch(ctx, node, format!("string {text:?}")));
                        }
                    } else {
                        out.clear();
                        self.sc.string_into(out)?;
                    }
                }
                DecodeOp::Bytes => {
                    if tok != b'"' {
                        return Err(self.unexpected_value(ctx, node));
                    }
                    let start = self.sc.pos();
                    ctx.scratch.clear();
                    self.sc.string_into(&mut ctx.scratch)?;
                    let decoded = STANDARD.decode(ctx.scratch.as_bytes()).map_err(|_| JsonError::UnmarshalType {
                        value: "string (invalid base64)".to_owned(),
                        type_name: self.type_name(node),
                        field: (!ctx.field.is_empty()).then(|| ctx.field.clone()),
                        offset: start,
                    })?;
                    *ptr.get_mut::<Bytes>() = Bytes(decoded);
                }
                DecodeOp::Number => {
                    let text = match tok {
                        b'"' => {
                            let text = self.quoted_text(ctx, node)?;
                            if text.parse::<Number>().is_err() {
                                return Err(self.mismatch(ctx, node, format!("string {text:?}")));
                            }
                            text
                        }
                        b'-' | b'0'..=b'9' => {
                            let (s, e) = self.sc.number_span()?;
                            String::from_utf8_lossy(&self.sc.input()[s..e]).into_owned()
                        }
                        _ => return Err(self.unexpected_value(ctx, node)),
                    };
                    *ptr.get_mut::<Number>() = Number::from_text_unchecked(text);
                }
                DecodeOp::Raw => {
                    let (s, e) = self.sc.skip_value(depth)?;
                    let raw = ptr.get_mut::<RawJson>();
                    raw.0.clear();
                    raw.0.extend_from_slice(&self.sc.input()[s..e]);
                }
                DecodeOp::Interface => {
                    let value = interface::decode_value(&mut self.sc, ctx, depth)?;
                    *ptr.get_mut::<Value>() = value;
                }
                DecodeOp::Unmarshal { hook } => {
                    let (s, e) = self.sc.skip_value(depth)?;
                    hook(ptr, &self.sc.input()[s..e]).map_err(|err| JsonError::Unmarshaler {
                        type_name: self.type_name(node),
                        source: HookFailure::new(err),
                    })?;
                }
                DecodeOp::Unsupported { reason } => {
                    return Err(JsonError::UnsupportedType {
                        type_name: self.type_name(node),
                        reason: *reason,
                    });
                }
                DecodeOp::Struct { .. } => {
                    if tok != b'{' {
                        return Err(self.unexpected_value(ctx, node));
                    }
                    self.sc.check_depth(depth + 1)?;
                    self.sc.bump();
                    ctx.dec_frames.push(DecFrame::Struct {
                        node,
                        base: ptr,
                        first: true,
                    });
                }
                DecodeOp::Slice { vtable, .. } => {
                    if tok != b'[' {
                        return Err(self.unexpected_value(ctx, node));
                    }
                    self.sc.check_depth(depth + 1)?;
                    self.sc.bump();
                    (vtable.clear)(ptr);
                    ctx.dec_frames.push(DecFrame::Slice {
                        node,
                        target: ptr,
                        first: true,
                    });
                }
                DecodeOp::Array { .. } => {
                    if tok != b'[' {
                        return Err(self.unexpected_value(ctx, node));
                    }
                    self.sc.check_depth(depth + 1)?;
                    self.sc.bump();
                    ctx.dec_frames.push(DecFrame::Array {
                        node,
                        base: ptr,
                        seen: 0,
                    });
                }
                DecodeOp::Map { .. } => {
                    if tok != b'{' {
                        return Err(self.unexpected_value(ctx, node));
                    }
                    self.sc.check_depth(depth + 1)?;
                    self.sc.bump();
                    ctx.dec_frames.push(DecFrame::Map {
                        node,
                        target: ptr,
                        first: true,
                    });
                }
                DecodeOp::Pointer { vtable, pointee } => {
                    let Some(inner) = (vtable.get_or_alloc)(ptr) else {
                        return Err(JsonError::InvalidTarget {
                            type_name: self.type_name(node),
                            reason: "shared pointer is not uniquely owned",
                        });
                    };
                    node = *pointee;
                    ptr = inner;
                    continue;
                }
            }
            return Ok(());
        }
    }

    /// Reads a string token holding a scalar written with the `string` option.
    fn quoted_text(&mut self, ctx: &RuntimeContext, node: u32) -> Result<String> {
        if self.sc.next_token() != Some(b'"') {
            return Err(self.unexpected_value(ctx, node));
        }
        let mut text = String::new();
        self.sc.string_into(&mut text)?;
        Ok(text)
    }

    fn number_text(&mut self, ctx: &RuntimeContext, node: u32, quoted: bool) -> Result<String> {
        if quoted {
            let text = self.quoted_text(ctx, node)?;
            if text.parse::<Number>().is_err() {
                return Err(self.mismatch(ctx, node, format!("string {text:?}")));
            }
            return Ok(text);
        }
        match self.sc.next_token() {
            Some(b'-' | b'0'..=b'9') => {
                let (s, e) = self.sc.number_span()?;
                Ok(String::from_utf8_lossy(&self.sc.input()[s..e]).into_owned())
            }
            _ => Err(self.unexpected_value(ctx, node)),
        }
    }
}

/// Parses integer text into the integer at `ptr`. `false` for fractions,
/// exponents and values out of range.
unsafe fn write_int(kind: IntKind, ptr: PtrMut, text: &str) -> bool {
    fn parse<T: std::str::FromStr>(text: &str) -> Option<T> {
        text.parse().ok()
    }
    match kind {
        IntKind::I8 => parse::<i8>(text).map(|v| *ptr.get_mut::<i8>() = v).is_some(),
        IntKind::I16 => parse::<i16>(text).map(|v| *ptr.get_mut::<i16>() = v).is_some(),
        IntKind::I32 => parse::<i32>(text).map(|v| *ptr.get_mut::<i32>() = v).is_some(),
        IntKind::I64 => parse::<i64>(text).map(|v| *ptr.get_mut::<i64>() = v).is_some(),
        IntKind::Isize => parse::<isize>(text).map(|v| *ptr.get_mut::<isize>() = v).is_some(),
        IntKind::U8 => parse::<u8>(text).map(|v| *ptr.get_mut::<u8>() = v).is_some(),
        IntKind::U16 => parse::<u16>(text).map(|v| *ptr.get_mut::<u16>() = v).is_some(),
        IntKind::U32 => parse::<u32>(text).map(|v| *ptr.get_mut::<u32>() = v).is_some(),
        IntKind::U64 => parse::<u64>(text).map(|v| *ptr.get_mut::<u64>() = v).is_some(),
        IntKind::Usize => parse::<usize>(text).map(|v| *ptr.get_mut::<usize>() = v).is_some(),
    }
}
