//! Encoding and decoding of [`Value`], the dynamically shaped field type.
//!
//! Both directions keep their pending work in the runtime context instead of
//! on the native stack, so a `Value` nested to the decode ceiling encodes and
//! decodes without recursion.

#![allow(unsafe_code)]

use std::collections::BTreeMap;

use super::layout::Layout;
use crate::error::{JsonError, Result};
use crate::escape;
use crate::ptr::PtrConst;
use crate::runtime::RuntimeContext;
use crate::scanner::Scanner;
use crate::value::{Number, Value};

/// Pending step while encoding a `Value`.
#[derive(Debug)]
pub(crate) enum ValueTask {
    /// Encode the `Value` at `ptr`.
    Value { ptr: PtrConst, depth: usize },
    /// Write the `String` at `ptr` as an object key.
    Key { ptr: PtrConst, depth: usize },
    /// Move to the next array element.
    Elem { depth: usize },
    /// Close the container.
    Close { bracket: u8, depth: usize },
}

/// Container under construction while decoding a `Value`.
#[derive(Debug)]
pub(crate) enum ValueBuild {
    Array(Vec<Value>),
    /// Members so far and the key of the member being read.
    Object(BTreeMap<String, Value>, String),
}

/// Encodes the `Value` at `ptr`, starting at nesting `depth`.
///
/// # Safety
/// `ptr` must address a live `Value` that outlives the call.
pub(crate) unsafe fn encode_value<L: Layout>(ctx: &mut RuntimeContext, ptr: PtrConst, depth: usize) -> Result<()> {
    let floor = ctx.value_tasks.len();
    ctx.value_tasks.push(ValueTask::Value { ptr, depth });
    while ctx.value_tasks.len() > floor {
        let Some(task) = ctx.value_tasks.pop() else {
            break;
        };
        match task {
            ValueTask::Value { ptr, depth } => match ptr.get::<Value>() {
                Value::Null => {
                    ctx.buf.extend_from_slice(b"null");
                    L::value_end(ctx);
                }
                Value::Bool(b) => {
                    ctx.buf.extend_from_slice(if *b { b"true" } else { b"false" });
                    L::value_end(ctx);
                }
                Value::Number(n) => {
                    write_number(&mut ctx.buf, n);
                    L::value_end(ctx);
                }
                Value::String(s) => {
                    escape::write_str(&mut ctx.buf, s, ctx.escape_html);
                    L::value_end(ctx);
                }
                Value::Array(items) if items.is_empty() => {
                    ctx.buf.extend_from_slice(b"[]");
                    L::value_end(ctx);
                }
                Value::Array(items) => {
                    L::open_array(ctx, depth);
                    ctx.value_tasks.push(ValueTask::Close { bracket: b']', depth });
                    for (i, item) in items.iter().enumerate().rev() {
                        ctx.value_tasks.push(ValueTask::Value {
                            ptr: PtrConst::from_ref(item),
                            depth: depth + 1,
                        });
                        if i > 0 {
                            ctx.value_tasks.push(ValueTask::Elem { depth });
                        }
                    }
                }
                Value::Object(members) if members.is_empty() => {
                    ctx.buf.extend_from_slice(b"{}");
                    L::value_end(ctx);
                }
                Value::Object(members) => {
                    L::open_object(ctx);
                    ctx.value_tasks.push(ValueTask::Close { bracket: b'}', depth });
                    for (key, item) in members.iter().rev() {
                        ctx.value_tasks.push(ValueTask::Value {
                            ptr: PtrConst::from_ref(item),
                            depth: depth + 1,
                        });
                        ctx.value_tasks.push(ValueTask::Key {
                            ptr: PtrConst::from_ref(key),
                            depth,
                        });
                    }
                }
            },
            ValueTask::Key { ptr, depth } => {
                let key = ptr.get::<String>();
                L::map_key(ctx, key.as_bytes(), depth);
            }
            ValueTask::Elem { depth } => L::elem_next(ctx, depth),
            ValueTask::Close { bracket, depth } => L::close(ctx, bracket, depth),
        }
    }
    Ok(())
}

/// Appends number text; the empty number is `0`.
pub(crate) fn write_number(buf: &mut Vec<u8>, n: &Number) {
    if n.as_str().is_empty() {
        buf.push(b'0');
    } else {
        buf.extend_from_slice(n.as_str().as_bytes());
    }
}

/// Decodes one value at the scanner's cursor. `depth` is the number of
/// containers already open around it.
pub(crate) fn decode_value(sc: &mut Scanner<'_>, ctx: &mut RuntimeContext, depth: usize) -> Result<Value> {
    let floor = ctx.value_stack.len();
    let result = build(sc, ctx, depth, floor);
    ctx.value_stack.truncate(floor);
    result
}

fn build(sc: &mut Scanner<'_>, ctx: &mut RuntimeContext, depth: usize, floor: usize) -> Result<Value> {
    loop {
        let mut value = match sc.next_token() {
            None => return Err(sc.unexpected_end()),
            Some(b'{') => {
                sc.check_depth(depth + ctx.value_stack.len() - floor + 1)?;
                sc.bump();
                if sc.eat(b'}') {
                    Value::Object(BTreeMap::new())
                } else {
                    let key = object_key(sc)?;
                    ctx.value_stack.push(ValueBuild::Object(BTreeMap::new(), key));
                    continue;
                }
            }
            Some(b'[') => {
                sc.check_depth(depth + ctx.value_stack.len() - floor + 1)?;
                sc.bump();
                if sc.eat(b']') {
                    Value::Array(Vec::new())
                } else {
                    ctx.value_stack.push(ValueBuild::Array(Vec::new()));
                    continue;
                }
            }
            Some(b'"') => {
                let mut s = String::new();
                sc.string_into(&mut s)?;
                Value::String(s)
            }
            Some(b't') => {
                sc.literal(b"true")?;
                Value::Bool(true)
            }
            Some(b'f') => {
                sc.literal(b"false")?;
                Value::Bool(false)
            }
            Some(b'n') => {
                sc.literal(b"null")?;
                Value::Null
            }
            Some(b'-' | b'0'..=b'9') => Value::Number(number(sc, ctx.use_number)?),
            Some(_) => return Err(sc.unexpected("looking for beginning of value")),
        };

        // Attach the finished value to its parent, closing parents that end here.
        loop {
            if ctx.value_stack.len() == floor {
                return Ok(value);
            }
            let Some(top) = ctx.value_stack.last_mut() else {
                return Ok(value);
            };
            match top {
                ValueBuild::Array(items) => {
                    items.push(value);
                    match sc.next_token() {
                        Some(b',') => {
                            sc.bump();
                            break;
                        }
                        Some(b']') => {
                            sc.bump();
                            value = Value::Array(std::mem::take(items));
                            ctx.value_stack.pop();
                        }
                        _ => return Err(sc.unexpected("after array element")),
                    }
                }
                ValueBuild::Object(members, key) => {
                    members.insert(std::mem::take(key), value);
                    match sc.next_token() {
                        Some(b',') => {
                            sc.bump();
                            *key = object_key(sc)?;
                            break;
                        }
                        Some(b'}') => {
                            sc.bump();
                            value = Value::Object(std::mem::take(members));
                            ctx.value_stack.pop();
                        }
                        _ => return Err(sc.unexpected("after object key:value pair")),
                    }
                }
            }
        }
    }
}

fn object_key(sc: &mut Scanner<'_>) -> Result<String> {
    if sc.next_token() != Some(b'"') {
        return Err(sc.unexpected("looking for beginning of object key string"));
    }
    let mut key = String::new();
    sc.string_into(&mut key)?;
    sc.expect(b':', "after object key")?;
    Ok(key)
}

fn number(sc: &mut Scanner<'_>, use_number: bool) -> Result<Number> {
    let (start, end) = sc.number_span()?;
    let text = &sc.input()[start..end];
    // The span only holds ASCII digits, signs, `.` and exponents.
    let text = String::from_utf8_lossy(text).into_owned();
    if use_number {
        return Ok(Number::from_text_unchecked(text));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .ok_or_else(|| JsonError::UnmarshalType {
            value: format!("number {text}"),
            type_name: "f64",
            field: None,
            offset: start,
        })
}
