//! Program execution.
//!
//! The encode VM walks an [`EncodeProgram`] against a value's memory and
//! appends to the context's buffer. It is generic over the output layout, so
//! the compact and indent programs share one loop with the separator and
//! newline handling resolved at compile time.
//!
//! The decode VM is a pushdown machine: each open container in the input is a
//! frame on the context's stack, which keeps the native stack flat no matter
//! how deep the document nests.
//!
//! The typed entry points check that the program was compiled for the value's
//! type. The `_raw` variants take erased addresses and leave that to the
//! caller.

#![allow(unsafe_code)]

use std::any::TypeId;

use tracing::trace;

use crate::compiler::{DecodeProgram, EncodeProgram};
use crate::error::{JsonError, Result};
use crate::ptr::{PtrConst, PtrMut};
use crate::runtime::RuntimeContext;

pub(crate) mod decode;
pub(crate) mod encode;
pub(crate) mod interface;
pub(crate) mod layout;

use layout::{Compact, Indented};

fn wrong_type(type_name: &'static str) -> JsonError {
    JsonError::InvalidTarget {
        type_name,
        reason: "program was compiled for another type",
    }
}

/// Appends the encoding of `value` to the context's output.
///
/// On error the output is rolled back to where it was before the call, so a
/// context can carry on after a failed encode.
pub fn encode<T: 'static>(program: &EncodeProgram, ctx: &mut RuntimeContext, value: &T) -> Result<()> {
    if program.type_id() != TypeId::of::<T>() {
        return Err(wrong_type(program.type_name()));
    }
    // SAFETY: the program describes `T` and `value` is borrowed for the call.
    unsafe { encode_raw(program, ctx, PtrConst::from_ref(value)) }
}

/// Appends the encoding of the value at `root` to the context's output.
///
/// # Safety
/// `root` must address a live value of the program's root type that is not
/// mutated for the duration of the call.
pub unsafe fn encode_raw(program: &EncodeProgram, ctx: &mut RuntimeContext, root: PtrConst) -> Result<()> {
    let mark = ctx.buf.len();
    let result = if program.is_indent() {
        encode::run::<Indented>(program, ctx, root)
    } else {
        encode::run::<Compact>(program, ctx, root)
    };
    if let Err(err) = &result {
        trace!(type_name = program.type_name(), error = %err, "encode failed, rolling back");
        ctx.buf.truncate(mark);
        for frame in ctx.enc_frames.drain(..) {
            frame.release();
        }
        ctx.leave_shared(0);
        ctx.value_tasks.clear();
        ctx.hook_buf.clear();
        ctx.base_indent = 0;
    }
    result
}

/// Decodes one JSON value starting at byte `pos` of `input` into `target`.
///
/// Leading whitespace is skipped; anything after the value is left for the
/// caller. Returns the position just past the value.
pub fn decode<T: 'static>(
    program: &DecodeProgram,
    ctx: &mut RuntimeContext,
    input: &[u8],
    pos: usize,
    target: Option<&mut T>,
) -> Result<usize> {
    let Some(target) = target else {
        return Err(JsonError::InvalidTarget {
            type_name: program.type_name(),
            reason: "no target to decode into",
        });
    };
    if program.type_id() != TypeId::of::<T>() {
        return Err(wrong_type(program.type_name()));
    }
    // SAFETY: the program describes `T` and `target` is exclusively borrowed.
    unsafe { decode_raw(program, ctx, input, pos, PtrMut::from_mut(target)) }
}

/// Decodes one JSON value starting at `pos` into the value at `target`.
///
/// # Safety
/// `target` must address a live value of the program's root type that nothing
/// else accesses for the duration of the call.
pub unsafe fn decode_raw(
    program: &DecodeProgram,
    ctx: &mut RuntimeContext,
    input: &[u8],
    pos: usize,
    target: PtrMut,
) -> Result<usize> {
    ctx.field.clear();
    ctx.scratch.clear();
    decode::run(program, ctx, input, pos, target)
}
