//! Output layouts shared by the program VM and the value encoder.
//!
//! Every value is followed by a separator (`,` compact, `,\n` indented).
//! Closing a container rewinds the separator of its last member, and the
//! top-level `End` strips the final one, so no instruction needs to know
//! whether it is the first or last member of anything.

use crate::error::Result;
use crate::escape;
use crate::reformat;
use crate::runtime::RuntimeContext;

pub(crate) trait Layout {
    /// Separator written after every value.
    const SEP: &'static [u8];

    fn value_end(ctx: &mut RuntimeContext) {
        ctx.buf.extend_from_slice(Self::SEP);
    }

    fn open_object(ctx: &mut RuntimeContext);

    /// `[` plus whatever precedes the first element.
    fn open_array(ctx: &mut RuntimeContext, depth: usize);

    /// Written before every element after the first.
    fn elem_next(ctx: &mut RuntimeContext, depth: usize);

    /// A pre-rendered `"key":`.
    fn key(ctx: &mut RuntimeContext, key: &[u8], depth: usize);

    /// Unescaped map key text.
    fn map_key(ctx: &mut RuntimeContext, key: &[u8], depth: usize);

    /// Rewinds the last separator and closes a non-empty or empty container.
    fn close(ctx: &mut RuntimeContext, bracket: u8, depth: usize);

    /// Copies a complete JSON value produced elsewhere into the layout.
    fn splice(ctx: &mut RuntimeContext, json: &[u8], depth: usize) -> Result<()>;

    /// Strips the separator after the top-level value.
    fn finish(ctx: &mut RuntimeContext) {
        if ctx.buf.ends_with(Self::SEP) {
            ctx.buf.truncate(ctx.buf.len() - Self::SEP.len());
        }
    }
}

pub(crate) struct Compact;

impl Layout for Compact {
    const SEP: &'static [u8] = b",";

    fn open_object(ctx: &mut RuntimeContext) {
        ctx.buf.push(b'{');
    }

    fn open_array(ctx: &mut RuntimeContext, _depth: usize) {
        ctx.buf.push(b'[');
    }

    fn elem_next(_ctx: &mut RuntimeContext, _depth: usize) {}

    fn key(ctx: &mut RuntimeContext, key: &[u8], _depth: usize) {
        ctx.buf.extend_from_slice(key);
    }

    fn map_key(ctx: &mut RuntimeContext, key: &[u8], _depth: usize) {
        escape::write_bytes_quoted(&mut ctx.buf, key, ctx.escape_html);
        ctx.buf.push(b':');
    }

    fn close(ctx: &mut RuntimeContext, bracket: u8, _depth: usize) {
        if ctx.buf.last() == Some(&b',') {
            ctx.buf.pop();
        }
        ctx.buf.push(bracket);
        ctx.buf.push(b',');
    }

    fn splice(ctx: &mut RuntimeContext, json: &[u8], _depth: usize) -> Result<()> {
        reformat::compact_into(&mut ctx.buf, json, ctx.escape_html)
    }
}

pub(crate) struct Indented;

impl Layout for Indented {
    const SEP: &'static [u8] = b",\n";

    fn open_object(ctx: &mut RuntimeContext) {
        ctx.buf.extend_from_slice(b"{\n");
    }

    fn open_array(ctx: &mut RuntimeContext, depth: usize) {
        ctx.buf.extend_from_slice(b"[\n");
        ctx.indent(depth + 1);
    }

    fn elem_next(ctx: &mut RuntimeContext, depth: usize) {
        ctx.indent(depth + 1);
    }

    fn key(ctx: &mut RuntimeContext, key: &[u8], depth: usize) {
        ctx.indent(depth + 1);
        ctx.buf.extend_from_slice(key);
        ctx.buf.push(b' ');
    }

    fn map_key(ctx: &mut RuntimeContext, key: &[u8], depth: usize) {
        ctx.indent(depth + 1);
        escape::write_bytes_quoted(&mut ctx.buf, key, ctx.escape_html);
        ctx.buf.extend_from_slice(b": ");
    }

    fn close(ctx: &mut RuntimeContext, bracket: u8, depth: usize) {
        if ctx.buf.ends_with(b",\n") {
            ctx.buf.truncate(ctx.buf.len() - 2);
            ctx.newline_indent(depth);
        } else if ctx.buf.last() == Some(&b'\n') {
            // Nothing was written since `{\n`.
            ctx.buf.pop();
        }
        ctx.buf.push(bracket);
        ctx.buf.extend_from_slice(b",\n");
    }

    fn splice(ctx: &mut RuntimeContext, json: &[u8], depth: usize) -> Result<()> {
        let level = ctx.base_indent + depth;
        reformat::indent_into(&mut ctx.buf, json, &ctx.prefix, &ctx.unit, level, ctx.escape_html)
    }
}
