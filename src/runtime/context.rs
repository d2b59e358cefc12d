#![allow(unsafe_code)]

use std::collections::HashSet;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};

use tracing::trace;

use super::pool::{Pool, Poolable};
use crate::cache::FallbackHasher;
use crate::config::Config;
use crate::constants::{CONTEXT_POOL_CAPACITY, DETACH_THRESHOLD, MAX_RETAINED_CAPACITY};
use crate::vm::decode::DecFrame;
use crate::vm::encode::EncFrame;
use crate::vm::interface::{ValueBuild, ValueTask};

/// Per-call mutable state threaded through every VM step.
///
/// One context serves exactly one top-level encode or decode call. Contexts
/// are pooled: acquiring one is a pop from a free-list and all clearing happens
/// on release, so a context taken from the pool always starts with every
/// buffer and stack at length zero and every option at its default.
#[derive(Debug, Default)]
pub struct RuntimeContext {
    /// Encoded output.
    pub(crate) buf: Vec<u8>,
    /// Output of marshal hooks and quoted scalars before it is spliced into `buf`.
    pub(crate) hook_buf: Vec<u8>,
    /// Addresses of shared pointees on the current encode path, in entry order.
    pub(crate) seen: Vec<usize>,
    /// The same addresses, for membership tests.
    seen_set: HashSet<usize, FallbackHasher>,
    pub(crate) enc_frames: Vec<EncFrame>,
    pub(crate) dec_frames: Vec<DecFrame>,
    /// Pending work while encoding a [`crate::Value`].
    pub(crate) value_tasks: Vec<ValueTask>,
    /// Partially built containers while decoding a [`crate::Value`].
    pub(crate) value_stack: Vec<ValueBuild>,
    /// Unescaped strings and object keys read by the decoder.
    pub(crate) scratch: String,
    /// The most recent object key, reported in decode errors.
    pub(crate) field: String,
    pub(crate) prefix: Vec<u8>,
    pub(crate) unit: Vec<u8>,
    pub(crate) base_indent: usize,
    pub(crate) escape_html: bool,
    pub(crate) use_number: bool,
    pub(crate) disallow_unknown_fields: bool,
    pub(crate) sort_map_keys: bool,
}

// Frames and tasks hold addresses into the value of the call that owns the
// context. They are cleared before the context goes back to the pool.
unsafe impl Send for RuntimeContext {}

static CONTEXT_POOL: Pool<RuntimeContext> = Pool::new(CONTEXT_POOL_CAPACITY);

impl RuntimeContext {
    /// Copies the options the VM reads from `config`.
    pub fn configure(&mut self, config: &Config) {
        self.escape_html = config.escape_html;
        self.use_number = config.use_number;
        self.disallow_unknown_fields = config.disallow_unknown_fields;
        self.sort_map_keys = config.sort_map_keys;
        self.prefix.clear();
        self.unit.clear();
        if let Some(indent) = &config.indent {
            self.prefix.extend_from_slice(indent.prefix.as_bytes());
            self.unit.extend_from_slice(indent.unit.as_bytes());
        }
    }

    /// Sets the indent layout explicitly, overriding the configured one.
    pub fn set_indent(&mut self, prefix: &str, unit: &str) {
        self.prefix.clear();
        self.prefix.extend_from_slice(prefix.as_bytes());
        self.unit.clear();
        self.unit.extend_from_slice(unit.as_bytes());
    }

    /// Adds a shared pointee to the current path. `false` if it is already on it.
    pub(crate) fn enter_shared(&mut self, addr: usize) -> bool {
        if !self.seen_set.insert(addr) {
            return false;
        }
        self.seen.push(addr);
        true
    }

    /// Drops path entries until `keep` remain.
    pub(crate) fn leave_shared(&mut self, keep: usize) {
        while self.seen.len() > keep {
            if let Some(addr) = self.seen.pop() {
                self.seen_set.remove(&addr);
            }
        }
    }

    /// The encoded output so far.
    pub fn output(&self) -> &[u8] {
        &self.buf
    }

    /// Moves the encoded output out of the context.
    ///
    /// Small outputs detach: the caller receives the pooled buffer itself and the
    /// context keeps a fresh empty one. Large outputs are copied into a
    /// right-sized vector so the grown buffer stays in the pool. The bytes are the
    /// same either way.
    pub fn take_output(&mut self) -> Vec<u8> {
        if self.buf.len() <= DETACH_THRESHOLD {
            trace!(len = self.buf.len(), "detaching output buffer");
            std::mem::take(&mut self.buf)
        } else {
            trace!(len = self.buf.len(), capacity = self.buf.capacity(), "copying output buffer");
            let out = self.buf.clone();
            self.buf.clear();
            out
        }
    }

    /// Appends a newline, the prefix and one unit per level.
    pub(crate) fn newline_indent(&mut self, level: usize) {
        self.buf.push(b'\n');
        self.indent(level);
    }

    /// Appends the prefix and one unit per level.
    pub(crate) fn indent(&mut self, level: usize) {
        self.buf.extend_from_slice(&self.prefix);
        for _ in 0..self.base_indent + level {
            self.buf.extend_from_slice(&self.unit);
        }
    }

    /// Length of every buffer and stack, for leak checks.
    pub fn lengths(&self) -> ContextLengths {
        ContextLengths {
            buf: self.buf.len(),
            hook_buf: self.hook_buf.len(),
            seen: self.seen.len() + self.seen_set.len(),
            frames: self.enc_frames.len() + self.dec_frames.len(),
            values: self.value_tasks.len() + self.value_stack.len(),
            scratch: self.scratch.len() + self.field.len(),
            base_indent: self.base_indent,
            indent: self.prefix.len() + self.unit.len(),
        }
    }
}

/// Snapshot of [`RuntimeContext::lengths`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextLengths {
    /// Output buffer length.
    pub buf: usize,
    /// Hook buffer length.
    pub hook_buf: usize,
    /// Cycle-detection set size.
    pub seen: usize,
    /// Encode plus decode frames.
    pub frames: usize,
    /// Value encode tasks plus value decode stack.
    pub values: usize,
    /// Scratch plus field-name lengths.
    pub scratch: usize,
    /// Base indent level.
    pub base_indent: usize,
    /// Indent prefix plus unit lengths.
    pub indent: usize,
}

impl ContextLengths {
    /// `true` when nothing is left over from a previous call.
    pub fn is_clear(&self) -> bool {
        *self == ContextLengths::default()
    }
}

impl Poolable for RuntimeContext {
    fn reset(&mut self) {
        self.buf.clear();
        self.hook_buf.clear();
        self.seen.clear();
        self.seen_set.clear();
        // Map contexts still held by an aborted encode go back to their pool.
        for frame in self.enc_frames.drain(..) {
            frame.release();
        }
        self.dec_frames.clear();
        self.value_tasks.clear();
        self.value_stack.clear();
        self.scratch.clear();
        self.field.clear();
        self.base_indent = 0;
        self.prefix.clear();
        self.unit.clear();
        self.escape_html = false;
        self.use_number = false;
        self.disallow_unknown_fields = false;
        self.sort_map_keys = false;

        self.buf.shrink_to(MAX_RETAINED_CAPACITY);
        self.hook_buf.shrink_to(MAX_RETAINED_CAPACITY);
        self.scratch.shrink_to(MAX_RETAINED_CAPACITY);
        self.value_stack.shrink_to(64);
        self.seen_set.shrink_to(64);
    }
}

/// Takes a context from the process-wide pool.
///
/// Prefer [`ContextGuard`], which releases on every exit path.
pub fn acquire_context() -> Box<RuntimeContext> {
    CONTEXT_POOL.acquire()
}

/// Clears `ctx` and returns it to the pool.
pub fn release_context(ctx: Box<RuntimeContext>) {
    CONTEXT_POOL.release(ctx);
}

/// Scoped [`RuntimeContext`] that returns to the pool when dropped.
#[derive(Debug)]
pub struct ContextGuard {
    ctx: ManuallyDrop<Box<RuntimeContext>>,
}

impl ContextGuard {
    /// Acquires a context configured from `config`.
    pub fn new(config: &Config) -> Self {
        let mut ctx = acquire_context();
        ctx.configure(config);
        Self {
            ctx: ManuallyDrop::new(ctx),
        }
    }
}

impl Deref for ContextGuard {
    type Target = RuntimeContext;

    fn deref(&self) -> &RuntimeContext {
        &self.ctx
    }
}

impl DerefMut for ContextGuard {
    fn deref_mut(&mut self) -> &mut RuntimeContext {
        &mut self.ctx
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        // SAFETY: `ctx` is taken exactly once, here, and never touched again.
        let ctx = unsafe { ManuallyDrop::take(&mut self.ctx) };
        release_context(ctx);
    }
}
