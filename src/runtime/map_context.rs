#![allow(unsafe_code)]

use std::ops::Range;

use super::pool::{Pool, Poolable};
use crate::constants::{MAP_CONTEXT_POOL_CAPACITY, MAX_RETAINED_CAPACITY};
use crate::describe::MapKey;
use crate::ptr::PtrConst;

#[derive(Debug, Clone, Copy)]
struct MapEntry {
    key_start: u32,
    key_end: u32,
    value: PtrConst,
}

/// Iteration state for one map being encoded.
///
/// The map's entries are collected up front as `(key text, value address)`
/// pairs so the encoder can emit them in a deterministic order and interleave
/// key and value emission with the rest of the program. The sorted variant keeps
/// an extra index buffer holding the emission order.
#[derive(Debug, Default)]
pub struct MapContext {
    entries: Vec<MapEntry>,
    keys: Vec<u8>,
    order: Vec<u32>,
    cursor: usize,
    sorted: bool,
}

// Entries only hold addresses while one encode call owns the context, and a
// released context is empty.
unsafe impl Send for MapContext {}

static UNORDERED_POOL: Pool<MapContext> = Pool::new(MAP_CONTEXT_POOL_CAPACITY);
static SORTED_POOL: Pool<MapContext> = Pool::new(MAP_CONTEXT_POOL_CAPACITY);

impl MapContext {
    /// Takes a context from the pool matching `sorted`, sized for `len` entries.
    pub fn acquire(len: usize, sorted: bool) -> Box<MapContext> {
        let pool = if sorted { &SORTED_POOL } else { &UNORDERED_POOL };
        let mut ctx = pool.acquire();
        ctx.sorted = sorted;
        ctx.entries.reserve(len);
        ctx
    }

    /// Resets `ctx` and returns it to its pool.
    pub fn release(ctx: Box<MapContext>) {
        let pool = if ctx.sorted { &SORTED_POOL } else { &UNORDERED_POOL };
        pool.release(ctx);
    }

    /// Records one entry.
    pub fn push_entry<K: MapKey>(&mut self, key: &K, value: PtrConst) {
        let key_start = self.keys.len() as u32;
        key.append_text(&mut self.keys);
        self.entries.push(MapEntry {
            key_start,
            key_end: self.keys.len() as u32,
            value,
        });
    }

    /// Fixes the emission order. Call once, after all entries are pushed.
    pub fn seal(&mut self) {
        self.cursor = 0;
        if !self.sorted {
            return;
        }
        let Self {
            entries, keys, order, ..
        } = self;
        order.clear();
        order.extend(0..entries.len() as u32);
        order.sort_unstable_by(|&a, &b| {
            let a = &entries[a as usize];
            let b = &entries[b as usize];
            keys[a.key_start as usize..a.key_end as usize].cmp(&keys[b.key_start as usize..b.key_end as usize])
        });
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entry was pushed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn current(&self) -> Option<&MapEntry> {
        let index = if self.sorted {
            *self.order.get(self.cursor)? as usize
        } else {
            self.cursor
        };
        self.entries.get(index)
    }

    fn key_range(entry: &MapEntry) -> Range<usize> {
        entry.key_start as usize..entry.key_end as usize
    }

    /// Unescaped key text and value address of the entry under the cursor.
    pub fn entry(&self) -> Option<(&[u8], PtrConst)> {
        let entry = self.current()?;
        Some((&self.keys[Self::key_range(entry)], entry.value))
    }

    /// Moves to the next entry. Returns `false` once past the last one.
    pub fn advance(&mut self) -> bool {
        self.cursor += 1;
        self.cursor < self.entries.len()
    }
}

impl Poolable for MapContext {
    fn reset(&mut self) {
        self.entries.clear();
        self.keys.clear();
        self.order.clear();
        self.cursor = 0;
        self.entries.shrink_to(MAX_RETAINED_CAPACITY / std::mem::size_of::<MapEntry>());
        self.keys.shrink_to(MAX_RETAINED_CAPACITY);
        self.order.shrink_to(MAX_RETAINED_CAPACITY / std::mem::size_of::<u32>());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_context_orders_by_key_bytes() {
        let values = [1u8, 2, 3];
        let mut ctx = MapContext::acquire(3, true);
        ctx.push_entry(&"b".to_string(), PtrConst::from_ref(&values[0]));
        ctx.push_entry(&"a".to_string(), PtrConst::from_ref(&values[1]));
        ctx.push_entry(&"ab".to_string(), PtrConst::from_ref(&values[2]));
        ctx.seal();

        let mut seen = Vec::new();
        loop {
            let (key, _) = ctx.entry().unwrap();
            seen.push(String::from_utf8(key.to_vec()).unwrap());
            if !ctx.advance() {
                break;
            }
        }
        assert_eq!(seen, ["a", "ab", "b"]);
        MapContext::release(ctx);
    }

    #[test]
    fn integer_keys_sort_as_text() {
        let v = 0u8;
        let mut ctx = MapContext::acquire(2, true);
        ctx.push_entry(&10u32, PtrConst::from_ref(&v));
        ctx.push_entry(&9u32, PtrConst::from_ref(&v));
        ctx.seal();
        assert_eq!(ctx.entry().unwrap().0, b"10");
    }

    #[test]
    fn released_context_is_empty() {
        let v = 0u8;
        let mut ctx = MapContext::acquire(1, false);
        ctx.push_entry(&"k".to_string(), PtrConst::from_ref(&v));
        ctx.reset();
        assert!(ctx.is_empty());
        assert!(ctx.keys.is_empty() && ctx.order.is_empty());
        assert_eq!(ctx.cursor, 0);
    }
}
