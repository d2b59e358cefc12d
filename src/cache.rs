//! The program cache: type identity to compiled programs in O(1).
//!
//! Each non-generic type owns a `static` [`TypeSlot`]. The first time a slot is
//! seen, the process-wide registry assigns it the next dense index under a
//! single lock; afterwards resolving the index is one atomic load. The index
//! addresses a segmented table of `OnceLock` slots, so a lookup is a load plus
//! two array reads and a program is never observed half-built.
//!
//! Generic types have no per-type static, and the dense table stops growing at
//! [`DENSE_SLOT_LIMIT`]. Both cases go through a keyed fallback map instead.

use std::any::TypeId;
use std::hash::BuildHasher;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, warn};
use twox_hash::XxHash64;

use crate::compiler::{self, DecodeProgram, EncodeProgram};
use crate::constants::{DENSE_SLOT_LIMIT, SEGMENT_LEN};
use crate::describe::Describe;
use crate::descriptor::{DescId, DescribeCx, TypeGraph};

const UNASSIGNED: u32 = 0;
const OVERFLOW: u32 = u32::MAX;
const SEGMENT_COUNT: usize = DENSE_SLOT_LIMIT / SEGMENT_LEN;

/// Per-type registration slot holding the type's dense index.
#[derive(Debug)]
pub struct TypeSlot {
    // 0 = unassigned, u32::MAX = past the dense ceiling, otherwise index + 1.
    state: AtomicU32,
}

impl TypeSlot {
    /// A slot with no index assigned yet.
    #[allow(clippy::new_without_default)]
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(UNASSIGNED),
        }
    }

    /// The slot's dense index, assigning the next free one on first use.
    ///
    /// `None` once the dense table is full.
    pub fn index(&self) -> Option<usize> {
        match self.state.load(Ordering::Acquire) {
            UNASSIGNED => REGISTRY.assign(self),
            OVERFLOW => None,
            n => Some(n as usize - 1),
        }
    }
}

struct TypeRegistry {
    next: Mutex<usize>,
}

static REGISTRY: TypeRegistry = TypeRegistry {
    next: parking_lot::const_mutex(0),
};

impl TypeRegistry {
    fn assign(&self, slot: &TypeSlot) -> Option<usize> {
        let mut next = self.next.lock();
        // Another thread may have assigned the slot while we waited.
        match slot.state.load(Ordering::Acquire) {
            UNASSIGNED => {}
            OVERFLOW => return None,
            n => return Some(n as usize - 1),
        }
        if *next >= DENSE_SLOT_LIMIT {
            warn!(limit = DENSE_SLOT_LIMIT, "dense type table is full, using keyed lookup");
            slot.state.store(OVERFLOW, Ordering::Release);
            return None;
        }
        let index = *next;
        *next += 1;
        slot.state.store(index as u32 + 1, Ordering::Release);
        debug!(index, "registered type");
        Some(index)
    }
}

/// Everything compiled for one root type.
///
/// The descriptor graph is built eagerly; each program is compiled the first
/// time it is asked for.
#[derive(Debug)]
pub struct CompiledType {
    graph: Arc<TypeGraph>,
    root: DescId,
    type_id: TypeId,
    type_name: &'static str,
    encode_compact: OnceLock<Arc<EncodeProgram>>,
    encode_indent: OnceLock<Arc<EncodeProgram>>,
    decode: OnceLock<Arc<DecodeProgram>>,
}

impl CompiledType {
    fn build<T: Describe>() -> Self {
        let mut cx = DescribeCx::new();
        let root = cx.describe::<T>();
        let graph = cx.finish();
        debug!(type_name = T::type_name(), descriptors = graph.len(), "described root type");
        Self {
            graph: Arc::new(graph),
            root,
            type_id: TypeId::of::<T>(),
            type_name: T::type_name(),
            encode_compact: OnceLock::new(),
            encode_indent: OnceLock::new(),
            decode: OnceLock::new(),
        }
    }

    /// The descriptor graph.
    pub fn graph(&self) -> &Arc<TypeGraph> {
        &self.graph
    }

    /// Root descriptor.
    pub fn root(&self) -> DescId {
        self.root
    }

    /// Identity of the root type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Name of the root type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Encode program for the compact layout.
    pub fn encode_compact(&self) -> &Arc<EncodeProgram> {
        self.encode_compact.get_or_init(|| {
            Arc::new(compiler::compile_encode(&self.graph, self.root, self.type_id, false))
        })
    }

    /// Encode program for the indent layout.
    pub fn encode_indent(&self) -> &Arc<EncodeProgram> {
        self.encode_indent.get_or_init(|| {
            Arc::new(compiler::compile_encode(&self.graph, self.root, self.type_id, true))
        })
    }

    /// Encode program for the requested layout.
    pub fn encode(&self, indent: bool) -> &Arc<EncodeProgram> {
        if indent {
            self.encode_indent()
        } else {
            self.encode_compact()
        }
    }

    /// Decode program. Input layout does not affect decoding, so there is one.
    pub fn decode(&self) -> &Arc<DecodeProgram> {
        self.decode
            .get_or_init(|| Arc::new(compiler::compile_decode(&self.graph, self.root, self.type_id)))
    }
}

type Segment = Box<[OnceLock<Arc<CompiledType>>]>;

/// Seeded xxHash64 for the keyed fallback and the encoder's cycle set. Both key
/// on values that are already well mixed, so a fixed seed is enough.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FallbackHasher;

impl BuildHasher for FallbackHasher {
    type Hasher = XxHash64;

    fn build_hasher(&self) -> XxHash64 {
        XxHash64::with_seed(0)
    }
}

/// Lookup counters, mostly for tests and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Root types compiled into dense slots.
    pub dense: usize,
    /// Root types compiled into the keyed fallback.
    pub fallback: usize,
    /// Dense segments allocated.
    pub segments: usize,
}

/// Type identity to [`CompiledType`] cache, safe for concurrent use.
pub struct ProgramCache {
    segments: Box<[OnceLock<Segment>]>,
    fallback: DashMap<TypeId, Arc<CompiledType>, FallbackHasher>,
    dense_len: AtomicUsize,
    segment_len: AtomicUsize,
}

impl std::fmt::Debug for ProgramCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramCache").field("stats", &self.stats()).finish()
    }
}

impl Default for ProgramCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            segments: (0..SEGMENT_COUNT).map(|_| OnceLock::new()).collect(),
            fallback: DashMap::with_hasher(FallbackHasher),
            dense_len: AtomicUsize::new(0),
            segment_len: AtomicUsize::new(0),
        }
    }

    /// The process-wide cache used by the free functions and default codecs.
    pub fn global() -> &'static Arc<ProgramCache> {
        static GLOBAL: OnceLock<Arc<ProgramCache>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(ProgramCache::new()))
    }

    /// Returns the compiled form of `T`, building it on first use.
    ///
    /// Every caller gets the same `Arc`. Racing first calls for a type that goes
    /// through the keyed fallback may build it twice; only one result is kept.
    pub fn compile<T: Describe>(&self) -> Arc<CompiledType> {
        if let Some(index) = T::type_slot().and_then(TypeSlot::index) {
            return self.dense::<T>(index).clone();
        }
        self.keyed::<T>()
    }

    fn dense<T: Describe>(&self, index: usize) -> &Arc<CompiledType> {
        let segment = self.segments[index / SEGMENT_LEN].get_or_init(|| {
            self.segment_len.fetch_add(1, Ordering::Relaxed);
            (0..SEGMENT_LEN).map(|_| OnceLock::new()).collect()
        });
        segment[index % SEGMENT_LEN].get_or_init(|| {
            self.dense_len.fetch_add(1, Ordering::Relaxed);
            debug!(type_name = T::type_name(), index, "compiling into dense slot");
            Arc::new(CompiledType::build::<T>())
        })
    }

    fn keyed<T: Describe>(&self) -> Arc<CompiledType> {
        let type_id = TypeId::of::<T>();
        if let Some(hit) = self.fallback.get(&type_id) {
            return hit.clone();
        }
        // Build outside the shard lock; the entry API keeps the first insert.
        let built = Arc::new(CompiledType::build::<T>());
        self.fallback
            .entry(type_id)
            .or_insert_with(|| {
                debug!(type_name = T::type_name(), "compiling into keyed fallback");
                built
            })
            .clone()
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            dense: self.dense_len.load(Ordering::Relaxed),
            fallback: self.fallback.len(),
            segments: self.segment_len.load(Ordering::Relaxed),
        }
    }
}

/// Compiles `T` through the process-wide cache.
pub fn compile<T: Describe>() -> Arc<CompiledType> {
    ProgramCache::global().compile::<T>()
}
