//! Monomorphized container operations.
//!
//! Descriptors never name container types directly. Instead each slice, map and
//! pointer descriptor stores a small table of function pointers instantiated for
//! the concrete container when it was described, so the VM can grow a `Vec<T>`
//! or allocate an `Option<T>` knowing only an address.

#![allow(unsafe_code)]

use std::cell::OnceCell;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};
use std::rc::Rc;
use std::sync::Arc;

use crate::describe::MapKey;
use crate::ptr::{PtrConst, PtrMut};
use crate::runtime::MapContext;

/// Operations on a growable sequence (`Vec<T>`).
#[derive(Clone, Copy)]
pub struct SliceVTable {
    /// Number of elements.
    pub len: unsafe fn(PtrConst) -> usize,
    /// Address of the first element.
    pub data: unsafe fn(PtrConst) -> PtrConst,
    /// Removes every element.
    pub clear: unsafe fn(PtrMut),
    /// Appends a default element and returns its address.
    pub push_default: unsafe fn(PtrMut) -> PtrMut,
}

impl SliceVTable {
    /// Table for `Vec<T>`.
    pub fn of_vec<T: Default>() -> Self {
        Self {
            len: vec_len::<T>,
            data: vec_data::<T>,
            clear: vec_clear::<T>,
            push_default: vec_push_default::<T>,
        }
    }
}

unsafe fn vec_len<T>(p: PtrConst) -> usize {
    p.get::<Vec<T>>().len()
}

unsafe fn vec_data<T>(p: PtrConst) -> PtrConst {
    PtrConst::from_raw(p.get::<Vec<T>>().as_ptr().cast())
}

unsafe fn vec_clear<T>(p: PtrMut) {
    p.get_mut::<Vec<T>>().clear();
}

unsafe fn vec_push_default<T: Default>(p: PtrMut) -> PtrMut {
    let vec = p.get_mut::<Vec<T>>();
    vec.push(T::default());
    let last = vec.len() - 1;
    PtrMut::from_mut(&mut vec[last])
}

/// Operations on a keyed container.
#[derive(Clone, Copy)]
pub struct MapVTable {
    /// Number of entries.
    pub len: unsafe fn(PtrConst) -> usize,
    /// Pushes `(key text, value address)` for every entry into a map context.
    pub collect: unsafe fn(PtrConst, &mut MapContext),
    /// Removes every entry.
    pub clear: unsafe fn(PtrMut),
    /// Parses `key`, stores a default value under it and returns the value's
    /// address. `None` when the key text does not parse as the key type.
    pub entry: unsafe fn(PtrMut, &str) -> Option<PtrMut>,
}

impl MapVTable {
    /// Table for `HashMap<K, V, S>`.
    pub fn of_hash_map<K, V, S>() -> Self
    where
        K: MapKey + Eq + Hash,
        V: Default,
        S: BuildHasher + Default,
    {
        Self {
            len: hash_map_len::<K, V, S>,
            collect: hash_map_collect::<K, V, S>,
            clear: hash_map_clear::<K, V, S>,
            entry: hash_map_entry::<K, V, S>,
        }
    }

    /// Table for `BTreeMap<K, V>`.
    pub fn of_btree_map<K, V>() -> Self
    where
        K: MapKey + Ord,
        V: Default,
    {
        Self {
            len: btree_len::<K, V>,
            collect: btree_collect::<K, V>,
            clear: btree_clear::<K, V>,
            entry: btree_entry::<K, V>,
        }
    }
}

unsafe fn hash_map_len<K, V, S>(p: PtrConst) -> usize {
    p.get::<HashMap<K, V, S>>().len()
}

unsafe fn hash_map_collect<K: MapKey, V, S>(p: PtrConst, ctx: &mut MapContext) {
    for (key, value) in p.get::<HashMap<K, V, S>>() {
        ctx.push_entry(key, PtrConst::from_ref(value));
    }
}

unsafe fn hash_map_clear<K, V, S>(p: PtrMut) {
    p.get_mut::<HashMap<K, V, S>>().clear();
}

unsafe fn hash_map_entry<K, V, S>(p: PtrMut, key: &str) -> Option<PtrMut>
where
    K: MapKey + Eq + Hash,
    V: Default,
    S: BuildHasher,
{
    let key = K::parse_text(key)?;
    let map = p.get_mut::<HashMap<K, V, S>>();
    // Decoding replaces an existing value instead of merging into it.
    let slot = map.entry(key).or_default();
    *slot = V::default();
    Some(PtrMut::from_mut(slot))
}

unsafe fn btree_len<K, V>(p: PtrConst) -> usize {
    p.get::<BTreeMap<K, V>>().len()
}

unsafe fn btree_collect<K: MapKey, V>(p: PtrConst, ctx: &mut MapContext) {
    for (key, value) in p.get::<BTreeMap<K, V>>() {
        ctx.push_entry(key, PtrConst::from_ref(value));
    }
}

unsafe fn btree_clear<K, V>(p: PtrMut) {
    p.get_mut::<BTreeMap<K, V>>().clear();
}

unsafe fn btree_entry<K: MapKey + Ord, V: Default>(p: PtrMut, key: &str) -> Option<PtrMut> {
    let key = K::parse_text(key)?;
    let slot = p.get_mut::<BTreeMap<K, V>>().entry(key).or_default();
    *slot = V::default();
    Some(PtrMut::from_mut(slot))
}

/// Operations on a single-indirection container.
#[derive(Clone, Copy)]
pub struct PointerVTable {
    /// Pointee address, `None` when the pointer is null.
    pub get: unsafe fn(PtrConst) -> Option<PtrConst>,
    /// Pointee address for writing, allocating a default pointee if the pointer
    /// is null. `None` if the pointee is shared and cannot be borrowed mutably.
    pub get_or_alloc: unsafe fn(PtrMut) -> Option<PtrMut>,
    /// Resets to null, or to a default pointee when the pointer cannot be null.
    pub reset: unsafe fn(PtrMut),
    /// Whether `get` can return `None`.
    pub nullable: bool,
    /// Whether several owners can reach the pointee, which makes runtime cycles possible.
    pub shared: bool,
}

impl std::fmt::Debug for PointerVTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointerVTable")
            .field("nullable", &self.nullable)
            .field("shared", &self.shared)
            .finish()
    }
}

impl PointerVTable {
    /// Table for `Option<T>`.
    pub fn of_option<T: Default>() -> Self {
        Self {
            get: option_get::<T>,
            get_or_alloc: option_alloc::<T>,
            reset: option_reset::<T>,
            nullable: true,
            shared: false,
        }
    }

    /// Table for `Box<T>`.
    pub fn of_box<T: Default>() -> Self {
        Self {
            get: box_get::<T>,
            get_or_alloc: box_alloc::<T>,
            reset: box_reset::<T>,
            nullable: false,
            shared: false,
        }
    }

    /// Table for `Rc<T>`.
    pub fn of_rc<T: Default>() -> Self {
        Self {
            get: rc_get::<T>,
            get_or_alloc: rc_alloc::<T>,
            reset: rc_reset::<T>,
            nullable: false,
            shared: true,
        }
    }

    /// Table for `Arc<T>`.
    pub fn of_arc<T: Default>() -> Self {
        Self {
            get: arc_get::<T>,
            get_or_alloc: arc_alloc::<T>,
            reset: arc_reset::<T>,
            nullable: false,
            shared: true,
        }
    }

    /// Table for `OnceCell<T>`.
    pub fn of_once_cell<T: Default>() -> Self {
        Self {
            get: cell_get::<T>,
            get_or_alloc: cell_alloc::<T>,
            reset: cell_reset::<T>,
            nullable: true,
            shared: false,
        }
    }
}

unsafe fn option_get<T>(p: PtrConst) -> Option<PtrConst> {
    p.get::<Option<T>>().as_ref().map(PtrConst::from_ref)
}

unsafe fn option_alloc<T: Default>(p: PtrMut) -> Option<PtrMut> {
    Some(PtrMut::from_mut(p.get_mut::<Option<T>>().get_or_insert_with(T::default)))
}

unsafe fn option_reset<T>(p: PtrMut) {
    *p.get_mut::<Option<T>>() = None;
}

unsafe fn box_get<T>(p: PtrConst) -> Option<PtrConst> {
    Some(PtrConst::from_ref(&**p.get::<Box<T>>()))
}

unsafe fn box_alloc<T>(p: PtrMut) -> Option<PtrMut> {
    Some(PtrMut::from_mut(&mut **p.get_mut::<Box<T>>()))
}

unsafe fn box_reset<T: Default>(p: PtrMut) {
    **p.get_mut::<Box<T>>() = T::default();
}

unsafe fn rc_get<T>(p: PtrConst) -> Option<PtrConst> {
    Some(PtrConst::from_ref(&**p.get::<Rc<T>>()))
}

unsafe fn rc_alloc<T: Default>(p: PtrMut) -> Option<PtrMut> {
    let rc = p.get_mut::<Rc<T>>();
    if Rc::get_mut(rc).is_none() {
        *rc = Rc::new(T::default());
    }
    Rc::get_mut(rc).map(PtrMut::from_mut)
}

unsafe fn rc_reset<T: Default>(p: PtrMut) {
    *p.get_mut::<Rc<T>>() = Rc::new(T::default());
}

unsafe fn arc_get<T>(p: PtrConst) -> Option<PtrConst> {
    Some(PtrConst::from_ref(&**p.get::<Arc<T>>()))
}

unsafe fn arc_alloc<T: Default>(p: PtrMut) -> Option<PtrMut> {
    let arc = p.get_mut::<Arc<T>>();
    if Arc::get_mut(arc).is_none() {
        *arc = Arc::new(T::default());
    }
    Arc::get_mut(arc).map(PtrMut::from_mut)
}

unsafe fn arc_reset<T: Default>(p: PtrMut) {
    *p.get_mut::<Arc<T>>() = Arc::new(T::default());
}

unsafe fn cell_get<T>(p: PtrConst) -> Option<PtrConst> {
    p.get::<OnceCell<T>>().get().map(PtrConst::from_ref)
}

unsafe fn cell_alloc<T: Default>(p: PtrMut) -> Option<PtrMut> {
    let cell = p.get_mut::<OnceCell<T>>();
    if cell.get().is_none() {
        let _ = cell.set(T::default());
    }
    cell.get_mut().map(PtrMut::from_mut)
}

unsafe fn cell_reset<T>(p: PtrMut) {
    p.get_mut::<OnceCell<T>>().take();
}

/// Overwrites the `T` at `p` with `T::default()`.
pub(crate) unsafe fn reset_default<T: Default>(p: PtrMut) {
    *p.get_mut::<T>() = T::default();
}
