//! Typed accessors over raw value addresses.
//!
//! The VM addresses values as `(base, offset)` pairs taken from compiled
//! descriptors. All address arithmetic and dereferencing in the crate goes
//! through [`PtrConst`] and [`PtrMut`], so the unsafe surface is this module
//! plus the vtable trampolines that call into it.
//!
//! # Safety
//!
//! A `PtrConst`/`PtrMut` carries no lifetime. Callers guarantee that the
//! pointed-to value outlives every use, which holds for the duration of a single
//! encode or decode call: the caller's value is borrowed for the whole call.

#![allow(unsafe_code)]

use std::fmt;

/// A read-only address inside a value being encoded.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PtrConst(*const u8);

impl PtrConst {
    /// Address of a borrowed value.
    pub fn from_ref<T>(value: &T) -> Self {
        Self((value as *const T).cast())
    }

    /// Wraps a raw address.
    pub fn from_raw(ptr: *const u8) -> Self {
        Self(ptr)
    }

    /// `true` for the null address.
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }

    /// Numeric address, used as the identity in cycle detection.
    pub fn addr(self) -> usize {
        self.0 as usize
    }

    /// Moves the address forward by `offset` bytes.
    ///
    /// # Safety
    /// The result must stay inside the same allocated object.
    #[inline]
    pub unsafe fn add(self, offset: usize) -> Self {
        Self(self.0.add(offset))
    }

    /// Reads the value at this address as a `T`.
    ///
    /// # Safety
    /// The address must point to a live, properly aligned `T`.
    #[inline]
    pub unsafe fn get<'a, T>(self) -> &'a T {
        &*self.0.cast::<T>()
    }
}

impl fmt::Debug for PtrConst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PtrConst({:p})", self.0)
    }
}

/// A writable address inside a decode target.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PtrMut(*mut u8);

impl PtrMut {
    /// Address of a mutably borrowed value.
    pub fn from_mut<T>(value: &mut T) -> Self {
        Self((value as *mut T).cast())
    }

    /// Wraps a raw address.
    pub fn from_raw(ptr: *mut u8) -> Self {
        Self(ptr)
    }

    /// `true` for the null address.
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }

    /// Moves the address forward by `offset` bytes.
    ///
    /// # Safety
    /// The result must stay inside the same allocated object.
    #[inline]
    pub unsafe fn add(self, offset: usize) -> Self {
        Self(self.0.add(offset))
    }

    /// Borrows the value at this address as a `T`.
    ///
    /// # Safety
    /// The address must point to a live, properly aligned `T` that nothing else borrows.
    #[inline]
    pub unsafe fn get_mut<'a, T>(self) -> &'a mut T {
        &mut *self.0.cast::<T>()
    }

    /// Read-only view of the same address.
    pub fn as_const(self) -> PtrConst {
        PtrConst(self.0.cast_const())
    }
}

impl fmt::Debug for PtrMut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PtrMut({:p})", self.0)
    }
}
