//! Capability hooks a type can opt into.
//!
//! A type customizes its JSON behaviour by implementing any of [`IsZero`],
//! [`MarshalJson`] and [`UnmarshalJson`] and advertising the implementation
//! through [`crate::Describe::hooks`] (the derive macro does this for
//! `#[json(is_zero, marshal, unmarshal)]`). The descriptor builder stores the
//! resulting [`Hooks`] table once, so the VM calls a plain function pointer and
//! never looks the capability up again.

#![allow(unsafe_code)]

use crate::error::HookError;
use crate::ptr::{PtrConst, PtrMut};

/// Custom zero-value predicate used by `omitzero` fields.
pub trait IsZero {
    /// Returns `true` when the value should count as absent.
    fn is_zero(&self) -> bool;
}

/// Custom encoder. The returned bytes must be a single valid JSON value.
pub trait MarshalJson {
    /// Renders `self` as JSON text.
    fn marshal_json(&self) -> Result<Vec<u8>, HookError>;
}

/// Custom decoder. Receives the raw text of exactly one JSON value.
pub trait UnmarshalJson {
    /// Overwrites `self` from JSON text.
    fn unmarshal_json(&mut self, data: &[u8]) -> Result<(), HookError>;
}

/// Bound zero-value predicate.
pub type IsZeroFn = unsafe fn(PtrConst) -> bool;
/// Bound marshal hook.
pub type MarshalFn = unsafe fn(PtrConst) -> Result<Vec<u8>, HookError>;
/// Bound unmarshal hook.
pub type UnmarshalFn = unsafe fn(PtrMut, &[u8]) -> Result<(), HookError>;

/// Hook table recorded on a type descriptor.
#[derive(Clone, Copy, Default)]
pub struct Hooks {
    /// Custom zero-value predicate.
    pub is_zero: Option<IsZeroFn>,
    /// Custom encoder.
    pub marshal: Option<MarshalFn>,
    /// Custom decoder.
    pub unmarshal: Option<UnmarshalFn>,
}

impl Hooks {
    /// No hooks.
    pub const NONE: Hooks = Hooks {
        is_zero: None,
        marshal: None,
        unmarshal: None,
    };

    /// Binds `T`'s [`IsZero`] implementation.
    pub fn with_is_zero<T: IsZero>(mut self) -> Self {
        self.is_zero = Some(call_is_zero::<T>);
        self
    }

    /// Binds `T`'s [`MarshalJson`] implementation.
    pub fn with_marshal<T: MarshalJson>(mut self) -> Self {
        self.marshal = Some(call_marshal::<T>);
        self
    }

    /// Binds `T`'s [`UnmarshalJson`] implementation.
    pub fn with_unmarshal<T: UnmarshalJson>(mut self) -> Self {
        self.unmarshal = Some(call_unmarshal::<T>);
        self
    }

    /// `true` if no hook is bound.
    pub fn is_empty(&self) -> bool {
        self.is_zero.is_none() && self.marshal.is_none() && self.unmarshal.is_none()
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("is_zero", &self.is_zero.is_some())
            .field("marshal", &self.marshal.is_some())
            .field("unmarshal", &self.unmarshal.is_some())
            .finish()
    }
}

unsafe fn call_is_zero<T: IsZero>(p: PtrConst) -> bool {
    p.get::<T>().is_zero()
}

unsafe fn call_marshal<T: MarshalJson>(p: PtrConst) -> Result<Vec<u8>, HookError> {
    p.get::<T>().marshal_json()
}

unsafe fn call_unmarshal<T: UnmarshalJson>(p: PtrMut, data: &[u8]) -> Result<(), HookError> {
    p.get_mut::<T>().unmarshal_json(data)
}
