//! Compiles type descriptors into flat VM programs.
//!
//! An [`EncodeProgram`] is a linear instruction list with forward and backward
//! jumps: containers loop over their element body, optional fields jump past
//! themselves, and recursive types are compiled once as subroutines. A
//! [`DecodeProgram`] is a graph of [`DecodeNode`]s the decoder walks with an
//! explicit frame stack.
//!
//! Programs are built once per root type by the [`crate::ProgramCache`] and are
//! immutable afterwards.

mod decode;
mod encode;
mod fields;
mod opcode;

pub(crate) use decode::compile_decode;
pub(crate) use encode::compile_encode;
pub use opcode::{
    DecodeField, DecodeNode, DecodeOp, DecodeProgram, EncodeInstr, EncodeOp, EncodeProgram, EncodedKey, Hop,
};
