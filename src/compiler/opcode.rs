use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::descriptor::{
    DescId, FieldOptions, FloatKind, IntKind, KeyOrdering, MapVTable, PointerVTable, SliceVTable,
    TypeGraph,
};
use crate::hooks::{MarshalFn, UnmarshalFn};

// --- ENCODE ---

/// Operation of one encode instruction.
#[derive(Clone)]
pub enum EncodeOp {
    /// `true` / `false`.
    Bool {
        /// Wrap in quotes.
        quoted: bool,
    },
    /// Integer in decimal.
    Int {
        /// Width and signedness.
        kind: IntKind,
        /// Wrap in quotes.
        quoted: bool,
    },
    /// Float in shortest round-trip form.
    Float {
        /// Width.
        kind: FloatKind,
        /// Wrap in quotes.
        quoted: bool,
    },
    /// Escaped string.
    Str {
        /// Encode the JSON string once more as a string.
        quoted: bool,
    },
    /// Base64 string.
    Bytes,
    /// Number text verbatim.
    Number {
        /// Wrap in quotes.
        quoted: bool,
    },
    /// Pre-encoded JSON text.
    Raw,
    /// A dynamic [`crate::Value`].
    Interface,
    /// Calls a marshal hook and splices its output.
    Marshal {
        /// The bound hook.
        hook: MarshalFn,
    },
    /// Fails with `UnsupportedType` when reached.
    Unsupported {
        /// Why the type cannot be encoded.
        reason: &'static str,
    },
    /// `{`.
    ObjectStart,
    /// Pre-rendered `"key":`.
    Key {
        /// Index into [`EncodeProgram::keys`].
        index: u32,
    },
    /// Rewinds the separator and writes `}`.
    ObjectEnd,
    /// Jumps past the field when the omission policy says it is absent.
    SkipIfAbsent {
        /// Policy to apply.
        options: FieldOptions,
    },
    /// Enters the pointee of a flattened pointer field; jumps when null.
    Enter {
        /// Pointer operations.
        vtable: PointerVTable,
    },
    /// Follows a chain of pointers; writes `null` and jumps when any is null.
    Deref {
        /// One entry per level of indirection.
        chain: Box<[PointerVTable]>,
    },
    /// Restores the base saved by `Enter` or `Deref`.
    PopBase,
    /// Starts a `Vec`; jumps past `SeqEnd` when empty.
    SliceStart {
        /// Container operations.
        vtable: SliceVTable,
        /// Element stride.
        stride: usize,
    },
    /// Starts a fixed array; jumps past `SeqEnd` when empty.
    ArrayStart {
        /// Element count.
        len: usize,
        /// Element stride.
        stride: usize,
    },
    /// Advances to the next element and jumps back to the element body.
    ElemNext,
    /// Rewinds the separator and writes `]`.
    SeqEnd,
    /// Collects and orders map entries; jumps past `MapEnd` when empty.
    MapStart {
        /// Container operations.
        vtable: MapVTable,
        /// Output ordering.
        ordering: KeyOrdering,
    },
    /// Writes the next key and jumps back to the value body.
    MapNext,
    /// Releases the map context and writes `}`.
    MapEnd,
    /// Enters the subroutine at `jump` with the value at `offset` as its base.
    Call,
    /// Returns from a subroutine.
    Ret,
    /// Strips the trailing separator and stops.
    End,
}

impl fmt::Debug for EncodeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeOp::Bool { quoted } => write!(f, "Bool{}", q(*quoted)),
            EncodeOp::Int { kind, quoted } => write!(f, "Int({kind:?}){}", q(*quoted)),
            EncodeOp::Float { kind, quoted } => write!(f, "Float({kind:?}){}", q(*quoted)),
            EncodeOp::Str { quoted } => write!(f, "Str{}", q(*quoted)),
            EncodeOp::Bytes => f.write_str("Bytes"),
            EncodeOp::Number { quoted } => write!(f, "Number{}", q(*quoted)),
            EncodeOp::Raw => f.write_str("Raw"),
            EncodeOp::Interface => f.write_str("Interface"),
            EncodeOp::Marshal { .. } => f.write_str("Marshal"),
            EncodeOp::Unsupported { reason } => write!(f, "Unsupported({reason})"),
            EncodeOp::ObjectStart => f.write_str("ObjectStart"),
            EncodeOp::Key { index } => write!(f, "Key({index})"),
            EncodeOp::ObjectEnd => f.write_str("ObjectEnd"),
            EncodeOp::SkipIfAbsent { options } => write!(
                f,
                "SkipIfAbsent(empty: {}, zero: {})",
                options.omit_empty, options.omit_zero
            ),
            EncodeOp::Enter { .. } => f.write_str("Enter"),
            EncodeOp::Deref { chain } => write!(f, "Deref({})", chain.len()),
            EncodeOp::PopBase => f.write_str("PopBase"),
            EncodeOp::SliceStart { stride, .. } => write!(f, "SliceStart(stride {stride})"),
            EncodeOp::ArrayStart { len, stride } => write!(f, "ArrayStart({len} x {stride})"),
            EncodeOp::ElemNext => f.write_str("ElemNext"),
            EncodeOp::SeqEnd => f.write_str("SeqEnd"),
            EncodeOp::MapStart { ordering, .. } => write!(f, "MapStart({ordering:?})"),
            EncodeOp::MapNext => f.write_str("MapNext"),
            EncodeOp::MapEnd => f.write_str("MapEnd"),
            EncodeOp::Call => f.write_str("Call"),
            EncodeOp::Ret => f.write_str("Ret"),
            EncodeOp::End => f.write_str("End"),
        }
    }
}

fn q(quoted: bool) -> &'static str {
    if quoted {
        " quoted"
    } else {
        ""
    }
}

/// One encode instruction.
#[derive(Debug, Clone)]
pub struct EncodeInstr {
    /// What to do.
    pub op: EncodeOp,
    /// Offset of the operand from the current base address.
    pub offset: usize,
    /// Jump target, for ops that branch.
    pub jump: u32,
    /// Nesting depth of the value, relative to the enclosing subroutine.
    pub depth: u32,
    /// Descriptor of the operand.
    pub desc: DescId,
}

/// A struct key rendered once in both escaping modes.
#[derive(Debug, Clone)]
pub struct EncodedKey {
    /// `"key":` with `<`, `>` and `&` left as is.
    pub plain: Box<[u8]>,
    /// `"key":` with `<`, `>` and `&` escaped.
    pub html: Box<[u8]>,
}

/// Compiled encode program for one root type and layout.
pub struct EncodeProgram {
    pub(crate) ops: Vec<EncodeInstr>,
    pub(crate) keys: Vec<EncodedKey>,
    pub(crate) graph: Arc<TypeGraph>,
    pub(crate) root: DescId,
    pub(crate) type_id: TypeId,
    pub(crate) indent: bool,
}

impl EncodeProgram {
    /// Instructions in execution order. Subroutines follow the main `End`.
    pub fn ops(&self) -> &[EncodeInstr] {
        &self.ops
    }

    /// Whether the program targets the indent layout.
    pub fn is_indent(&self) -> bool {
        self.indent
    }

    /// Name of the root type.
    pub fn type_name(&self) -> &'static str {
        self.graph[self.root].name
    }

    /// Identity of the root type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }
}

impl fmt::Debug for EncodeProgram {
    /// One instruction per line: `pc: op @offset -> jump [depth]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "EncodeProgram<{}> (indent: {})", self.type_name(), self.indent)?;
        for (pc, instr) in self.ops.iter().enumerate() {
            writeln!(
                f,
                "{pc:4}: {:?} @{} -> {} [{}]",
                instr.op, instr.offset, instr.jump, instr.depth
            )?;
        }
        Ok(())
    }
}

// --- DECODE ---

/// One pointer indirection on the way to a flattened field.
#[derive(Debug, Clone, Copy)]
pub struct Hop {
    /// Offset of the pointer from the current base.
    pub offset: usize,
    /// Pointer operations.
    pub vtable: PointerVTable,
}

/// A struct field as seen by the decoder.
#[derive(Debug, Clone)]
pub struct DecodeField {
    /// JSON key.
    pub key: Box<str>,
    /// Pointers to follow (allocating) before applying `offset`.
    pub hops: Box<[Hop]>,
    /// Offset from the struct base, or from the last hop's pointee.
    pub offset: usize,
    /// Node decoding the field's value.
    pub node: u32,
}

/// Operation of one decode node.
#[derive(Clone)]
pub enum DecodeOp {
    /// `true` / `false`.
    Bool {
        /// Expect the literal inside a string.
        quoted: bool,
    },
    /// Integer of the given width.
    Int {
        /// Width and signedness.
        kind: IntKind,
        /// Expect the number inside a string.
        quoted: bool,
    },
    /// Float of the given width.
    Float {
        /// Width.
        kind: FloatKind,
        /// Expect the number inside a string.
        quoted: bool,
    },
    /// String.
    Str {
        /// Expect a JSON string encoded inside a string.
        quoted: bool,
    },
    /// Base64 string.
    Bytes,
    /// Number text.
    Number,
    /// Raw JSON text of the value.
    Raw,
    /// A dynamic [`crate::Value`].
    Interface,
    /// Hands the raw value text to an unmarshal hook.
    Unmarshal {
        /// The bound hook.
        hook: UnmarshalFn,
    },
    /// Fails with `UnsupportedType` when reached.
    Unsupported {
        /// Why the type cannot be decoded.
        reason: &'static str,
    },
    /// Object into struct fields.
    Struct {
        /// Fields after flattening and conflict resolution.
        fields: Box<[DecodeField]>,
        /// Exact key to field index.
        index: HashMap<Box<str>, u32>,
    },
    /// Array appended to a `Vec`.
    Slice {
        /// Container operations.
        vtable: SliceVTable,
        /// Element node.
        elem: u32,
    },
    /// Array into a fixed array.
    Array {
        /// Element count.
        len: usize,
        /// Element stride.
        stride: usize,
        /// Element node.
        elem: u32,
    },
    /// Object into a keyed container.
    Map {
        /// Container operations.
        vtable: MapVTable,
        /// Value node.
        value: u32,
    },
    /// Allocates the pointee on first non-null write.
    Pointer {
        /// Pointer operations.
        vtable: PointerVTable,
        /// Pointee node.
        pointee: u32,
    },
}

impl fmt::Debug for DecodeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeOp::Bool { quoted } => write!(f, "Bool{}", q(*quoted)),
            DecodeOp::Int { kind, quoted } => write!(f, "Int({kind:?}){}", q(*quoted)),
            DecodeOp::Float { kind, quoted } => write!(f, "Float({kind:?}){}", q(*quoted)),
            DecodeOp::Str { quoted } => write!(f, "Str{}", q(*quoted)),
            DecodeOp::Bytes => f.write_str("Bytes"),
            DecodeOp::Number => f.write_str("Number"),
            DecodeOp::Raw => f.write_str("Raw"),
            DecodeOp::Interface => f.write_str("Interface"),
            DecodeOp::Unmarshal { .. } => f.write_str("Unmarshal"),
            DecodeOp::Unsupported { reason } => write!(f, "Unsupported({reason})"),
            DecodeOp::Struct { fields, .. } => {
                f.write_str("Struct ")?;
                f.debug_map()
                    .entries(fields.iter().map(|field| (&field.key, field.node)))
                    .finish()
            }
            DecodeOp::Slice { elem, .. } => write!(f, "Slice(node {elem})"),
            DecodeOp::Array { len, elem, .. } => write!(f, "Array(node {elem}; {len})"),
            DecodeOp::Map { value, .. } => write!(f, "Map(node {value})"),
            DecodeOp::Pointer { pointee, .. } => write!(f, "Pointer(node {pointee})"),
        }
    }
}

/// One decode node: what to do with the value under the cursor.
#[derive(Debug, Clone)]
pub struct DecodeNode {
    /// What to do.
    pub op: DecodeOp,
    /// Descriptor of the target type.
    pub desc: DescId,
}

/// Compiled decode program for one root type.
///
/// Nodes form a graph: a recursive type points back at an earlier node, so the
/// program stays finite.
pub struct DecodeProgram {
    pub(crate) nodes: Vec<DecodeNode>,
    pub(crate) root: u32,
    pub(crate) graph: Arc<TypeGraph>,
    pub(crate) type_id: TypeId,
}

impl DecodeProgram {
    /// Nodes in compile order; the root is not necessarily first.
    pub fn nodes(&self) -> &[DecodeNode] {
        &self.nodes
    }

    /// Name of the root type.
    pub fn type_name(&self) -> &'static str {
        self.graph[self.nodes[self.root as usize].desc].name
    }

    /// Identity of the root type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }
}

impl fmt::Debug for DecodeProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DecodeProgram<{}> (root {})", self.type_name(), self.root)?;
        for (i, node) in self.nodes.iter().enumerate() {
            writeln!(f, "{i:4}: {:?}", node.op)?;
        }
        Ok(())
    }
}
