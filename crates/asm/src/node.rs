//! The node model: the closed set of building blocks a program is written
//! in, and the flattening pass that erases the two holder variants.

use etch_data::{Opcode, PushError, PushValue};
use etch_stack::Transform;

/// A program: a sequence of nodes, possibly nested through [`Node::Fn`] and
/// [`Node::Block`].
pub type Code = Vec<Node>;

/// One element of a program.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    /// A literal opcode, stack-checked at compile time.
    Op(Opcode),
    /// Arbitrary bytes appended verbatim; bypasses every check. For
    /// embedded data, not code.
    Raw(Vec<u8>),
    /// Push a value with the narrowest possible PUSH.
    Push(PushValue),
    /// Push the four-byte selector of a function signature (always PUSH4).
    PushSelector(String),
    /// A named JUMPDEST: emits the opcode byte and records its offset.
    JumpDest(String),
    /// A named position: emits nothing, records the offset of the next
    /// byte.
    Label(String),
    /// Push the resolved offset of a [`Node::JumpDest`] or [`Node::Label`].
    PushLabel(String),
    /// Push the concatenated offsets of several labels, each written at the
    /// same width. Useful for jump tables.
    PushLabels(Vec<String>),
    /// Push the distance in bytes between two labels.
    PushSize(String, String),
    /// A DUP or SWAP counted from the *bottom* of the tracked stack;
    /// rewritten at compile time to the opcode that reaches that slot.
    Inverted(Opcode),
    /// Children emitted in reverse, so arguments read like a function call:
    /// `Fn(MSTORE, offset, value)` emits `value offset MSTORE`.
    Fn(Vec<Node>),
    /// Children emitted in order.
    Block(Vec<Node>),
    /// A declarative stack rearrangement, lowered to the shortest
    /// SWAP/DUP/POP sequence.
    Reshape(Transform),
    /// Asserts the tracked stack depth; emits nothing.
    ExpectDepth(u16),
    /// Overrides the tracked stack depth; emits nothing. Required after
    /// every JUMPDEST, where backward jumps invalidate straight-line
    /// tracking.
    SetDepth(u16),
}

impl Node {
    pub fn push(value: impl Into<PushValue>) -> Self {
        Node::Push(value.into())
    }

    /// Push a byte string of 1..=32 bytes.
    pub fn push_bytes(bytes: impl AsRef<[u8]>) -> Result<Self, PushError> {
        Ok(Node::Push(PushValue::bytes(bytes)?))
    }

    pub fn push_selector(sig: impl Into<String>) -> Self {
        Node::PushSelector(sig.into())
    }

    pub fn jumpdest(name: impl Into<String>) -> Self {
        Node::JumpDest(name.into())
    }

    pub fn label(name: impl Into<String>) -> Self {
        Node::Label(name.into())
    }

    pub fn push_label(name: impl Into<String>) -> Self {
        Node::PushLabel(name.into())
    }

    pub fn push_labels<I>(names: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Node::PushLabels(names.into_iter().map(Into::into).collect())
    }

    pub fn push_size(a: impl Into<String>, b: impl Into<String>) -> Self {
        Node::PushSize(a.into(), b.into())
    }
}

impl From<Opcode> for Node {
    fn from(op: Opcode) -> Self {
        Node::Op(op)
    }
}

/// Recursively replaces every holder with its children: [`Node::Block`] in
/// order, [`Node::Fn`] reversed. The result contains no holders.
pub(crate) fn flatten(code: Code) -> Vec<Node> {
    let mut out = Vec::with_capacity(code.len());
    splice_into(code, false, &mut out);
    out
}

fn splice_into(nodes: Vec<Node>, reversed: bool, out: &mut Vec<Node>) {
    if reversed {
        for node in nodes.into_iter().rev() {
            expand(node, out);
        }
    } else {
        for node in nodes {
            expand(node, out);
        }
    }
}

fn expand(node: Node, out: &mut Vec<Node>) {
    match node {
        Node::Fn(children) => splice_into(children, true, out),
        Node::Block(children) => splice_into(children, false, out),
        leaf => out.push(leaf),
    }
}
