//! Compilation errors.
//!
//! Nothing is recovered locally: every failure surfaces through the
//! `compile` return value, carrying the index of the offending node in the
//! flattened sequence where one exists. No partial bytecode is ever
//! returned.

use etch_data::{Opcode, PushError};
use etch_stack::ReshapeError;
use std::fmt;

/// Result type for compilation.
pub type Result<T> = std::result::Result<T, CompileError>;

#[derive(Clone, Debug, PartialEq)]
pub enum CompileError {
    /// A push referenced a label that no JumpDest/Label defines.
    UndefinedLabel { name: String },
    /// The same label was defined twice.
    DuplicateLabel { name: String },
    /// An ExpectDepth assertion failed.
    DepthMismatch { expected: u16, got: u16, node_index: usize },
    /// An instruction would pop more values than the tracked stack holds.
    StackUnderflow { need: u8, have: u16, node_index: usize },
    /// The tracked stack grew past the 1024-slot limit.
    StackOverflow { depth: u16, node_index: usize },
    /// Inverted applied to a non-DUP/SWAP opcode, or the bottom-counted
    /// slot lies below the tracked stack.
    InvalidInversion { op: Opcode, depth: u16, node_index: usize },
    /// A JumpDest was not followed by a SetDepth.
    MissingSetDepthAfterJumpDest { node_index: usize },
    /// A Reshape request was invalid or its pinned ops did not verify.
    BadReshape { source: ReshapeError, node_index: usize },
    /// A push value (or a label concatenation) cannot fit a 32-byte word.
    BadPush { source: PushError, node_index: usize },
    /// The distance between two labels cannot be pushed in two bytes;
    /// bytecode that long is not deployable anyway.
    SizeOverflow { between: (String, String), diff: u64 },
    /// A broken internal invariant. Always a bug, never a user error.
    Internal { site: &'static str },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UndefinedLabel { name } => {
                write!(f, "push of label {name:?} without a corresponding JumpDest/Label")
            }
            CompileError::DuplicateLabel { name } => {
                write!(f, "duplicate JumpDest/Label {name:?}")
            }
            CompileError::DepthMismatch { expected, got, node_index } => {
                write!(f, "node [{node_index}]: stack depth {got} when expecting {expected}")
            }
            CompileError::StackUnderflow { need, have, node_index } => {
                write!(f, "node [{node_index}]: popping {need} values with stack depth {have}")
            }
            CompileError::StackOverflow { depth, node_index } => {
                write!(f, "node [{node_index}]: stack depth {depth} exceeds the 1024 limit")
            }
            CompileError::InvalidInversion { op, depth, node_index } => {
                write!(f, "node [{node_index}]: Inverted({op}) with stack depth {depth}")
            }
            CompileError::MissingSetDepthAfterJumpDest { node_index } => {
                write!(f, "node [{node_index}]: JumpDest must be followed by SetDepth")
            }
            CompileError::BadReshape { source, node_index } => {
                write!(f, "node [{node_index}]: {source}")
            }
            CompileError::BadPush { source, node_index } => {
                write!(f, "node [{node_index}]: {source}")
            }
            CompileError::SizeOverflow { between: (a, b), diff } => {
                write!(f, "size {diff} between {a:?} and {b:?} can't be represented in 2 bytes")
            }
            CompileError::Internal { site } => {
                write!(f, "internal invariant broken at {site}; this is a bug")
            }
        }
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompileError::BadReshape { source, .. } => Some(source),
            CompileError::BadPush { source, .. } => Some(source),
            _ => None,
        }
    }
}
