//! The compiler driver: a linear scan over the flattened node sequence.
//!
//! The driver appends finished bytes to the current splice, starts a new
//! splice at every lazy node, and tracks the stack depth across every
//! instruction it emits. Depth tracking is straight-line only; the
//! programmer re-anchors it with `SetDepth` after every `JumpDest`, since a
//! backward jump can arrive with any stack.

use crate::error::{CompileError, Result};
use crate::node::{flatten, Code, Node};
use crate::splice::{Layout, LazyOp};
use etch_data::{selector, Opcode};
use tracing::debug;

/// The EVM stack holds at most 1024 words.
const STACK_LIMIT: u16 = 1024;

/// Compiles a program to raw bytecode, sizing every immediate and resolving
/// every label reference.
pub fn compile(code: Code) -> Result<Vec<u8>> {
    let flat = flatten(code);
    debug!(nodes = flat.len(), "compiling");

    let mut compiler = Compiler::new();
    for (index, node) in flat.into_iter().enumerate() {
        compiler.node(index, node)?;
    }

    let bytecode = compiler.layout.finalize()?;
    debug!(bytes = bytecode.len(), "compiled");
    Ok(bytecode)
}

struct Compiler {
    layout: Layout,
    /// Straight-line belief about the stack depth.
    depth: u16,
    /// Set after a JumpDest; the next node must be SetDepth.
    need_set_depth: bool,
}

impl Compiler {
    fn new() -> Self {
        Self { layout: Layout::new(), depth: 0, need_set_depth: false }
    }

    fn node(&mut self, index: usize, node: Node) -> Result<()> {
        // Depth pseudo-ops come before the pending-SetDepth check so that an
        // assertion may sit between a JumpDest and its SetDepth.
        let node = match node {
            Node::SetDepth(depth) => {
                if depth > STACK_LIMIT {
                    return Err(CompileError::StackOverflow { depth, node_index: index });
                }
                self.depth = depth;
                self.need_set_depth = false;
                return Ok(());
            }
            Node::ExpectDepth(expected) => {
                if self.depth != expected {
                    return Err(CompileError::DepthMismatch {
                        expected,
                        got: self.depth,
                        node_index: index,
                    });
                }
                return Ok(());
            }
            node => node,
        };

        if self.need_set_depth {
            return Err(CompileError::MissingSetDepthAfterJumpDest { node_index: index });
        }

        match node {
            Node::Op(op) => self.emit(index, &[op.byte()]),
            Node::Inverted(op) => {
                let op = self.invert(index, op)?;
                self.emit(index, &[op.byte()])
            }
            Node::Raw(bytes) => {
                // Data, not code: appended verbatim, invisible to tracking.
                self.layout.buf().extend_from_slice(&bytes);
                Ok(())
            }
            Node::Push(value) => self.emit(index, &value.encode()),
            Node::PushSelector(sig) => {
                let mut bytes = Vec::with_capacity(5);
                bytes.push(Opcode::PUSH4.byte());
                bytes.extend_from_slice(&selector(&sig));
                self.emit(index, &bytes)
            }
            Node::JumpDest(name) => {
                self.layout.begin_lazy(LazyOp::JumpDest(name), index)?;
                self.need_set_depth = true;
                Ok(())
            }
            Node::Label(name) => self.layout.begin_lazy(LazyOp::Label(name), index),
            Node::PushLabel(name) => {
                self.layout.begin_lazy(LazyOp::PushLabel(name), index)?;
                self.grow(index)
            }
            Node::PushLabels(names) => {
                if names.is_empty() {
                    // Pushing zero offsets emits nothing, so the stack must
                    // not be counted either.
                    return Ok(());
                }
                self.layout.begin_lazy(LazyOp::PushLabels(names), index)?;
                self.grow(index)
            }
            Node::PushSize(a, b) => {
                self.layout.begin_lazy(LazyOp::PushSize(a, b), index)?;
                self.grow(index)
            }
            Node::Reshape(xform) => {
                let ops = xform
                    .solve()
                    .map_err(|source| CompileError::BadReshape { source, node_index: index })?;
                let bytes: Vec<u8> = ops.iter().map(|op| op.byte()).collect();
                self.emit(index, &bytes)
            }
            Node::Fn(_) | Node::Block(_) => {
                Err(CompileError::Internal { site: "holder survived flattening" })
            }
            Node::SetDepth(_) | Node::ExpectDepth(_) => {
                Err(CompileError::Internal { site: "depth pseudo-op fell through" })
            }
        }
    }

    /// Rewrites a bottom-counted DUP/SWAP into the opcode reaching that
    /// slot at the current depth. `Inverted(DUP1)` is the bottom of the
    /// stack (or the deepest reachable slot when more than 16 values are
    /// tracked), `Inverted(DUP2)` one above it, and so on.
    fn invert(&self, index: usize, op: Opcode) -> Result<Opcode> {
        let byte = op.byte();
        let base = byte & 0xf0;
        if base != Opcode::DUP1.byte() && base != Opcode::SWAP1.byte() {
            return Err(CompileError::InvalidInversion {
                op,
                depth: self.depth,
                node_index: index,
            });
        }

        let offset = (byte - base) as u16;
        let mut reach = self.depth.min(16);
        if base == Opcode::SWAP1.byte() {
            // SWAPs exchange with the top, so the bottom slot itself is one
            // position closer than for DUPs.
            reach = reach.saturating_sub(1);
        }
        if offset >= reach {
            return Err(CompileError::InvalidInversion {
                op,
                depth: self.depth,
                node_index: index,
            });
        }

        let inverted = base + (reach - offset - 1) as u8;
        Opcode::from_byte(inverted)
            .ok_or(CompileError::Internal { site: "inversion left the DUP/SWAP range" })
    }

    /// Appends instruction bytes to the current splice, applying each
    /// opcode's stack delta and skipping PUSH immediates.
    fn emit(&mut self, index: usize, bytes: &[u8]) -> Result<()> {
        let mut at = 0;
        while at < bytes.len() {
            let op = Opcode::from_byte(bytes[at])
                .ok_or(CompileError::Internal { site: "undefined opcode emitted" })?;
            let delta = op.info();
            if self.depth < delta.pop as u16 {
                return Err(CompileError::StackUnderflow {
                    need: delta.pop,
                    have: self.depth,
                    node_index: index,
                });
            }
            self.depth = self.depth - delta.pop as u16 + delta.push as u16;
            if self.depth > STACK_LIMIT {
                return Err(CompileError::StackOverflow { depth: self.depth, node_index: index });
            }
            at += 1 + op.push_bytes() as usize;
        }

        self.layout.buf().extend_from_slice(bytes);
        Ok(())
    }

    /// One value pushed by a lazy operator.
    fn grow(&mut self, index: usize) -> Result<()> {
        self.depth += 1;
        if self.depth > STACK_LIMIT {
            return Err(CompileError::StackOverflow { depth: self.depth, node_index: index });
        }
        Ok(())
    }
}
