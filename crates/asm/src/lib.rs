//! An embedded DSL for crafting raw EVM bytecode.
//!
//! Programs are trees of [`Node`]s: literal opcodes, pushes whose width is
//! chosen for you, named jump destinations with forward and backward
//! references, bottom-counted DUP/SWAP, and declarative stack reshaping.
//! [`compile`] turns a tree into a byte-exact contract, resolving every
//! label offset and immediate width through a fixpoint.
//!
//! ```
//! use etch_asm::{compile, Node, Opcode::*};
//!
//! let hello = b"Hello world";
//! let code = vec![
//!     Node::Fn(vec![MSTORE.into(), PUSH0.into(), Node::push_bytes(hello)?]),
//!     Node::Fn(vec![
//!         RETURN.into(),
//!         Node::push(32 - hello.len() as u64),
//!         Node::push(hello.len() as u64),
//!     ]),
//! ];
//!
//! assert_eq!(
//!     compile(code)?,
//!     alloy_primitives::hex::decode("6a48656c6c6f20776f726c645f52600b6015f3")?,
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod compiler;
mod error;
mod node;
mod splice;

#[cfg(test)]
mod tests;

pub use crate::{
    compiler::compile,
    error::CompileError,
    node::{Code, Node},
};

pub use etch_data::{minimal_push, selector, Opcode, PushError, PushValue, StackDelta};
pub use etch_stack::{ReshapeError, Transform};
