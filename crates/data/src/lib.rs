//! Shared data definitions for the etch assembler: the EVM opcode table and
//! its compile-time stack metadata, normalized push immediates with their
//! minimal PUSH encoding, selector hashing, and index newtypes.

pub mod index;
pub mod opcode;
pub mod push;

pub use crate::{
    index::*,
    opcode::{Opcode, StackDelta},
    push::{minimal_push, selector, PushError, PushValue},
};
