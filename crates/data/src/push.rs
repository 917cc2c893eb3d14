//! Stack-push immediates and their minimal PUSH encoding.
//!
//! Everything a program can ask to push — integers, addresses, byte strings,
//! four-byte selectors — funnels into one normalized representation: a
//! big-endian byte string of at most 32 bytes. The encoder then picks the
//! narrowest PUSH opcode that still represents the value.

use alloy_primitives::{keccak256, Address, U256};
use std::fmt;

/// The PUSH0 opcode byte; PUSH1..PUSH32 are the 32 bytes that follow it.
pub const PUSH0: u8 = 0x5f;

/// A value destined for the stack, normalized to big-endian bytes.
///
/// Leading zero bytes are allowed here; they are stripped when the value is
/// encoded. The length is always in 1..=32.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushValue {
    bytes: Vec<u8>,
}

impl PushValue {
    /// Wraps a raw byte string. Lengths outside 1..=32 cannot be pushed.
    pub fn bytes(bytes: impl AsRef<[u8]>) -> Result<Self, PushError> {
        let bytes = bytes.as_ref();
        match bytes.len() {
            0 => Err(PushError::Empty),
            n if n > 32 => Err(PushError::TooLong { len: n }),
            _ => Ok(Self { bytes: bytes.to_vec() }),
        }
    }

    /// The normalized big-endian bytes, leading zeroes included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The `PUSHn` + immediate encoding of this value.
    pub fn encode(&self) -> Vec<u8> {
        minimal_push(&self.bytes).expect("length validated at construction")
    }
}

impl From<u64> for PushValue {
    fn from(value: u64) -> Self {
        if value == 0 {
            return Self { bytes: vec![0] };
        }
        let be = value.to_be_bytes();
        let skip = value.leading_zeros() as usize / 8;
        Self { bytes: be[skip..].to_vec() }
    }
}

impl From<U256> for PushValue {
    fn from(value: U256) -> Self {
        if value.is_zero() {
            return Self { bytes: vec![0] };
        }
        Self { bytes: value.to_be_bytes_trimmed_vec() }
    }
}

impl From<Address> for PushValue {
    fn from(value: Address) -> Self {
        Self { bytes: value.as_slice().to_vec() }
    }
}

impl TryFrom<&[u8]> for PushValue {
    type Error = PushError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::bytes(bytes)
    }
}

/// Encodes `bytes` as the narrowest possible PUSH: leading zeroes are
/// stripped, an all-zero (or empty-after-strip) value becomes a lone PUSH0,
/// anything else becomes `PUSH<m>` followed by the `m` remaining bytes.
pub fn minimal_push(bytes: &[u8]) -> Result<Vec<u8>, PushError> {
    let n = bytes.len();
    if n == 0 {
        return Err(PushError::Empty);
    }
    if n > 32 {
        return Err(PushError::TooLong { len: n });
    }

    let zeroes = bytes.iter().take_while(|&&b| b == 0).count();
    let m = n - zeroes;
    if m == 0 {
        return Ok(vec![PUSH0]);
    }

    let mut out = Vec::with_capacity(1 + m);
    out.push(PUSH0 + m as u8);
    out.extend_from_slice(&bytes[zeroes..]);
    Ok(out)
}

/// The four-byte function selector for a signature: `keccak256(sig)[..4]`.
pub fn selector(sig: &str) -> [u8; 4] {
    let hash = keccak256(sig.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// A value that cannot be pushed to the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushError {
    /// Zero bytes were supplied; even PUSH0 represents the one-byte value 0.
    Empty,
    /// More than 32 bytes were supplied.
    TooLong { len: usize },
}

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::Empty => write!(f, "empty push value"),
            PushError::TooLong { len } => {
                write!(f, "push value of {len} bytes exceeds the 32-byte stack word")
            }
        }
    }
}

impl std::error::Error for PushError {}
