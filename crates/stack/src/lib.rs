//! Declarative stack reshaping for the etch assembler.
//!
//! A [`Transform`] describes a desired arrangement of the top of the EVM
//! stack in terms of the slots' current positions; solving it yields the
//! shortest sequence of SWAP/DUP/POP opcodes that produces that arrangement.
//! Slot 0 is the top of the stack.
//!
//! Two flavours exist: a [permutation](Transform::permute) reorders the top
//! `n` slots in place (SWAPs only), while a general
//! [transform](Transform::transform) may also duplicate and drop slots,
//! changing the stack height.

mod search;

use etch_data::Opcode;
use smallvec::SmallVec;
use std::fmt;

pub(crate) type State = SmallVec<[u8; 16]>;

/// SWAP and DUP can reach at most 16 slots down.
const REACH: usize = 16;

/// A requested rearrangement of the top of the stack.
///
/// Construction never fails; validation happens in [`solve`](Self::solve) so
/// that a `Transform` can be embedded in a program and report errors through
/// the compiler like any other node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transform {
    kind: Kind,
    depth: u8,
    indices: SmallVec<[u8; 16]>,
    ops: Option<Vec<Opcode>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Permutation,
    General,
}

impl Transform {
    /// Reorders the top `indices.len()` slots into the given order. The
    /// indices must be a permutation of `0..n` with `n <= 16`; the stack
    /// height is unchanged and only SWAPs are emitted.
    pub fn permute(indices: impl IntoIterator<Item = u8>) -> Self {
        let indices: SmallVec<[u8; 16]> = indices.into_iter().collect();
        Self { kind: Kind::Permutation, depth: indices.len() as u8, indices, ops: None }
    }

    /// Replaces the top `depth` slots with the requested arrangement, which
    /// may repeat, drop, or reorder them. Slots below `depth` are untouched.
    pub fn transform(depth: u8, indices: impl IntoIterator<Item = u8>) -> Self {
        Self { kind: Kind::General, depth, indices: indices.into_iter().collect(), ops: None }
    }

    /// Pins the opcode sequence instead of searching for one.
    ///
    /// [`solve`](Self::solve) will verify that the given ops produce the
    /// requested arrangement and return them verbatim. A pinned sequence
    /// longer than the optimum is accepted: this is a user-supplied cache
    /// for a result that was already searched (or hand-written code being
    /// reproduced exactly).
    pub fn with_ops(mut self, ops: impl IntoIterator<Item = Opcode>) -> Self {
        self.ops = Some(ops.into_iter().collect());
        self
    }

    /// The stack depth the transform operates on.
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// The requested arrangement, top of stack first.
    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    /// How the stack height changes: requested length minus operating
    /// depth. Zero for permutations.
    pub fn net_change(&self) -> i32 {
        self.indices.len() as i32 - self.depth as i32
    }

    /// Validates the request and returns the shortest opcode sequence that
    /// satisfies it (or the pinned sequence, verified).
    pub fn solve(&self) -> Result<Vec<Opcode>, ReshapeError> {
        self.validate()?;

        if let Some(ops) = &self.ops {
            let got = search::replay(self.depth, ops)?;
            if got[..] != self.indices[..] {
                return Err(ReshapeError::OverrideMismatch);
            }
            return Ok(ops.clone());
        }

        search::shortest_path(self.depth, &self.indices)
    }

    fn validate(&self) -> Result<(), ReshapeError> {
        match self.kind {
            Kind::Permutation => {
                let n = self.indices.len();
                if n > REACH {
                    return Err(ReshapeError::TooDeep { depth: n });
                }
                let mut seen = [false; REACH];
                for &idx in &self.indices {
                    if idx as usize >= REACH {
                        return Err(ReshapeError::IndexOutOfRange { index: idx, depth: n as u8 });
                    }
                    if seen[idx as usize] {
                        return Err(ReshapeError::DuplicateIndex { index: idx });
                    }
                    seen[idx as usize] = true;
                }
                // n distinct values, so a gap below n implies a stray value
                // at or above it; report the gap.
                for idx in 0..n {
                    if !seen[idx] {
                        return Err(ReshapeError::MissingIndex { index: idx as u8 });
                    }
                }
                Ok(())
            }
            Kind::General => {
                if self.depth as usize > REACH {
                    return Err(ReshapeError::TooDeep { depth: self.depth as usize });
                }
                if self.indices.len() > REACH {
                    return Err(ReshapeError::TooLong { len: self.indices.len() });
                }
                for &idx in &self.indices {
                    if idx >= self.depth {
                        return Err(ReshapeError::IndexOutOfRange { index: idx, depth: self.depth });
                    }
                }
                Ok(())
            }
        }
    }
}

/// A reshape request that is invalid or cannot be satisfied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReshapeError {
    /// The operating depth (or permutation size) exceeds the 16 slots that
    /// SWAP/DUP can reach.
    TooDeep { depth: usize },
    /// More than 16 slots were requested as the new top of stack.
    TooLong { len: usize },
    /// An index referred to a slot at or below the operating depth.
    IndexOutOfRange { index: u8, depth: u8 },
    /// A permutation named the same slot twice.
    DuplicateIndex { index: u8 },
    /// A permutation skipped a slot.
    MissingIndex { index: u8 },
    /// A pinned op is not a SWAP/DUP/POP or is illegal at its position.
    OverrideOp { op: Opcode, at: usize },
    /// The pinned ops do not produce the requested arrangement.
    OverrideMismatch,
    /// The search exhausted its state space; a bug, not a user error.
    Unreachable,
}

impl fmt::Display for ReshapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReshapeError::TooDeep { depth } => {
                write!(f, "can only reshape up to 16 stack slots; got {depth}")
            }
            ReshapeError::TooLong { len } => {
                write!(f, "requested arrangement of {len} slots exceeds the 16-slot reach")
            }
            ReshapeError::IndexOutOfRange { index, depth } => {
                write!(f, "slot index {index} out of range for depth {depth}")
            }
            ReshapeError::DuplicateIndex { index } => {
                write!(f, "duplicate slot index {index} in permutation")
            }
            ReshapeError::MissingIndex { index } => {
                write!(f, "permutation is missing slot index {index}")
            }
            ReshapeError::OverrideOp { op, at } => {
                write!(f, "pinned op {op} at position {at} is not applicable")
            }
            ReshapeError::OverrideMismatch => {
                write!(f, "pinned ops do not produce the requested arrangement")
            }
            ReshapeError::Unreachable => {
                write!(f, "exhausted search without reaching the requested arrangement")
            }
        }
    }
}

impl std::error::Error for ReshapeError {}

#[cfg(test)]
mod tests {
    use super::*;
    use etch_data::Opcode::*;

    #[test]
    fn noop_requests_emit_nothing() {
        assert_eq!(Transform::permute([]).solve().unwrap(), vec![]);
        assert_eq!(Transform::permute([0, 1, 2, 3, 4, 5]).solve().unwrap(), vec![]);
        assert_eq!(Transform::transform(2, [0, 1]).solve().unwrap(), vec![]);
        assert_eq!(Transform::transform(0, []).solve().unwrap(), vec![]);
    }

    #[test]
    fn permute_four() {
        let ops = Transform::permute([2, 0, 3, 1]).solve().unwrap();
        assert_eq!(ops, vec![SWAP1, SWAP3, SWAP2]);
    }

    #[test]
    fn single_swap_permutations() {
        let ops = Transform::permute([7, 1, 2, 3, 4, 5, 6, 0]).solve().unwrap();
        assert_eq!(ops, vec![SWAP7]);

        let ops = Transform::permute([4, 1, 2, 3, 0, 5, 6]).solve().unwrap();
        assert_eq!(ops, vec![SWAP4]);
    }

    #[test]
    fn transform_same_depth() {
        let ops = Transform::transform(5, [4, 0, 2, 2, 3, 1]).solve().unwrap();
        assert_eq!(ops, vec![DUP3, SWAP2, SWAP5]);
    }

    #[test]
    fn transform_greater_depth_pops_surplus() {
        let ops = Transform::transform(7, [4, 0, 2, 2, 3, 1]).solve().unwrap();
        assert_eq!(ops, vec![SWAP2, SWAP3, SWAP5, POP, SWAP5, POP, DUP2, SWAP3]);
    }

    #[test]
    fn single_op_transforms() {
        assert_eq!(Transform::transform(5, [1, 2, 3, 4]).solve().unwrap(), vec![POP]);
        assert_eq!(Transform::transform(5, [3, 0, 1, 2, 3, 4]).solve().unwrap(), vec![DUP4]);
        assert_eq!(Transform::transform(7, []).solve().unwrap(), vec![POP; 7]);
    }

    #[test]
    fn net_change() {
        assert_eq!(Transform::permute([2, 0, 1]).net_change(), 0);
        assert_eq!(Transform::transform(7, [4, 0, 2, 2, 3, 1]).net_change(), -1);
        assert_eq!(Transform::transform(4, [1, 3, 3, 0, 2, 0]).net_change(), 2);
        assert_eq!(Transform::transform(5, []).net_change(), -5);
    }

    #[test]
    fn pinned_ops_are_verified_and_returned_verbatim() {
        // 0age's metamorphic constructor: the hand-written sequence is one
        // op longer than the search result, and is accepted as-is.
        let pinned = [DUP1, SWAP4, DUP1, SWAP2, SWAP3];
        let xform = Transform::transform(4, [1, 3, 3, 0, 2, 0]).with_ops(pinned);
        assert_eq!(xform.solve().unwrap(), pinned.to_vec());

        let searched = Transform::transform(4, [1, 3, 3, 0, 2, 0]).solve().unwrap();
        assert!(searched.len() < pinned.len());
    }

    #[test]
    fn pinned_ops_mismatch() {
        let err = Transform::transform(4, [1, 3, 3, 0, 2, 0])
            .with_ops([DUP1, SWAP4])
            .solve()
            .unwrap_err();
        assert_eq!(err, ReshapeError::OverrideMismatch);
    }

    #[test]
    fn pinned_ops_must_be_applicable() {
        // SWAP4 on a three-slot stack.
        let err = Transform::transform(3, [2, 1, 0]).with_ops([SWAP4]).solve().unwrap_err();
        assert_eq!(err, ReshapeError::OverrideOp { op: SWAP4, at: 0 });

        // Only SWAP/DUP/POP reshape the stack.
        let err = Transform::transform(2, [1, 0]).with_ops([ADD]).solve().unwrap_err();
        assert_eq!(err, ReshapeError::OverrideOp { op: ADD, at: 0 });
    }

    #[test]
    fn permutation_validation() {
        assert_eq!(
            Transform::permute([0, 0, 1]).solve().unwrap_err(),
            ReshapeError::DuplicateIndex { index: 0 },
        );
        assert_eq!(
            Transform::permute([0, 3, 1]).solve().unwrap_err(),
            ReshapeError::MissingIndex { index: 2 },
        );
        assert_eq!(
            Transform::permute([0, 16, 1]).solve().unwrap_err(),
            ReshapeError::IndexOutOfRange { index: 16, depth: 3 },
        );
        assert_eq!(
            Transform::permute(0..17).solve().unwrap_err(),
            ReshapeError::TooDeep { depth: 17 },
        );
    }

    #[test]
    fn transform_validation() {
        assert_eq!(
            Transform::transform(3, [3]).solve().unwrap_err(),
            ReshapeError::IndexOutOfRange { index: 3, depth: 3 },
        );
        assert_eq!(
            Transform::transform(17, [0]).solve().unwrap_err(),
            ReshapeError::TooDeep { depth: 17 },
        );
        assert_eq!(
            Transform::transform(2, [0; 17]).solve().unwrap_err(),
            ReshapeError::TooLong { len: 17 },
        );
    }
}
