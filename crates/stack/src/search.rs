//! Breadth-first search over stack arrangements.
//!
//! A state is the top `depth` slots written as the slots' *original*
//! positions, root state `[0, 1, …, depth-1]`. One opcode is one edge:
//! SWAPk exchanges positions 0 and k, DUPk prepends a copy of position k-1,
//! POP drops position 0. BFS from the root returns a shortest path to the
//! requested arrangement.
//!
//! Edge generation is delta-guided: a DUP is only worth taking for a symbol
//! the target still needs more copies of, a POP only when the top symbol is
//! surplus, while every legal SWAP is always a candidate. Candidates are
//! enumerated in a fixed order (DUPs by ascending symbol, then POP, then
//! SWAPs by ascending k) so that equally-short paths tie-break identically
//! on every run and platform.

use crate::{ReshapeError, State};
use etch_data::Opcode;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use std::collections::VecDeque;

const DUPS: [Opcode; 16] = [
    Opcode::DUP1,
    Opcode::DUP2,
    Opcode::DUP3,
    Opcode::DUP4,
    Opcode::DUP5,
    Opcode::DUP6,
    Opcode::DUP7,
    Opcode::DUP8,
    Opcode::DUP9,
    Opcode::DUP10,
    Opcode::DUP11,
    Opcode::DUP12,
    Opcode::DUP13,
    Opcode::DUP14,
    Opcode::DUP15,
    Opcode::DUP16,
];

const SWAPS: [Opcode; 16] = [
    Opcode::SWAP1,
    Opcode::SWAP2,
    Opcode::SWAP3,
    Opcode::SWAP4,
    Opcode::SWAP5,
    Opcode::SWAP6,
    Opcode::SWAP7,
    Opcode::SWAP8,
    Opcode::SWAP9,
    Opcode::SWAP10,
    Opcode::SWAP11,
    Opcode::SWAP12,
    Opcode::SWAP13,
    Opcode::SWAP14,
    Opcode::SWAP15,
    Opcode::SWAP16,
];

/// Finds a shortest SWAP/DUP/POP sequence turning `[0, …, depth-1]` into
/// `target`. Inputs must already be validated.
pub(crate) fn shortest_path(depth: u8, target: &[u8]) -> Result<Vec<Opcode>, ReshapeError> {
    let root: State = (0..depth).collect();
    if root[..] == *target {
        return Ok(Vec::new());
    }

    let mut want = [0u8; 16];
    for &s in target {
        want[s as usize] += 1;
    }

    // States stay within depth + len(target) <= 32 slots (a DUP edge exists
    // only while some symbol is still in deficit), so 4 bits per slot packs
    // any state into a u128.
    let mut seen = FxHashSet::default();
    seen.insert(pack(&root));

    let mut queue: VecDeque<(State, Vec<Opcode>)> = VecDeque::new();
    queue.push_back((root, Vec::new()));

    while let Some((state, path)) = queue.pop_front() {
        let mut have = [0u8; 16];
        for &s in &state {
            have[s as usize] += 1;
        }

        let mut candidates: SmallVec<[Opcode; 24]> = SmallVec::new();
        for s in 0..depth {
            if want[s as usize] > have[s as usize] {
                if let Some(pos) = state.iter().position(|&x| x == s) {
                    if pos < DUPS.len() {
                        candidates.push(DUPS[pos]);
                    }
                }
            }
        }
        if let Some(&top) = state.first() {
            if want[top as usize] < have[top as usize] {
                candidates.push(Opcode::POP);
            }
        }
        for k in 1..=state.len().saturating_sub(1).min(SWAPS.len()) {
            candidates.push(SWAPS[k - 1]);
        }

        for op in candidates {
            let next = step(&state, op);
            if !seen.insert(pack(&next)) {
                continue;
            }

            let mut next_path = path.clone();
            next_path.push(op);
            if next[..] == *target {
                return Ok(next_path);
            }
            queue.push_back((next, next_path));
        }
    }

    Err(ReshapeError::Unreachable)
}

/// Replays `ops` against the root state of the given depth, rejecting
/// anything that is not an applicable SWAP/DUP/POP.
pub(crate) fn replay(depth: u8, ops: &[Opcode]) -> Result<State, ReshapeError> {
    let mut state: State = (0..depth).collect();
    for (at, &op) in ops.iter().enumerate() {
        let applicable = if op == Opcode::POP {
            !state.is_empty()
        } else if op.is_dup() {
            let k = (op.byte() - Opcode::DUP1.byte()) as usize + 1;
            state.len() >= k
        } else if op.is_swap() {
            let k = (op.byte() - Opcode::SWAP1.byte()) as usize + 1;
            state.len() > k
        } else {
            false
        };
        if !applicable {
            return Err(ReshapeError::OverrideOp { op, at });
        }
        state = step(&state, op);
    }
    Ok(state)
}

fn step(state: &State, op: Opcode) -> State {
    let mut next = state.clone();
    if op == Opcode::POP {
        next.remove(0);
    } else if op.is_dup() {
        let k = (op.byte() - Opcode::DUP1.byte()) as usize;
        let slot = next[k];
        next.insert(0, slot);
    } else {
        let k = (op.byte() - Opcode::SWAP1.byte()) as usize + 1;
        next.swap(0, k);
    }
    next
}

fn pack(state: &State) -> (u8, u128) {
    let mut key = 0u128;
    for &s in state {
        key = (key << 4) | s as u128;
    }
    (state.len() as u8, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Transform;
    use proptest::prelude::*;

    fn simulate(depth: u8, ops: &[Opcode]) -> Vec<u8> {
        replay(depth, ops).expect("solver emitted an inapplicable op").to_vec()
    }

    /// Reference shortest-path search with *every* legal edge, no pruning.
    /// Only usable for tiny inputs.
    fn oracle_len(depth: u8, target: &[u8]) -> usize {
        let cap = depth as usize + target.len();
        let root: State = (0..depth).collect();
        if root[..] == *target {
            return 0;
        }
        let mut seen = FxHashSet::default();
        seen.insert(pack(&root));
        let mut queue: VecDeque<(State, usize)> = VecDeque::new();
        queue.push_back((root, 0));
        while let Some((state, len)) = queue.pop_front() {
            let mut edges: Vec<Opcode> = Vec::new();
            for k in 1..=state.len().min(16) {
                if state.len() < cap {
                    edges.push(DUPS[k - 1]);
                }
            }
            if !state.is_empty() {
                edges.push(Opcode::POP);
            }
            for k in 1..=state.len().saturating_sub(1).min(16) {
                edges.push(SWAPS[k - 1]);
            }
            for op in edges {
                let next = step(&state, op);
                if !seen.insert(pack(&next)) {
                    continue;
                }
                if next[..] == *target {
                    return len + 1;
                }
                queue.push_back((next, len + 1));
            }
        }
        panic!("oracle failed to reach {target:?} from depth {depth}");
    }

    #[test]
    fn step_matches_evm_semantics() {
        let state: State = (0..4).collect();
        assert_eq!(step(&state, Opcode::SWAP2)[..], [2, 1, 0, 3]);
        assert_eq!(step(&state, Opcode::DUP3)[..], [2, 0, 1, 2, 3]);
        assert_eq!(step(&state, Opcode::POP)[..], [1, 2, 3]);
    }

    #[test]
    fn pack_distinguishes_lengths() {
        let a: State = [0, 0, 1].into_iter().collect();
        let b: State = [0, 1].into_iter().collect();
        assert_ne!(pack(&a), pack(&b));
    }

    proptest! {
        #[test]
        fn permutations_reach_their_target(target in Just((0u8..8).collect::<Vec<_>>()).prop_shuffle()) {
            let ops = Transform::permute(target.iter().copied()).solve().unwrap();
            prop_assert_eq!(simulate(target.len() as u8, &ops), target);
            // A permutation never changes the stack height.
            for op in ops {
                prop_assert!(op.is_swap());
            }
        }

        #[test]
        fn transforms_reach_their_target(target in proptest::collection::vec(0u8..5, 0..9)) {
            let ops = Transform::transform(5, target.iter().copied()).solve().unwrap();
            prop_assert_eq!(simulate(5, &ops), target);
        }

        #[test]
        fn solver_is_optimal(target in proptest::collection::vec(0u8..3, 0..6)) {
            let ops = Transform::transform(3, target.iter().copied()).solve().unwrap();
            prop_assert_eq!(ops.len(), oracle_len(3, &target));
        }

        #[test]
        fn solver_is_deterministic(target in proptest::collection::vec(0u8..5, 0..8)) {
            let a = Transform::transform(5, target.iter().copied()).solve().unwrap();
            let b = Transform::transform(5, target.iter().copied()).solve().unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
