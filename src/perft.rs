//! Kestrel - Perft
//!
//! Leaf counts of the legal move tree, used to validate move generation
//! against published reference numbers.

use crate::board::Position;
use crate::error::{EngineError, EngineResult};
use crate::move_generator::generate_legal;
use crate::moves::Move;

/// Count leaf nodes at `depth`
pub fn perft(pos: &mut Position, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }

    let moves = generate_legal(pos);
    if depth == 1 {
        return moves.len() as u64;
    }

    let mut nodes = 0u64;
    for mv in moves {
        let snapshot = pos.make_move(mv);
        nodes += perft(pos, depth - 1);
        pos.restore(snapshot);
    }
    nodes
}

/// Per-root-move leaf counts
pub fn divide(pos: &mut Position, depth: u32) -> Vec<(Move, u64)> {
    if depth == 0 {
        return Vec::new();
    }
    generate_legal(pos)
        .into_iter()
        .map(|mv| {
            let snapshot = pos.make_move(mv);
            let nodes = perft(pos, depth - 1);
            pos.restore(snapshot);
            (mv, nodes)
        })
        .collect()
}

/// Perft that also checks, at every node, that the incremental hash matches
/// a full recomputation and that restore returns the exact prior state.
pub fn perft_verified(pos: &mut Position, depth: u32) -> EngineResult<u64> {
    if depth == 0 {
        return Ok(1);
    }

    let mut nodes = 0u64;
    for mv in generate_legal(pos) {
        let before = *pos;
        let snapshot = pos.make_move(mv);

        let recomputed = pos.compute_hash();
        let result = if pos.hash != recomputed {
            Err(EngineError::HashMismatch {
                mv: mv.to_uci(),
                incremental: pos.hash,
                recomputed,
            })
        } else {
            perft_verified(pos, depth - 1)
        };
        pos.restore(snapshot);
        debug_assert_eq!(*pos, before);
        nodes += result?;
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shallow_start_position_counts() {
        let mut pos = Position::new();
        assert_eq!(perft(&mut pos, 0), 1);
        assert_eq!(perft(&mut pos, 1), 20);
        assert_eq!(perft(&mut pos, 2), 400);
        assert_eq!(perft(&mut pos, 3), 8902);
    }

    #[test]
    fn divide_sums_to_perft() {
        let mut pos = Position::new();
        let split = divide(&mut pos, 3);
        assert_eq!(split.len(), 20);
        assert_eq!(split.iter().map(|(_, n)| n).sum::<u64>(), 8902);
    }

    #[test]
    fn verified_perft_leaves_position_untouched() {
        let mut pos =
            Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1").expect("fen");
        let before = pos;
        assert_eq!(perft_verified(&mut pos, 2), Ok(2039));
        assert_eq!(pos, before);
    }

    #[test]
    fn hash_mismatch_still_restores_the_position() {
        let mut pos = Position::new();
        pos.hash ^= 1;
        let before = pos;
        assert!(matches!(
            perft_verified(&mut pos, 3),
            Err(EngineError::HashMismatch { .. })
        ));
        assert_eq!(pos, before);
    }
}
