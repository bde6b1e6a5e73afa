//! Perft against published reference counts, with hash verification on
//! the smaller trees.

use kestrel_chess::board::{Position, STARTING_FEN};
use kestrel_chess::move_generator::generate_legal;
use kestrel_chess::perft::{divide, perft, perft_verified};

struct PerftCase {
    name: &'static str,
    fen: &'static str,
    counts: &'static [u64],
}

const CASES: [PerftCase; 6] = [
    PerftCase {
        name: "start position",
        fen: STARTING_FEN,
        counts: &[20, 400, 8902, 197_281, 4_865_609],
    },
    PerftCase {
        name: "kiwipete",
        fen: "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        counts: &[48, 2039, 97_862, 4_085_603],
    },
    PerftCase {
        name: "rook endgame",
        fen: "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        counts: &[14, 191, 2812, 43_238, 674_624],
    },
    PerftCase {
        name: "promotions and pins",
        fen: "r2q1rk1/pP1p2pp/Q4n2/bbp1p3/Np6/1B3NBn/pPPP1PPP/R3K2R b KQ - 0 1",
        counts: &[6, 264, 9467, 422_333],
    },
    PerftCase {
        name: "discovered checks",
        fen: "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
        counts: &[44, 1486, 62_379, 2_103_487],
    },
    PerftCase {
        name: "symmetric middlegame",
        fen: "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
        counts: &[46, 2079, 89_890, 3_894_594],
    },
];

#[test]
fn perft_matches_reference_counts() {
    for case in &CASES {
        let mut pos = Position::from_fen(case.fen).expect("valid FEN");
        for (i, &expected) in case.counts.iter().enumerate() {
            let depth = i as u32 + 1;
            assert_eq!(perft(&mut pos, depth), expected, "{} at depth {}", case.name, depth);
        }
    }
}

#[test]
fn incremental_hash_matches_recomputed_hash_everywhere() {
    for case in &CASES {
        let mut pos = Position::from_fen(case.fen).expect("valid FEN");
        let depth = case.counts.len().min(3);
        assert_eq!(perft_verified(&mut pos, depth as u32), Ok(case.counts[depth - 1]), "{}", case.name);
    }
}

#[test]
fn restore_is_exact_for_every_legal_move() {
    for case in &CASES {
        let mut pos = Position::from_fen(case.fen).expect("valid FEN");
        let before = pos;
        for mv in generate_legal(&pos) {
            let snapshot = pos.make_move(mv);
            let after_one = pos;
            for reply in generate_legal(&pos) {
                let inner = pos.make_move(reply);
                pos.restore(inner);
                assert_eq!(pos, after_one, "{}: {} {}", case.name, mv, reply);
            }
            pos.restore(snapshot);
            assert_eq!(pos, before, "{}: {}", case.name, mv);
        }
    }
}

#[test]
fn divide_splits_the_total() {
    let mut pos = Position::from_fen(CASES[1].fen).expect("valid FEN");
    let split = divide(&mut pos, 3);
    assert_eq!(split.len(), 48);
    assert_eq!(split.iter().map(|(_, n)| n).sum::<u64>(), 97_862);
}

#[test]
fn fen_round_trips() {
    for case in &CASES {
        let pos = Position::from_fen(case.fen).expect("valid FEN");
        assert_eq!(pos.to_fen(), case.fen);
    }
}
