//! Threefold repetition from real games.

use kestrel_chess::game::Game;

const THREEFOLD: [(&str, &str); 7] = [
    (
        "6k1/5p1p/6p1/8/1p1q1P2/1QP3P1/1P3RKP/4r3 b - - 2 35",
        "d4e4 g2h3 e4f5 h3g2 f5e4 g2h3 e4f5 h3g2 f5e4",
    ),
    (
        "3r1rk1/1p1b1pp1/p1p1p1qp/P1Pp4/1P1PPP2/2N3R1/2Q2RPP/6K1 b - - 8 28",
        "g6h5 g3h3 h5g4 h3g3 g4h5 g3h3 h5g4 h3g3 g4h5",
    ),
    (
        "8/2R5/6pk/5p1p/4p2P/6P1/1r3PK1/8 w - - 2 52",
        "g2g1 b2a2 g1f1 a2b2 f1g1 b2a2 g1f1 a2b2 f1g1",
    ),
    (
        "8/2BP4/2K3k1/8/1q5p/4PB2/8/8 b - - 8 52",
        "b4a4 c6d6 a4a3 d6c6 a3a4 c6d6 a4b4 d6c6 b4a4",
    ),
    (
        "1k6/8/1p3b1R/1P3Np1/1P2r2p/1K6/8/8 b - - 14 83",
        "f6d8 h6h8 b8c7 h8h7 c7b8 h7h8 b8c7 h8h7 c7b8 h7h8",
    ),
    (
        "2r1kb1r/5p1p/p1q2p2/3Npb2/8/PN6/2PQ2PP/R2R1K2 w k - 10 27",
        "b3a5 c6d6 a5b7 d6c6 b7a5 c6d6 a5b7 d6c6 b7a5",
    ),
    (
        "6k1/5q2/3p3p/1pnP1Pp1/3Q4/r7/2B2PK1/7R b - - 1 46",
        "f7f8 d4b4 f8a8 b4d4 a8f8 d4b4 f8a8 b4d4 a8f8",
    ),
];

#[test]
fn threefold_is_detected_on_the_third_occurrence() {
    for (number, (fen, line)) in THREEFOLD.iter().enumerate() {
        let mut game = Game::from_fen(fen).expect("valid FEN");
        let moves: Vec<&str> = line.split_whitespace().collect();
        let (last, earlier) = moves.split_last().expect("moves");

        for mv in earlier {
            assert!(game.play_uci(mv), "position {}: {} is legal", number + 1, mv);
        }
        assert!(!game.is_threefold(), "position {} flagged one move early", number + 1);

        assert!(game.play_uci(last));
        assert!(game.is_threefold(), "position {} not flagged", number + 1);
    }
}

#[test]
fn positions_before_a_capture_do_not_count() {
    // start position seen twice, then a capture
    let (mut game, ok) = Game::setup(None, &["g1f3", "g8f6", "f3g1", "f6g8", "e2e4", "d7d5", "e4d5"]).expect("setup");
    assert!(ok);
    for mv in ["g8f6", "g1f3", "f6g8", "f3g1"] {
        assert!(game.play_uci(mv), "{} is legal", mv);
    }
    assert!(!game.is_threefold());
    for mv in ["g8f6", "g1f3", "f6g8", "f3g1"] {
        assert!(game.play_uci(mv), "{} is legal", mv);
    }
    assert!(game.is_threefold());
}

#[test]
fn illegal_move_leaves_game_unchanged() {
    let mut game = Game::new();
    let before = *game.position();
    assert!(!game.play_uci("e2e5"));
    assert!(!game.play_uci("zz"));
    assert_eq!(*game.position(), before);
    assert_eq!(game.history().len(), 1);
}
