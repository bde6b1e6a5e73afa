//! Zobrist hash behaviour across move orders.

use kestrel_chess::game::Game;

fn hash_after(fen: Option<&str>, moves: &str) -> u64 {
    let moves: Vec<&str> = moves.split_whitespace().collect();
    let (game, ok) = Game::setup(fen, &moves).expect("valid FEN");
    assert!(ok, "all moves legal: {}", moves.join(" "));
    game.position().hash
}

#[test]
fn transpositions_share_a_hash() {
    assert_eq!(
        hash_after(None, "e2e4 e7e5 g1f3 g8f6"),
        hash_after(None, "g1f3 e7e5 e2e4 g8f6")
    );
}

#[test]
fn different_positions_differ() {
    assert_ne!(
        hash_after(None, "d2d4 e7e5 g1f3 g8f6"),
        hash_after(None, "e2e4 e7e5 g1f3 g8f6")
    );
}

#[test]
fn same_placement_other_side_to_move_differs() {
    let fen = "rnbqkbnr/pppp1ppp/4p3/8/8/4PP2/PPPP2PP/RNBQKBNR b - - 0 2";
    let start = hash_after(Some(fen), "");
    let after = hash_after(Some(fen), "e8e7 e1f2 e7e8 f2e2 e8e7 e2e1 e7e8");
    assert_ne!(start, after);
}

#[test]
fn lost_castling_rights_change_the_hash() {
    // king walks out and back: same squares, no castling
    let walked = hash_after(None, "e2e4 e7e5 e1e2 e8e7 e2e1 e7e8");
    let direct = hash_after(None, "e2e4 e7e5 g1f3 g8f6 f3g1 f6g8");
    assert_ne!(walked, direct);
}

#[test]
fn en_passant_square_is_part_of_the_hash() {
    let with_ep = hash_after(None, "e2e4 g8f6 e4e5 d7d5");
    let without_ep = hash_after(None, "e2e4 d7d5 e4e5 g8f6");
    assert_ne!(with_ep, without_ep);
}

#[test]
fn hash_survives_fen_round_trip() {
    let (game, _) = Game::setup(None, &["e2e4", "c7c5", "g1f3", "d7d6", "e1e2"]).expect("setup");
    let reloaded = Game::from_fen(&game.position().to_fen()).expect("FEN");
    assert_eq!(game.position().hash, reloaded.position().hash);
}
