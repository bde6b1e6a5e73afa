//! Kestrel - Move Generator Module
//!
//! Legal moves are produced directly: every destination is intersected with
//! the check-block mask and the moving piece's pin ray before a move is
//! materialized. En passant and castling depend on discovered attacks the
//! masks cannot express, so those are confirmed by a speculative
//! make/restore. A pseudo-legal generator and a capture-plus-queen-promotion
//! generator for quiescence share the same piece loops.

use crate::bitboard::*;
use crate::board::{Position, BOTH};
use crate::magic::tables;
use crate::moves::*;
use crate::types::*;

pub type MoveList = Vec<Move>;

#[derive(Clone, Copy, PartialEq, Eq)]
enum GenKind {
    /// Every move
    All,
    /// Captures and queen promotions
    Tactical,
}

/// Masks applied while generating
struct Filter {
    legal: bool,
    block: u64,
    pins: Option<crate::board::Pins>,
}

impl Filter {
    #[inline]
    fn targets(&self, from: usize) -> u64 {
        match &self.pins {
            Some(pins) => self.block & pins.allowed(from),
            None => self.block,
        }
    }
}

/// Generate all legal moves for the side to move
pub fn generate_legal(pos: &Position) -> MoveList {
    generate(pos, GenKind::All, true)
}

/// Legal captures (including en passant) and queen promotions
pub fn generate_captures(pos: &Position) -> MoveList {
    generate(pos, GenKind::Tactical, true)
}

/// Generate all pseudo-legal moves (may leave king in check)
pub fn generate_pseudo_legal(pos: &Position) -> MoveList {
    generate(pos, GenKind::All, false)
}

/// Legal move matching coordinate notation, if any
pub fn find_legal(pos: &Position, text: &str) -> Option<Move> {
    let (from, to, promotion) = parse_uci(text)?;
    generate_legal(pos)
        .into_iter()
        .find(|mv| mv.from() == from && mv.to() == to && mv.promotion() == promotion)
}

fn generate(pos: &Position, kind: GenKind, legal: bool) -> MoveList {
    let mut moves = MoveList::with_capacity(64);
    let us = pos.side;

    let (block, pins, double_check) = if legal {
        let checks = pos.checks(us);
        (checks.block, Some(pos.pins(us)), checks.is_double())
    } else {
        (!0, None, false)
    };

    generate_king_moves(pos, kind, legal, &mut moves);
    if double_check {
        return moves;
    }

    let filter = Filter { legal, block, pins };
    generate_pawn_moves(pos, kind, &filter, &mut moves);
    for piece in [KNIGHT, BISHOP, ROOK, QUEEN] {
        generate_piece_moves(pos, piece, kind, &filter, &mut moves);
    }
    if kind == GenKind::All {
        generate_castling(pos, legal, &mut moves);
    }

    moves
}

#[inline]
fn push_targets(moves: &mut MoveList, from: usize, piece: usize, targets: u64, enemy: u64) {
    for to in Squares(targets) {
        let flags = if enemy & square_bb(to) != 0 { FLAG_CAPTURE } else { 0 };
        moves.push(Move::with_flags(from, to, piece, flags));
    }
}

fn generate_piece_moves(pos: &Position, piece: usize, kind: GenKind, filter: &Filter, moves: &mut MoveList) {
    let t = tables();
    let us = pos.side;
    let enemy = pos.occupancy[opponent(us)];
    let occupied = pos.occupancy[BOTH];
    let allowed = match kind {
        GenKind::All => !pos.occupancy[us],
        GenKind::Tactical => enemy,
    };

    for from in Squares(pos.pieces[us][piece]) {
        let attacks = match piece {
            KNIGHT => t.knight(from),
            BISHOP => t.bishop(from, occupied),
            ROOK => t.rook(from, occupied),
            _ => t.queen(from, occupied),
        };
        push_targets(moves, from, piece, attacks & allowed & filter.targets(from), enemy);
    }
}

fn generate_king_moves(pos: &Position, kind: GenKind, legal: bool, moves: &mut MoveList) {
    let us = pos.side;
    let them = opponent(us);
    let from = pos.king_square(us);
    let enemy = pos.occupancy[them];
    let mut targets = tables().king(from)
        & match kind {
            GenKind::All => !pos.occupancy[us],
            GenKind::Tactical => enemy,
        };

    if legal {
        // the king must not shield the square it steps back onto
        let occupied = pos.occupancy[BOTH] ^ square_bb(from);
        let mut safe = 0u64;
        for to in Squares(targets) {
            if pos.attackers_to(to, them, occupied) == 0 {
                safe |= square_bb(to);
            }
        }
        targets = safe;
    }

    push_targets(moves, from, KING, targets, enemy);
}

fn push_pawn_move(moves: &mut MoveList, from: usize, to: usize, flags: u32, kind: GenKind) {
    if square_bb(to) & (RANK_1 | RANK_8) != 0 {
        moves.push(Move::with_promotion(from, to, QUEEN, flags));
        if kind == GenKind::All {
            for promo in [ROOK, BISHOP, KNIGHT] {
                moves.push(Move::with_promotion(from, to, promo, flags));
            }
        }
    } else {
        moves.push(Move::with_flags(from, to, PAWN, flags));
    }
}

fn generate_pawn_moves(pos: &Position, kind: GenKind, filter: &Filter, moves: &mut MoveList) {
    let t = tables();
    let us = pos.side;
    let enemy = pos.occupancy[opponent(us)];
    let empty = !pos.occupancy[BOTH];
    let (forward, start_rank, last_rank): (i32, u64, u64) = if us == WHITE {
        (8, RANK_2, RANK_8)
    } else {
        (-8, RANK_7, RANK_1)
    };

    for from in Squares(pos.pieces[us][PAWN]) {
        let allowed = filter.targets(from);

        let single = (from as i32 + forward) as usize;
        if empty & square_bb(single) != 0 {
            let promotes = square_bb(single) & last_rank != 0;
            if allowed & square_bb(single) != 0 && (kind == GenKind::All || promotes) {
                push_pawn_move(moves, from, single, 0, kind);
            }
            if kind == GenKind::All && square_bb(from) & start_rank != 0 {
                let double = (single as i32 + forward) as usize;
                if empty & allowed & square_bb(double) != 0 {
                    moves.push(Move::with_flags(from, double, PAWN, FLAG_DOUBLE_PUSH));
                }
            }
        }

        for to in Squares(t.pawn(us, from) & enemy & allowed) {
            push_pawn_move(moves, from, to, FLAG_CAPTURE, kind);
        }

        if let Some(ep) = pos.en_passant {
            if t.pawn(us, from) & square_bb(ep) != 0 {
                let mv = Move::with_flags(from, ep, PAWN, FLAG_CAPTURE | FLAG_EN_PASSANT);
                if !filter.legal || leaves_king_safe(pos, mv) {
                    moves.push(mv);
                }
            }
        }
    }
}

fn generate_castling(pos: &Position, legal: bool, moves: &mut MoveList) {
    let us = pos.side;
    let them = opponent(us);
    let occupied = pos.occupancy[BOTH];

    // (right, king from, king to, squares that must be empty, square the king crosses)
    let candidates = if us == WHITE {
        [(CASTLE_WK, E1, G1, square_bb(F1) | square_bb(G1), F1), (CASTLE_WQ, E1, C1, 0x0E, D1)]
    } else {
        [
            (CASTLE_BK, E8, G8, square_bb(F8) | square_bb(G8), F8),
            (CASTLE_BQ, E8, C8, 0x0E << 56, D8),
        ]
    };

    for (right, from, to, corridor, crossed) in candidates {
        if pos.castling & right == 0 || occupied & corridor != 0 {
            continue;
        }
        let rook_home = castle_rook(to).map_or(0, |(rook_from, _)| square_bb(rook_from));
        if pos.pieces[us][KING] & square_bb(from) == 0 || pos.pieces[us][ROOK] & rook_home == 0 {
            continue;
        }
        if pos.in_check || pos.is_square_attacked(crossed, them) {
            continue;
        }
        let mv = Move::with_flags(from, to, KING, FLAG_CASTLING);
        if !legal || leaves_king_safe(pos, mv) {
            moves.push(mv);
        }
    }
}

/// Speculatively play `mv` and test the mover's king
fn leaves_king_safe(pos: &Position, mv: Move) -> bool {
    let mut scratch = *pos;
    let us = pos.side;
    let snapshot = scratch.make_move(mv);
    let safe = !scratch.king_in_check(us);
    scratch.restore(snapshot);
    safe
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::STARTING_FEN;

    fn legal_count(fen: &str) -> usize {
        generate_legal(&Position::from_fen(fen).expect("fen")).len()
    }

    /// Filter pseudo-legal moves by playing them out
    fn filtered_pseudo_legal(pos: &Position) -> Vec<Move> {
        generate_pseudo_legal(pos)
            .into_iter()
            .filter(|&mv| leaves_king_safe(pos, mv))
            .collect()
    }

    #[test]
    fn starting_position_has_twenty_moves() {
        assert_eq!(legal_count(STARTING_FEN), 20);
    }

    #[test]
    fn legal_equals_filtered_pseudo_legal() {
        for fen in [
            STARTING_FEN,
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "r2q1rk1/pP1p2pp/Q4n2/bbp1p3/Np6/1B3NBn/pPPP1PPP/R3K2R b KQ - 0 1",
            "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
            "4k3/8/8/8/8/3n4/8/r3K3 w - - 0 1",
        ] {
            let pos = Position::from_fen(fen).expect("fen");
            let mut legal: Vec<u32> = generate_legal(&pos).iter().map(|m| m.bits()).collect();
            let mut reference: Vec<u32> = filtered_pseudo_legal(&pos).iter().map(|m| m.bits()).collect();
            legal.sort_unstable();
            reference.sort_unstable();
            assert_eq!(legal, reference, "{fen}");
        }
    }

    #[test]
    fn double_check_allows_only_king_moves() {
        let pos = Position::from_fen("4k3/8/8/8/8/3n4/8/r3K2R w K - 0 1").expect("fen");
        let moves = generate_legal(&pos);
        assert!(!moves.is_empty());
        assert!(moves.iter().all(|m| m.piece() == KING && !m.is_castling()));
    }

    #[test]
    fn en_passant_discovered_check_is_rejected() {
        // capturing d5xe6 would expose the white king on the fifth rank
        let pos = Position::from_fen("8/8/8/K2pP2r/8/8/8/7k w - d6 0 1").expect("fen");
        assert!(generate_legal(&pos).iter().all(|m| !m.is_en_passant()));

        let pos = Position::from_fen("8/8/8/3pP3/8/8/8/K6k w - d6 0 1").expect("fen");
        assert!(generate_legal(&pos).iter().any(|m| m.is_en_passant()));
    }

    #[test]
    fn castling_through_attack_is_rejected() {
        // black rook on f8 covers f1
        let pos = Position::from_fen("5rk1/8/8/8/8/8/8/R3K2R w KQ - 0 1").expect("fen");
        let castles: Vec<String> = generate_legal(&pos)
            .iter()
            .filter(|m| m.is_castling())
            .map(|m| m.to_uci())
            .collect();
        assert_eq!(castles, vec!["e1c1".to_string()]);
    }

    #[test]
    fn capture_generator_yields_captures_and_queen_promotions() {
        let pos = Position::from_fen("r3k3/1P6/8/8/8/8/8/4K3 w - - 0 1").expect("fen");
        let tactical = generate_captures(&pos);
        let uci: Vec<String> = tactical.iter().map(|m| m.to_uci()).collect();
        assert!(uci.contains(&"b7a8q".to_string()));
        assert!(uci.contains(&"b7b8q".to_string()));
        assert!(!uci.contains(&"b7b8n".to_string()));
        assert!(tactical.iter().all(|m| m.is_capture() || m.promotion() == Some(QUEEN)));
        assert_eq!(tactical.len(), 2);
    }

    #[test]
    fn pinned_piece_moves_along_ray_only() {
        let pos = Position::from_fen("4r1k1/8/8/8/8/8/4R3/4K3 w - - 0 1").expect("fen");
        let rook_moves: Vec<Move> = generate_legal(&pos).into_iter().filter(|m| m.piece() == ROOK).collect();
        assert!(rook_moves.iter().all(|m| file_of(m.to()) == 4));
        assert_eq!(rook_moves.len(), 6);
    }

    #[test]
    fn find_legal_matches_coordinates() {
        let pos = Position::new();
        let mv = find_legal(&pos, "g1f3").expect("legal");
        assert_eq!(mv.piece(), KNIGHT);
        assert!(find_legal(&pos, "e2e5").is_none());
        assert!(find_legal(&pos, "nonsense").is_none());
    }
}
