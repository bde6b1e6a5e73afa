//! Kestrel - Position Evaluation Module
//!
//! Static evaluation of chess positions considering:
//! - Material balance with pawn-count adjusted knights and rooks
//! - Piece positioning (piece-square tables, opening and endgame)
//! - Pawn structure (doubled, isolated, passed, protected pawns)
//! - Piece mobility
//! - Bishop pair and rook file bonuses
//! - King shelter in the opening, king activity in the endgame
//!
//! Opening and endgame terms are blended by the position's cached phase.

use crate::bitboard::*;
use crate::board::{Position, BOTH, PHASE_MAX};
use crate::magic::tables;
use crate::types::*;

// ============================================================================
// PIECE VALUES
// ============================================================================

pub const PIECE_VALUES: [i32; 6] = [
    100,    // PAWN
    320,    // KNIGHT
    330,    // BISHOP
    500,    // ROOK
    900,    // QUEEN
    20000,  // KING
];

// ============================================================================
// PIECE-SQUARE TABLES (a1 first, from white's side)
// ============================================================================

#[rustfmt::skip]
const PAWN_MG: [i32; 64] = [
     0,   0,   0,   0,   0,   0,   0,   0,
     5,  10,  10, -20, -20,  10,  10,   5,
     5,  -5, -10,   0,   0, -10,  -5,   5,
     0,   0,   0,  20,  20,   0,   0,   0,
     5,   5,  10,  25,  25,  10,   5,   5,
    10,  10,  20,  30,  30,  20,  10,  10,
    50,  50,  50,  50,  50,  50,  50,  50,
     0,   0,   0,   0,   0,   0,   0,   0,
];

#[rustfmt::skip]
const PAWN_EG: [i32; 64] = [
     0,   0,   0,   0,   0,   0,   0,   0,
     0,   0,   0,   0,   0,   0,   0,   0,
     5,   5,   5,   5,   5,   5,   5,   5,
    10,  10,  10,  10,  10,  10,  10,  10,
    25,  25,  25,  25,  25,  25,  25,  25,
    45,  45,  45,  45,  45,  45,  45,  45,
    80,  80,  80,  80,  80,  80,  80,  80,
     0,   0,   0,   0,   0,   0,   0,   0,
];

#[rustfmt::skip]
const KNIGHT_PST: [i32; 64] = [
   -50, -40, -30, -30, -30, -30, -40, -50,
   -40, -20,   0,   5,   5,   0, -20, -40,
   -30,   5,  10,  15,  15,  10,   5, -30,
   -30,   0,  15,  20,  20,  15,   0, -30,
   -30,   5,  15,  20,  20,  15,   5, -30,
   -30,   0,  10,  15,  15,  10,   0, -30,
   -40, -20,   0,   0,   0,   0, -20, -40,
   -50, -40, -30, -30, -30, -30, -40, -50,
];

#[rustfmt::skip]
const BISHOP_PST: [i32; 64] = [
   -20, -10, -10, -10, -10, -10, -10, -20,
   -10,   5,   0,   0,   0,   0,   5, -10,
   -10,  10,  10,  10,  10,  10,  10, -10,
   -10,   0,  10,  10,  10,  10,   0, -10,
   -10,   5,   5,  10,  10,   5,   5, -10,
   -10,   0,   5,  10,  10,   5,   0, -10,
   -10,   0,   0,   0,   0,   0,   0, -10,
   -20, -10, -10, -10, -10, -10, -10, -20,
];

#[rustfmt::skip]
const ROOK_PST: [i32; 64] = [
     0,   0,   0,   5,   5,   0,   0,   0,
    -5,   0,   0,   0,   0,   0,   0,  -5,
    -5,   0,   0,   0,   0,   0,   0,  -5,
    -5,   0,   0,   0,   0,   0,   0,  -5,
    -5,   0,   0,   0,   0,   0,   0,  -5,
    -5,   0,   0,   0,   0,   0,   0,  -5,
     5,  10,  10,  10,  10,  10,  10,   5,
     0,   0,   0,   0,   0,   0,   0,   0,
];

#[rustfmt::skip]
const QUEEN_PST: [i32; 64] = [
   -20, -10, -10,  -5,  -5, -10, -10, -20,
   -10,   0,   5,   0,   0,   0,   0, -10,
   -10,   5,   5,   5,   5,   5,   0, -10,
     0,   0,   5,   5,   5,   5,   0,  -5,
    -5,   0,   5,   5,   5,   5,   0,  -5,
   -10,   0,   5,   5,   5,   5,   0, -10,
   -10,   0,   0,   0,   0,   0,   0, -10,
   -20, -10, -10,  -5,  -5, -10, -10, -20,
];

#[rustfmt::skip]
const KING_MG: [i32; 64] = [
    20,  30,  10,   0,   0,  10,  30,  20,
    20,  20,   0,   0,   0,   0,  20,  20,
   -10, -20, -20, -20, -20, -20, -20, -10,
   -20, -30, -30, -40, -40, -30, -30, -20,
   -30, -40, -40, -50, -50, -40, -40, -30,
   -30, -40, -40, -50, -50, -40, -40, -30,
   -30, -40, -40, -50, -50, -40, -40, -30,
   -30, -40, -40, -50, -50, -40, -40, -30,
];

#[rustfmt::skip]
const KING_EG: [i32; 64] = [
   -50, -30, -30, -30, -30, -30, -30, -50,
   -30, -30,   0,   0,   0,   0, -30, -30,
   -30, -10,  20,  30,  30,  20, -10, -30,
   -30, -10,  30,  40,  40,  30, -10, -30,
   -30, -10,  30,  40,  40,  30, -10, -30,
   -30, -10,  20,  30,  30,  20, -10, -30,
   -30, -20, -10,   0,   0, -10, -20, -30,
   -50, -40, -30, -20, -20, -30, -40, -50,
];

const MG_TABLES: [&[i32; 64]; 6] = [&PAWN_MG, &KNIGHT_PST, &BISHOP_PST, &ROOK_PST, &QUEEN_PST, &KING_MG];
const EG_TABLES: [&[i32; 64]; 6] = [&PAWN_EG, &KNIGHT_PST, &BISHOP_PST, &ROOK_PST, &QUEEN_PST, &KING_EG];

// ============================================================================
// EVALUATION BONUSES/PENALTIES
// ============================================================================

const DOUBLED_PAWN_PENALTY: i32 = -15;
const ISOLATED_PAWN_PENALTY: i32 = -20;
const PASSED_PAWN_BONUS: [i32; 8] = [0, 10, 20, 35, 60, 100, 150, 0];

const BISHOP_PAIR_BONUS: i32 = 50;
const ROOK_ON_OPEN_FILE_BONUS: i32 = 25;
const ROOK_ON_SEMI_OPEN_FILE_BONUS: i32 = 15;
const ROOK_ON_7TH_RANK_BONUS: i32 = 30;

/// Per reachable square, indexed by piece type
const MOBILITY_BONUS: [i32; 6] = [0, 4, 5, 3, 2, 0];

/// Per own pawn above five
const KNIGHT_PAWN_ADJUST: i32 = 6;
const ROOK_PAWN_ADJUST: i32 = -12;

const CENTER: u64 = (1 << 27) | (1 << 28) | (1 << 35) | (1 << 36);
const CENTER_PAWN_BONUS: i32 = 15;
const PROTECTED_PAWN_BONUS: i32 = 10;

// King safety (opening) and activity (endgame)
const KING_CORNER_BONUS: i32 = 2;
const KING_SHIELD_BONUS: i32 = 5;
const KING_ATTACKER_PENALTY: i32 = -15;
const KING_CENTRALITY_EG: i32 = -4;
/// Per square between the kings, for the side ahead in material
const KING_PROXIMITY_EG: i32 = -2;
const MOP_UP_MARGIN: i32 = 200;

/// Opening and endgame halves of a score
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
struct Score {
    mg: i32,
    eg: i32,
}

impl Score {
    #[inline]
    fn add(&mut self, mg: i32, eg: i32) {
        self.mg += mg;
        self.eg += eg;
    }

    #[inline]
    fn both(&mut self, value: i32) {
        self.add(value, value);
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Square as seen from `color`'s side of the board
#[inline]
fn relative(color: usize, sq: usize) -> usize {
    if color == WHITE { sq } else { sq ^ 56 }
}

fn adjacent_files(file: usize) -> u64 {
    let mut mask = 0;
    if file > 0 {
        mask |= file_bb(file - 1);
    }
    if file < 7 {
        mask |= file_bb(file + 1);
    }
    mask
}

/// Ranks strictly ahead of `rank` for `color`
fn ranks_ahead(color: usize, rank: usize) -> u64 {
    if color == WHITE {
        if rank >= 7 { 0 } else { !0u64 << (8 * (rank + 1)) }
    } else if rank == 0 {
        0
    } else {
        (1u64 << (8 * rank)) - 1
    }
}

/// Manhattan distance to the nearest of the four centre squares
fn center_distance(sq: usize) -> i32 {
    let (file, rank) = (file_of(sq) as i32, rank_of(sq) as i32);
    (3 - rank).max(rank - 4) + (3 - file).max(file - 4)
}

fn distance(a: usize, b: usize) -> i32 {
    (file_of(a) as i32 - file_of(b) as i32).abs() + (rank_of(a) as i32 - rank_of(b) as i32).abs()
}

/// Own pawns defended by another own pawn
fn protected_pawns(color: usize, pawns: u64) -> u64 {
    Squares(pawns)
        .filter(|&sq| PAWN_ATTACKS[opponent(color)][sq] & pawns != 0)
        .fold(0, |acc, sq| acc | square_bb(sq))
}

/// Squares beside and in front of the king
fn king_shelter(color: usize, king: usize) -> u64 {
    let rank = rank_of(king);
    KING_ATTACKS[king] & (ranks_ahead(color, rank) | (RANK_1 << (8 * rank)))
}

fn non_king_material(pos: &Position, color: usize) -> i32 {
    (PAWN..KING).map(|piece| popcount(pos.pieces[color][piece]) as i32 * PIECE_VALUES[piece]).sum()
}

fn king_terms(pos: &Position, color: usize, score: &mut Score) {
    let them = opponent(color);
    let king = pos.king_square(color);
    let centrality = center_distance(king);

    let shield = popcount(king_shelter(color, king) & pos.occupancy[color]) as i32;
    let attackers = popcount(KING_ATTACKS[king] & pos.occupancy[them]) as i32;
    let safety = KING_CORNER_BONUS * centrality + KING_SHIELD_BONUS * shield + KING_ATTACKER_PENALTY * attackers;

    let mut activity = KING_CENTRALITY_EG * centrality;
    if non_king_material(pos, color) >= non_king_material(pos, them) + MOP_UP_MARGIN {
        activity += KING_PROXIMITY_EG * distance(king, pos.king_square(them));
    }

    score.add(safety, activity);
}

fn material_and_placement(pos: &Position, color: usize, score: &mut Score) {
    for piece in PAWN..=KING {
        for sq in Squares(pos.pieces[color][piece]) {
            let idx = relative(color, sq);
            let value = if piece == KING { 0 } else { PIECE_VALUES[piece] };
            score.add(value + MG_TABLES[piece][idx], value + EG_TABLES[piece][idx]);
        }
    }

    let own_pawns = popcount(pos.pieces[color][PAWN]) as i32;
    let knights = popcount(pos.pieces[color][KNIGHT]) as i32;
    let rooks = popcount(pos.pieces[color][ROOK]) as i32;
    score.both(knights * (own_pawns - 5) * KNIGHT_PAWN_ADJUST);
    score.both(rooks * (own_pawns - 5) * ROOK_PAWN_ADJUST);
}

fn pawn_structure(pos: &Position, color: usize, score: &mut Score) {
    let own = pos.pieces[color][PAWN];
    let enemy = pos.pieces[opponent(color)][PAWN];

    for sq in Squares(own) {
        let file = file_of(sq);

        if popcount(own & file_bb(file)) > 1 {
            score.both(DOUBLED_PAWN_PENALTY);
        }
        if own & adjacent_files(file) == 0 {
            score.both(ISOLATED_PAWN_PENALTY);
        }

        let front_span = (file_bb(file) | adjacent_files(file)) & ranks_ahead(color, rank_of(sq));
        if enemy & front_span == 0 {
            let bonus = PASSED_PAWN_BONUS[rank_of(relative(color, sq))];
            score.add(bonus, bonus * 2);
        }
    }

    score.add(popcount(own & CENTER) as i32 * CENTER_PAWN_BONUS, 0);
    score.both(popcount(protected_pawns(color, own)) as i32 * PROTECTED_PAWN_BONUS);
}

fn piece_activity(pos: &Position, color: usize, score: &mut Score) {
    let t = tables();
    let occupied = pos.occupancy[BOTH];
    let own = pos.occupancy[color];
    let own_pawns = pos.pieces[color][PAWN];
    let enemy_pawns = pos.pieces[opponent(color)][PAWN];

    if popcount(pos.pieces[color][BISHOP]) >= 2 {
        score.both(BISHOP_PAIR_BONUS);
    }

    for piece in KNIGHT..=QUEEN {
        for sq in Squares(pos.pieces[color][piece]) {
            let attacks = match piece {
                KNIGHT => t.knight(sq),
                BISHOP => t.bishop(sq, occupied),
                ROOK => t.rook(sq, occupied),
                _ => t.queen(sq, occupied),
            };
            score.both(popcount(attacks & !own) as i32 * MOBILITY_BONUS[piece]);

            if piece == ROOK {
                let file = file_bb(file_of(sq));
                if file & (own_pawns | enemy_pawns) == 0 {
                    score.both(ROOK_ON_OPEN_FILE_BONUS);
                } else if file & own_pawns == 0 {
                    score.both(ROOK_ON_SEMI_OPEN_FILE_BONUS);
                }
                if rank_of(relative(color, sq)) == 6 {
                    score.both(ROOK_ON_7TH_RANK_BONUS);
                }
            }
        }
    }
}

// ============================================================================
// MAIN EVALUATION FUNCTION
// ============================================================================

/// Evaluate the position from the side to move's perspective
pub fn evaluate(pos: &Position) -> i32 {
    let mut total = Score::default();

    for color in [WHITE, BLACK] {
        let mut side = Score::default();
        material_and_placement(pos, color, &mut side);
        pawn_structure(pos, color, &mut side);
        piece_activity(pos, color, &mut side);
        king_terms(pos, color, &mut side);

        let sign = if color == WHITE { 1 } else { -1 };
        total.add(sign * side.mg, sign * side.eg);
    }

    let phase = pos.phase.clamp(0, PHASE_MAX);
    let blended = (total.mg * (PHASE_MAX - phase) + total.eg * phase) / PHASE_MAX;

    if pos.side == WHITE { blended } else { -blended }
}

/// MVV-LVA ordering key: most valuable victim first, cheapest attacker breaks ties
#[inline]
pub fn mvv_lva(victim: usize, attacker: usize) -> i32 {
    10 * PIECE_VALUES[victim] - PIECE_VALUES[attacker]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(fen: &str) -> i32 {
        evaluate(&Position::from_fen(fen).expect("fen"))
    }

    #[test]
    fn starting_position_is_balanced() {
        assert_eq!(evaluate(&Position::new()), 0);
    }

    #[test]
    fn mirrored_positions_score_the_same_for_the_mover() {
        let white = eval("r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3");
        let black = eval("rnbqkb1r/pppp1ppp/5n2/4p3/4P3/2N5/PPPP1PPP/R1BQKBNR b KQkq - 2 3");
        assert_eq!(white, black);
    }

    #[test]
    fn extra_queen_is_winning() {
        assert!(eval("4k3/8/8/8/8/8/8/3QK3 w - - 0 1") > 800);
        assert!(eval("4k3/8/8/8/8/8/8/3QK3 b - - 0 1") < -800);
    }

    fn white_pawns(fen: &str) -> Score {
        let mut score = Score::default();
        pawn_structure(&Position::from_fen(fen).expect("fen"), WHITE, &mut score);
        score
    }

    fn king_score(fen: &str, color: usize) -> Score {
        let mut score = Score::default();
        king_terms(&Position::from_fen(fen).expect("fen"), color, &mut score);
        score
    }

    #[test]
    fn enemy_pawn_on_adjacent_file_stops_the_passer() {
        // same material both times; only the black pawn's file changes
        let passed = white_pawns("4k3/p7/8/3P4/8/8/8/4K3 w - - 0 1");
        let stopped = white_pawns("4k3/4p3/8/3P4/8/8/8/4K3 w - - 0 1");
        assert_eq!(passed.mg - stopped.mg, PASSED_PAWN_BONUS[4]);
        assert_eq!(passed.eg - stopped.eg, 2 * PASSED_PAWN_BONUS[4]);
    }

    #[test]
    fn pawn_defended_by_pawn_is_protected() {
        // e2 defends d3; c3 has no defender
        let pos = Position::from_fen("4k3/8/8/8/8/2PP4/4P3/4K3 w - - 0 1").expect("fen");
        assert_eq!(protected_pawns(WHITE, pos.pieces[WHITE][PAWN]), square_bb(19));

        let pos = Position::from_fen("4k3/8/4p3/3p4/8/8/8/4K3 b - - 0 1").expect("fen");
        assert_eq!(protected_pawns(BLACK, pos.pieces[BLACK][PAWN]), square_bb(35));
    }

    #[test]
    fn king_shelter_counts_pieces_in_front() {
        // g1 is 5 from the centre; f2 g2 h2 shelter it
        let sheltered = king_score("6k1/8/8/8/8/8/5PPP/6K1 w - - 0 1", WHITE);
        assert_eq!(sheltered.mg, 2 * 5 + 5 * 3);

        // the queen on h2 both removes a shield square and attacks
        let attacked = king_score("6k1/8/8/8/8/8/5PPq/6K1 w - - 0 1", WHITE);
        assert_eq!(attacked.mg, 2 * 5 + 5 * 2 - 15);
        assert_eq!(king_shelter(WHITE, 6), square_bb(5) | square_bb(7) | square_bb(13) | square_bb(14) | square_bb(15));
    }

    #[test]
    fn endgame_king_wants_the_centre_and_the_enemy_king() {
        let central = king_score("7k/8/8/8/3K4/8/8/1R6 w - - 0 1", WHITE);
        let corner = king_score("7k/8/8/8/8/8/8/KR6 w - - 0 1", WHITE);
        assert!(central.eg > corner.eg);

        // the defending side gets no proximity term
        let defender = king_score("7k/8/8/8/3K4/8/8/1R6 w - - 0 1", BLACK);
        assert_eq!(defender.eg, KING_CENTRALITY_EG * 6);
    }

    #[test]
    fn ranks_ahead_masks() {
        assert_eq!(ranks_ahead(WHITE, 6), RANK_8);
        assert_eq!(ranks_ahead(BLACK, 1), RANK_1);
        assert_eq!(ranks_ahead(WHITE, 7), 0);
        assert_eq!(ranks_ahead(BLACK, 0), 0);
    }

    #[test]
    fn mvv_lva_prefers_big_victims() {
        assert!(mvv_lva(QUEEN, PAWN) > mvv_lva(QUEEN, KNIGHT));
        assert!(mvv_lva(ROOK, QUEEN) > mvv_lva(BISHOP, PAWN));
    }
}
