//! Kestrel - Board Representation Module
//!
//! `Position` holds twelve piece bitboards, three occupancy boards and the
//! game-state fields, together with an incrementally maintained Zobrist
//! hash. `make_move` returns a `Snapshot` of the whole prior state;
//! `restore` puts it back, so every mutation is exactly reversible.

use std::fmt;

use crate::bitboard::*;
use crate::error::{EngineError, EngineResult};
use crate::magic::tables;
use crate::moves::{castle_rook, Move};
use crate::types::*;
use crate::zobrist::keys;

/// Starting position FEN
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Index of the combined occupancy board
pub const BOTH: usize = 2;

/// Game phase at which evaluation is purely endgame
pub const PHASE_MAX: i32 = 256;

const PHASE_WEIGHTS: [i32; 6] = [0, 1, 1, 2, 4, 0];
const PHASE_TOTAL: i32 = 24;

/// Castling rights that survive a move touching each square
const CASTLE_MASK: [u8; 64] = {
    let mut mask = [CASTLE_ALL; 64];
    mask[A1] = CASTLE_ALL & !CASTLE_WQ;
    mask[E1] = CASTLE_ALL & !(CASTLE_WK | CASTLE_WQ);
    mask[H1] = CASTLE_ALL & !CASTLE_WK;
    mask[A8] = CASTLE_ALL & !CASTLE_BQ;
    mask[E8] = CASTLE_ALL & !(CASTLE_BK | CASTLE_BQ);
    mask[H8] = CASTLE_ALL & !CASTLE_BK;
    mask
};

/// Full board state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position {
    /// [color][piece type]
    pub pieces: [[u64; 6]; 2],
    /// white, black, both
    pub occupancy: [u64; 3],
    pub side: usize,
    /// Bitmask for castling rights (1=K, 2=Q, 4=k, 8=q)
    pub castling: u8,
    pub en_passant: Option<usize>,
    /// Plies since last pawn move or capture
    pub halfmove: u32,
    pub fullmove: u32,
    pub hash: u64,
    /// Side to move is in check
    pub in_check: bool,
    /// 0 = opening .. 256 = bare kings
    pub phase: i32,
}

/// Opaque copy of a position taken before a mutation
#[derive(Clone, Copy, Debug)]
#[must_use = "a snapshot is the only way to undo the move"]
pub struct Snapshot {
    state: Position,
}

/// Pieces of one side pinned to their king
pub struct Pins {
    pub pinned: u64,
    rays: [u64; 64],
}

impl Pins {
    /// Squares the piece on `sq` may move to without exposing its king
    #[inline]
    pub fn allowed(&self, sq: usize) -> u64 {
        if self.pinned & square_bb(sq) != 0 {
            self.rays[sq]
        } else {
            !0
        }
    }
}

/// Checkers of one side's king and the squares that resolve a single check
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checks {
    pub checkers: u64,
    /// Capture-or-block targets; all squares when not in check, none under double check
    pub block: u64,
}

impl Checks {
    #[inline]
    pub fn in_check(&self) -> bool {
        self.checkers != 0
    }

    #[inline]
    pub fn is_double(&self) -> bool {
        several(self.checkers)
    }
}

impl Position {
    /// Create a new board with the starting position
    pub fn new() -> Self {
        Self::from_fen(STARTING_FEN).unwrap_or_else(|err| unreachable!("{err}"))
    }

    fn empty() -> Self {
        Position {
            pieces: [[0; 6]; 2],
            occupancy: [0; 3],
            side: WHITE,
            castling: 0,
            en_passant: None,
            halfmove: 0,
            fullmove: 1,
            hash: 0,
            in_check: false,
            phase: 0,
        }
    }

    // ========================================================================
    // FEN IMPORT / EXPORT
    // ========================================================================

    /// Parse a six-field FEN string
    pub fn from_fen(fen: &str) -> EngineResult<Self> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(EngineError::FenFieldCount { found: fields.len() });
        }

        let mut pos = Position::empty();
        pos.parse_placement(fields[0])?;

        pos.side = match fields[1] {
            "w" => WHITE,
            "b" => BLACK,
            other => return Err(EngineError::InvalidSide { token: other.to_string() }),
        };

        if fields[2] != "-" {
            for c in fields[2].chars() {
                pos.castling |= match c {
                    'K' => CASTLE_WK,
                    'Q' => CASTLE_WQ,
                    'k' => CASTLE_BK,
                    'q' => CASTLE_BQ,
                    _ => return Err(EngineError::InvalidCastling { token: fields[2].to_string() }),
                };
            }
        }

        if fields[3] != "-" {
            let ep = parse_square(fields[3])
                .filter(|&sq| square_bb(sq) & (RANK_3 | RANK_6) != 0)
                .ok_or_else(|| EngineError::InvalidEnPassant { token: fields[3].to_string() })?;
            pos.en_passant = Some(ep);
        }

        pos.halfmove = fields[4].parse().map_err(|_| EngineError::InvalidCounter {
            field: "half-move",
            token: fields[4].to_string(),
        })?;
        pos.fullmove = fields[5].parse().map_err(|_| EngineError::InvalidCounter {
            field: "full-move",
            token: fields[5].to_string(),
        })?;

        if popcount(pos.pieces[WHITE][KING]) != 1 || popcount(pos.pieces[BLACK][KING]) != 1 {
            return Err(EngineError::KingCount);
        }
        // otherwise the king itself would be capturable
        if pos.king_in_check(opponent(pos.side)) {
            return Err(EngineError::OpponentInCheck);
        }

        pos.hash = pos.compute_hash();
        pos.in_check = pos.king_in_check(pos.side);
        pos.phase = pos.compute_phase();
        Ok(pos)
    }

    fn parse_placement(&mut self, placement: &str) -> EngineResult<()> {
        let invalid = |reason| EngineError::InvalidPlacement {
            placement: placement.to_string(),
            reason,
        };

        let ranks: Vec<&str> = placement.split('/').collect();
        if ranks.len() != 8 {
            return Err(invalid("expected 8 ranks"));
        }

        for (i, rank_text) in ranks.iter().enumerate() {
            let rank = 7 - i;
            let mut file = 0usize;
            for c in rank_text.chars() {
                if let Some(skip) = c.to_digit(10) {
                    if !(1..=8).contains(&skip) {
                        return Err(invalid("bad empty-square count"));
                    }
                    file += skip as usize;
                } else {
                    let (color, piece) = fen_to_piece(c).ok_or_else(|| invalid("unknown piece"))?;
                    if file >= 8 {
                        return Err(invalid("rank too long"));
                    }
                    self.put_piece(color, piece, rank * 8 + file);
                    file += 1;
                }
                if file > 8 {
                    return Err(invalid("rank too long"));
                }
            }
            if file != 8 {
                return Err(invalid("rank too short"));
            }
        }

        if (self.pieces[WHITE][PAWN] | self.pieces[BLACK][PAWN]) & (RANK_1 | RANK_8) != 0 {
            return Err(invalid("pawn on back rank"));
        }
        Ok(())
    }

    /// Generate FEN string from current board state
    pub fn to_fen(&self) -> String {
        let mut fen = String::new();

        for rank in (0..8).rev() {
            let mut empty_count = 0;
            for file in 0..8 {
                match self.piece_at(rank * 8 + file) {
                    None => empty_count += 1,
                    Some((color, piece)) => {
                        if empty_count > 0 {
                            fen.push_str(&empty_count.to_string());
                            empty_count = 0;
                        }
                        fen.push(piece_to_fen(color, piece));
                    }
                }
            }
            if empty_count > 0 {
                fen.push_str(&empty_count.to_string());
            }
            if rank > 0 {
                fen.push('/');
            }
        }

        fen.push_str(if self.side == WHITE { " w " } else { " b " });

        if self.castling == 0 {
            fen.push('-');
        } else {
            for (flag, c) in [(CASTLE_WK, 'K'), (CASTLE_WQ, 'Q'), (CASTLE_BK, 'k'), (CASTLE_BQ, 'q')] {
                if self.castling & flag != 0 {
                    fen.push(c);
                }
            }
        }

        fen.push(' ');
        match self.en_passant {
            Some(sq) => fen.push_str(&square_name(sq)),
            None => fen.push('-'),
        }

        fen.push_str(&format!(" {} {}", self.halfmove, self.fullmove));
        fen
    }

    // ========================================================================
    // PIECE PLACEMENT
    // ========================================================================

    #[inline]
    fn put_piece(&mut self, color: usize, piece: usize, sq: usize) {
        let bb = square_bb(sq);
        self.pieces[color][piece] |= bb;
        self.occupancy[color] |= bb;
        self.occupancy[BOTH] |= bb;
    }

    #[inline]
    fn add_piece(&mut self, color: usize, piece: usize, sq: usize) {
        self.put_piece(color, piece, sq);
        self.hash ^= keys().pieces[color][piece][sq];
    }

    #[inline]
    fn remove_piece(&mut self, color: usize, piece: usize, sq: usize) {
        let bb = square_bb(sq);
        self.pieces[color][piece] ^= bb;
        self.occupancy[color] ^= bb;
        self.occupancy[BOTH] ^= bb;
        self.hash ^= keys().pieces[color][piece][sq];
    }

    #[inline]
    fn shift_piece(&mut self, color: usize, piece: usize, from: usize, to: usize) {
        let bb = square_bb(from) | square_bb(to);
        self.pieces[color][piece] ^= bb;
        self.occupancy[color] ^= bb;
        self.occupancy[BOTH] ^= bb;
        let k = &keys().pieces[color][piece];
        self.hash ^= k[from] ^ k[to];
    }

    /// Piece type of `color` standing on `sq`
    #[inline]
    pub fn piece_on(&self, color: usize, sq: usize) -> Option<usize> {
        let bb = square_bb(sq);
        if self.occupancy[color] & bb == 0 {
            return None;
        }
        (PAWN..=KING).find(|&piece| self.pieces[color][piece] & bb != 0)
    }

    /// (color, piece type) on `sq`
    pub fn piece_at(&self, sq: usize) -> Option<(usize, usize)> {
        [WHITE, BLACK]
            .into_iter()
            .find_map(|color| self.piece_on(color, sq).map(|piece| (color, piece)))
    }

    #[inline]
    pub fn king_square(&self, color: usize) -> usize {
        lsb(self.pieces[color][KING])
    }

    // ========================================================================
    // MAKE / RESTORE
    // ========================================================================

    /// Apply a move produced by the move generator
    pub fn make_move(&mut self, mv: Move) -> Snapshot {
        let snapshot = Snapshot { state: *self };
        let zobrist = keys();
        let us = self.side;
        let them = opponent(us);
        let (from, to, piece) = (mv.from(), mv.to(), mv.piece());

        if let Some(ep) = self.en_passant.take() {
            self.hash ^= zobrist.en_passant[file_of(ep)];
        }

        let mut material_changed = false;
        if mv.is_capture() {
            let target = if mv.is_en_passant() {
                if us == WHITE { to - 8 } else { to + 8 }
            } else {
                to
            };
            if let Some(victim) = self.piece_on(them, target) {
                self.remove_piece(them, victim, target);
                material_changed = true;
            }
        }

        self.shift_piece(us, piece, from, to);

        if let Some(promo) = mv.promotion() {
            self.remove_piece(us, PAWN, to);
            self.add_piece(us, promo, to);
            material_changed = true;
        }

        if mv.is_castling() {
            if let Some((rook_from, rook_to)) = castle_rook(to) {
                self.shift_piece(us, ROOK, rook_from, rook_to);
            }
        }

        if mv.is_double_push() {
            let ep = (from + to) / 2;
            self.en_passant = Some(ep);
            self.hash ^= zobrist.en_passant[file_of(ep)];
        }

        let rights = self.castling & CASTLE_MASK[from] & CASTLE_MASK[to];
        if rights != self.castling {
            self.hash ^= zobrist.castling_key(self.castling ^ rights);
            self.castling = rights;
        }

        if piece == PAWN || mv.is_capture() {
            self.halfmove = 0;
        } else {
            self.halfmove += 1;
        }
        if us == BLACK {
            self.fullmove += 1;
        }

        self.side = them;
        self.hash ^= zobrist.side;
        self.in_check = self.king_in_check(them);
        if material_changed {
            self.phase = self.compute_phase();
        }

        snapshot
    }

    /// Pass the turn without moving. The half-move clock restarts so that
    /// repetition scans never reach back across the null move.
    pub fn make_null_move(&mut self) -> Snapshot {
        let snapshot = Snapshot { state: *self };
        let zobrist = keys();

        if let Some(ep) = self.en_passant.take() {
            self.hash ^= zobrist.en_passant[file_of(ep)];
        }
        self.halfmove = 0;
        self.side = opponent(self.side);
        self.hash ^= zobrist.side;
        self.in_check = false;

        snapshot
    }

    /// Return to the state captured by `snapshot`
    #[inline]
    pub fn restore(&mut self, snapshot: Snapshot) {
        *self = snapshot.state;
    }

    // ========================================================================
    // HASH AND PHASE
    // ========================================================================

    /// Hash recomputed from the raw board state
    pub fn compute_hash(&self) -> u64 {
        let zobrist = keys();
        let mut hash = 0u64;

        for color in [WHITE, BLACK] {
            for piece in PAWN..=KING {
                for sq in Squares(self.pieces[color][piece]) {
                    hash ^= zobrist.pieces[color][piece][sq];
                }
            }
        }
        hash ^= zobrist.castling_key(self.castling);
        if let Some(ep) = self.en_passant {
            hash ^= zobrist.en_passant[file_of(ep)];
        }
        if self.side == BLACK {
            hash ^= zobrist.side;
        }
        hash
    }

    fn compute_phase(&self) -> i32 {
        let material: i32 = (KNIGHT..=QUEEN)
            .map(|piece| {
                let count = popcount(self.pieces[WHITE][piece] | self.pieces[BLACK][piece]) as i32;
                count * PHASE_WEIGHTS[piece]
            })
            .sum();
        let material = material.min(PHASE_TOTAL);
        ((PHASE_TOTAL - material) * PHASE_MAX + PHASE_TOTAL / 2) / PHASE_TOTAL
    }

    // ========================================================================
    // ATTACK QUERIES
    // ========================================================================

    /// Pieces of `by` attacking `sq` given an occupancy
    #[inline]
    pub fn attackers_to(&self, sq: usize, by: usize, occupied: u64) -> u64 {
        let t = tables();
        let p = &self.pieces[by];
        (t.pawn(opponent(by), sq) & p[PAWN])
            | (t.knight(sq) & p[KNIGHT])
            | (t.king(sq) & p[KING])
            | (t.bishop(sq, occupied) & (p[BISHOP] | p[QUEEN]))
            | (t.rook(sq, occupied) & (p[ROOK] | p[QUEEN]))
    }

    /// Check if a square is attacked by any piece of the given color
    #[inline]
    pub fn is_square_attacked(&self, sq: usize, by: usize) -> bool {
        self.attackers_to(sq, by, self.occupancy[BOTH]) != 0
    }

    #[inline]
    pub fn king_in_check(&self, color: usize) -> bool {
        self.is_square_attacked(self.king_square(color), opponent(color))
    }

    /// Pinned pieces of `color` and the ray each may still move along
    pub fn pins(&self, color: usize) -> Pins {
        let t = tables();
        let them = opponent(color);
        let king = self.king_square(color);
        let enemy = &self.pieces[them];

        let snipers = (t.rook(king, self.occupancy[them]) & (enemy[ROOK] | enemy[QUEEN]))
            | (t.bishop(king, self.occupancy[them]) & (enemy[BISHOP] | enemy[QUEEN]));

        let mut pins = Pins { pinned: 0, rays: [0; 64] };
        for sniper in Squares(snipers) {
            let between = t.between(king, sniper);
            let blockers = between & self.occupancy[BOTH];
            if blockers != 0 && !several(blockers) && blockers & self.occupancy[color] != 0 {
                let sq = lsb(blockers);
                pins.pinned |= blockers;
                pins.rays[sq] = between | square_bb(sniper);
            }
        }
        pins
    }

    /// Pieces giving check to `color`'s king and the squares that answer it
    pub fn checks(&self, color: usize) -> Checks {
        let king = self.king_square(color);
        let checkers = self.attackers_to(king, opponent(color), self.occupancy[BOTH]);
        let block = match checkers {
            0 => !0,
            c if several(c) => 0,
            c => c | tables().between(king, lsb(c)),
        };
        Checks { checkers, block }
    }

    // ========================================================================
    // MATERIAL QUERIES
    // ========================================================================

    /// Only kings and pawns remain
    pub fn is_pawn_only(&self) -> bool {
        let pawns_and_kings = self.pieces[WHITE][PAWN]
            | self.pieces[BLACK][PAWN]
            | self.pieces[WHITE][KING]
            | self.pieces[BLACK][KING];
        self.occupancy[BOTH] == pawns_and_kings
    }

    /// Neither side can possibly mate: K v K, K+minor v K, bishops all on one color
    pub fn insufficient_material(&self) -> bool {
        let heavy_or_pawn = [PAWN, ROOK, QUEEN]
            .iter()
            .any(|&piece| self.pieces[WHITE][piece] | self.pieces[BLACK][piece] != 0);
        if heavy_or_pawn {
            return false;
        }

        let knights = self.pieces[WHITE][KNIGHT] | self.pieces[BLACK][KNIGHT];
        let bishops = self.pieces[WHITE][BISHOP] | self.pieces[BLACK][BISHOP];
        if popcount(knights | bishops) <= 1 {
            return true;
        }
        knights == 0 && (bishops & LIGHT_SQUARES == 0 || bishops & DARK_SQUARES == 0)
    }

    /// Display the board as a string
    pub fn display(&self) -> String {
        let mut lines = Vec::new();
        lines.push("  +---+---+---+---+---+---+---+---+".to_string());

        for rank in (0..8).rev() {
            let mut row = format!("{} |", rank + 1);
            for file in 0..8 {
                match self.piece_at(rank * 8 + file) {
                    Some((color, piece)) => row.push_str(&format!(" {} |", piece_to_fen(color, piece))),
                    None => row.push_str("   |"),
                }
            }
            lines.push(row);
            lines.push("  +---+---+---+---+---+---+---+---+".to_string());
        }
        lines.push("    a   b   c   d   e   f   g   h".to_string());

        lines.join("\n")
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::new()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}
