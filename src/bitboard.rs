//! Kestrel - Bitboard Module
//!
//! A bitboard is a 64-bit integer where each bit represents a square on the board.
//! Leaper attacks are evaluated at compile time; slider attacks come from the
//! magic tables in `magic`, which are seeded from the ray walkers at the bottom
//! of this file.

// ============================================================================
// CONSTANTS - Files and Ranks
// ============================================================================

pub const FILE_A: u64 = 0x0101010101010101;
pub const FILE_H: u64 = 0x8080808080808080;

pub const RANK_1: u64 = 0x00000000000000FF;
pub const RANK_2: u64 = 0x000000000000FF00;
pub const RANK_3: u64 = 0x0000000000FF0000;
pub const RANK_6: u64 = 0x0000FF0000000000;
pub const RANK_7: u64 = 0x00FF000000000000;
pub const RANK_8: u64 = 0xFF00000000000000;

pub const EDGES: u64 = FILE_A | FILE_H | RANK_1 | RANK_8;

/// Squares where a1 is dark: b1, a2, ...
pub const LIGHT_SQUARES: u64 = 0x55AA55AA55AA55AA;
pub const DARK_SQUARES: u64 = !LIGHT_SQUARES;

// ============================================================================
// PRECOMPUTED LEAPER TABLES
// ============================================================================

const KNIGHT_DELTAS: [(i32, i32); 8] = [
    (1, 2), (-1, 2), (2, 1), (-2, 1),
    (1, -2), (-1, -2), (2, -1), (-2, -1),
];

const KING_DELTAS: [(i32, i32); 8] = [
    (0, 1), (0, -1), (1, 0), (-1, 0),
    (1, 1), (-1, 1), (1, -1), (-1, -1),
];

const WHITE_PAWN_DELTAS: [(i32, i32); 2] = [(-1, 1), (1, 1)];
const BLACK_PAWN_DELTAS: [(i32, i32); 2] = [(-1, -1), (1, -1)];

/// Knight attack table - attacks from each square
pub static KNIGHT_ATTACKS: [u64; 64] = leaper_table(&KNIGHT_DELTAS);

/// King attack table - attacks from each square
pub static KING_ATTACKS: [u64; 64] = leaper_table(&KING_DELTAS);

/// Pawn attack table - [color][square]
pub static PAWN_ATTACKS: [[u64; 64]; 2] = [
    leaper_table(&WHITE_PAWN_DELTAS),
    leaper_table(&BLACK_PAWN_DELTAS),
];

/// Build a table of single-step jumps given as (file, rank) deltas
const fn leaper_table(deltas: &[(i32, i32)]) -> [u64; 64] {
    let mut table = [0u64; 64];
    let mut sq = 0usize;

    while sq < 64 {
        let file = (sq % 8) as i32;
        let rank = (sq / 8) as i32;
        let mut i = 0;
        while i < deltas.len() {
            let f = file + deltas[i].0;
            let r = rank + deltas[i].1;
            if f >= 0 && f < 8 && r >= 0 && r < 8 {
                table[sq] |= 1u64 << (r * 8 + f);
            }
            i += 1;
        }
        sq += 1;
    }

    table
}

// ============================================================================
// BITBOARD UTILITIES
// ============================================================================

/// Extract and clear the least significant bit, returning its index
#[inline]
pub fn pop_lsb(bb: &mut u64) -> usize {
    let idx = bb.trailing_zeros() as usize;
    *bb &= *bb - 1;
    idx
}

/// Count the number of set bits in a bitboard
#[inline]
pub fn popcount(bb: u64) -> u32 {
    bb.count_ones()
}

/// Get the index of the least significant bit
#[inline]
pub fn lsb(bb: u64) -> usize {
    bb.trailing_zeros() as usize
}

/// More than one bit set
#[inline]
pub const fn several(bb: u64) -> bool {
    bb & bb.wrapping_sub(1) != 0
}

/// Create a bitboard with a single bit set at the given square
#[inline]
pub const fn square_bb(sq: usize) -> u64 {
    1u64 << sq
}

/// Get the file (0-7) of a square
#[inline]
pub const fn file_of(sq: usize) -> usize {
    sq & 7
}

/// Get the rank (0-7) of a square
#[inline]
pub const fn rank_of(sq: usize) -> usize {
    sq >> 3
}

/// Get the bitboard for a file (0-7)
#[inline]
pub const fn file_bb(file: usize) -> u64 {
    FILE_A << file
}

/// Iterator over the set squares of a bitboard, lowest first
pub struct Squares(pub u64);

impl Iterator for Squares {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some(pop_lsb(&mut self.0))
        }
    }
}

// ============================================================================
// RAY WALKERS (table generation only)
// ============================================================================

pub const ROOK_DIRECTIONS: [(i32, i32); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];
pub const BISHOP_DIRECTIONS: [(i32, i32); 4] = [(1, 1), (-1, 1), (1, -1), (-1, -1)];

/// Walk each direction until the edge or the first occupied square (inclusive)
pub fn slide(sq: usize, occupied: u64, directions: &[(i32, i32)]) -> u64 {
    let mut attacks = 0u64;

    for &(df, dr) in directions {
        let mut f = (sq % 8) as i32 + df;
        let mut r = (sq / 8) as i32 + dr;
        while (0..8).contains(&f) && (0..8).contains(&r) {
            let target = square_bb((r * 8 + f) as usize);
            attacks |= target;
            if target & occupied != 0 {
                break;
            }
            f += df;
            r += dr;
        }
    }

    attacks
}

/// Rook attacks by walking rays
pub fn rook_attacks_slow(sq: usize, occupied: u64) -> u64 {
    slide(sq, occupied, &ROOK_DIRECTIONS)
}

/// Bishop attacks by walking rays
pub fn bishop_attacks_slow(sq: usize, occupied: u64) -> u64 {
    slide(sq, occupied, &BISHOP_DIRECTIONS)
}
