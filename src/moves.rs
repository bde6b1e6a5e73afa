//! Kestrel - Move encoding
//!
//! A move is packed into 32 bits:
//!
//! | bits  | field                          |
//! |-------|--------------------------------|
//! | 0-5   | from square                    |
//! | 6-11  | to square                      |
//! | 12-14 | promotion piece (0 = none)     |
//! | 15-17 | moving piece type              |
//! | 18    | capture                        |
//! | 19    | en passant                     |
//! | 20    | castling                       |
//! | 21    | double pawn push               |
//!
//! Castling is stored as the king's move; the rook's part comes from
//! `castle_rook`.

use std::fmt;

use crate::types::*;

pub const FLAG_CAPTURE: u32 = 1 << 18;
pub const FLAG_EN_PASSANT: u32 = 1 << 19;
pub const FLAG_CASTLING: u32 = 1 << 20;
pub const FLAG_DOUBLE_PUSH: u32 = 1 << 21;

const SQUARE_MASK: u32 = 0x3F;
const PIECE_MASK: u32 = 0x7;

/// Highest bit pattern a move can carry
pub const MOVE_BITS: u32 = (1 << 22) - 1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Move(u32);

impl Move {
    pub const NULL: Move = Move(0);

    /// Quiet move without flags
    #[inline]
    pub const fn new(from: usize, to: usize, piece: usize) -> Self {
        Move(from as u32 | (to as u32) << 6 | (piece as u32) << 15)
    }

    #[inline]
    pub const fn with_flags(from: usize, to: usize, piece: usize, flags: u32) -> Self {
        Move(Move::new(from, to, piece).0 | flags)
    }

    #[inline]
    pub const fn with_promotion(from: usize, to: usize, promotion: usize, flags: u32) -> Self {
        Move(Move::new(from, to, PAWN).0 | (promotion as u32) << 12 | flags)
    }

    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Move(bits & MOVE_BITS)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn from(self) -> usize {
        (self.0 & SQUARE_MASK) as usize
    }

    #[inline]
    pub const fn to(self) -> usize {
        ((self.0 >> 6) & SQUARE_MASK) as usize
    }

    #[inline]
    pub const fn piece(self) -> usize {
        ((self.0 >> 15) & PIECE_MASK) as usize
    }

    #[inline]
    pub fn promotion(self) -> Option<usize> {
        match (self.0 >> 12) & PIECE_MASK {
            0 => None,
            p => Some(p as usize),
        }
    }

    #[inline]
    pub const fn is_capture(self) -> bool {
        self.0 & FLAG_CAPTURE != 0
    }

    #[inline]
    pub const fn is_en_passant(self) -> bool {
        self.0 & FLAG_EN_PASSANT != 0
    }

    #[inline]
    pub const fn is_castling(self) -> bool {
        self.0 & FLAG_CASTLING != 0
    }

    #[inline]
    pub const fn is_double_push(self) -> bool {
        self.0 & FLAG_DOUBLE_PUSH != 0
    }

    #[inline]
    pub fn is_quiet(self) -> bool {
        !self.is_capture() && self.promotion().is_none()
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Coordinate notation, e.g. "e2e4" or "e7e8q"
    pub fn to_uci(self) -> String {
        if self.is_null() {
            return "0000".to_string();
        }
        let mut uci = format!("{}{}", square_name(self.from()), square_name(self.to()));
        if let Some(promo) = self.promotion() {
            uci.push(match promo {
                KNIGHT => 'n',
                BISHOP => 'b',
                ROOK => 'r',
                _ => 'q',
            });
        }
        uci
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uci())
    }
}

/// Rook (from, to) for a castling king destination
#[inline]
pub fn castle_rook(king_to: usize) -> Option<(usize, usize)> {
    match king_to {
        G1 => Some((H1, F1)),
        C1 => Some((A1, D1)),
        G8 => Some((H8, F8)),
        C8 => Some((A8, D8)),
        _ => None,
    }
}

/// Split coordinate notation into (from, to, promotion)
pub fn parse_uci(text: &str) -> Option<(usize, usize, Option<usize>)> {
    if !text.is_ascii() || !(4..=5).contains(&text.len()) {
        return None;
    }
    let from = parse_square(&text[0..2])?;
    let to = parse_square(&text[2..4])?;
    let promotion = match text.as_bytes().get(4) {
        None => None,
        Some(b'q') | Some(b'Q') => Some(QUEEN),
        Some(b'r') | Some(b'R') => Some(ROOK),
        Some(b'b') | Some(b'B') => Some(BISHOP),
        Some(b'n') | Some(b'N') => Some(KNIGHT),
        Some(_) => return None,
    };
    Some((from, to, promotion))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_do_not_overlap() {
        let mv = Move::with_promotion(
            52,
            63,
            QUEEN,
            FLAG_CAPTURE | FLAG_EN_PASSANT | FLAG_CASTLING | FLAG_DOUBLE_PUSH,
        );
        assert_eq!(mv.from(), 52);
        assert_eq!(mv.to(), 63);
        assert_eq!(mv.promotion(), Some(QUEEN));
        assert_eq!(mv.piece(), PAWN);
        assert!(mv.is_capture() && mv.is_en_passant() && mv.is_castling() && mv.is_double_push());
        assert_eq!(mv.bits(), mv.bits() & MOVE_BITS);
    }

    #[test]
    fn quiet_move_has_no_flags() {
        let mv = Move::new(6, 21, KNIGHT);
        assert_eq!(mv.piece(), KNIGHT);
        assert_eq!(mv.promotion(), None);
        assert!(mv.is_quiet());
        assert!(!mv.is_null());
        assert_eq!(mv.to_uci(), "g1f3");
    }

    #[test]
    fn uci_strings() {
        assert_eq!(Move::with_promotion(52, 60, KNIGHT, 0).to_uci(), "e7e8n");
        assert_eq!(Move::NULL.to_uci(), "0000");
        assert_eq!(parse_uci("e7e8q"), Some((52, 60, Some(QUEEN))));
        assert_eq!(parse_uci("e2e4"), Some((12, 28, None)));
        assert_eq!(parse_uci("e2e4x"), None);
        assert_eq!(parse_uci("e2"), None);
    }

    #[test]
    fn castling_rook_lookup() {
        assert_eq!(castle_rook(G1), Some((H1, F1)));
        assert_eq!(castle_rook(C8), Some((A8, D8)));
        assert_eq!(castle_rook(E1), None);
    }
}
