//! Kestrel - Type definitions and constants
//!
//! Colors, piece types and castling flags shared by every module.
//! Squares are numbered a1 = 0 .. h8 = 63.

/// Colors index the first dimension of every per-side table
pub const WHITE: usize = 0;
pub const BLACK: usize = 1;

/// Piece types index the second dimension of the piece bitboards
pub const PAWN: usize = 0;
pub const KNIGHT: usize = 1;
pub const BISHOP: usize = 2;
pub const ROOK: usize = 3;
pub const QUEEN: usize = 4;
pub const KING: usize = 5;

/// Castling rights bitmasks
pub const CASTLE_WK: u8 = 1; // White kingside
pub const CASTLE_WQ: u8 = 2; // White queenside
pub const CASTLE_BK: u8 = 4; // Black kingside
pub const CASTLE_BQ: u8 = 8; // Black queenside
pub const CASTLE_ALL: u8 = 15;

/// File and rank names for UCI notation
pub const FILE_NAMES: &[u8; 8] = b"abcdefgh";
pub const RANK_NAMES: &[u8; 8] = b"12345678";

/// Named squares used by castling and tests
pub const A1: usize = 0;
pub const C1: usize = 2;
pub const D1: usize = 3;
pub const E1: usize = 4;
pub const F1: usize = 5;
pub const G1: usize = 6;
pub const H1: usize = 7;
pub const A8: usize = 56;
pub const C8: usize = 58;
pub const D8: usize = 59;
pub const E8: usize = 60;
pub const F8: usize = 61;
pub const G8: usize = 62;
pub const H8: usize = 63;

/// Opposite color
#[inline]
pub const fn opponent(color: usize) -> usize {
    color ^ 1
}

/// Convert square index (0-63) to algebraic notation (e.g., "e4")
pub fn square_name(sq: usize) -> String {
    let file = sq % 8;
    let rank = sq / 8;
    format!("{}{}", FILE_NAMES[file] as char, RANK_NAMES[rank] as char)
}

/// Convert algebraic notation to square index
pub fn parse_square(name: &str) -> Option<usize> {
    let bytes = name.as_bytes();
    if bytes.len() != 2 {
        return None;
    }

    let file = match bytes[0] {
        b'a'..=b'h' => (bytes[0] - b'a') as usize,
        _ => return None,
    };
    let rank = match bytes[1] {
        b'1'..=b'8' => (bytes[1] - b'1') as usize,
        _ => return None,
    };

    Some(rank * 8 + file)
}

/// FEN piece character to (color, piece type)
pub fn fen_to_piece(c: char) -> Option<(usize, usize)> {
    let color = if c.is_ascii_uppercase() { WHITE } else { BLACK };
    let piece = match c.to_ascii_lowercase() {
        'p' => PAWN,
        'n' => KNIGHT,
        'b' => BISHOP,
        'r' => ROOK,
        'q' => QUEEN,
        'k' => KING,
        _ => return None,
    };
    Some((color, piece))
}

/// (color, piece type) to FEN character
pub fn piece_to_fen(color: usize, piece: usize) -> char {
    let c = match piece {
        PAWN => 'p',
        KNIGHT => 'n',
        BISHOP => 'b',
        ROOK => 'r',
        QUEEN => 'q',
        KING => 'k',
        _ => '?',
    };
    if color == WHITE {
        c.to_ascii_uppercase()
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_names_round_trip() {
        for sq in 0..64 {
            assert_eq!(parse_square(&square_name(sq)), Some(sq));
        }
        assert_eq!(square_name(E1), "e1");
        assert_eq!(square_name(H8), "h8");
    }

    #[test]
    fn rejects_malformed_squares() {
        assert_eq!(parse_square("i1"), None);
        assert_eq!(parse_square("a9"), None);
        assert_eq!(parse_square("e"), None);
        assert_eq!(parse_square("e44"), None);
    }

    #[test]
    fn fen_piece_chars() {
        assert_eq!(fen_to_piece('N'), Some((WHITE, KNIGHT)));
        assert_eq!(fen_to_piece('k'), Some((BLACK, KING)));
        assert_eq!(fen_to_piece('x'), None);
        assert_eq!(piece_to_fen(BLACK, QUEEN), 'q');
        assert_eq!(piece_to_fen(WHITE, PAWN), 'P');
    }
}
