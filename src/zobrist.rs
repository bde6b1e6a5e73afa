//! Kestrel - Zobrist keys
//!
//! One random key per (color, piece, square), per castling right, per
//! en-passant file and for the side to move. Keys come from a fixed seed so
//! hashes are reproducible across runs.

use std::sync::OnceLock;

use rand::prelude::*;

const ZOBRIST_SEED: u64 = 12345;

pub struct ZobristKeys {
    pub pieces: [[[u64; 64]; 6]; 2],
    pub castling: [u64; 4],
    pub en_passant: [u64; 8],
    pub side: u64,
}

impl ZobristKeys {
    fn generate() -> Self {
        let mut rng = StdRng::seed_from_u64(ZOBRIST_SEED);

        let mut pieces = [[[0u64; 64]; 6]; 2];
        for color in pieces.iter_mut() {
            for piece in color.iter_mut() {
                for key in piece.iter_mut() {
                    *key = rng.gen();
                }
            }
        }

        let mut castling = [0u64; 4];
        castling.iter_mut().for_each(|key| *key = rng.gen());

        let mut en_passant = [0u64; 8];
        en_passant.iter_mut().for_each(|key| *key = rng.gen());

        ZobristKeys { pieces, castling, en_passant, side: rng.gen() }
    }

    /// Combined key of every right set in `rights`
    #[inline]
    pub fn castling_key(&self, rights: u8) -> u64 {
        (0..4)
            .filter(|bit| rights & (1 << bit) != 0)
            .fold(0, |acc, bit| acc ^ self.castling[bit])
    }
}

static KEYS: OnceLock<ZobristKeys> = OnceLock::new();

#[inline]
pub fn keys() -> &'static ZobristKeys {
    KEYS.get_or_init(ZobristKeys::generate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keys_are_distinct() {
        let k = keys();
        let mut seen = HashSet::new();
        for color in &k.pieces {
            for piece in color {
                for &key in piece {
                    assert!(seen.insert(key));
                }
            }
        }
        for &key in k.castling.iter().chain(&k.en_passant) {
            assert!(seen.insert(key));
        }
        assert!(seen.insert(k.side));
    }

    #[test]
    fn castling_key_combines_rights() {
        let k = keys();
        assert_eq!(k.castling_key(0), 0);
        assert_eq!(k.castling_key(1), k.castling[0]);
        assert_eq!(k.castling_key(0b1010), k.castling[1] ^ k.castling[3]);
    }
}
