//! Kestrel - Magic Bitboard Module
//!
//! Slider attack lookup: a relevant-occupancy mask per square, a multiplier
//! that hashes every subset of that mask to a unique slot, and one dense
//! table holding the attack set for every slot. The tables are generated
//! once per process by `initialize_tables()` and are read-only afterwards.

use std::sync::OnceLock;
use std::time::Instant;

use log::debug;
use rand::prelude::*;

use crate::bitboard::*;
use crate::error::{EngineError, EngineResult};

/// Candidates tried per square before giving up
pub const MAX_MAGIC_ATTEMPTS: u32 = 100_000_000;

const MAGIC_SEED: u64 = 0x4B45_5354_5245_4C21;

/// Per-square hashing parameters
#[derive(Clone, Copy, Debug, Default)]
pub struct Magic {
    pub mask: u64,
    pub magic: u64,
    pub shift: u32,
    pub offset: usize,
}

impl Magic {
    #[inline]
    fn index(&self, occupied: u64) -> usize {
        self.offset + ((occupied & self.mask).wrapping_mul(self.magic) >> self.shift) as usize
    }
}

/// Immutable attack lookup tables
pub struct AttackTables {
    rook: [Magic; 64],
    bishop: [Magic; 64],
    attacks: Vec<u64>,
    between: Vec<u64>,
}

#[derive(Clone, Copy)]
enum Slider {
    Rook,
    Bishop,
}

impl Slider {
    fn name(self) -> &'static str {
        match self {
            Slider::Rook => "rook",
            Slider::Bishop => "bishop",
        }
    }

    fn attacks(self, sq: usize, occupied: u64) -> u64 {
        match self {
            Slider::Rook => rook_attacks_slow(sq, occupied),
            Slider::Bishop => bishop_attacks_slow(sq, occupied),
        }
    }

    /// Squares that can block, edges excluded
    fn relevant_mask(self, sq: usize) -> u64 {
        match self {
            Slider::Bishop => bishop_attacks_slow(sq, 0) & !EDGES,
            Slider::Rook => {
                let file = file_of(sq);
                let rank = rank_of(sq);
                let file_mask = file_bb(file) & !(RANK_1 | RANK_8);
                let rank_mask = (RANK_1 << (8 * rank)) & !(FILE_A | FILE_H);
                (file_mask | rank_mask) & !square_bb(sq)
            }
        }
    }
}

impl AttackTables {
    /// Build all slider tables. Fails only if a square exhausts its magic search.
    pub fn generate() -> EngineResult<Self> {
        let started = Instant::now();
        let mut rng = StdRng::seed_from_u64(MAGIC_SEED);
        let mut attacks = Vec::new();

        let mut rook = [Magic::default(); 64];
        let mut bishop = [Magic::default(); 64];
        for sq in 0..64 {
            rook[sq] = find_magic(Slider::Rook, sq, &mut rng, &mut attacks)?;
        }
        for sq in 0..64 {
            bishop[sq] = find_magic(Slider::Bishop, sq, &mut rng, &mut attacks)?;
        }

        let mut between = vec![0u64; 64 * 64];
        for a in 0..64 {
            for b in 0..64 {
                between[a * 64 + b] = ray_between(a, b);
            }
        }

        debug!(
            "attack tables ready: {} slider entries in {:?}",
            attacks.len(),
            started.elapsed()
        );

        Ok(AttackTables { rook, bishop, attacks, between })
    }

    #[inline]
    pub fn rook(&self, sq: usize, occupied: u64) -> u64 {
        self.attacks[self.rook[sq].index(occupied)]
    }

    #[inline]
    pub fn bishop(&self, sq: usize, occupied: u64) -> u64 {
        self.attacks[self.bishop[sq].index(occupied)]
    }

    #[inline]
    pub fn queen(&self, sq: usize, occupied: u64) -> u64 {
        self.rook(sq, occupied) | self.bishop(sq, occupied)
    }

    #[inline]
    pub fn knight(&self, sq: usize) -> u64 {
        KNIGHT_ATTACKS[sq]
    }

    #[inline]
    pub fn king(&self, sq: usize) -> u64 {
        KING_ATTACKS[sq]
    }

    #[inline]
    pub fn pawn(&self, color: usize, sq: usize) -> u64 {
        PAWN_ATTACKS[color][sq]
    }

    /// Squares strictly between two aligned squares, empty otherwise
    #[inline]
    pub fn between(&self, a: usize, b: usize) -> u64 {
        self.between[a * 64 + b]
    }

    pub fn rook_magic(&self, sq: usize) -> Magic {
        self.rook[sq]
    }

    pub fn bishop_magic(&self, sq: usize) -> Magic {
        self.bishop[sq]
    }
}

/// Spread the low bits of `index` over the set bits of `mask`
fn occupancy_subset(index: usize, mask: u64) -> u64 {
    let mut occupied = 0u64;
    for (bit, sq) in Squares(mask).enumerate() {
        if index & (1 << bit) != 0 {
            occupied |= square_bb(sq);
        }
    }
    occupied
}

fn find_magic(
    slider: Slider,
    sq: usize,
    rng: &mut StdRng,
    table: &mut Vec<u64>,
) -> EngineResult<Magic> {
    let mask = slider.relevant_mask(sq);
    let bits = popcount(mask);
    let size = 1usize << bits;

    let occupancies: Vec<u64> = (0..size).map(|i| occupancy_subset(i, mask)).collect();
    let reference: Vec<u64> = occupancies.iter().map(|&occ| slider.attacks(sq, occ)).collect();

    let mut used = vec![0u64; size];
    // epoch[i] == attempt marks slot i as written during this attempt
    let mut epoch = vec![0u32; size];

    for attempt in 1..=MAX_MAGIC_ATTEMPTS {
        let magic = rng.gen::<u64>() & rng.gen::<u64>() & rng.gen::<u64>();
        if popcount(mask.wrapping_mul(magic) & RANK_8) < 6 {
            continue;
        }

        let shift = 64 - bits;
        let mut collision = false;
        for (occ, &attack) in occupancies.iter().zip(&reference) {
            let idx = (occ.wrapping_mul(magic) >> shift) as usize;
            if epoch[idx] != attempt {
                epoch[idx] = attempt;
                used[idx] = attack;
            } else if used[idx] != attack {
                collision = true;
                break;
            }
        }

        if !collision {
            let offset = table.len();
            table.resize(offset + size, 0);
            for (occ, &attack) in occupancies.iter().zip(&reference) {
                let idx = (occ.wrapping_mul(magic) >> shift) as usize;
                table[offset + idx] = attack;
            }
            return Ok(Magic { mask, magic, shift, offset });
        }
    }

    Err(EngineError::MagicExhausted {
        slider: slider.name(),
        square: sq,
        attempts: MAX_MAGIC_ATTEMPTS,
    })
}

fn ray_between(a: usize, b: usize) -> u64 {
    if a == b {
        return 0;
    }
    let (a_bb, b_bb) = (square_bb(a), square_bb(b));
    for directions in [&ROOK_DIRECTIONS, &BISHOP_DIRECTIONS] {
        if slide(a, 0, directions) & b_bb != 0 {
            return slide(a, b_bb, directions) & slide(b, a_bb, directions);
        }
    }
    0
}

static TABLES: OnceLock<AttackTables> = OnceLock::new();

/// Generate the process-wide tables. Call once at startup; later calls are no-ops.
pub fn initialize_tables() -> EngineResult<&'static AttackTables> {
    if let Some(tables) = TABLES.get() {
        return Ok(tables);
    }
    let generated = AttackTables::generate()?;
    Ok(TABLES.get_or_init(|| generated))
}

/// Read-only handle to the tables, generating them on first use.
///
/// # Panics
/// If the magic search fails, which means the mask generator is broken and
/// no move can be generated.
#[inline]
pub fn tables() -> &'static AttackTables {
    TABLES.get_or_init(|| match AttackTables::generate() {
        Ok(tables) => tables,
        Err(err) => panic!("attack table generation failed: {err}"),
    })
}
