//! Kestrel - Transposition Table Module
//!
//! A fixed-size table of packed search results shared by every search thread
//! without a lock. Each slot holds two 64-bit words: the packed entry and the
//! position hash XOR-ed with that entry. Writers store both words with plain
//! atomic stores, so a concurrent reader may see one word from one writer and
//! the other from a second writer. Such a torn slot fails the XOR check and is
//! reported as a miss, never as a hit for the wrong position.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::moves::{Move, MOVE_BITS};
use crate::search::MATE_THRESHOLD;

// ============================================================================
// ENTRY PACKING
// ============================================================================
//
//  bits  0-15  score (i16)
//  bits 16-23  depth (u8)
//  bits 24-25  bound (1 upper, 2 lower, 3 exact; 0 marks an empty slot)
//  bits 26-31  age (search generation, 6 bits)
//  bits 32-53  move

const DEPTH_SHIFT: u32 = 16;
const BOUND_SHIFT: u32 = 24;
const AGE_SHIFT: u32 = 26;
const MOVE_SHIFT: u32 = 32;

pub const AGE_CYCLE: u8 = 64;
const AGE_MASK: u64 = AGE_CYCLE as u64 - 1;

const SLOT_BYTES: usize = 16;
const HASHFULL_SAMPLE: usize = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Bound {
    /// Score is at most this value (fail low)
    Upper = 1,
    /// Score is at least this value (fail high)
    Lower = 2,
    Exact = 3,
}

impl Bound {
    fn from_bits(bits: u64) -> Option<Bound> {
        match bits {
            1 => Some(Bound::Upper),
            2 => Some(Bound::Lower),
            3 => Some(Bound::Exact),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TtEntry {
    pub mv: Move,
    pub depth: u8,
    pub bound: Bound,
    pub age: u8,
    pub score: i16,
}

impl TtEntry {
    pub fn pack(&self) -> u64 {
        (self.score as u16 as u64)
            | (self.depth as u64) << DEPTH_SHIFT
            | (self.bound as u64) << BOUND_SHIFT
            | (self.age as u64 & AGE_MASK) << AGE_SHIFT
            | ((self.mv.bits() & MOVE_BITS) as u64) << MOVE_SHIFT
    }

    /// `None` for an empty slot
    pub fn unpack(data: u64) -> Option<TtEntry> {
        let bound = Bound::from_bits((data >> BOUND_SHIFT) & 3)?;
        Some(TtEntry {
            mv: Move::from_bits((data >> MOVE_SHIFT) as u32 & MOVE_BITS),
            depth: (data >> DEPTH_SHIFT) as u8,
            bound,
            age: ((data >> AGE_SHIFT) & AGE_MASK) as u8,
            score: data as u16 as i16,
        })
    }
}

// ============================================================================
// MATE SCORE ADJUSTMENT
// ============================================================================

/// Mate scores are stored relative to the node, not the root
pub fn score_to_tt(score: i32, ply: usize) -> i32 {
    if score >= MATE_THRESHOLD {
        score + ply as i32
    } else if score <= -MATE_THRESHOLD {
        score - ply as i32
    } else {
        score
    }
}

pub fn score_from_tt(score: i32, ply: usize) -> i32 {
    if score >= MATE_THRESHOLD {
        score - ply as i32
    } else if score <= -MATE_THRESHOLD {
        score + ply as i32
    } else {
        score
    }
}

// ============================================================================
// TABLE
// ============================================================================

#[derive(Default)]
struct Slot {
    key: AtomicU64,
    data: AtomicU64,
}

pub struct TranspositionTable {
    slots: Vec<Slot>,
    generation: AtomicU8,
}

impl TranspositionTable {
    pub fn new(size_mb: usize) -> Self {
        let count = (size_mb.max(1) * 1024 * 1024 / SLOT_BYTES).max(1);
        let mut slots = Vec::with_capacity(count);
        slots.resize_with(count, Slot::default);
        TranspositionTable { slots, generation: AtomicU8::new(0) }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    fn slot(&self, hash: u64) -> &Slot {
        &self.slots[(hash % self.slots.len() as u64) as usize]
    }

    pub fn generation(&self) -> u8 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Start a new search; entries from earlier searches age by one step
    pub fn new_search(&self) {
        let next = (self.generation() + 1) % AGE_CYCLE;
        self.generation.store(next, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        for slot in &self.slots {
            slot.key.store(0, Ordering::Relaxed);
            slot.data.store(0, Ordering::Relaxed);
        }
        self.generation.store(0, Ordering::Relaxed);
    }

    pub fn probe(&self, hash: u64) -> Option<TtEntry> {
        let slot = self.slot(hash);
        let data = slot.data.load(Ordering::Relaxed);
        let key = slot.key.load(Ordering::Relaxed);
        if data == 0 || key ^ data != hash {
            return None;
        }
        TtEntry::unpack(data)
    }

    /// Write unless the slot holds a deeper, fresher result.
    /// Returns whether the entry was written.
    pub fn store(&self, hash: u64, mv: Move, depth: i32, bound: Bound, score: i32) -> bool {
        let generation = self.generation();
        let depth = depth.clamp(0, u8::MAX as i32);
        let slot = self.slot(hash);

        let existing = slot.data.load(Ordering::Relaxed);
        if let Some(old) = TtEntry::unpack(existing) {
            let distance = (generation + AGE_CYCLE - old.age) % AGE_CYCLE;
            let effective = old.depth as i32 - 2 * distance as i32;
            if bound != Bound::Exact && effective >= depth {
                return false;
            }
        }

        let entry = TtEntry {
            mv,
            depth: depth as u8,
            bound,
            age: generation,
            score: score.clamp(i16::MIN as i32, i16::MAX as i32) as i16,
        };
        let data = entry.pack();
        slot.key.store(hash ^ data, Ordering::Relaxed);
        slot.data.store(data, Ordering::Relaxed);
        true
    }

    /// Permille of sampled slots written during the current search
    pub fn hashfull(&self) -> usize {
        let sample = self.slots.len().min(HASHFULL_SAMPLE);
        if sample == 0 {
            return 0;
        }
        let generation = self.generation();
        let used = self.slots[..sample]
            .iter()
            .filter_map(|slot| TtEntry::unpack(slot.data.load(Ordering::Relaxed)))
            .filter(|entry| entry.age == generation)
            .count();
        used * 1000 / sample
    }
}
