//! Kestrel - Time Management Module
//!
//! Turns the time fields of a `go` command into a per-move budget and
//! carries that budget, plus an explicit stop flag, to every search thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::types::*;

pub const DEFAULT_MOVE_OVERHEAD: u64 = 50;

/// Smallest budget ever handed to a search
pub const MIN_ALLOTMENT_MS: u64 = 10;

const BASE_MOVES_TO_GO: i64 = 40;
const MIN_MOVES_TO_GO: i64 = 10;

// ============================================================================
// CLOCK
// ============================================================================

/// Time fields in milliseconds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Clock {
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub winc: u64,
    pub binc: u64,
    pub movestogo: Option<u32>,
    pub movetime: Option<u64>,
    pub infinite: bool,
    pub overhead: u64,
}

impl Default for Clock {
    fn default() -> Self {
        Clock {
            wtime: None,
            btime: None,
            winc: 0,
            binc: 0,
            movestogo: None,
            movetime: None,
            infinite: false,
            overhead: DEFAULT_MOVE_OVERHEAD,
        }
    }
}

impl Clock {
    /// Budget for the side to move, `None` when the search is unbounded
    pub fn allotment(&self, side: usize, fullmove: u32) -> Option<Duration> {
        if self.infinite {
            return None;
        }

        let overhead = self.overhead as i64;

        if let Some(movetime) = self.movetime {
            return Some(Self::floored(movetime as i64 - overhead));
        }

        let (remaining, increment) = if side == WHITE {
            (self.wtime?, self.winc)
        } else {
            (self.btime?, self.binc)
        };
        let remaining = remaining as i64;
        let increment = increment as i64;

        let moves_to_go = match self.movestogo {
            Some(n) => (n as i64).max(1),
            None => (BASE_MOVES_TO_GO - fullmove as i64).max(MIN_MOVES_TO_GO),
        };

        let share = (remaining + (increment - overhead) * moves_to_go) / (moves_to_go + 1) - overhead;
        Some(Self::floored(share.min(remaining - overhead)))
    }

    fn floored(ms: i64) -> Duration {
        Duration::from_millis(ms.max(MIN_ALLOTMENT_MS as i64) as u64)
    }
}

// ============================================================================
// SEARCH TOKEN
// ============================================================================

const NO_DEADLINE: u64 = u64::MAX;

/// Cancellation handle shared by the dispatcher and all search threads.
///
/// The deadline is stored as milliseconds since `start` so that `ponderhit`
/// can arm it after the search has begun.
#[derive(Clone, Debug)]
pub struct SearchToken {
    stop: Arc<AtomicBool>,
    deadline_ms: Arc<AtomicU64>,
    start: Instant,
}

impl SearchToken {
    pub fn new(budget: Option<Duration>) -> Self {
        let token = SearchToken {
            stop: Arc::new(AtomicBool::new(false)),
            deadline_ms: Arc::new(AtomicU64::new(NO_DEADLINE)),
            start: Instant::now(),
        };
        if let Some(budget) = budget {
            token.arm(budget);
        }
        token
    }

    /// Never stops on its own
    pub fn unbounded() -> Self {
        SearchToken::new(None)
    }

    /// Set the deadline to `budget` from now
    pub fn arm(&self, budget: Duration) {
        let at = self.start.elapsed() + budget;
        self.deadline_ms.store(at.as_millis() as u64, Ordering::Release);
    }

    pub fn has_deadline(&self) -> bool {
        self.deadline_ms.load(Ordering::Acquire) != NO_DEADLINE
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn past_deadline(&self) -> bool {
        let deadline = self.deadline_ms.load(Ordering::Acquire);
        deadline != NO_DEADLINE && self.start.elapsed().as_millis() as u64 >= deadline
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
