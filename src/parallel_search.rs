//! Kestrel - Parallel Search Module (Lazy SMP)
//!
//! Runs a search on its own thread so the protocol loop stays responsive.
//! Helper threads search the same position independently, starting at
//! staggered depths, and share nothing but the transposition table. Only the
//! main searcher reports progress and chooses the move.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, info};

use crate::clock::{Clock, SearchToken};
use crate::game::Game;
use crate::search::{SearchInfo, SearchLimits, SearchResult, Searcher, MAX_DEPTH};
use crate::tt::TranspositionTable;

/// Poll interval while an unbounded search waits for `stop`
const IDLE_POLL: Duration = Duration::from_millis(1);

/// Everything a `go` command asks for
#[derive(Clone, Debug, Default)]
pub struct SearchRequest {
    pub game: Game,
    pub clock: Clock,
    pub depth: Option<i32>,
    pub ponder: bool,
}

struct ActiveSearch {
    token: SearchToken,
    handle: JoinHandle<()>,
    /// Budget to arm on `ponderhit`
    pending_budget: Option<Duration>,
    /// Finishes without an explicit `stop`
    bounded: bool,
}

/// Parallel search engine using Lazy SMP
pub struct ParallelSearchEngine {
    tt: Arc<TranspositionTable>,
    num_threads: usize,
    active: Option<ActiveSearch>,
}

impl ParallelSearchEngine {
    pub fn new(tt_size_mb: usize, num_threads: usize) -> Self {
        ParallelSearchEngine {
            tt: Arc::new(TranspositionTable::new(tt_size_mb)),
            num_threads: num_threads.max(1),
            active: None,
        }
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn set_threads(&mut self, threads: usize) {
        self.stop();
        self.num_threads = threads.max(1);
    }

    /// Replace the table with an empty one of the given size
    pub fn set_hash(&mut self, size_mb: usize) {
        self.stop();
        self.tt = Arc::new(TranspositionTable::new(size_mb));
    }

    pub fn clear_tt(&mut self) {
        self.stop();
        self.tt.clear();
    }

    pub fn hashfull(&self) -> usize {
        self.tt.hashfull()
    }

    pub fn is_searching(&self) -> bool {
        self.active.is_some()
    }

    /// Start searching in the background. `on_info` receives every completed
    /// iteration of the main searcher; `on_done` receives the final result
    /// once the search is over (and, for infinite or ponder searches, once
    /// it has been stopped).
    pub fn start<I, D>(&mut self, request: SearchRequest, on_info: I, on_done: D)
    where
        I: FnMut(&SearchInfo) + Send + 'static,
        D: FnOnce(SearchResult) + Send + 'static,
    {
        self.stop();
        self.tt.new_search();

        let pos = *request.game.position();
        let budget = request.clock.allotment(pos.side, pos.fullmove);
        let token = if request.ponder { SearchToken::unbounded() } else { SearchToken::new(budget) };
        let wait_for_stop = request.ponder || request.clock.infinite;
        let limits = SearchLimits::depth(request.depth.unwrap_or(MAX_DEPTH));

        info!(
            "search: budget {:?}, depth {}, {} threads{}",
            budget,
            limits.depth,
            self.num_threads,
            if request.ponder { ", pondering" } else { "" }
        );

        let tt = Arc::clone(&self.tt);
        let threads = self.num_threads;
        let search_token = token.clone();
        let handle = thread::spawn(move || {
            let result = run(request.game, tt, search_token, threads, limits, wait_for_stop, on_info);
            on_done(result);
        });

        self.active = Some(ActiveSearch {
            token,
            handle,
            pending_budget: if request.ponder { budget } else { None },
            bounded: !wait_for_stop,
        });
    }

    /// The opponent played the expected move: keep searching, now on the clock
    pub fn ponderhit(&mut self) {
        if let Some(active) = &mut self.active {
            if let Some(budget) = active.pending_budget.take() {
                active.token.arm(budget);
            }
            active.bounded = true;
        }
    }

    /// Stop the running search and wait until it has reported
    pub fn stop(&mut self) {
        if let Some(active) = &self.active {
            active.token.stop();
        }
        self.wait();
    }

    /// Block until the running search, if any, is finished
    pub fn wait(&mut self) {
        if let Some(active) = self.active.take() {
            if active.handle.join().is_err() {
                error!("search thread panicked");
            }
        }
    }

    /// Barrier for `isready`: waits only for searches that end on their own
    pub fn wait_if_bounded(&mut self) {
        if self.active.as_ref().is_some_and(|active| active.bounded) {
            self.wait();
        }
    }

    /// Run a search to completion on the calling thread's behalf
    pub fn search_blocking<I>(&mut self, request: SearchRequest, on_info: I) -> SearchResult
    where
        I: FnMut(&SearchInfo) + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        self.start(request, on_info, move |result| {
            let _ = sender.send(result);
        });
        self.wait();
        receiver.recv().unwrap_or_default()
    }
}

impl Default for ParallelSearchEngine {
    fn default() -> Self {
        ParallelSearchEngine::new(64, num_cpus::get())
    }
}

impl Drop for ParallelSearchEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<I>(
    game: Game,
    tt: Arc<TranspositionTable>,
    token: SearchToken,
    threads: usize,
    limits: SearchLimits,
    wait_for_stop: bool,
    on_info: I,
) -> SearchResult
where
    I: FnMut(&SearchInfo),
{
    let nodes = Arc::new(AtomicU64::new(0));
    let game = &game;

    let mut result = thread::scope(|scope| {
        for id in 1..threads {
            let (tt, token, nodes) = (Arc::clone(&tt), token.clone(), Arc::clone(&nodes));
            scope.spawn(move || {
                let mut helper = Searcher::new(*game.position(), game.history(), tt, token, nodes);
                let staggered = SearchLimits { start_depth: 1 + (id % 2) as i32, ..limits };
                helper.search(staggered, |_| {});
            });
        }

        let mut main = Searcher::new(*game.position(), game.history(), Arc::clone(&tt), token.clone(), Arc::clone(&nodes));
        let result = main.search(limits, on_info);

        // infinite and ponder searches report only when told to
        if wait_for_stop {
            while !token.is_stopped() && !token.has_deadline() {
                thread::sleep(IDLE_POLL);
            }
        }
        token.stop();
        result
    });

    result.nodes = nodes.load(Ordering::Relaxed);
    result
}
