//! Kestrel - Search Engine Module
//!
//! This module implements the chess search algorithm using:
//! - Principal Variation Search (PVS) with iterative deepening
//! - Aspiration windows around the previous iteration's score
//! - Transposition table cutoffs and move ordering
//! - Null Move Pruning (NMP)
//! - Late Move Reductions (LMR)
//! - Killer/History heuristics
//! - Quiescence search with delta pruning
//!
//! A `Searcher` owns a private copy of the position; any number of them can
//! run at once over one shared `TranspositionTable`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace};

use crate::bitboard::popcount;
use crate::board::{Position, BOTH};
use crate::clock::SearchToken;
use crate::evaluation::{evaluate, mvv_lva, PIECE_VALUES};
use crate::game::{repetitions, Game};
use crate::move_generator::{generate_captures, generate_legal, MoveList};
use crate::moves::Move;
use crate::tt::{score_from_tt, score_to_tt, Bound, TranspositionTable};
use crate::types::*;

// ============================================================================
// SCORES AND LIMITS
// ============================================================================

pub const INFINITY: i32 = 32000;
pub const CHECKMATE: i32 = 30000;
pub const MAX_PLY: usize = 128;
/// Scores beyond this are mates
pub const MATE_THRESHOLD: i32 = CHECKMATE - MAX_PLY as i32;
/// Deepest iteration ever started
pub const MAX_DEPTH: i32 = 64;

// Aspiration windows
const ASPIRATION_START_DEPTH: i32 = 4;
const ASPIRATION_WINDOW: i32 = 25;
const ASPIRATION_LIMIT: i32 = 1000;

// Null Move Pruning
const NMP_MIN_DEPTH: i32 = 3;
const NMP_MIN_PIECES: u32 = 7;

// Late Move Reductions
const LMR_MIN_DEPTH: i32 = 3;
const LMR_FULL_DEPTH_MOVES: usize = 4;

// Quiescence
const DELTA_MARGIN: i32 = 200;

/// Nodes between deadline checks
const CHECK_INTERVAL: u64 = 1024;

// Move ordering
const PV_MOVE_SCORE: i32 = 4_000_000;
const TT_MOVE_SCORE: i32 = 3_000_000;
const CAPTURE_SCORE: i32 = 2_000_000;
const KILLER_SCORES: [i32; 2] = [1_000_000, 900_000];
const HISTORY_MAX: i32 = 800_000;

/// Moves to mate: positive when the side to move mates, negative when it is mated
pub fn mate_in(score: i32) -> Option<i32> {
    if score >= MATE_THRESHOLD {
        Some((CHECKMATE - score + 1) / 2)
    } else if score <= -MATE_THRESHOLD {
        Some(-(CHECKMATE + score) / 2)
    } else {
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchLimits {
    /// Last iteration to run
    pub depth: i32,
    /// First iteration; helper threads start deeper to desynchronize
    pub start_depth: i32,
}

impl Default for SearchLimits {
    fn default() -> Self {
        SearchLimits { depth: MAX_DEPTH, start_depth: 1 }
    }
}

impl SearchLimits {
    pub fn depth(depth: i32) -> Self {
        SearchLimits { depth, ..SearchLimits::default() }
    }
}

/// Progress after a completed iteration
#[derive(Clone, Debug)]
pub struct SearchInfo {
    pub depth: i32,
    pub seldepth: usize,
    pub score: i32,
    pub nodes: u64,
    pub time: Duration,
    pub hashfull: usize,
    pub pv: Vec<Move>,
}

impl SearchInfo {
    pub fn nps(&self) -> u64 {
        let ms = self.time.as_millis() as u64;
        if ms == 0 { 0 } else { self.nodes * 1000 / ms }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SearchResult {
    pub best_move: Option<Move>,
    pub ponder: Option<Move>,
    pub score: i32,
    /// Last fully completed iteration, 0 if none finished
    pub depth: i32,
    pub nodes: u64,
    pub pv: Vec<Move>,
}

// ============================================================================
// SEARCHER
// ============================================================================

pub struct Searcher {
    pos: Position,
    /// Game history followed by the current search path
    hashes: Vec<u64>,
    tt: Arc<TranspositionTable>,
    token: SearchToken,

    nodes: u64,
    flushed: u64,
    shared_nodes: Arc<AtomicU64>,
    stopped: bool,
    seldepth: usize,

    killers: [[Move; 2]; MAX_PLY],
    history: Box<[[[i32; 64]; 64]; 2]>,

    pv_table: Vec<[Move; MAX_PLY]>,
    pv_len: [usize; MAX_PLY],
    prev_pv: Vec<Move>,
    follow_pv: bool,
}

impl Searcher {
    /// `history` holds the hash of every game position, the root last
    pub fn new(
        pos: Position,
        history: &[u64],
        tt: Arc<TranspositionTable>,
        token: SearchToken,
        shared_nodes: Arc<AtomicU64>,
    ) -> Self {
        let mut hashes = Vec::with_capacity(history.len() + MAX_PLY);
        hashes.extend_from_slice(history);
        if hashes.last() != Some(&pos.hash) {
            hashes.push(pos.hash);
        }

        Searcher {
            pos,
            hashes,
            tt,
            token,
            nodes: 0,
            flushed: 0,
            shared_nodes,
            stopped: false,
            seldepth: 0,
            killers: [[Move::NULL; 2]; MAX_PLY],
            history: Box::new([[[0; 64]; 64]; 2]),
            pv_table: vec![[Move::NULL; MAX_PLY]; MAX_PLY],
            pv_len: [0; MAX_PLY],
            prev_pv: Vec::new(),
            follow_pv: false,
        }
    }

    /// Searcher with its own node counter
    pub fn from_game(game: &Game, tt: Arc<TranspositionTable>, token: SearchToken) -> Self {
        Searcher::new(*game.position(), game.history(), tt, token, Arc::new(AtomicU64::new(0)))
    }

    pub fn nodes(&self) -> u64 {
        self.nodes
    }

    /// Iterative deepening; `report` is called after every completed iteration
    pub fn search<F: FnMut(&SearchInfo)>(&mut self, limits: SearchLimits, mut report: F) -> SearchResult {
        let root_moves = generate_legal(&self.pos);
        let mut result = SearchResult { best_move: root_moves.first().copied(), ..SearchResult::default() };

        if root_moves.is_empty() {
            result.score = if self.pos.in_check { -CHECKMATE } else { 0 };
            return result;
        }

        let max_depth = limits.depth.clamp(1, MAX_DEPTH);
        let mut score = 0;

        for depth in limits.start_depth.clamp(1, max_depth)..=max_depth {
            self.age_history();
            self.seldepth = 0;

            let Some(found) = self.aspiration(depth, score) else {
                break;
            };
            score = found;

            let pv = self.pv_table[0][..self.pv_len[0]].to_vec();
            if pv.is_empty() {
                break;
            }

            result.best_move = Some(pv[0]);
            result.ponder = pv.get(1).copied();
            result.score = score;
            result.depth = depth;
            result.pv = pv.clone();
            self.prev_pv = pv;

            let info = SearchInfo {
                depth,
                seldepth: self.seldepth,
                score,
                nodes: self.total_nodes(),
                time: self.token.elapsed(),
                hashfull: self.tt.hashfull(),
                pv: result.pv.clone(),
            };
            debug!("depth {} score {} nodes {} pv {}", depth, score, info.nodes, result.pv.len());
            report(&info);

            // reductions can hide a shorter mate, so only trust one well inside the horizon
            if mate_in(score).is_some() && 2 * (CHECKMATE - score.abs()) <= depth {
                break;
            }
        }

        self.flush_nodes();
        result.nodes = self.nodes;
        result
    }

    /// One iteration, re-searched with wider windows until the score lands inside.
    /// `None` if the search was stopped first.
    fn aspiration(&mut self, depth: i32, previous: i32) -> Option<i32> {
        let mut window = ASPIRATION_WINDOW;
        let (mut alpha, mut beta) = if depth >= ASPIRATION_START_DEPTH {
            (previous - window, previous + window)
        } else {
            (-INFINITY, INFINITY)
        };

        loop {
            self.follow_pv = true;
            let score = self.pvs(depth, 0, alpha, beta, true);
            if self.stopped {
                return None;
            }
            if score > alpha && score < beta {
                return Some(score);
            }

            trace!("depth {} score {} outside ({}, {})", depth, score, alpha, beta);
            window *= 2;
            if window > ASPIRATION_LIMIT {
                alpha = -INFINITY;
                beta = INFINITY;
            } else {
                alpha = (previous - window).max(-INFINITY);
                beta = (previous + window).min(INFINITY);
            }
        }
    }

    // ========================================================================
    // PRINCIPAL VARIATION SEARCH
    // ========================================================================

    fn pvs(&mut self, mut depth: i32, ply: usize, mut alpha: i32, beta: i32, allow_null: bool) -> i32 {
        self.pv_len[ply] = ply;
        if self.check_stop() {
            return 0;
        }
        self.count_node();

        let in_check = self.pos.in_check;
        if depth <= 0 {
            if !in_check {
                return self.quiescence(ply, alpha, beta);
            }
            depth = 1;
        }

        if ply >= MAX_PLY - 1 {
            return evaluate(&self.pos);
        }
        self.seldepth = self.seldepth.max(ply);

        if ply > 0 && (self.pos.halfmove >= 100 || self.pos.insufficient_material() || self.is_repetition()) {
            return 0;
        }

        let pv_node = beta - alpha > 1;
        let hash = self.pos.hash;

        let mut tt_move = Move::NULL;
        if let Some(entry) = self.tt.probe(hash) {
            tt_move = entry.mv;
            if !pv_node && ply > 0 && entry.depth as i32 >= depth {
                let score = score_from_tt(entry.score as i32, ply);
                match entry.bound {
                    Bound::Exact => return score,
                    Bound::Lower if score >= beta => return score,
                    Bound::Upper if score <= alpha => return score,
                    _ => {}
                }
            }
        }

        // Null Move Pruning
        if allow_null
            && !pv_node
            && ply > 0
            && !in_check
            && depth >= NMP_MIN_DEPTH
            && popcount(self.pos.occupancy[BOTH]) >= NMP_MIN_PIECES
            && !self.pos.is_pawn_only()
        {
            let reduction = 3 + depth / 6;
            let snapshot = self.pos.make_null_move();
            self.hashes.push(self.pos.hash);
            let score = -self.pvs(depth - reduction - 1, ply + 1, -beta, -beta + 1, false);
            self.hashes.pop();
            self.pos.restore(snapshot);

            if self.stopped {
                return 0;
            }
            if score >= beta {
                return if score >= MATE_THRESHOLD { beta } else { score };
            }
        }

        let moves = generate_legal(&self.pos);
        if moves.is_empty() {
            return if in_check { ply as i32 - CHECKMATE } else { 0 };
        }
        let ordered = self.order_moves(&moves, tt_move, ply);

        let mut best_score = -INFINITY;
        let mut best_move = Move::NULL;
        let mut bound = Bound::Upper;

        for (index, &(mv, _)) in ordered.iter().enumerate() {
            let snapshot = self.pos.make_move(mv);
            self.hashes.push(self.pos.hash);

            let score = if index == 0 {
                let score = -self.pvs(depth - 1, ply + 1, -beta, -alpha, true);
                self.follow_pv = false;
                score
            } else {
                let reduction = if !pv_node
                    && depth >= LMR_MIN_DEPTH
                    && index >= LMR_FULL_DEPTH_MOVES
                    && mv.is_quiet()
                    && !in_check
                    && !self.pos.in_check
                    && !self.is_killer(ply, mv)
                {
                    (1 + index as i32 / 8).min(depth - 2)
                } else {
                    0
                };

                let mut score = -self.pvs(depth - 1 - reduction, ply + 1, -alpha - 1, -alpha, true);
                if reduction > 0 && score > alpha {
                    score = -self.pvs(depth - 1, ply + 1, -alpha - 1, -alpha, true);
                }
                if score > alpha && score < beta {
                    score = -self.pvs(depth - 1, ply + 1, -beta, -alpha, true);
                }
                score
            };

            self.hashes.pop();
            self.pos.restore(snapshot);

            // result of an interrupted subtree is meaningless
            if self.stopped {
                return 0;
            }

            if score > best_score {
                best_score = score;
                best_move = mv;

                if score > alpha {
                    alpha = score;
                    bound = Bound::Exact;
                    self.update_pv(ply, mv);

                    if score >= beta {
                        bound = Bound::Lower;
                        if mv.is_quiet() {
                            self.record_cutoff(mv, ply, depth);
                        }
                        break;
                    }
                }
            }
        }

        self.tt.store(hash, best_move, depth, bound, score_to_tt(best_score, ply));
        best_score
    }

    // ========================================================================
    // QUIESCENCE SEARCH
    // ========================================================================

    fn quiescence(&mut self, ply: usize, mut alpha: i32, beta: i32) -> i32 {
        self.pv_len[ply] = ply;
        if self.check_stop() {
            return 0;
        }
        self.count_node();
        self.seldepth = self.seldepth.max(ply);

        if ply >= MAX_PLY - 1 {
            return evaluate(&self.pos);
        }

        let in_check = self.pos.in_check;
        let stand_pat = if in_check { -INFINITY } else { evaluate(&self.pos) };

        if !in_check {
            if stand_pat >= beta {
                return stand_pat;
            }
            alpha = alpha.max(stand_pat);
        }

        // in check every evasion is searched, so an empty list is mate
        let moves = if in_check { generate_legal(&self.pos) } else { generate_captures(&self.pos) };
        if in_check && moves.is_empty() {
            return ply as i32 - CHECKMATE;
        }

        let mut best_score = stand_pat;
        for (mv, _) in self.order_moves(&moves, Move::NULL, ply) {
            if !in_check && stand_pat + self.material_gain(mv) + DELTA_MARGIN <= alpha {
                continue;
            }

            let snapshot = self.pos.make_move(mv);
            let score = -self.quiescence(ply + 1, -beta, -alpha);
            self.pos.restore(snapshot);

            if self.stopped {
                return 0;
            }

            if score > best_score {
                best_score = score;
                if score > alpha {
                    alpha = score;
                    if score >= beta {
                        break;
                    }
                }
            }
        }

        best_score
    }

    /// Most material a capture or promotion can win
    fn material_gain(&self, mv: Move) -> i32 {
        let mut gain = self.victim(mv).map_or(0, |piece| PIECE_VALUES[piece]);
        if let Some(promo) = mv.promotion() {
            gain += PIECE_VALUES[promo] - PIECE_VALUES[PAWN];
        }
        gain
    }

    // ========================================================================
    // MOVE ORDERING
    // ========================================================================

    fn victim(&self, mv: Move) -> Option<usize> {
        if mv.is_en_passant() {
            Some(PAWN)
        } else if mv.is_capture() {
            self.pos.piece_on(opponent(self.pos.side), mv.to())
        } else {
            None
        }
    }

    /// Moves sorted best first: PV move, table move, captures by MVV-LVA,
    /// killers, then history.
    fn order_moves(&mut self, moves: &MoveList, tt_move: Move, ply: usize) -> Vec<(Move, i32)> {
        let pv_move = if self.follow_pv {
            self.prev_pv.get(ply).copied().filter(|pv| moves.contains(pv))
        } else {
            None
        };
        self.follow_pv = pv_move.is_some();

        let side = self.pos.side;
        let mut scored: Vec<(Move, i32)> = moves
            .iter()
            .map(|&mv| {
                let score = if Some(mv) == pv_move {
                    PV_MOVE_SCORE
                } else if !tt_move.is_null() && mv == tt_move {
                    TT_MOVE_SCORE
                } else if let Some(victim) = self.victim(mv) {
                    CAPTURE_SCORE + mvv_lva(victim, mv.piece()) + mv.promotion().map_or(0, |p| PIECE_VALUES[p])
                } else if mv.promotion() == Some(QUEEN) {
                    CAPTURE_SCORE + PIECE_VALUES[QUEEN]
                } else if mv == self.killers[ply][0] {
                    KILLER_SCORES[0]
                } else if mv == self.killers[ply][1] {
                    KILLER_SCORES[1]
                } else {
                    self.history[side][mv.from()][mv.to()]
                };
                (mv, score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored
    }

    fn is_killer(&self, ply: usize, mv: Move) -> bool {
        self.killers[ply].contains(&mv)
    }

    fn record_cutoff(&mut self, mv: Move, ply: usize, depth: i32) {
        if self.killers[ply][0] != mv {
            self.killers[ply][1] = self.killers[ply][0];
            self.killers[ply][0] = mv;
        }
        let side = self.pos.side;
        let entry = &mut self.history[side][mv.from()][mv.to()];
        *entry = (*entry + depth * depth).min(HISTORY_MAX);
    }

    fn age_history(&mut self) {
        for entry in self.history.iter_mut().flatten().flatten() {
            *entry /= 2;
        }
    }

    fn update_pv(&mut self, ply: usize, mv: Move) {
        let end = self.pv_len[ply + 1].max(ply + 1);
        let (head, tail) = self.pv_table.split_at_mut(ply + 1);
        head[ply][ply] = mv;
        head[ply][ply + 1..end].copy_from_slice(&tail[0][ply + 1..end]);
        self.pv_len[ply] = end;
    }

    // ========================================================================
    // DRAWS, NODES, CANCELLATION
    // ========================================================================

    /// One earlier occurrence is enough inside the tree
    fn is_repetition(&self) -> bool {
        repetitions(&self.hashes, self.pos.halfmove) > 0
    }

    #[inline]
    fn check_stop(&mut self) -> bool {
        if !self.stopped && self.token.is_stopped() {
            self.stopped = true;
        }
        self.stopped
    }

    #[inline]
    fn count_node(&mut self) {
        self.nodes += 1;
        if self.nodes % CHECK_INTERVAL == 0 {
            self.flush_nodes();
            if self.token.past_deadline() {
                self.token.stop();
            }
        }
    }

    fn flush_nodes(&mut self) {
        self.shared_nodes.fetch_add(self.nodes - self.flushed, Ordering::Relaxed);
        self.flushed = self.nodes;
    }

    fn total_nodes(&self) -> u64 {
        self.shared_nodes.load(Ordering::Relaxed) + (self.nodes - self.flushed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(fen: &str, depth: i32) -> SearchResult {
        let game = Game::from_fen(fen).expect("fen");
        let tt = Arc::new(TranspositionTable::new(4));
        let mut searcher = Searcher::from_game(&game, tt, SearchToken::unbounded());
        searcher.search(SearchLimits::depth(depth), |_| {})
    }

    #[test]
    fn mate_scores_convert_to_moves() {
        assert_eq!(mate_in(CHECKMATE - 1), Some(1));
        assert_eq!(mate_in(CHECKMATE - 5), Some(3));
        assert_eq!(mate_in(2 - CHECKMATE), Some(-1));
        assert_eq!(mate_in(6 - CHECKMATE), Some(-3));
        assert_eq!(mate_in(350), None);
    }

    #[test]
    fn finds_back_rank_mate() {
        let result = run("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1", 4);
        assert_eq!(result.best_move.map(|m| m.to_uci()), Some("a1a8".to_string()));
        assert_eq!(mate_in(result.score), Some(1));
    }

    #[test]
    fn takes_a_hanging_queen() {
        let result = run("4k3/8/8/3q4/8/8/3R4/4K3 w - - 0 1", 3);
        assert_eq!(result.best_move.map(|m| m.to_uci()), Some("d2d5".to_string()));
    }

    #[test]
    fn no_moves_at_the_root() {
        let mated = run("R5k1/5ppp/8/8/8/8/8/6K1 b - - 0 1", 3);
        assert_eq!(mated.best_move, None);
        assert_eq!(mated.score, -CHECKMATE);

        let stalemate = run("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1", 3);
        assert_eq!(stalemate.best_move, None);
        assert_eq!(stalemate.score, 0);
    }

    #[test]
    fn pv_starts_with_best_move_and_ponder() {
        let result = run(crate::board::STARTING_FEN, 4);
        assert_eq!(result.depth, 4);
        assert_eq!(result.pv.first().copied(), result.best_move);
        assert_eq!(result.pv.get(1).copied(), result.ponder);
    }

    #[test]
    fn stopped_search_still_returns_a_legal_move() {
        let game = Game::new();
        let tt = Arc::new(TranspositionTable::new(1));
        let token = SearchToken::unbounded();
        token.stop();
        let mut searcher = Searcher::from_game(&game, tt, token);
        let result = searcher.search(SearchLimits::default(), |_| {});
        assert_eq!(result.depth, 0);
        assert!(result.best_move.is_some());
    }

    #[test]
    fn update_pv_copies_child_line() {
        let game = Game::new();
        let mut searcher = Searcher::from_game(&game, Arc::new(TranspositionTable::new(1)), SearchToken::unbounded());
        let a = Move::new(12, 28, PAWN);
        let b = Move::new(52, 36, PAWN);
        searcher.pv_len[2] = 2;
        searcher.update_pv(1, b);
        searcher.update_pv(0, a);
        assert_eq!(&searcher.pv_table[0][..searcher.pv_len[0]], &[a, b]);
    }
}
