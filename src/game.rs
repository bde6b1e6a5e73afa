//! Kestrel - Game record
//!
//! The current position plus the hash of every position since setup. The
//! search continues this history along its own path to detect repetitions
//! that span the game and the tree.

use log::warn;

use crate::board::{Position, STARTING_FEN};
use crate::error::EngineResult;
use crate::move_generator::find_legal;
use crate::moves::Move;

#[derive(Clone, Debug)]
pub struct Game {
    position: Position,
    history: Vec<u64>,
}

impl Game {
    pub fn new() -> Self {
        Game::from_position(Position::new())
    }

    pub fn from_position(position: Position) -> Self {
        Game { history: vec![position.hash], position }
    }

    pub fn from_fen(fen: &str) -> EngineResult<Self> {
        Ok(Game::from_position(Position::from_fen(fen)?))
    }

    /// Set up from FEN (or the start position) and replay coordinate moves.
    /// Stops at the first illegal move and reports it as `Ok(false)`.
    pub fn setup<S: AsRef<str>>(fen: Option<&str>, moves: &[S]) -> EngineResult<(Self, bool)> {
        let mut game = Game::from_fen(fen.unwrap_or(STARTING_FEN))?;
        for text in moves {
            if !game.play_uci(text.as_ref()) {
                warn!("illegal move '{}' in position {}", text.as_ref(), game.position.to_fen());
                return Ok((game, false));
            }
        }
        Ok((game, true))
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Hashes of every position so far, the current one last
    pub fn history(&self) -> &[u64] {
        &self.history
    }

    /// Play a move given in coordinate notation; `false` if it is not legal
    pub fn play_uci(&mut self, text: &str) -> bool {
        match find_legal(&self.position, text) {
            Some(mv) => {
                self.play(mv);
                true
            }
            None => false,
        }
    }

    /// Play a move already known to be legal
    pub fn play(&mut self, mv: Move) {
        let _ = self.position.make_move(mv);
        self.history.push(self.position.hash);
    }

    /// Current position occurred at least twice before since the last irreversible move
    pub fn is_threefold(&self) -> bool {
        repetitions(&self.history, self.position.halfmove) >= 2
    }
}

impl Default for Game {
    fn default() -> Self {
        Game::new()
    }
}

/// Earlier occurrences of the last hash in `history`.
///
/// Only every second ply can match (same side to move) and nothing before
/// the last capture or pawn move can.
pub fn repetitions(history: &[u64], halfmove: u32) -> usize {
    let Some((&current, earlier)) = history.split_last() else {
        return 0;
    };
    let len = earlier.len();
    let oldest = len.saturating_sub(halfmove as usize);

    (oldest..len.saturating_sub(1))
        .rev()
        .step_by(2)
        .filter(|&i| earlier[i] == current)
        .count()
}
