//! Kestrel - Error Module
//!
//! Structured errors for position import, table generation, option
//! handling and perft verification. Search cancellation and illegal move
//! requests are not errors and never pass through here.

use thiserror::Error;

/// Errors produced by the engine core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// FEN string did not split into exactly six fields
    #[error("FEN must have 6 fields, found {found}")]
    FenFieldCount { found: usize },

    /// Piece placement field could not be read
    #[error("invalid piece placement '{placement}': {reason}")]
    InvalidPlacement { placement: String, reason: &'static str },

    /// Side to move was neither 'w' nor 'b'
    #[error("invalid side to move '{token}'")]
    InvalidSide { token: String },

    /// Castling field contained something other than KQkq or '-'
    #[error("invalid castling rights '{token}'")]
    InvalidCastling { token: String },

    /// En passant field was not '-' or a square on rank 3/6
    #[error("invalid en passant square '{token}'")]
    InvalidEnPassant { token: String },

    /// Half-move or full-move counter was not a number
    #[error("invalid {field} counter '{token}'")]
    InvalidCounter { field: &'static str, token: String },

    /// A side has no king or more than one
    #[error("position must contain exactly one king per side")]
    KingCount,

    /// The side that just moved left its own king in check
    #[error("side not to move is in check")]
    OpponentInCheck,

    /// Magic multiplier search ran out of candidates
    #[error("no {slider} magic found for square {square} after {attempts} attempts")]
    MagicExhausted {
        slider: &'static str,
        square: usize,
        attempts: u32,
    },

    /// Incremental hash diverged from a full recomputation
    #[error("hash mismatch after {mv}: incremental {incremental:#018x}, recomputed {recomputed:#018x}")]
    HashMismatch {
        mv: String,
        incremental: u64,
        recomputed: u64,
    },

    /// `setoption` named an option the engine does not have
    #[error("unknown option '{name}'")]
    UnknownOption { name: String },

    /// `setoption` value was missing, out of range or not a number
    #[error("invalid value '{value}' for option '{name}'")]
    InvalidOptionValue { name: String, value: String },
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
