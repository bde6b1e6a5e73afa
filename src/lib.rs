//! Kestrel - UCI Chess Engine
//!
//! A chess engine written in Rust with support for:
//! - Full FIDE chess rules
//! - Magic bitboard attack generation
//! - Legal move generation from check and pin masks
//! - Principal variation search with a lock-free transposition table
//! - Null move pruning, late move reductions, quiescence search
//! - Multi-threaded search (Lazy SMP)
//! - UCI protocol
//!
//! Call `magic::initialize_tables()` once at startup; everything else
//! reads the tables through `magic::tables()`.

pub mod types;
pub mod error;
pub mod bitboard;
pub mod magic;
pub mod zobrist;
pub mod moves;
pub mod board;
pub mod move_generator;
pub mod game;
pub mod perft;
pub mod evaluation;
pub mod tt;
pub mod clock;
pub mod search;
pub mod parallel_search;
pub mod config;
pub mod uci;
