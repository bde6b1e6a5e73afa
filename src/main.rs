//! Kestrel - UCI Chess Engine
//!
//! Usage:
//!     kestrel
//!
//! The engine reads UCI commands from stdin and writes responses to stdout.
//! Diagnostics go to stderr; set `RUST_LOG=debug` to see them.
//! Compatible with any UCI chess GUI (Arena, CuteChess, etc.)

use std::process::ExitCode;
use std::time::Instant;

use log::{error, info};

use kestrel_chess::magic::initialize_tables;
use kestrel_chess::uci::UCIProtocol;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let start = Instant::now();
    if let Err(err) = initialize_tables() {
        error!("attack table generation failed: {}", err);
        return ExitCode::FAILURE;
    }
    info!("attack tables ready in {:?}", start.elapsed());

    let mut uci = UCIProtocol::new();
    uci.run();
    ExitCode::SUCCESS
}
