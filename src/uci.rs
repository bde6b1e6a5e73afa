//! Kestrel - UCI Protocol Module
//!
//! This module implements the Universal Chess Interface (UCI) protocol,
//! allowing the engine to communicate with chess GUIs. Commands are parsed
//! into a closed `Command` enum and dispatched with one exhaustive match.

use std::io::{self, BufRead, Write};
use std::time::Instant;

use log::{debug, warn};

use crate::board::STARTING_FEN;
use crate::clock::Clock;
use crate::config::{EngineOptions, OptionEffect};
use crate::game::Game;
use crate::move_generator::generate_legal;
use crate::moves::Move;
use crate::parallel_search::{ParallelSearchEngine, SearchRequest};
use crate::perft::divide;
use crate::search::{mate_in, SearchInfo, SearchResult};

// Engine identification
const ENGINE_NAME: &str = "Kestrel";
const ENGINE_AUTHOR: &str = "the Kestrel developers";
const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

const BENCH_DEPTH: i32 = 5;
const BENCH_POSITIONS: [&str; 3] = [
    STARTING_FEN,
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
];

// ============================================================================
// COMMANDS
// ============================================================================

/// Parameters of a `go` command; times in milliseconds
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GoParams {
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub winc: Option<u64>,
    pub binc: Option<u64>,
    pub movestogo: Option<u32>,
    pub movetime: Option<u64>,
    pub depth: Option<i32>,
    pub infinite: bool,
    pub ponder: bool,
    /// `go perft N`
    pub perft: Option<u32>,
}

impl GoParams {
    fn parse(args: &[&str]) -> Self {
        fn value<T: std::str::FromStr>(args: &[&str], i: usize) -> Option<T> {
            args.get(i + 1).and_then(|s| s.parse().ok())
        }

        let mut params = GoParams::default();
        let mut i = 0;
        while i < args.len() {
            let consumed = match args[i] {
                "wtime" => {
                    params.wtime = value(args, i);
                    2
                }
                "btime" => {
                    params.btime = value(args, i);
                    2
                }
                "winc" => {
                    params.winc = value(args, i);
                    2
                }
                "binc" => {
                    params.binc = value(args, i);
                    2
                }
                "movestogo" => {
                    params.movestogo = value(args, i);
                    2
                }
                "movetime" => {
                    params.movetime = value(args, i);
                    2
                }
                "depth" => {
                    params.depth = value(args, i);
                    2
                }
                "perft" => {
                    params.perft = value(args, i);
                    2
                }
                "infinite" => {
                    params.infinite = true;
                    1
                }
                "ponder" => {
                    params.ponder = true;
                    1
                }
                _ => 1,
            };
            i += consumed;
        }
        params
    }

    pub fn clock(&self, overhead: u64) -> Clock {
        Clock {
            wtime: self.wtime,
            btime: self.btime,
            winc: self.winc.unwrap_or(0),
            binc: self.binc.unwrap_or(0),
            movestogo: self.movestogo,
            movetime: self.movetime,
            infinite: self.infinite,
            overhead,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Uci,
    Debug(bool),
    IsReady,
    SetOption { name: String, value: Option<String> },
    UciNewGame,
    /// `fen` is `None` for `startpos`
    Position { fen: Option<String>, moves: Vec<String> },
    Go(GoParams),
    Stop,
    PonderHit,
    Quit,
    Display,
    Perft(u32),
    Bench,
    Unknown(String),
}

impl Command {
    /// `None` for a blank line
    pub fn parse(line: &str) -> Option<Command> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let (&command, args) = parts.split_first()?;

        let parsed = match command {
            "uci" => Command::Uci,
            "debug" => Command::Debug(args.first() == Some(&"on")),
            "isready" => Command::IsReady,
            "setoption" => Self::parse_setoption(args),
            "ucinewgame" => Command::UciNewGame,
            "position" => Self::parse_position(args),
            "go" => Command::Go(GoParams::parse(args)),
            "stop" => Command::Stop,
            "ponderhit" => Command::PonderHit,
            "quit" => Command::Quit,
            "d" => Command::Display,
            "perft" => Command::Perft(args.first().and_then(|s| s.parse().ok()).unwrap_or(1)),
            "bench" => Command::Bench,
            _ => Command::Unknown(line.trim().to_string()),
        };
        Some(parsed)
    }

    fn parse_setoption(args: &[&str]) -> Command {
        let args = match args.split_first() {
            Some((&"name", rest)) => rest,
            _ => args,
        };
        match args.iter().position(|&a| a == "value") {
            Some(i) => Command::SetOption {
                name: args[..i].join(" "),
                value: Some(args[i + 1..].join(" ")),
            },
            None => Command::SetOption { name: args.join(" "), value: None },
        }
    }

    fn parse_position(args: &[&str]) -> Command {
        let moves_at = args.iter().position(|&a| a == "moves");
        let setup = &args[..moves_at.unwrap_or(args.len())];
        let moves = moves_at
            .map(|i| args[i + 1..].iter().map(|m| m.to_string()).collect())
            .unwrap_or_default();

        let fen = match setup.split_first() {
            Some((&"fen", fields)) => Some(fields.join(" ")),
            _ => None,
        };
        Command::Position { fen, moves }
    }
}

// ============================================================================
// OUTPUT FORMATTING
// ============================================================================

/// `cp <n>` or `mate <n>`
pub fn format_score(score: i32) -> String {
    match mate_in(score) {
        Some(moves) => format!("mate {}", moves),
        None => format!("cp {}", score),
    }
}

pub fn format_info(info: &SearchInfo) -> String {
    let pv: Vec<String> = info.pv.iter().map(|m| m.to_uci()).collect();
    format!(
        "info depth {} seldepth {} score {} nodes {} nps {} time {} hashfull {} pv {}",
        info.depth,
        info.seldepth,
        format_score(info.score),
        info.nodes,
        info.nps(),
        info.time.as_millis(),
        info.hashfull,
        pv.join(" ")
    )
}

pub fn format_bestmove(result: &SearchResult) -> String {
    match (result.best_move, result.ponder) {
        (Some(best), Some(ponder)) => format!("bestmove {} ponder {}", best, ponder),
        (Some(best), None) => format!("bestmove {}", best),
        (None, _) => format!("bestmove {}", Move::NULL),
    }
}

fn send(message: &str) {
    let mut stdout = io::stdout().lock();
    // a closed pipe means the GUI is gone; nothing left to report to
    let _ = writeln!(stdout, "{}", message);
    let _ = stdout.flush();
}

// ============================================================================
// PROTOCOL HANDLER
// ============================================================================

/// UCI protocol handler
pub struct UCIProtocol {
    game: Game,
    engine: ParallelSearchEngine,
    options: EngineOptions,
    running: bool,
    debug_mode: bool,
}

impl UCIProtocol {
    pub fn new() -> Self {
        let options = EngineOptions::default();
        UCIProtocol {
            game: Game::new(),
            engine: ParallelSearchEngine::new(options.hash_mb, options.threads),
            options,
            running: true,
            debug_mode: false,
        }
    }

    pub fn run(&mut self) {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if let Some(command) = Command::parse(&line) {
                self.process_command(command);
            }
            if !self.running {
                break;
            }
        }
        self.engine.stop();
    }

    pub fn process_command(&mut self, command: Command) {
        debug!("command: {:?}", command);
        match command {
            Command::Uci => self.cmd_uci(),
            Command::Debug(on) => self.debug_mode = on,
            Command::IsReady => self.cmd_isready(),
            Command::SetOption { name, value } => self.cmd_setoption(&name, value.as_deref()),
            Command::UciNewGame => self.cmd_ucinewgame(),
            Command::Position { fen, moves } => self.cmd_position(fen.as_deref(), &moves),
            Command::Go(params) => self.cmd_go(params),
            Command::Stop => self.engine.stop(),
            Command::PonderHit => self.engine.ponderhit(),
            Command::Quit => self.running = false,
            Command::Display => self.cmd_display(),
            Command::Perft(depth) => self.cmd_perft(depth),
            Command::Bench => self.cmd_bench(),
            Command::Unknown(line) => {
                warn!("unknown command: {}", line);
                if self.debug_mode {
                    send(&format!("info string Unknown command: {}", line));
                }
            }
        }
    }

    fn cmd_uci(&self) {
        send(&format!("id name {} {}", ENGINE_NAME, ENGINE_VERSION));
        send(&format!("id author {}", ENGINE_AUTHOR));
        for option in self.options.table() {
            send(&option.to_uci_string());
        }
        send("uciok");
    }

    fn cmd_isready(&mut self) {
        self.engine.wait_if_bounded();
        send("readyok");
    }

    fn cmd_setoption(&mut self, name: &str, value: Option<&str>) {
        match self.options.set(name, value) {
            Ok(OptionEffect::ResizeHash(mb)) => self.engine.set_hash(mb),
            Ok(OptionEffect::SetThreads(threads)) => self.engine.set_threads(threads),
            Ok(OptionEffect::ClearHash) => self.engine.clear_tt(),
            Ok(OptionEffect::Stored) => {}
            Err(err) => {
                warn!("setoption: {}", err);
                if self.debug_mode {
                    send(&format!("info string {}", err));
                }
                return;
            }
        }
        if self.debug_mode {
            send(&format!("info string Option {} set", name));
        }
    }

    fn cmd_ucinewgame(&mut self) {
        self.engine.clear_tt();
        self.game = Game::new();
    }

    fn cmd_position(&mut self, fen: Option<&str>, moves: &[String]) {
        self.engine.stop();
        match Game::setup(fen, moves) {
            Ok((game, _)) => self.game = game,
            Err(err) => {
                warn!("position rejected: {}", err);
                if self.debug_mode {
                    send(&format!("info string {}", err));
                }
            }
        }
    }

    fn cmd_go(&mut self, params: GoParams) {
        if let Some(depth) = params.perft {
            self.cmd_perft(depth);
            return;
        }

        let request = SearchRequest {
            game: self.game.clone(),
            clock: params.clock(self.options.move_overhead),
            depth: params.depth,
            ponder: params.ponder,
        };
        self.engine.start(
            request,
            |info| send(&format_info(info)),
            |result| send(&format_bestmove(&result)),
        );
    }

    fn cmd_display(&self) {
        let pos = self.game.position();
        send(&pos.display());
        send(&format!("FEN: {}", pos.to_fen()));
        send(&format!("Hash: {:016x}", pos.hash));
        send(&format!("In check: {}", pos.in_check));

        let legal_moves = generate_legal(pos);
        let list: Vec<String> = legal_moves.iter().map(|m| m.to_uci()).collect();
        send(&format!("Legal moves ({}): {}", legal_moves.len(), list.join(" ")));
    }

    fn cmd_perft(&mut self, depth: u32) {
        self.engine.stop();
        let start = Instant::now();
        let mut pos = *self.game.position();

        let split = divide(&mut pos, depth);
        for (mv, nodes) in &split {
            send(&format!("{}: {}", mv, nodes));
        }
        let total: u64 = split.iter().map(|(_, n)| n).sum();
        let total = if depth == 0 { 1 } else { total };

        send("");
        send(&format!("Nodes: {}", total));
        send(&format!("Time: {} ms", start.elapsed().as_millis()));
    }

    fn cmd_bench(&mut self) {
        let start = Instant::now();
        let mut total_nodes = 0u64;

        for fen in BENCH_POSITIONS {
            let game = match Game::from_fen(fen) {
                Ok(game) => game,
                Err(err) => {
                    warn!("bench position rejected: {}", err);
                    continue;
                }
            };
            self.engine.clear_tt();
            let request = SearchRequest { game, depth: Some(BENCH_DEPTH), ..SearchRequest::default() };
            total_nodes += self.engine.search_blocking(request, |_| {}).nodes;
        }

        let elapsed_secs = start.elapsed().as_secs_f64();
        let nps = if elapsed_secs > 0.0 { (total_nodes as f64 / elapsed_secs) as u64 } else { 0 };
        send(&format!(
            "info string Benchmark: {} nodes in {:.2}s ({} nps)",
            total_nodes, elapsed_secs, nps
        ));
    }
}

impl Default for UCIProtocol {
    fn default() -> Self {
        UCIProtocol::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::CHECKMATE;
    use std::time::Duration;

    #[test]
    fn parses_position_commands() {
        assert_eq!(
            Command::parse("position startpos moves e2e4 e7e5"),
            Some(Command::Position { fen: None, moves: vec!["e2e4".into(), "e7e5".into()] })
        );
        assert_eq!(
            Command::parse("position fen 8/8/8/8/8/8/8/K6k w - - 0 1"),
            Some(Command::Position { fen: Some("8/8/8/8/8/8/8/K6k w - - 0 1".into()), moves: vec![] })
        );
    }

    #[test]
    fn parses_go_parameters() {
        let Some(Command::Go(params)) =
            Command::parse("go ponder wtime 60000 btime 55000 winc 1000 binc 1000 movestogo 20")
        else {
            panic!("not a go command");
        };
        assert!(params.ponder);
        assert_eq!(params.wtime, Some(60000));
        assert_eq!(params.binc, Some(1000));
        assert_eq!(params.movestogo, Some(20));

        let clock = params.clock(30);
        assert_eq!(clock.winc, 1000);
        assert_eq!(clock.overhead, 30);

        assert_eq!(Command::parse("go perft 3"), Some(Command::Go(GoParams { perft: Some(3), ..GoParams::default() })));
        assert_eq!(
            Command::parse("go infinite"),
            Some(Command::Go(GoParams { infinite: true, ..GoParams::default() }))
        );
    }

    #[test]
    fn parses_setoption_with_spaces() {
        assert_eq!(
            Command::parse("setoption name Move Overhead value 120"),
            Some(Command::SetOption { name: "Move Overhead".into(), value: Some("120".into()) })
        );
        assert_eq!(
            Command::parse("setoption name Clear Hash"),
            Some(Command::SetOption { name: "Clear Hash".into(), value: None })
        );
    }

    #[test]
    fn blank_and_unknown_lines() {
        assert_eq!(Command::parse("   "), None);
        assert_eq!(Command::parse("xyzzy 1 2"), Some(Command::Unknown("xyzzy 1 2".into())));
        assert_eq!(Command::parse("ponderhit"), Some(Command::PonderHit));
    }

    #[test]
    fn score_and_bestmove_formatting() {
        assert_eq!(format_score(35), "cp 35");
        assert_eq!(format_score(CHECKMATE - 3), "mate 2");
        assert_eq!(format_score(4 - CHECKMATE), "mate -2");

        let best = Move::new(12, 28, crate::types::PAWN);
        let reply = Move::new(52, 36, crate::types::PAWN);
        let result = SearchResult { best_move: Some(best), ponder: Some(reply), ..SearchResult::default() };
        assert_eq!(format_bestmove(&result), "bestmove e2e4 ponder e7e5");
        assert_eq!(format_bestmove(&SearchResult::default()), "bestmove 0000");
    }

    #[test]
    fn info_line_layout() {
        let info = SearchInfo {
            depth: 3,
            seldepth: 5,
            score: -12,
            nodes: 2000,
            time: Duration::from_millis(100),
            hashfull: 7,
            pv: vec![Move::new(6, 21, crate::types::KNIGHT)],
        };
        assert_eq!(
            format_info(&info),
            "info depth 3 seldepth 5 score cp -12 nodes 2000 nps 20000 time 100 hashfull 7 pv g1f3"
        );
    }

    #[test]
    fn illegal_setup_move_keeps_earlier_moves() {
        let mut uci = UCIProtocol::new();
        uci.process_command(Command::Position { fen: None, moves: vec!["e2e4".into(), "e2e5".into()] });
        assert_eq!(uci.game.history().len(), 2);
    }
}
