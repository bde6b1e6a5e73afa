//! Kestrel - Engine Options
//!
//! Settings a GUI can change through `setoption`, and the option table the
//! engine advertises in reply to `uci`.

use crate::clock::DEFAULT_MOVE_OVERHEAD;
use crate::error::{EngineError, EngineResult};

pub const DEFAULT_HASH_MB: usize = 64;
const MAX_HASH_MB: i64 = 4096;
const MAX_THREADS: i64 = 256;
const MAX_OVERHEAD_MS: i64 = 5000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineOptions {
    pub hash_mb: usize,
    pub threads: usize,
    pub move_overhead: u64,
    pub ponder: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            hash_mb: DEFAULT_HASH_MB,
            threads: num_cpus::get().max(1),
            move_overhead: DEFAULT_MOVE_OVERHEAD,
            ponder: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionKind {
    Spin { default: i64, min: i64, max: i64 },
    Check { default: bool },
    Button,
}

/// UCI option representation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UciOption {
    pub name: &'static str,
    pub kind: OptionKind,
}

impl UciOption {
    pub fn to_uci_string(&self) -> String {
        match self.kind {
            OptionKind::Spin { default, min, max } => {
                format!("option name {} type spin default {} min {} max {}", self.name, default, min, max)
            }
            OptionKind::Check { default } => {
                format!("option name {} type check default {}", self.name, default)
            }
            OptionKind::Button => format!("option name {} type button", self.name),
        }
    }
}

/// What the protocol layer must do after an option changed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionEffect {
    ResizeHash(usize),
    SetThreads(usize),
    ClearHash,
    /// Nothing beyond the stored value
    Stored,
}

impl EngineOptions {
    /// Advertised options, defaults taken from `self`
    pub fn table(&self) -> Vec<UciOption> {
        vec![
            UciOption {
                name: "Hash",
                kind: OptionKind::Spin { default: self.hash_mb as i64, min: 1, max: MAX_HASH_MB },
            },
            UciOption {
                name: "Threads",
                kind: OptionKind::Spin { default: self.threads as i64, min: 1, max: MAX_THREADS },
            },
            UciOption {
                name: "Move Overhead",
                kind: OptionKind::Spin { default: self.move_overhead as i64, min: 0, max: MAX_OVERHEAD_MS },
            },
            UciOption { name: "Ponder", kind: OptionKind::Check { default: self.ponder } },
            UciOption { name: "Clear Hash", kind: OptionKind::Button },
        ]
    }

    /// Apply `setoption name <name> [value <value>]`
    pub fn set(&mut self, name: &str, value: Option<&str>) -> EngineResult<OptionEffect> {
        let option = self
            .table()
            .into_iter()
            .find(|option| option.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| EngineError::UnknownOption { name: name.to_string() })?;

        let invalid = || EngineError::InvalidOptionValue {
            name: option.name.to_string(),
            value: value.unwrap_or("").to_string(),
        };

        match option.kind {
            OptionKind::Button => Ok(OptionEffect::ClearHash),
            OptionKind::Check { .. } => {
                let flag = match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
                    Some("true") => true,
                    Some("false") => false,
                    _ => return Err(invalid()),
                };
                self.ponder = flag;
                Ok(OptionEffect::Stored)
            }
            OptionKind::Spin { min, max, .. } => {
                let number = value
                    .and_then(|v| v.trim().parse::<i64>().ok())
                    .filter(|n| (min..=max).contains(n))
                    .ok_or_else(invalid)?;
                match option.name {
                    "Hash" => {
                        self.hash_mb = number as usize;
                        Ok(OptionEffect::ResizeHash(self.hash_mb))
                    }
                    "Threads" => {
                        self.threads = number as usize;
                        Ok(OptionEffect::SetThreads(self.threads))
                    }
                    _ => {
                        self.move_overhead = number as u64;
                        Ok(OptionEffect::Stored)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertised_options() {
        let options = EngineOptions { threads: 4, ..EngineOptions::default() };
        let lines: Vec<String> = options.table().iter().map(UciOption::to_uci_string).collect();
        assert_eq!(lines[0], "option name Hash type spin default 64 min 1 max 4096");
        assert_eq!(lines[1], "option name Threads type spin default 4 min 1 max 256");
        assert_eq!(lines[3], "option name Ponder type check default false");
        assert_eq!(lines[4], "option name Clear Hash type button");
    }

    #[test]
    fn setting_options() {
        let mut options = EngineOptions::default();
        assert_eq!(options.set("Hash", Some("128")), Ok(OptionEffect::ResizeHash(128)));
        assert_eq!(options.set("threads", Some("2")), Ok(OptionEffect::SetThreads(2)));
        assert_eq!(options.set("Move Overhead", Some("100")), Ok(OptionEffect::Stored));
        assert_eq!(options.set("Ponder", Some("true")), Ok(OptionEffect::Stored));
        assert_eq!(options.set("Clear Hash", None), Ok(OptionEffect::ClearHash));
        assert_eq!(
            options,
            EngineOptions { hash_mb: 128, threads: 2, move_overhead: 100, ponder: true }
        );
    }

    #[test]
    fn rejected_values_leave_options_unchanged() {
        let mut options = EngineOptions::default();
        let before = options;
        assert!(matches!(options.set("Hash", Some("0")), Err(EngineError::InvalidOptionValue { .. })));
        assert!(matches!(options.set("Threads", Some("many")), Err(EngineError::InvalidOptionValue { .. })));
        assert!(matches!(options.set("Ponder", None), Err(EngineError::InvalidOptionValue { .. })));
        assert!(matches!(options.set("Contempt", Some("10")), Err(EngineError::UnknownOption { .. })));
        assert_eq!(options, before);
    }
}
