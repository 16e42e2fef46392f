//! Engine configuration.

use std::path::PathBuf;

/// Runtime configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Journal directory shared with the sequencer.
    pub journal_dir: PathBuf,
    /// Maximum price levels per side in published book snapshots.
    pub order_book_depth: usize,
    /// Run the internal consistency audit after every event. Too slow
    /// for production traffic.
    pub debug_mode: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            journal_dir: PathBuf::from("./journal"),
            order_book_depth: 100,
            debug_mode: false,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            journal_dir: std::env::var("TRADING_JOURNAL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.journal_dir),
            order_book_depth: std::env::var("TRADING_BOOK_DEPTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.order_book_depth),
            debug_mode: std::env::var("TRADING_DEBUG")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.debug_mode),
        }
    }
}
