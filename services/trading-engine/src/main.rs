use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use sequencer::{Sequencer, SequencerConfig};
use trading_engine::store::{LoggingPublisher, MemoryTradeStore};
use trading_engine::{channels, output, EngineConfig, JournalEventLog, TradingEngine};
use types::event::RawEvent;

/// Standalone trading engine: raw events as JSON lines on stdin, outputs
/// as JSON log lines.
#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = EngineConfig::from_env();
    info!(?config, "starting trading engine");

    let mut sequencer = Sequencer::open(SequencerConfig::new(&config.journal_dir))?;

    let (lanes, receivers) = channels();
    let store = Arc::new(MemoryTradeStore::new());
    let publisher = Arc::new(LoggingPublisher);
    let _workers = output::spawn_workers(receivers, store, publisher);

    let event_log = Box::new(JournalEventLog::new(&config.journal_dir));
    let mut engine = TradingEngine::new(config.clone(), event_log, lanes);

    // Rebuild state by replaying the full journal.
    let history = sequencer::reader::load_events_after(&config.journal_dir, 0)?;
    info!(events = history.len(), "replaying journal");
    if let Err(fault) = engine.process_batch(history) {
        error!("replay failed: {}", fault);
        std::process::exit(1);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let raw: RawEvent = match serde_json::from_str(line) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("ignoring malformed input line: {}", e);
                continue;
            }
        };

        // A journaling failure is fatal: nothing may proceed unjournaled.
        let events = sequencer.assign(vec![raw])?;
        if let Err(fault) = engine.process_batch(events) {
            error!("engine fault: {}", fault);
            std::process::exit(1);
        }
    }

    info!("input closed, shutting down");
    Ok(())
}
