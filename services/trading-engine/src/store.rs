//! Storage and publication seams.
//!
//! The engine core talks to the outside world through these traits so
//! tests can run against in-memory implementations and the binary can
//! wire in real backends without touching the orchestrator.

use sequencer::journal::JournalError;
use sequencer::reader::load_events_after;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing::info;
use types::event::SequencedEvent;
use types::message::{ApiResultMessage, NotificationMessage};
use types::trade::TickMessage;

use crate::output::DbWrite;
use matching_engine::book::OrderBookSnapshot;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("storage failed: {0}")]
    Storage(String),

    #[error("publish failed: {0}")]
    Publish(String),
}

/// Read access to the durable event log, used to close sequence gaps.
pub trait EventLog: Send {
    /// Every event with `sequence_id > after`, in order.
    fn load_after(&self, after: u64) -> Result<Vec<SequencedEvent>, StoreError>;
}

/// Event log backed by the sequencer's journal directory.
pub struct JournalEventLog {
    dir: PathBuf,
}

impl JournalEventLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl EventLog for JournalEventLog {
    fn load_after(&self, after: u64) -> Result<Vec<SequencedEvent>, StoreError> {
        Ok(load_events_after(&self.dir, after)?)
    }
}

/// Batched persistence of orders and match details.
pub trait TradeStore: Send + Sync {
    fn save_batch(&self, batch: &[DbWrite]) -> Result<(), StoreError>;
}

/// In-memory trade store, for tests and standalone runs.
#[derive(Debug, Default)]
pub struct MemoryTradeStore {
    rows: Mutex<Vec<DbWrite>>,
}

impl MemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<DbWrite> {
        self.rows.lock().expect("store mutex poisoned").clone()
    }
}

impl TradeStore for MemoryTradeStore {
    fn save_batch(&self, batch: &[DbWrite]) -> Result<(), StoreError> {
        self.rows
            .lock()
            .map_err(|e| StoreError::Storage(e.to_string()))?
            .extend_from_slice(batch);
        Ok(())
    }
}

/// Outbound publication of ticks, results, notifications and books.
pub trait Publisher: Send + Sync {
    fn publish_ticks(&self, message: &TickMessage) -> Result<(), StoreError>;
    fn publish_api_result(&self, message: &ApiResultMessage) -> Result<(), StoreError>;
    fn publish_notification(&self, message: &NotificationMessage) -> Result<(), StoreError>;
    fn publish_book(&self, snapshot: &OrderBookSnapshot) -> Result<(), StoreError>;
}

/// Publisher that emits each message as a JSON log line.
#[derive(Debug, Default)]
pub struct LoggingPublisher;

impl LoggingPublisher {
    fn emit<T: serde::Serialize>(&self, stream: &str, message: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string(message).map_err(|e| StoreError::Publish(e.to_string()))?;
        info!(stream, "{}", json);
        Ok(())
    }
}

impl Publisher for LoggingPublisher {
    fn publish_ticks(&self, message: &TickMessage) -> Result<(), StoreError> {
        self.emit("ticks", message)
    }

    fn publish_api_result(&self, message: &ApiResultMessage) -> Result<(), StoreError> {
        self.emit("api_results", message)
    }

    fn publish_notification(&self, message: &NotificationMessage) -> Result<(), StoreError> {
        self.emit("notifications", message)
    }

    fn publish_book(&self, snapshot: &OrderBookSnapshot) -> Result<(), StoreError> {
        self.emit("orderbook", snapshot)
    }
}
