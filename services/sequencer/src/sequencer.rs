//! The sequencer: single writer assigning event identity.

use crate::journal::{JournalConfig, JournalEntry, JournalError, JournalWriter};
use crate::reader::scan_state;
use chrono::Utc;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{info, warn};
use types::event::{RawEvent, SequencedEvent};

/// Configuration for the sequencer.
#[derive(Debug, Clone)]
pub struct SequencerConfig {
    /// Journal directory.
    pub dir: PathBuf,
    /// Maximum journal file size before rotation.
    pub max_file_size: u64,
}

impl SequencerConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_file_size: 64 * 1024 * 1024,
        }
    }
}

/// Assigns sequence ids, timestamps and idempotency, and makes every
/// assigned event durable before returning it.
///
/// There is exactly one sequencer per deployment. All identity decisions
/// happen here; downstream consumers treat sequenced events as immutable.
pub struct Sequencer {
    journal: JournalWriter,
    last_sequence: u64,
    last_timestamp: i64,
    unique_ids: HashSet<String>,
}

impl Sequencer {
    /// Open the sequencer, rebuilding its state from the journal.
    pub fn open(config: SequencerConfig) -> Result<Self, JournalError> {
        let state = scan_state(&config.dir)?;
        let mut journal = JournalWriter::open(JournalConfig {
            dir: config.dir,
            max_file_size: config.max_file_size,
        })?;
        journal.set_next_sequence(state.last_sequence + 1);
        info!(
            last_sequence = state.last_sequence,
            unique_ids = state.unique_ids.len(),
            "sequencer recovered from journal"
        );
        Ok(Self {
            journal,
            last_sequence: state.last_sequence,
            last_timestamp: state.last_timestamp,
            unique_ids: state.unique_ids,
        })
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Sequence a batch of raw events.
    ///
    /// Duplicate idempotency keys are dropped with a warning. All surviving
    /// events of the batch are appended and fsynced before any of them is
    /// returned; a durability failure here is fatal to the process, since
    /// an unjournaled event must never reach the engine.
    pub fn assign(&mut self, batch: Vec<RawEvent>) -> Result<Vec<SequencedEvent>, JournalError> {
        let mut now = Utc::now().timestamp_millis();
        if now < self.last_timestamp {
            warn!(
                now,
                last = self.last_timestamp,
                "clock moved backwards, clamping event timestamps"
            );
            now = self.last_timestamp;
        }

        let mut assigned = Vec::with_capacity(batch.len());
        for raw in batch {
            if let Some(unique_id) = &raw.unique_id {
                if !self.unique_ids.insert(unique_id.clone()) {
                    warn!(unique_id = %unique_id, "dropping duplicate event");
                    continue;
                }
            }

            let event = SequencedEvent {
                sequence_id: self.last_sequence + 1,
                previous_id: self.last_sequence,
                created_at: now,
                unique_id: raw.unique_id,
                payload: raw.payload,
            };
            self.journal.append(&JournalEntry::from_event(&event)?)?;
            self.last_sequence = event.sequence_id;
            self.last_timestamp = now;
            assigned.push(event);
        }

        if !assigned.is_empty() {
            self.journal.sync()?;
        }
        Ok(assigned)
    }
}
