//! Event sequencing and the durable event log.
//!
//! The sequencer is the single writer that turns raw events into
//! sequenced events: it assigns dense sequence ids, monotonic timestamps
//! and idempotency, and appends every assigned event to an append-only
//! journal before anyone downstream sees it.

pub mod journal;
pub mod reader;
pub mod sequencer;

pub use journal::{JournalConfig, JournalEntry, JournalError, JournalWriter};
pub use reader::{load_events_after, scan_state, ScanState};
pub use sequencer::{Sequencer, SequencerConfig};
