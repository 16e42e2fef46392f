//! Journal scanning for recovery and replay.
//!
//! Reading is strict about checksums but lenient about the tail: a
//! truncated or corrupted suffix marks the end of the log, because an
//! interrupted final write is the one corruption a crash can legitimately
//! leave behind. Corruption followed by further valid entries is reported
//! as an error.

use crate::journal::{parse_journal_index, JournalEntry, JournalError};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use types::event::SequencedEvent;

/// State recovered by scanning the whole journal.
#[derive(Debug, Clone, Default)]
pub struct ScanState {
    /// Highest sequence id in the journal (0 when empty).
    pub last_sequence: u64,
    /// Timestamp of the newest entry (0 when empty).
    pub last_timestamp: i64,
    /// Every idempotency key ever assigned.
    pub unique_ids: HashSet<String>,
}

/// All journal files in `dir`, sorted by file index.
fn discover_files(dir: &Path) -> Result<Vec<PathBuf>, JournalError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files: Vec<(u64, PathBuf)> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            parse_journal_index(&e.file_name().to_string_lossy()).map(|idx| (idx, e.path()))
        })
        .collect();
    files.sort_by_key(|(idx, _)| *idx);
    Ok(files.into_iter().map(|(_, p)| p).collect())
}

/// Read every valid entry in the journal, in sequence order.
///
/// Sequence density is verified across file boundaries. A bad tail (the
/// last readable region of the last file) is logged and dropped.
pub fn read_entries(dir: &Path) -> Result<Vec<JournalEntry>, JournalError> {
    let files = discover_files(dir)?;
    let last_file_idx = files.len().saturating_sub(1);
    let mut entries: Vec<JournalEntry> = Vec::new();

    for (file_idx, path) in files.iter().enumerate() {
        let data = fs::read(path)?;
        let mut pos = 0usize;

        while pos < data.len() {
            let parsed = JournalEntry::from_bytes(&data[pos..]);
            let bad = match parsed {
                Ok((entry, consumed)) if entry.verify_checksum() => {
                    let expected = entries.last().map(|e: &JournalEntry| e.sequence + 1);
                    if let Some(expected) = expected {
                        if entry.sequence != expected {
                            return Err(JournalError::SequenceError {
                                expected,
                                got: entry.sequence,
                            });
                        }
                    }
                    entries.push(entry);
                    pos += consumed;
                    continue;
                }
                Ok(_) => "checksum mismatch",
                Err(_) => "unreadable entry",
            };

            // Anything after a bad region would be unreachable on replay,
            // so it is only tolerable at the very end of the log.
            if file_idx != last_file_idx {
                return Err(JournalError::Serialization(format!(
                    "{} in {} before end of log",
                    bad,
                    path.display()
                )));
            }
            warn!(
                file = %path.display(),
                offset = pos,
                "dropping corrupted journal tail: {}",
                bad
            );
            return Ok(entries);
        }
    }
    Ok(entries)
}

/// Recover sequencing state by scanning the whole journal.
pub fn scan_state(dir: &Path) -> Result<ScanState, JournalError> {
    let mut state = ScanState::default();
    for entry in read_entries(dir)? {
        state.last_sequence = entry.sequence;
        state.last_timestamp = entry.timestamp;
        let event = entry.into_event()?;
        if let Some(unique_id) = event.unique_id {
            state.unique_ids.insert(unique_id);
        }
    }
    Ok(state)
}

/// Load every event with `sequence_id > after`, in order.
pub fn load_events_after(dir: &Path, after: u64) -> Result<Vec<SequencedEvent>, JournalError> {
    read_entries(dir)?
        .into_iter()
        .filter(|e| e.sequence > after)
        .map(JournalEntry::into_event)
        .collect()
}
