//! Append-only event journal with checksums.
//!
//! # Binary Format (per entry)
//! ```text
//! [body_len:  u32]
//! [sequence:  u64]
//! [previous:  u64]
//! [timestamp: i64]
//! [payload_len: u32][payload: bytes]   // bincode EntryBody
//! [checksum: u32]  // CRC32C over sequence+previous+timestamp+payload
//! ```
//!
//! The idempotency key travels inside the payload, so an event and its
//! uniqueness record are one atomic append.

use crc32c::crc32c;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use types::event::{EventPayload, SequencedEvent};

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Sequence error: expected {expected}, got {got}")]
    SequenceError { expected: u64, got: u64 },
}

// ── Journal Entry ───────────────────────────────────────────────────

/// The bincode-encoded variable part of an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct EntryBody {
    unique_id: Option<String>,
    payload: EventPayload,
}

/// A single journal entry representing one sequenced event.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    /// Dense sequence id, starting at 1.
    pub sequence: u64,
    /// Sequence id of the preceding entry (0 for the first).
    pub previous: u64,
    /// Unix millisecond timestamp assigned by the sequencer.
    pub timestamp: i64,
    /// Bincode-serialized `EntryBody`.
    pub payload: Vec<u8>,
    /// CRC32C over (sequence ++ previous ++ timestamp ++ payload).
    pub checksum: u32,
}

impl JournalEntry {
    pub fn new(sequence: u64, previous: u64, timestamp: i64, payload: Vec<u8>) -> Self {
        let checksum = Self::compute_checksum(sequence, previous, timestamp, &payload);
        Self {
            sequence,
            previous,
            timestamp,
            payload,
            checksum,
        }
    }

    /// Encode a sequenced event as a journal entry.
    pub fn from_event(event: &SequencedEvent) -> Result<Self, JournalError> {
        let body = EntryBody {
            unique_id: event.unique_id.clone(),
            payload: event.payload.clone(),
        };
        let payload =
            bincode::serialize(&body).map_err(|e| JournalError::Serialization(e.to_string()))?;
        Ok(Self::new(
            event.sequence_id,
            event.previous_id,
            event.created_at,
            payload,
        ))
    }

    /// Decode the entry back into a sequenced event.
    pub fn into_event(self) -> Result<SequencedEvent, JournalError> {
        let body: EntryBody = bincode::deserialize(&self.payload)
            .map_err(|e| JournalError::Serialization(e.to_string()))?;
        Ok(SequencedEvent {
            sequence_id: self.sequence,
            previous_id: self.previous,
            created_at: self.timestamp,
            unique_id: body.unique_id,
            payload: body.payload,
        })
    }

    pub fn compute_checksum(sequence: u64, previous: u64, timestamp: i64, payload: &[u8]) -> u32 {
        let mut buf = Vec::with_capacity(8 + 8 + 8 + payload.len());
        buf.extend_from_slice(&sequence.to_le_bytes());
        buf.extend_from_slice(&previous.to_le_bytes());
        buf.extend_from_slice(&timestamp.to_le_bytes());
        buf.extend_from_slice(payload);
        crc32c(&buf)
    }

    pub fn verify_checksum(&self) -> bool {
        let expected =
            Self::compute_checksum(self.sequence, self.previous, self.timestamp, &self.payload);
        self.checksum == expected
    }

    /// Serialize entry to the binary wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let payload_len = self.payload.len() as u32;
        // body = 8 (seq) + 8 (prev) + 8 (ts) + 4 (pl_len) + pl_bytes + 4 (crc)
        let body_len: u32 = 8 + 8 + 8 + 4 + payload_len + 4;

        let mut buf = Vec::with_capacity(4 + body_len as usize);
        buf.extend_from_slice(&body_len.to_le_bytes());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&self.previous.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&payload_len.to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf.extend_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Deserialize entry from the binary wire format.
    ///
    /// Returns `(entry, bytes_consumed)` on success. Truncated or
    /// implausible data is an error, never a panic.
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize), JournalError> {
        if data.len() < 4 {
            return Err(JournalError::Serialization(
                "Not enough data for length prefix".into(),
            ));
        }

        let body_len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if body_len > 100_000_000 {
            return Err(JournalError::Serialization(format!(
                "Implausible body length: {} (likely corruption)",
                body_len
            )));
        }

        let total = 4 + body_len;
        if data.len() < total {
            return Err(JournalError::Serialization(format!(
                "Incomplete entry: need {} bytes, have {}",
                total,
                data.len()
            )));
        }

        // Minimum body: 8 + 8 + 8 + 4 + 0 + 4 = 32
        if body_len < 32 {
            return Err(JournalError::Serialization(format!(
                "Body too small: {} bytes, minimum is 32",
                body_len
            )));
        }

        let body = &data[4..total];
        let mut pos: usize = 0;

        let sequence = u64::from_le_bytes(body[pos..pos + 8].try_into().unwrap());
        pos += 8;
        let previous = u64::from_le_bytes(body[pos..pos + 8].try_into().unwrap());
        pos += 8;
        let timestamp = i64::from_le_bytes(body[pos..pos + 8].try_into().unwrap());
        pos += 8;

        let payload_len = u32::from_le_bytes(body[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 4;
        if pos + payload_len + 4 > body.len() {
            return Err(JournalError::Serialization(format!(
                "payload_len {} exceeds remaining body ({} bytes)",
                payload_len,
                body.len() - pos
            )));
        }
        let payload = body[pos..pos + payload_len].to_vec();
        pos += payload_len;

        let checksum = u32::from_le_bytes(body[pos..pos + 4].try_into().unwrap());

        Ok((
            Self {
                sequence,
                previous,
                timestamp,
                payload,
                checksum,
            },
            total,
        ))
    }
}

// ── Journal Writer Configuration ────────────────────────────────────

/// Configuration for the journal writer.
#[derive(Debug, Clone)]
pub struct JournalConfig {
    /// Directory for journal files.
    pub dir: PathBuf,
    /// Maximum file size in bytes before rotation (default 64 MiB).
    pub max_file_size: u64,
}

impl JournalConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_file_size: 64 * 1024 * 1024,
        }
    }
}

// ── Journal Writer ──────────────────────────────────────────────────

/// Append-only journal writer with checksums and rotation.
///
/// Appends are buffered; callers make a batch durable with [`sync`],
/// which flushes and fsyncs. Nothing downstream may observe an event
/// before its batch has been synced.
///
/// [`sync`]: JournalWriter::sync
pub struct JournalWriter {
    config: JournalConfig,
    writer: BufWriter<File>,
    current_file: PathBuf,
    current_file_size: u64,
    next_sequence: u64,
    file_index: u64,
}

impl JournalWriter {
    /// Open a journal writer, creating the directory if needed and
    /// appending to the newest existing file.
    pub fn open(config: JournalConfig) -> Result<Self, JournalError> {
        fs::create_dir_all(&config.dir)?;

        let file_index = Self::find_latest_index(&config.dir);
        let current_file = Self::journal_path(&config.dir, file_index);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&current_file)?;
        let current_file_size = file.metadata()?.len();

        Ok(Self {
            config,
            writer: BufWriter::new(file),
            current_file,
            current_file_size,
            next_sequence: 1,
            file_index,
        })
    }

    /// Set the next expected sequence number (used after recovery).
    pub fn set_next_sequence(&mut self, seq: u64) {
        self.next_sequence = seq;
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn current_file_path(&self) -> &Path {
        &self.current_file
    }

    /// Append a journal entry. Validates that sequence ids stay dense.
    pub fn append(&mut self, entry: &JournalEntry) -> Result<(), JournalError> {
        if entry.sequence != self.next_sequence {
            return Err(JournalError::SequenceError {
                expected: self.next_sequence,
                got: entry.sequence,
            });
        }

        if self.current_file_size >= self.config.max_file_size {
            self.rotate()?;
        }

        let bytes = entry.to_bytes();
        self.writer.write_all(&bytes)?;
        self.current_file_size += bytes.len() as u64;
        self.next_sequence = entry.sequence + 1;
        Ok(())
    }

    /// Flush and fsync everything appended so far.
    pub fn sync(&mut self) -> Result<(), JournalError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    // ── Internal Helpers ────────────────────────────────────────────

    fn rotate(&mut self) -> Result<(), JournalError> {
        // Fsync the old file before switching.
        self.sync()?;

        self.file_index += 1;
        self.current_file = Self::journal_path(&self.config.dir, self.file_index);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.current_file)?;
        self.writer = BufWriter::new(file);
        self.current_file_size = 0;
        Ok(())
    }

    pub(crate) fn journal_path(dir: &Path, index: u64) -> PathBuf {
        dir.join(format!("journal-{:06}.bin", index))
    }

    pub(crate) fn find_latest_index(dir: &Path) -> u64 {
        fs::read_dir(dir)
            .ok()
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter_map(|e| parse_journal_index(&e.file_name().to_string_lossy()))
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }
}

/// Extract the file index from a `journal-NNNNNN.bin` name.
pub(crate) fn parse_journal_index(name: &str) -> Option<u64> {
    name.strip_prefix("journal-")?
        .strip_suffix(".bin")?
        .parse::<u64>()
        .ok()
}

// ── Tests ───────────────────────────────────────────────────────────
