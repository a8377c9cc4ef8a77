//! Append-only journal of committed store writes.
//!
//! Every store call that changes data becomes one entry. An entry is
//! written and synced before the change is applied in memory, and on open
//! the journal is replayed in order. An entry that was only partly written
//! (crash mid-append) fails its checksum and is cut off, so each entry is
//! durable all-or-nothing.
//!
//! A failed append is rolled back by truncating the file to the end of the
//! last good entry. If even that fails the journal refuses further appends,
//! since anything written after the damaged tail would be lost on replay.
//!
//! Layout: `magic | version | (len u32 LE | msgpack entry | crc32 LE)*`

use super::table::TableOp;
use crate::error::{StoreError, StoreResult};
use crate::types::Timestamp;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

/// Magic bytes for the journal file.
const JOURNAL_MAGIC: &[u8; 4] = b"BSJ\0";

/// Current journal format version.
const JOURNAL_VERSION: u8 = 1;

const HEADER_LEN: u64 = 5;

/// Entries larger than this are treated as corruption.
const MAX_ENTRY_BYTES: usize = 64 * 1024 * 1024;

/// A single committed write.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct JournalEntry {
    pub seq: u64,
    pub timestamp: Timestamp,
    pub ops: Vec<TableOp>,
}

/// Borrowed form of [`JournalEntry`] so appends don't clone ops.
#[derive(Serialize)]
struct EntryRef<'a> {
    seq: u64,
    timestamp: Timestamp,
    ops: &'a [TableOp],
}

/// Where journal frames go. Implemented by [`File`].
trait FrameSink {
    fn append(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl FrameSink for File {
    fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        // Opened in append mode, so later writes land at the new end
        self.set_len(len)
    }
}

/// Append state, guarded by the journal's mutex.
struct JournalWriter<F> {
    sink: F,
    /// Byte length of the intact entries.
    len: u64,
    next_seq: u64,
    sync_writes: bool,
    /// Set when a failed append could not be rolled back.
    poisoned: bool,
}

impl<F: FrameSink> JournalWriter<F> {
    fn append(&mut self, ops: &[TableOp]) -> StoreResult<u64> {
        if self.poisoned {
            return Err(StoreError::Unavailable(
                "journal has an unrecoverable partial write".into(),
            ));
        }

        let seq = self.next_seq;
        let encoded = rmp_serde::to_vec(&EntryRef {
            seq,
            timestamp: Timestamp::now(),
            ops,
        })?;
        if encoded.len() > MAX_ENTRY_BYTES {
            return Err(StoreError::Serialization(format!(
                "journal entry of {} bytes exceeds the limit",
                encoded.len()
            )));
        }

        let frame = encode_frame(&encoded);
        if let Err(e) = self.write_frame(&frame) {
            match self.sink.truncate(self.len) {
                Ok(()) => tracing::warn!(seq, error = %e, "journal append failed, rolled back"),
                Err(rollback) => {
                    tracing::error!(
                        seq,
                        error = %e,
                        rollback_error = %rollback,
                        "journal rollback failed, refusing further appends"
                    );
                    self.poisoned = true;
                }
            }
            return Err(e.into());
        }

        self.len += frame.len() as u64;
        self.next_seq += 1;
        Ok(seq)
    }

    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.sink.append(frame)?;
        if self.sync_writes {
            self.sink.sync()?;
        }
        Ok(())
    }
}

/// Journal file writer.
pub struct Journal {
    path: PathBuf,
    writer: Mutex<JournalWriter<File>>,
}

impl Journal {
    /// Open or create a journal, returning it with the entries to replay.
    ///
    /// A torn or corrupt tail is truncated so later appends land right after
    /// the last good entry. A file too short to hold the header (crash while
    /// creating it) is started over.
    pub fn open(path: impl AsRef<Path>, sync_writes: bool) -> StoreResult<(Self, Vec<JournalEntry>)> {
        let path = path.as_ref().to_path_buf();
        let file_len = if path.exists() {
            fs::metadata(&path)?.len()
        } else {
            0
        };

        let (entries, valid_len) = if file_len >= HEADER_LEN {
            let (entries, valid_len) = Self::read_entries(&path)?;

            if valid_len < file_len {
                tracing::warn!(
                    path = %path.display(),
                    discarded_bytes = file_len - valid_len,
                    "truncating torn journal tail"
                );
                let file = OpenOptions::new().write(true).open(&path)?;
                file.set_len(valid_len)?;
                file.sync_all()?;
            }

            (entries, valid_len)
        } else {
            Self::write_header(&path)?;
            (Vec::new(), HEADER_LEN)
        };

        let next_seq = entries.last().map(|e| e.seq + 1).unwrap_or(1);
        let file = OpenOptions::new().append(true).open(&path)?;

        Ok((
            Self {
                path,
                writer: Mutex::new(JournalWriter {
                    sink: file,
                    len: valid_len,
                    next_seq,
                    sync_writes,
                    poisoned: false,
                }),
            },
            entries,
        ))
    }

    /// Append one entry (returns its sequence number).
    ///
    /// On error nothing of the entry remains in the file.
    pub fn append(&self, ops: &[TableOp]) -> StoreResult<u64> {
        self.writer.lock().append(ops)
    }

    /// Sequence number the next append will get.
    pub fn next_seq(&self) -> u64 {
        self.writer.lock().next_seq
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a fresh header, replacing a missing or partial one.
    fn write_header(path: &Path) -> StoreResult<()> {
        let mut header = Vec::with_capacity(HEADER_LEN as usize);
        header.extend_from_slice(JOURNAL_MAGIC);
        header.push(JOURNAL_VERSION);

        if path.exists() {
            let existing = fs::read(path)?;
            if !header.starts_with(&existing) {
                return Err(StoreError::InvalidFormat("Invalid journal magic".into()));
            }
            if !existing.is_empty() {
                tracing::warn!(path = %path.display(), "rewriting incomplete journal header");
            }
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(&header)?;
        file.sync_all()?;

        Ok(())
    }

    /// Read every intact entry. Returns the entries and the byte length of
    /// the intact prefix.
    fn read_entries(path: &Path) -> StoreResult<(Vec<JournalEntry>, u64)> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != JOURNAL_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid journal magic".into()));
        }

        let mut version = [0u8; 1];
        reader.read_exact(&mut version)?;
        if version[0] != JOURNAL_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported journal version: {}",
                version[0]
            )));
        }

        let (entries, frames_len) = read_frames(&mut reader);
        Ok((entries, HEADER_LEN + frames_len))
    }
}

fn encode_frame(encoded: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(encoded.len() + 8);
    frame.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
    frame.extend_from_slice(encoded);
    frame.extend_from_slice(&crc32fast::hash(encoded).to_le_bytes());
    frame
}

/// Decode frames until the first bad or missing one. Returns the entries
/// and the byte length they occupy.
fn read_frames(reader: &mut impl Read) -> (Vec<JournalEntry>, u64) {
    let mut entries = Vec::new();
    let mut len = 0u64;

    loop {
        match read_frame(reader) {
            Ok(encoded) => match rmp_serde::from_slice::<JournalEntry>(&encoded) {
                Ok(entry) => {
                    len += 8 + encoded.len() as u64;
                    entries.push(entry);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "undecodable journal entry");
                    break;
                }
            },
            Err(StoreError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => {
                tracing::warn!(error = %e, "corrupt journal entry");
                break;
            }
        }
    }

    (entries, len)
}

fn read_frame(reader: &mut impl Read) -> StoreResult<Vec<u8>> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    if len > MAX_ENTRY_BYTES {
        return Err(StoreError::Corruption("Journal entry too large".into()));
    }

    let mut encoded = vec![0u8; len];
    reader.read_exact(&mut encoded)?;

    let mut checksum_bytes = [0u8; 4];
    reader.read_exact(&mut checksum_bytes)?;
    let stored = u32::from_le_bytes(checksum_bytes);

    if stored != crc32fast::hash(&encoded) {
        return Err(StoreError::Corruption("Journal checksum mismatch".into()));
    }

    Ok(encoded)
}
