// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSONL operation journal with group commit support.
//!
//! Records are durably stored before being acknowledged, enabling crash
//! recovery via replay. Group commit batches writes (~10ms) for performance.
//!
//! Each entry is a single line of JSON: `{"seq":N,"record":{...}}\n`

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

/// Flush interval for group commit (~10ms batches)
const FLUSH_INTERVAL: Duration = Duration::from_millis(10);

/// Maximum entries to buffer before forcing flush
const FLUSH_THRESHOLD: usize = 100;

const MAX_BAK_FILES: u32 = 3;

/// Errors that can occur in journal operations
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialization helper for writing entries without cloning the record.
#[derive(Serialize)]
struct RecordRef<'a, T> {
    seq: u64,
    record: &'a T,
}

#[derive(Deserialize)]
struct Record<T> {
    seq: u64,
    record: T,
}

/// A single journal entry with sequence number
#[derive(Debug, Clone)]
pub struct JournalEntry<T> {
    pub seq: u64,
    pub record: T,
}

/// Append-only JSONL journal with group commit.
///
/// Records are buffered in memory and flushed to disk either when
/// `needs_flush()` reports the interval elapsed / buffer full, or
/// explicitly via `flush()`. A corrupt tail found at open time is rotated
/// to `.bak` and the valid prefix preserved.
pub struct Journal<T> {
    file: File,
    path: PathBuf,
    write_seq: u64,
    write_buffer: Vec<Vec<u8>>,
    last_flush: Instant,
    /// Entries appended since the last `rewrite` (compaction trigger)
    appended_since_rewrite: u64,
    _marker: PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> Journal<T> {
    /// Open or create a journal, returning it together with all recovered
    /// entries in append order.
    pub fn open(path: &Path) -> Result<(Self, Vec<JournalEntry<T>>), JournalError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let (entries, corrupt) = Self::scan(&file)?;

        let file = if corrupt {
            drop(file);
            let bak_path = rotate_bak_path(path);
            warn!(
                path = %path.display(),
                bak = %bak_path.display(),
                valid_entries = entries.len(),
                "Corrupt journal detected, rotating to .bak and preserving valid entries",
            );
            fs::rename(path, &bak_path)?;

            {
                let mut new_file = File::create(path)?;
                for entry in &entries {
                    let record = RecordRef {
                        seq: entry.seq,
                        record: &entry.record,
                    };
                    serde_json::to_writer(&mut new_file, &record)?;
                    new_file.write_all(b"\n")?;
                }
                new_file.sync_all()?;
            }

            OpenOptions::new()
                .create(true)
                .read(true)
                .append(true)
                .open(path)?
        } else {
            file
        };

        let write_seq = entries.last().map(|e| e.seq).unwrap_or(0);

        Ok((
            Self {
                file,
                path: path.to_owned(),
                write_seq,
                write_buffer: Vec::new(),
                last_flush: Instant::now(),
                appended_since_rewrite: 0,
                _marker: PhantomData,
            },
            entries,
        ))
    }

    /// Read all parseable entries, stopping at the first corrupt line.
    ///
    /// Returns `(entries, corrupt)` where `corrupt` is true when a parse
    /// error (not just EOF) ended the scan.
    fn scan(file: &File) -> Result<(Vec<JournalEntry<T>>, bool), JournalError> {
        let mut reader = BufReader::new(file.try_clone()?);
        let mut entries = Vec::new();
        let mut corrupt = false;
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    corrupt = true;
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let record: Record<T> = match serde_json::from_str(trimmed) {
                Ok(r) => r,
                Err(_) => {
                    corrupt = true;
                    break;
                }
            };

            entries.push(JournalEntry {
                seq: record.seq,
                record: record.record,
            });
        }

        Ok((entries, corrupt))
    }

    /// Append a record to the write buffer.
    ///
    /// Returns the assigned sequence number. The record is NOT durable
    /// until `flush()` is called.
    pub fn append(&mut self, record: &T) -> Result<u64, JournalError> {
        self.write_seq += 1;
        let seq = self.write_seq;
        let json_bytes = serde_json::to_vec(&RecordRef { seq, record })?;
        self.write_buffer.push(json_bytes);
        self.appended_since_rewrite += 1;
        Ok(seq)
    }

    /// Check if flush is needed (interval elapsed or buffer full).
    pub fn needs_flush(&self) -> bool {
        !self.write_buffer.is_empty()
            && (self.last_flush.elapsed() >= FLUSH_INTERVAL
                || self.write_buffer.len() >= FLUSH_THRESHOLD)
    }

    /// Flush all buffered entries to disk with a single fsync.
    ///
    /// This is the durability point: after flush returns, all buffered
    /// records are on disk.
    pub fn flush(&mut self) -> Result<(), JournalError> {
        if self.write_buffer.is_empty() {
            return Ok(());
        }

        for mut json_bytes in self.write_buffer.drain(..) {
            json_bytes.push(b'\n');
            self.file.write_all(&json_bytes)?;
        }

        self.file.sync_all()?;
        self.last_flush = Instant::now();
        Ok(())
    }

    /// Number of records appended since the last compaction.
    pub fn appended_since_rewrite(&self) -> u64 {
        self.appended_since_rewrite
    }

    /// Replace the journal contents with a compacted record set.
    ///
    /// Writes to a temp file, fsyncs, then atomically renames over the
    /// journal. Sequence numbering continues from the current write_seq.
    pub fn rewrite(&mut self, records: &[T]) -> Result<(), JournalError> {
        self.flush()?;

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut tmp_file = File::create(&tmp_path)?;
            for record in records {
                self.write_seq += 1;
                let line = serde_json::to_vec(&RecordRef {
                    seq: self.write_seq,
                    record,
                })?;
                tmp_file.write_all(&line)?;
                tmp_file.write_all(b"\n")?;
            }
            tmp_file.sync_all()?;
        }

        fs::rename(&tmp_path, &self.path)?;

        self.file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        self.appended_since_rewrite = 0;

        Ok(())
    }
}

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`.
/// The oldest backup is removed when the limit is reached.
pub(crate) fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }

    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
