//! Append-only file-backed slice store
//!
//! Layout: `<data_dir>/slices/slices.log`, one record per line:
//!
//! ```text
//! 8c1f03a2 {"paramId":"p1","coreHash":"...","day":"2025-01-01",...}
//! ```
//!
//! The hex prefix is the CRC32 of the JSON text. On open the log is
//! replayed in file order into an in-memory index, so the last line for a
//! series/day wins. A line that fails its checksum, does not parse, or
//! violates a record invariant is logged and skipped; the rest of the file
//! still loads. A final line left without its newline by a crash is
//! terminated on open so the next append starts a fresh line. Every append
//! is fsynced before it becomes visible.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::checksum::{decode_line, encode_line};
use super::errors::{SliceError, SliceResult};
use super::record::SliceRecord;
use super::store::{AppendOutcome, MemorySliceStore, SliceStore, StoredSeries};
use crate::observability::{log_event_with_fields, Event};

/// A line excluded during replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptLine {
    /// 1-based line number
    pub line: usize,
    pub reason: String,
}

pub struct FileSliceStore {
    path: PathBuf,
    file: Mutex<File>,
    index: MemorySliceStore,
    corrupt: Vec<CorruptLine>,
}

impl FileSliceStore {
    /// Opens (creating if needed) the store under `data_dir`
    pub fn open(data_dir: &Path) -> SliceResult<Self> {
        let dir = data_dir.join("slices");
        fs::create_dir_all(&dir).map_err(|e| {
            SliceError::io_error(format!("Failed to create slice directory: {}", dir.display()), e)
        })?;
        let path = dir.join("slices.log");

        let index = MemorySliceStore::new();
        let replayed = if path.exists() {
            replay(&path, &index)?
        } else {
            Replay::default()
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                SliceError::io_error(format!("Failed to open slice log: {}", path.display()), e)
            })?;

        // A torn final record must not absorb the next append.
        if replayed.torn_tail {
            file.write_all(b"\n").and_then(|_| file.sync_all()).map_err(|e| {
                SliceError::write_failed(
                    format!("Failed to terminate torn tail of {}", path.display()),
                    e,
                )
            })?;
        }
        let corrupt = replayed.corrupt;

        log_event_with_fields(
            Event::SliceStoreOpened,
            &[
                ("path", path.display().to_string().as_str()),
                ("series", index.series_count().to_string().as_str()),
                ("corrupt_lines", corrupt.len().to_string().as_str()),
            ],
        );

        Ok(Self {
            path,
            file: Mutex::new(file),
            index,
            corrupt,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines excluded when the store was opened
    pub fn corrupt_lines(&self) -> &[CorruptLine] {
        &self.corrupt
    }
}

#[derive(Default)]
struct Replay {
    corrupt: Vec<CorruptLine>,
    /// The file ends with a record missing its newline
    torn_tail: bool,
}

fn replay(path: &Path, index: &MemorySliceStore) -> SliceResult<Replay> {
    let file = File::open(path).map_err(|e| {
        SliceError::io_error(format!("Failed to read slice log: {}", path.display()), e)
    })?;
    let mut reader = BufReader::new(file);
    let mut replayed = Replay::default();
    let mut buf = Vec::new();
    let mut line_no = 0;

    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf).map_err(|e| {
            SliceError::io_error(format!("Failed to read line {} of slice log", line_no + 1), e)
        })?;
        if read == 0 {
            break;
        }
        line_no += 1;
        if buf.last() == Some(&b'\n') {
            buf.pop();
        } else {
            replayed.torn_tail = true;
        }
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }

        let parsed = std::str::from_utf8(&buf)
            .map_err(|e| format!("invalid UTF-8: {}", e))
            .and_then(|line| {
                if line.trim().is_empty() {
                    return Ok(None);
                }
                let json = decode_line(line)?;
                let record: SliceRecord =
                    serde_json::from_str(json).map_err(|e| format!("invalid JSON: {}", e))?;
                record.validate().map_err(|e| e.message().to_string())?;
                Ok(Some(record))
            });

        match parsed {
            Ok(Some(record)) => {
                index.insert_validated(record)?;
            }
            Ok(None) => {}
            Err(reason) => {
                log_event_with_fields(
                    Event::SliceRecordCorrupt,
                    &[
                        ("line", line_no.to_string().as_str()),
                        ("path", path.display().to_string().as_str()),
                        ("reason", reason.as_str()),
                    ],
                );
                replayed.corrupt.push(CorruptLine {
                    line: line_no,
                    reason,
                });
            }
        }
    }

    Ok(replayed)
}

impl SliceStore for FileSliceStore {
    fn append(&self, record: SliceRecord) -> SliceResult<AppendOutcome> {
        record.validate()?;
        let json = serde_json::to_string(&record)
            .map_err(|e| SliceError::invalid_record(format!("unserializable record: {}", e)))?;
        let line = encode_line(&json);

        // The file lock is held until the index is updated so replay order
        // and visible order agree.
        let mut file = self.file.lock().map_err(|_| SliceError::poisoned())?;
        writeln!(file, "{}", line).map_err(|e| {
            SliceError::write_failed(format!("Failed to append slice for {}", record.param_id), e)
        })?;
        file.sync_all().map_err(|e| {
            SliceError::write_failed(
                format!("fsync failed after appending slice for {}", record.param_id),
                e,
            )
        })?;

        let param_id = record.param_id.clone();
        let day = record.day.to_string();
        let outcome = self.index.insert_validated(record)?;
        drop(file);

        log_event_with_fields(
            Event::SliceAppended,
            &[("param_id", param_id.as_str()), ("day", day.as_str())],
        );
        Ok(outcome)
    }

    fn series(&self, param_id: &str) -> SliceResult<Vec<StoredSeries>> {
        self.index.series(param_id)
    }
}
