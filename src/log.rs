//! Range-log manager (component C): an append-only JSON-lines journal
//! of known-present time spans, with compaction and a self-healing
//! rebuild from on-disk data when a line fails to parse.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::Result;
use crate::model::{LogEntry, Source};
use crate::storage;

const LOG_FILE_NAME: &str = "fetch_log.jsonl";

fn log_path(dir: &Path) -> PathBuf {
    dir.join(LOG_FILE_NAME)
}

/// Append one line to the location's range log.
pub fn append(dir: &Path, data_start: i64, data_end: i64, count: Option<u64>, source: Source) -> Result<()> {
    fs::create_dir_all(dir)?;
    let entry = LogEntry::new(Utc::now(), data_start, data_end, count, source)?;
    let line = serde_json::to_string(&entry)?;
    let mut f = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path(dir))?;
    writeln!(f, "{line}")?;
    Ok(())
}

/// Parse every non-empty line of the log. On the first unparseable
/// line, warn once, rebuild the log from the partition files on disk,
/// then re-read (the rebuild always produces a well-formed log, so the
/// re-read cannot recurse more than once in practice). Returned list
/// is sorted by `data_start`.
pub fn read(dir: &Path) -> Result<Vec<LogEntry>> {
    let path = log_path(dir);
    if !path.exists() {
        return Ok(vec![]);
    }
    let text = fs::read_to_string(&path)?;
    let mut entries = Vec::new();
    let mut corrupted = false;
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LogEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    line = line_no + 1,
                    error = %e,
                    "range log corrupted; rebuilding from data"
                );
                corrupted = true;
                break;
            }
        }
    }

    if corrupted {
        rebuild_from_data(dir)?;
        return read(dir);
    }

    entries.sort_by_key(|e| e.data_start);
    Ok(entries)
}

/// True iff two entries abut (`a.end == b.start` or vice versa) or
/// overlap (`a.start <= b.end && b.start <= a.end`).
pub fn can_merge(a: &LogEntry, b: &LogEntry) -> bool {
    if a.data_end == b.data_start || b.data_end == a.data_start {
        return true;
    }
    a.data_start <= b.data_end && b.data_start <= a.data_end
}

/// Fold a sorted entry list, merging any consecutive mergeable pair.
/// Pure, does not touch disk. Shared by `compact` (which persists
/// the result) and the continuity analyzer (which does not).
pub(crate) fn fold_compact(entries: &[LogEntry]) -> Vec<LogEntry> {
    let mut out: Vec<LogEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        match out.last_mut() {
            Some(last) if can_merge(last, entry) => {
                let merged = LogEntry {
                    fetch_time: last.fetch_time,
                    data_start: last.data_start.min(entry.data_start),
                    data_end: last.data_end.max(entry.data_end),
                    count: None,
                    source: Source::Compacted,
                };
                *last = merged;
            }
            _ => out.push(entry.clone()),
        }
    }
    out
}

/// Merge mergeable consecutive entries and atomically rewrite the log
/// file. Non-mergeable adjacent pairs (gaps) are preserved as distinct
/// entries. Returns the compacted entries.
pub fn compact(dir: &Path) -> Result<Vec<LogEntry>> {
    let entries = read(dir)?;
    if entries.len() < 2 {
        return Ok(entries);
    }
    let compacted = fold_compact(&entries);
    write_log_atomic(dir, &compacted)?;
    Ok(compacted)
}

fn write_log_atomic(dir: &Path, entries: &[LogEntry]) -> Result<()> {
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    for entry in entries {
        let line = serde_json::to_string(entry)?;
        writeln!(tmp, "{line}")?;
    }
    tmp.flush()?;
    tmp.persist(log_path(dir)).map_err(|e| e.error)?;
    Ok(())
}

/// Reconstruct the log from the partition files on disk: a single
/// entry spanning `[min(time), max(time)]` with `source = "rebuilt"`
/// and an exact `count` (once the log itself is lost there is no way
/// to tell where the real gaps were, so the whole span is
/// conservatively treated as one continuous block). A no-op when
/// there is no data.
pub fn rebuild_from_data(dir: &Path) -> Result<()> {
    let rows = storage::read_all_partitions(dir)?;
    if rows.is_empty() {
        return Ok(());
    }
    let data_start = rows.iter().map(|r| r.time).min().unwrap();
    let data_end = rows.iter().map(|r| r.time).max().unwrap();
    let entry = LogEntry::new(Utc::now(), data_start, data_end, Some(rows.len() as u64), Source::Rebuilt)?;
    write_log_atomic(dir, &[entry])?;
    Ok(())
}
