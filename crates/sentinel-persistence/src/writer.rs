//! JSON Lines writer with daily file rotation.
//!
//! Each record is serialized to one line of `{prefix}_{YYYY-MM-DD}.jsonl`
//! under the base directory. Files are opened in append mode; a line is either
//! fully written or absent, so an interrupted write only loses that line.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::PersistenceResult;

/// Writer for the file of one UTC day.
struct ActiveWriter {
    writer: BufWriter<File>,
    date: NaiveDate,
    records_written: usize,
}

/// Append-only JSON Lines writer.
pub struct JsonLinesWriter {
    base_dir: PathBuf,
    prefix: String,
    /// Serialized lines awaiting flush.
    buffer: Vec<String>,
    max_buffer_size: usize,
    active_writer: Option<ActiveWriter>,
}

impl JsonLinesWriter {
    /// Create the writer, creating `base_dir` if needed.
    pub fn new(base_dir: impl AsRef<Path>, prefix: &str, max_buffer_size: usize) -> PersistenceResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;

        Ok(Self {
            base_dir,
            prefix: prefix.to_string(),
            buffer: Vec::with_capacity(max_buffer_size),
            max_buffer_size: max_buffer_size.max(1),
            active_writer: None,
        })
    }

    /// Path of the file for `date`.
    #[must_use]
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.base_dir
            .join(format!("{}_{}.jsonl", self.prefix, date.format("%Y-%m-%d")))
    }

    /// Serialize and buffer one record, flushing to today's file when the
    /// buffer is full.
    pub fn append<T: Serialize>(&mut self, record: &T) -> PersistenceResult<()> {
        self.buffer.push(serde_json::to_string(record)?);

        if self.buffer.len() >= self.max_buffer_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Flush pending lines to the file for today (UTC).
    pub fn flush(&mut self) -> PersistenceResult<()> {
        self.flush_for(Utc::now().date_naive())
    }

    /// Flush pending lines to the file for `date`, rotating if the active file
    /// belongs to another day.
    pub fn flush_for(&mut self, date: NaiveDate) -> PersistenceResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        if self.active_writer.as_ref().is_some_and(|w| w.date != date) {
            self.close_active_writer();
        }

        let active = match self.active_writer.take() {
            Some(active) => active,
            None => self.open_writer(date)?,
        };
        let active = self.active_writer.insert(active);

        let record_count = self.buffer.len();
        for line in &self.buffer {
            writeln!(active.writer, "{line}")?;
        }
        active.writer.flush()?;
        active.records_written += record_count;

        debug!(%date, records = record_count, "Flushed audit records");
        self.buffer.clear();
        Ok(())
    }

    /// Flush pending lines and close the active file.
    pub fn close(&mut self) -> PersistenceResult<()> {
        self.flush()?;
        self.close_active_writer();
        Ok(())
    }

    fn open_writer(&self, date: NaiveDate) -> PersistenceResult<ActiveWriter> {
        let path = self.path_for(date);
        info!(path = %path.display(), "Opening JSON Lines writer (append mode)");

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(ActiveWriter {
            writer: BufWriter::new(file),
            date,
            records_written: 0,
        })
    }

    fn close_active_writer(&mut self) {
        if let Some(mut active) = self.active_writer.take() {
            if let Err(e) = active.writer.flush() {
                warn!(?e, "Failed to flush writer on close");
            }
            info!(
                date = %active.date,
                records = active.records_written,
                "Closed JSON Lines writer"
            );
        }
    }
}

impl Drop for JsonLinesWriter {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(?e, "Failed to flush buffer on drop");
        }
        self.close_active_writer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::{BufRead, BufReader};
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize)]
    struct Record {
        id: u32,
        symbol: String,
    }

    fn record(id: u32) -> Record {
        Record {
            id,
            symbol: "AAPL".to_string(),
        }
    }

    fn read_lines(path: &Path) -> Vec<String> {
        let file = File::open(path).unwrap();
        BufReader::new(file).lines().map_while(Result::ok).collect()
    }

    #[test]
    fn test_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = JsonLinesWriter::new(temp_dir.path(), "audit", 100).unwrap();

        for i in 0..5 {
            writer.append(&record(i)).unwrap();
        }
        writer.close().unwrap();

        let path = writer.path_for(Utc::now().date_naive());
        let lines = read_lines(&path);
        assert_eq!(lines.len(), 5);

        let first: Record = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first.id, 0);
        assert_eq!(first.symbol, "AAPL");
    }

    #[test]
    fn test_append_mode_across_writers() {
        let temp_dir = TempDir::new().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        for batch in 0..2 {
            let mut writer = JsonLinesWriter::new(temp_dir.path(), "audit", 100).unwrap();
            for i in 0..3 {
                writer.append(&record(batch * 3 + i)).unwrap();
            }
            writer.flush_for(date).unwrap();
        }

        let writer = JsonLinesWriter::new(temp_dir.path(), "audit", 100).unwrap();
        assert_eq!(read_lines(&writer.path_for(date)).len(), 6);
    }

    #[test]
    fn test_rotates_on_date_change() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = JsonLinesWriter::new(temp_dir.path(), "audit", 100).unwrap();
        let day1 = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();

        writer.append(&record(1)).unwrap();
        writer.flush_for(day1).unwrap();
        writer.append(&record(2)).unwrap();
        writer.append(&record(3)).unwrap();
        writer.flush_for(day2).unwrap();

        assert_eq!(read_lines(&writer.path_for(day1)).len(), 1);
        assert_eq!(read_lines(&writer.path_for(day2)).len(), 2);
    }

    #[test]
    fn test_auto_flush_at_buffer_limit() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = JsonLinesWriter::new(temp_dir.path(), "audit", 2).unwrap();

        writer.append(&record(1)).unwrap();
        writer.append(&record(2)).unwrap();

        let path = writer.path_for(Utc::now().date_naive());
        assert_eq!(read_lines(&path).len(), 2);
    }

    #[test]
    fn test_empty_flush_noop() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = JsonLinesWriter::new(temp_dir.path(), "audit", 100).unwrap();

        writer.flush().unwrap();

        let entries: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert!(entries.is_empty());
    }
}
