//! CSV export and import of daily logs.
//!
//! Columns: `date,flow,symptoms,mood,notes`, with symptoms joined by `;`.
//! Imports skip malformed rows and go through [`Tracker::import_logs`] so
//! the whole file lands under one lock and one recomputation.

use crate::store::Store;
use crate::tracker::Tracker;
use crate::{DailyLog, Error, Flow, LogEntry, Result, UserId};
use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;

const SYMPTOM_SEPARATOR: char = ';';

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    date: String,
    flow: Option<String>,
    symptoms: Option<String>,
    mood: Option<String>,
    notes: Option<String>,
}

impl From<&DailyLog> for CsvRow {
    fn from(log: &DailyLog) -> Self {
        let symptoms = log
            .symptoms
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(&SYMPTOM_SEPARATOR.to_string());
        CsvRow {
            date: log.date.format("%Y-%m-%d").to_string(),
            flow: log.flow.map(|f| f.as_str().to_string()),
            symptoms: (!symptoms.is_empty()).then_some(symptoms),
            mood: log.mood.clone(),
            notes: log.notes.clone(),
        }
    }
}

impl TryFrom<CsvRow> for LogEntry {
    type Error = Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        let date = NaiveDate::parse_from_str(row.date.trim(), "%Y-%m-%d")
            .map_err(|e| Error::invalid("date", format!("'{}': {}", row.date, e)))?;

        let flow = match row.flow.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(s.parse::<Flow>()?),
        };

        let symptoms = row
            .symptoms
            .map(|s| {
                s.split(SYMPTOM_SEPARATOR)
                    .map(|part| part.to_string())
                    .collect()
            })
            .unwrap_or_default();

        Ok(LogEntry {
            date: Some(date),
            flow,
            symptoms,
            mood: row.mood,
            notes: row.notes,
        })
    }
}

/// Write logs as CSV (header included), returning the row count
pub fn write_logs<W: Write>(logs: &[DailyLog], writer: W) -> Result<usize> {
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(writer);
    for log in logs {
        writer.serialize(CsvRow::from(log))?;
    }
    writer.flush()?;
    Ok(logs.len())
}

/// Parse log entries, skipping rows that cannot be read
pub fn read_entries<R: Read>(reader: R) -> Result<Vec<LogEntry>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let mut entries = Vec::new();
    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        // Header is line 1
        let line = index + 2;
        match result {
            Ok(row) => match LogEntry::try_from(row) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!("Skipping CSV line {}: {}", line, e),
            },
            Err(e) => tracing::warn!("Failed to deserialize CSV line {}: {}", line, e),
        }
    }
    Ok(entries)
}

/// Export every log of `user` to `path`
pub fn export_logs<S: Store>(tracker: &Tracker<S>, user: &UserId, path: &Path) -> Result<usize> {
    let logs = tracker.logs(user)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = std::fs::File::create(path)?;
    let count = write_logs(&logs, &file)?;
    file.sync_all()?;

    tracing::info!("Exported {} logs for {} to {:?}", count, user, path);
    Ok(count)
}

/// Import logs from `path`, overwriting same-date logs
pub fn import_logs<S: Store>(tracker: &Tracker<S>, user: &UserId, path: &Path) -> Result<usize> {
    let file = std::fs::File::open(path)?;
    let entries = read_entries(file)?;
    if entries.is_empty() {
        tracing::info!("No importable rows in {:?}", path);
        return Ok(0);
    }
    tracker.import_logs(user, entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn user() -> UserId {
        UserId::new("csv").unwrap()
    }

    #[test]
    fn test_write_format() {
        let mut log = DailyLog::new(d(2024, 3, 1)).with_flow(Flow::Heavy);
        log.symptoms = ["cramps", "bloating"].iter().map(|s| s.to_string()).collect();
        log.mood = Some("Irritable".into());
        let plain = DailyLog::new(d(2024, 3, 2));

        let mut out = Vec::new();
        write_logs(&[log, plain], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "date,flow,symptoms,mood,notes");
        assert_eq!(lines[1], "2024-03-01,heavy,bloating;cramps,Irritable,");
        assert_eq!(lines[2], "2024-03-02,,,,");
    }

    #[test]
    fn test_read_skips_bad_rows() {
        crate::logging::init_test();
        let data = "date,flow,symptoms,mood,notes\n\
                    2024-03-01,medium,cramps;headache,,\n\
                    not-a-date,light,,,\n\
                    2024-03-02,gushing,,,\n\
                    2024-03-03,,,Calm,walked\n";

        let entries = read_entries(data.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].flow, Some(Flow::Medium));
        assert_eq!(entries[0].symptoms, vec!["cramps", "headache"]);
        assert_eq!(entries[1].date, Some(d(2024, 3, 3)));
        assert_eq!(entries[1].flow, None);
        assert_eq!(entries[1].notes.as_deref(), Some("walked"));
    }

    #[test]
    fn test_export_then_import_into_new_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("out").join("logs.csv");
        let user = user();

        let source = Tracker::new(MemoryStore::new());
        for day in [1, 2, 3, 29, 30] {
            source
                .log_day(&user, LogEntry::on(d(2024, 1, day)).flow(Flow::Light).symptom("cramps"))
                .unwrap();
        }
        assert_eq!(export_logs(&source, &user, &path).unwrap(), 5);

        let target = Tracker::new(MemoryStore::new());
        assert_eq!(import_logs(&target, &user, &path).unwrap(), 5);

        let imported = target.logs(&user).unwrap();
        assert_eq!(imported.len(), 5);
        assert!(imported.iter().all(|l| l.symptoms.contains("cramps")));
        assert_eq!(target.cycles(&user).unwrap(), source.cycles(&user).unwrap());
    }

    #[test]
    fn test_import_empty_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("empty.csv");
        std::fs::write(&path, "date,flow,symptoms,mood,notes\n").unwrap();

        let tracker = Tracker::new(MemoryStore::new());
        assert_eq!(import_logs(&tracker, &user(), &path).unwrap(), 0);
    }
}
