//! CSV export of the water log.
//!
//! Exports are written to a temp file next to the destination, synced, and
//! then renamed into place, so a crash never leaves a half-written export.

use crate::{DailyAggregate, Error, LogEntry, Result};
use std::path::Path;
use tempfile::NamedTempFile;

/// A row in the daily export
#[derive(Debug, serde::Serialize)]
struct DailyRow {
    date: String,
    total_ml: u64,
    log_count: u32,
    goal_achieved: bool,
}

impl From<&DailyAggregate> for DailyRow {
    fn from(day: &DailyAggregate) -> Self {
        DailyRow {
            date: day.date.format("%Y-%m-%d").to_string(),
            total_ml: day.total_amount,
            log_count: day.log_count,
            goal_achieved: day.goal_achieved,
        }
    }
}

/// A row in the raw entry export
#[derive(Debug, serde::Serialize)]
struct EntryRow {
    id: String,
    amount_ml: u32,
    logged_at: String,
    created_at: String,
}

impl From<&LogEntry> for EntryRow {
    fn from(entry: &LogEntry) -> Self {
        EntryRow {
            id: entry.id.to_string(),
            amount_ml: entry.amount,
            logged_at: entry.logged_at.to_rfc3339(),
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

const DAILY_HEADER: [&str; 4] = ["date", "total_ml", "log_count", "goal_achieved"];
const ENTRY_HEADER: [&str; 4] = ["id", "amount_ml", "logged_at", "created_at"];

/// Header is written up front so an empty export still carries it
fn write_rows<R, I>(path: &Path, header: &[&str], rows: I) -> Result<usize>
where
    R: serde::Serialize,
    I: IntoIterator<Item = R>,
{
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(temp.as_file());
    writer.write_record(header)?;

    let mut count = 0;
    for row in rows {
        writer.serialize(row)?;
        count += 1;
    }
    writer.flush()?;
    drop(writer);

    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::info!("Exported {} rows to {:?}", count, path);
    Ok(count)
}

/// Write one row per day: `date,total_ml,log_count,goal_achieved`
pub fn export_daily_csv(days: &[DailyAggregate], path: &Path) -> Result<usize> {
    write_rows(path, &DAILY_HEADER, days.iter().map(DailyRow::from))
}

/// Write one row per entry: `id,amount_ml,logged_at,created_at`
pub fn export_entries_csv(entries: &[LogEntry], path: &Path) -> Result<usize> {
    write_rows(path, &ENTRY_HEADER, entries.iter().map(EntryRow::from))
}
