//! Offline listing of all stored resume records with human-readable status.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::store::{self, ResumeRecord};

/// One listing row for a stored resume record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub hash: String,
    pub created: String,
    pub elapsed: String,
    pub found: bool,
    pub path: String,
}

/// Scan `dir` for resume records and build their listing rows, sorted by
/// creation timestamp ascending. Entries that are not records, or that do
/// not parse, are skipped rather than aborting the listing.
pub fn scan_records(dir: &Path) -> Result<Vec<ReportRow>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to scan {}", dir.display()))?;

    let mut rows = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to scan {}", dir.display()))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_record_name(name) || !entry.path().is_file() {
            continue;
        }
        let record = match store::read_record(&entry.path()) {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!("skipping {}: no resume time stored", entry.path().display());
                continue;
            }
            Err(err) => {
                warn!("skipping unreadable record: {err}");
                continue;
            }
        };
        let Some(created) = format_created(record.created_ms) else {
            warn!(
                "skipping {}: creation time out of range",
                entry.path().display()
            );
            continue;
        };
        let path = resolve_record_path(&record);
        rows.push(ReportRow {
            hash: name.to_string(),
            created,
            elapsed: format_elapsed(record.time_ms),
            found: path.exists(),
            path: path.to_string_lossy().into_owned(),
        });
    }

    rows.sort_by(|a, b| a.created.cmp(&b.created));
    Ok(rows)
}

/// Print the listing for `dir` to stdout, one row per record.
pub fn run(dir: &Path) -> Result<()> {
    for row in scan_records(dir)? {
        let status = if row.found { "found" } else { "missing" };
        println!(
            "{}  {}  {}  {:<7}  {}",
            row.hash, row.created, row.elapsed, status, row.path
        );
    }
    Ok(())
}

/// Record file names are the 32 lowercase hex characters of the identity
/// hash; everything else in the directory is ignored.
fn is_record_name(name: &str) -> bool {
    name.len() == 32
        && name
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
}

/// Reassemble the absolute media path a record points at.
fn resolve_record_path(record: &ResumeRecord) -> PathBuf {
    if record.mountpoint.is_empty() {
        PathBuf::from(&record.file)
    } else {
        Path::new(&record.mountpoint).join(record.file.trim_start_matches('/'))
    }
}

fn format_created(created_ms: u64) -> Option<String> {
    let created = DateTime::<Utc>::from_timestamp_millis(i64::try_from(created_ms).ok()?)?;
    Some(created.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Saved position as `H:MM:SS`. Hours are unbounded, there is no day
/// rollover.
fn format_elapsed(time_ms: u64) -> String {
    let total_secs = time_ms / 1000;
    format!(
        "{}:{:02}:{:02}",
        total_secs / 3600,
        total_secs % 3600 / 60,
        total_secs % 60
    )
}
