use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::section;

/// Last-played pointer file name inside the base directory.
pub const LAST_PLAYED_FILE: &str = "last_played";

const RECORD_SECTION: &str = "File";

/// Persisted resume state for one media item. Records are rewritten whole on
/// every close, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeRecord {
    /// Mount-independent relative path (unescaped).
    pub file: String,
    /// Mountpoint the item lived under, or "" (unescaped).
    pub mountpoint: String,
    /// Saved playback position in milliseconds, always > 0 for a written
    /// record.
    pub time_ms: u64,
    /// Epoch milliseconds when the record was written.
    pub created_ms: u64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("record {path} has a malformed {key} value {value:?}")]
    Malformed {
        path: PathBuf,
        key: &'static str,
        value: String,
    },
}

/// Record location for an identity hash.
pub fn record_path(base_dir: &Path, identity_hash: &str) -> PathBuf {
    base_dir.join(identity_hash)
}

/// Read a record. A missing file, or a record without a `time` key, is not
/// an error: it simply means there is nothing to resume.
pub fn read_record(path: &Path) -> Result<Option<ResumeRecord>, StoreError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source: err,
            });
        }
    };
    parse_record(&raw, path)
}

fn parse_record(raw: &str, path: &Path) -> Result<Option<ResumeRecord>, StoreError> {
    let (entries, _) = section::parse(raw, RECORD_SECTION);
    let Some(time_raw) = entries.get("time") else {
        return Ok(None);
    };
    let time_ms = parse_millis(time_raw, "time", path)?;
    let created_ms = match entries.get("created") {
        Some(created_raw) => parse_millis(created_raw, "created", path)?,
        None => 0,
    };
    Ok(Some(ResumeRecord {
        file: entries.get("file").cloned().unwrap_or_default(),
        mountpoint: entries.get("mountpoint").cloned().unwrap_or_default(),
        time_ms,
        created_ms,
    }))
}

fn parse_millis(raw: &str, key: &'static str, path: &Path) -> Result<u64, StoreError> {
    raw.parse().map_err(|_| StoreError::Malformed {
        path: path.to_path_buf(),
        key,
        value: raw.to_string(),
    })
}

/// Write (or overwrite) a record, creating the base directory on demand.
pub fn write_record(path: &Path, record: &ResumeRecord) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| StoreError::Io {
            path: parent.to_path_buf(),
            source: err,
        })?;
    }
    let rendered = section::render(
        RECORD_SECTION,
        &[
            ("file", record.file.clone()),
            ("mountpoint", record.mountpoint.clone()),
            ("time", record.time_ms.to_string()),
            ("created", record.created_ms.to_string()),
        ],
    );
    fs::write(path, rendered).map_err(|err| StoreError::Io {
        path: path.to_path_buf(),
        source: err,
    })
}

/// Remove a record. A record that is already gone is not an error.
pub fn delete_record(path: &Path) -> Result<(), StoreError> {
    remove_if_present(path)
}

/// Raw path of the most recently saved item, if any.
pub fn read_last_played(base_dir: &Path) -> Result<Option<String>, StoreError> {
    let path = base_dir.join(LAST_PLAYED_FILE);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(StoreError::Io { path, source: err }),
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

pub fn write_last_played(base_dir: &Path, raw_path: &str) -> Result<(), StoreError> {
    fs::create_dir_all(base_dir).map_err(|err| StoreError::Io {
        path: base_dir.to_path_buf(),
        source: err,
    })?;
    let path = base_dir.join(LAST_PLAYED_FILE);
    fs::write(&path, format!("{raw_path}\n")).map_err(|err| StoreError::Io { path, source: err })
}

pub fn delete_last_played(base_dir: &Path) -> Result<(), StoreError> {
    remove_if_present(&base_dir.join(LAST_PLAYED_FILE))
}

fn remove_if_present(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source: err,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> ResumeRecord {
        ResumeRecord {
            file: "/videos/100% show.mkv".to_string(),
            mountpoint: "/mnt/usb%drive".to_string(),
            time_ms: 120_000,
            created_ms: 1_700_000_000_000,
        }
    }

    #[test]
    fn write_then_read_round_trips_percent_fields_exactly() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = record_path(dir.path(), "0123456789abcdef0123456789abcdef");
        let record = sample_record();
        write_record(&path, &record).expect("record should write");
        let read = read_record(&path)
            .expect("record should parse")
            .expect("record should exist");
        assert_eq!(read, record);
    }

    #[test]
    fn write_creates_the_base_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = record_path(&dir.path().join("nested"), "00000000000000000000000000000000");
        write_record(&path, &sample_record()).expect("record should write");
        assert!(path.exists());
    }

    #[test]
    fn missing_record_reads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let absent = read_record(&record_path(dir.path(), "ffffffffffffffffffffffffffffffff"))
            .expect("missing file is not an error");
        assert_eq!(absent, None);
    }

    #[test]
    fn record_without_time_key_reads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("record");
        fs::write(&path, "[File]\nfile = /videos/a.mkv\n").expect("write raw record");
        let read = read_record(&path).expect("record without time is not an error");
        assert_eq!(read, None);
    }

    #[test]
    fn malformed_time_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("record");
        fs::write(&path, "[File]\ntime = soon\n").expect("write raw record");
        let err = read_record(&path).expect_err("malformed time must fail");
        assert!(matches!(err, StoreError::Malformed { key: "time", .. }));
    }

    #[test]
    fn deleting_an_absent_record_is_not_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        delete_record(&record_path(dir.path(), "deadbeefdeadbeefdeadbeefdeadbeef"))
            .expect("deleting an absent record is a no-op");
    }

    #[test]
    fn last_played_pointer_round_trips_and_deletes() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(
            read_last_played(dir.path()).expect("absent pointer is not an error"),
            None
        );
        write_last_played(dir.path(), "file:///videos/a%20b.mkv").expect("pointer should write");
        assert_eq!(
            read_last_played(dir.path()).expect("pointer should read"),
            Some("file:///videos/a%20b.mkv".to_string())
        );
        delete_last_played(dir.path()).expect("pointer should delete");
        assert_eq!(
            read_last_played(dir.path()).expect("deleted pointer reads as absent"),
            None
        );
    }
}
