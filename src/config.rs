use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use tracing::warn;

use crate::section;

/// Config file name inside the base directory.
pub const CONFIG_FILE: &str = "config";

const CONFIG_SECTION: &str = "Config";

/// Process-wide tuning knobs, loaded once at startup and immutable after.
///
/// The on-disk options are given in seconds; the three threshold fields are
/// converted to milliseconds at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Reopen the last saved item shortly after startup.
    pub restart_last: bool,
    /// Delay before the restart attempt fires.
    pub restart_delay_secs: u64,
    /// Period of the position-poll task while playing.
    pub update_interval_secs: u64,
    /// Offset subtracted from the position before saving, so playback
    /// resumes just before where it stopped.
    pub rewind_ms: u64,
    /// Positions below `min_runtime_ms + rewind_ms` are not worth saving.
    pub min_runtime_ms: u64,
    /// Positions within this distance of the stream end are not worth saving.
    pub max_runtime_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            restart_last: true,
            restart_delay_secs: 2,
            update_interval_secs: 3,
            rewind_ms: 10_000,
            min_runtime_ms: 120_000,
            max_runtime_ms: 90_000,
        }
    }
}

impl Config {
    /// Load from `<base_dir>/config`. A missing file, a missing option or a
    /// malformed value falls back to that field's default; loading never
    /// fails.
    pub fn load(base_dir: &Path) -> Self {
        let path = base_dir.join(CONFIG_FILE);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Self::default(),
            Err(err) => {
                warn!("failed to read config file {}: {err}", path.display());
                return Self::default();
            }
        };
        Self::parse(&raw)
    }

    fn parse(raw: &str) -> Self {
        let (entries, skipped) = section::parse(raw, CONFIG_SECTION);
        if skipped > 0 {
            warn!("ignored {skipped} malformed config line(s)");
        }

        let defaults = Self::default();
        Self {
            restart_last: bool_option(&entries, "restart_last", defaults.restart_last),
            restart_delay_secs: int_option(&entries, "restart_delay", defaults.restart_delay_secs),
            update_interval_secs: int_option(
                &entries,
                "update_interval",
                defaults.update_interval_secs,
            ),
            rewind_ms: secs_option(&entries, "rewind_time", defaults.rewind_ms),
            min_runtime_ms: secs_option(&entries, "min_runtime", defaults.min_runtime_ms),
            max_runtime_ms: secs_option(&entries, "max_runtime", defaults.max_runtime_ms),
        }
    }
}

fn bool_option(entries: &HashMap<String, String>, key: &str, default: bool) -> bool {
    let Some(raw) = entries.get(key) else {
        return default;
    };
    match parse_bool(raw) {
        Some(value) => value,
        None => {
            warn!("config option {key} has invalid boolean {raw:?}, using default");
            default
        }
    }
}

fn int_option(entries: &HashMap<String, String>, key: &str, default: u64) -> u64 {
    let Some(raw) = entries.get(key) else {
        return default;
    };
    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            warn!("config option {key} has invalid integer {raw:?}, using default");
            default
        }
    }
}

/// Threshold options are stored in seconds but used in milliseconds.
fn secs_option(entries: &HashMap<String, String>, key: &str, default_ms: u64) -> u64 {
    let Some(raw) = entries.get(key) else {
        return default_ms;
    };
    match raw.parse::<u64>() {
        Ok(secs) => secs * 1000,
        Err(_) => {
            warn!("config option {key} has invalid integer {raw:?}, using default");
            default_ms
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Some(true),
        "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_without_config_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(Config::load(dir.path()), Config::default());
    }

    #[test]
    fn parse_converts_threshold_seconds_to_milliseconds() {
        let raw = "[Config]\nrestart_last = no\nrestart_delay = 5\nupdate_interval = 7\n\
                   rewind_time = 15\nmin_runtime = 60\nmax_runtime = 30\n";
        let config = Config::parse(raw);
        assert!(!config.restart_last);
        assert_eq!(config.restart_delay_secs, 5);
        assert_eq!(config.update_interval_secs, 7);
        assert_eq!(config.rewind_ms, 15_000);
        assert_eq!(config.min_runtime_ms, 60_000);
        assert_eq!(config.max_runtime_ms, 30_000);
    }

    #[test]
    fn malformed_values_fall_back_per_field() {
        let raw = "[Config]\nrestart_last = maybe\nrewind_time = soon\nmin_runtime = 60\n";
        let config = Config::parse(raw);
        assert_eq!(config.restart_last, Config::default().restart_last);
        assert_eq!(config.rewind_ms, Config::default().rewind_ms);
        assert_eq!(config.min_runtime_ms, 60_000);
    }

    #[test]
    fn boolean_options_accept_all_config_forms() {
        for (raw, expected) in [("1", true), ("on", true), ("FALSE", false), ("Off", false)] {
            assert_eq!(parse_bool(raw), Some(expected), "for input {raw:?}");
        }
        assert_eq!(parse_bool("2"), None);
    }
}
