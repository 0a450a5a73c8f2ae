//! On-disk text format shared by the config file and resume records: one
//! `[Name]` header followed by `key = value` lines. Literal `%` is stored
//! doubled so values survive a round trip.

use std::collections::HashMap;

pub(crate) fn escape(raw: &str) -> String {
    raw.replace('%', "%%")
}

pub(crate) fn unescape(raw: &str) -> String {
    raw.replace("%%", "%")
}

/// Parse the named section out of `raw`. Returns the key/value entries plus
/// the number of malformed lines that were skipped.
pub(crate) fn parse(raw: &str, section: &str) -> (HashMap<String, String>, usize) {
    let mut entries = HashMap::new();
    let mut skipped = 0;
    let mut in_section = false;
    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }
        if let Some(name) = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        {
            in_section = name == section;
            continue;
        }
        if !in_section {
            continue;
        }
        match trimmed.split_once('=') {
            Some((key, value)) => {
                entries.insert(key.trim().to_string(), unescape(value.trim()));
            }
            None => skipped += 1,
        }
    }
    (entries, skipped)
}

/// Render a section in the same shape `parse` reads back.
pub(crate) fn render(section: &str, entries: &[(&str, String)]) -> String {
    let mut out = format!("[{section}]\n");
    for (key, value) in entries {
        out.push_str(key);
        out.push_str(" = ");
        out.push_str(&escape(value));
        out.push('\n');
    }
    out
}
