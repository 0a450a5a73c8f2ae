use std::path::PathBuf;

use anyhow::{Context, Result};

/// Default directory holding the config file, the last-played pointer and
/// the per-item resume records.
pub fn default_base_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("unable to resolve data directory")?;
    Ok(base.join("watchlater"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_dir_ends_with_the_app_directory() {
        if let Ok(dir) = default_base_dir() {
            assert!(dir.ends_with("watchlater"));
        }
    }
}
