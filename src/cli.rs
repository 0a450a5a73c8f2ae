use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "watchlater-report",
    version,
    about = "List stored resume records with their saved position and status"
)]
pub struct Cli {
    /// Directory to scan for stored resume records.
    #[arg(default_value = ".")]
    pub path: PathBuf,
}
