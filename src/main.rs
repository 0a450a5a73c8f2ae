use anyhow::Result;
use clap::Parser;

use watchlater::cli::Cli;
use watchlater::report;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    report::run(&cli.path)
}
