use anyhow::Result;
use bq_fixtures::cli::{self, Command};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "bqfixture", version, about = "Local BigQuery emulator for fixture tests")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bq_fixtures=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    cli::run(Cli::parse().command)
}
