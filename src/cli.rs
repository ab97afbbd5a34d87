use crate::adapters::memory::InMemoryWarehouse;
use crate::server::http;
use anyhow::{Context as _, Result};
use clap::Subcommand;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the in-memory REST emulator that integration tests point at
    Serve {
        #[arg(long, default_value = "127.0.0.1:9050")]
        addr: SocketAddr,
    },
}

pub fn run(command: Command) -> Result<()> {
    match command {
        Command::Serve { addr } => serve(addr),
    }
}

/// Blocks until the server stops. The emulator starts empty.
fn serve(addr: SocketAddr) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(http::serve(Arc::new(InMemoryWarehouse::new()), addr))
}
