//! docdiff -- stdio JSON-RPC server for previewing and applying document hunks.
//!
//! Usage: docdiff [--config <engine.json>]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "docdiff", version, about = "Locate, preview and apply proposed document edits", long_about = None)]
struct Args {
    /// JSON file with engine thresholds (missing fields keep their defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries JSON-RPC.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match args.config {
        Some(path) => docdiff::EngineConfig::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => docdiff::EngineConfig::default(),
    };

    docdiff::run_stdio_server(config)
}
