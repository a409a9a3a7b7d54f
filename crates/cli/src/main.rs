// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tabletx - operator tool for the tabletx storage engine

mod commands;
mod counter;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{config, stress};
use output::OutputFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tabletx",
    version,
    about = "tabletx - transactional entity storage over a partitioned table store"
)]
struct Cli {
    /// Engine configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and validate engine configuration
    Config(config::ConfigArgs),
    /// Run contention scenarios against the in-memory store
    Stress(stress::StressArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Config(args) => config::handle(args.command, cli.config.as_deref(), cli.format),
        Commands::Stress(args) => {
            let engine_config = config::load(cli.config.as_deref())?;
            stress::handle(args.command, engine_config, cli.format).await
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
