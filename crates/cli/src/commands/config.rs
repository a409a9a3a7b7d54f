// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Config commands

use crate::output::{self, OutputFormat};
use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tabletx_core::EngineConfig;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Validate a configuration file
    Check {
        /// Path to the TOML file
        file: PathBuf,
    },
}

/// Configuration from `path`, or defaults when none is given
pub fn load(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .map_err(|e| anyhow::anyhow!("failed to load {}: {}", path.display(), e)),
        None => Ok(EngineConfig::default()),
    }
}

pub fn handle(command: ConfigCommand, path: Option<&Path>, format: OutputFormat) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            output::print_config(&load(path)?, format)?;
        }
        ConfigCommand::Check { file } => {
            let config = load(Some(&file))?;
            output::print(&CheckReport::new(&file, &config), format);
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct CheckReport {
    file: String,
    valid: bool,
    max_batch_size: usize,
    page_size: usize,
    auto_create_tables: bool,
}

impl CheckReport {
    fn new(file: &Path, config: &EngineConfig) -> Self {
        Self {
            file: file.display().to_string(),
            valid: true,
            max_batch_size: config.batch.max_batch_size,
            page_size: config.scan.page_size,
            auto_create_tables: config.auto_create_tables,
        }
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: ok (batch={} page={} auto_create={})",
            self.file, self.max_batch_size, self.page_size, self.auto_create_tables
        )
    }
}
