// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output formatting for CLI commands

use clap::ValueEnum;
use serde::Serialize;
use tabletx_core::EngineConfig;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary lines (TOML for configuration)
    #[default]
    Text,
    Json,
}

/// Print a report in the specified format
pub fn print<T: Serialize + std::fmt::Display>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", value),
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(value) {
                println!("{}", json);
            }
        }
    }
}

/// Print an engine configuration as a document that loads back unchanged
pub fn print_config(config: &EngineConfig, format: OutputFormat) -> anyhow::Result<()> {
    let document = match format {
        OutputFormat::Text => config.to_toml_string()?,
        OutputFormat::Json => serde_json::to_string_pretty(config)? + "\n",
    };
    print!("{}", document);
    Ok(())
}
