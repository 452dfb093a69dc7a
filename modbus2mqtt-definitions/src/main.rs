//! Loads and validates a modbus2mqtt register definitions document.

use anyhow::{Context, Result};
use clap::Parser;
use modbus2mqtt_common::init_tracing;
use modbus2mqtt_definitions::CatalogStore;
use modbus2mqtt_definitions::config::DefinitionsConfig;
use std::path::PathBuf;
use tracing::info;

/// Register definition loader for modbus2mqtt.
#[derive(Parser, Debug)]
#[command(name = "modbus2mqtt-definitions")]
#[command(about = "Loads and validates Modbus register definitions")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format)
    #[arg(short, long, default_value = "modbus2mqtt.json5")]
    config: PathBuf,

    /// Definitions document, overriding the configured path.
    #[arg(short, long)]
    definitions: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Print the normalized catalog as JSON.
    #[arg(long)]
    dump: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // A missing config file is fine when the definitions path is given directly
    let config = if args.definitions.is_some() && !args.config.exists() {
        DefinitionsConfig::default()
    } else {
        DefinitionsConfig::load_from_file(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?
    };

    let log_config = config
        .logging
        .clone()
        .with_level_override(args.log_level.as_deref());
    init_tracing(&log_config).context("Failed to init tracing")?;

    let definitions = args
        .definitions
        .clone()
        .unwrap_or_else(|| config.definitions_path(&args.config));

    info!(path = ?definitions, "Loading register definitions");

    let store = CatalogStore::new();
    let catalog = store
        .load_path(&definitions)
        .with_context(|| format!("Failed to load definitions from {:?}", definitions))?;

    let summary = catalog.summary();
    info!(
        definitions = summary.definitions,
        readable = summary.readable,
        writable = summary.writable,
        visible = summary.visible,
        retained = summary.retained,
        scaled = summary.scaled,
        "Register catalog ready"
    );

    if args.dump {
        println!("{}", catalog.to_json_pretty()?);
    }

    Ok(())
}
