// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use errflow_cli::commands;
use errflow_config::load_config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "errflow", version, about = "Error classification and handling toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,

    /// Configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every registered error type.
    Catalog {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Resolve a built-in exception class to its error type.
    Classify {
        /// Exception class name, e.g. `TimeoutException`.
        class: String,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Load and validate a configuration file.
    CheckConfig {
        /// Path to the TOML file.
        path: PathBuf,
    },

    /// Print the JSON schema of the configuration file.
    Schema,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let filter = if cli.debug {
        EnvFilter::new("errflow=debug")
    } else {
        EnvFilter::new(format!(
            "errflow={}",
            config.log_level.as_deref().unwrap_or("info")
        ))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Catalog { json } => {
            let repo = config.build_repository()?;
            let entries = commands::catalog(&repo);
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print!("{}", commands::catalog_text(&entries));
            }
        }
        Commands::Classify { class, json } => {
            let repo = config.build_repository()?;
            let c = commands::classify(&repo, &class)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&c)?);
            } else {
                println!("{} -> {}", c.class, c.error_type);
                if c.critical {
                    println!("critical: bypasses every handler");
                }
            }
        }
        Commands::CheckConfig { path } => {
            let report = commands::check_config(&path)?;
            for w in &report.warnings {
                println!("warning: {w}");
            }
            println!(
                "ok: {} error type(s), {} flow(s)",
                report.error_types, report.flows
            );
        }
        Commands::Schema => {
            println!("{}", commands::schema_json().context("render schema")?);
        }
    }
    Ok(())
}
