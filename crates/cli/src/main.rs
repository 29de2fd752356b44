//! dropwatch — debounced drop-folder import trigger daemon.
//!
//! Watches configured drop folders, groups changed files into filesets,
//! and fires the external import command once per quiet fileset.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use dropwatch_cli::config::Config;
use dropwatch_cli::run;

#[derive(Parser)]
#[command(
    name = "dropwatch",
    version,
    about = "Debounced drop-folder import triggers"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the configured drop folders and trigger imports.
    Run {
        /// Path to the TOML configuration.
        #[arg(long, default_value = "dropwatch.toml")]
        config: PathBuf,
    },
    /// Parse and print the effective configuration, then exit.
    CheckConfig {
        /// Path to the TOML configuration.
        #[arg(long, default_value = "dropwatch.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run { config } => run::run(&config).await,
        Command::CheckConfig { config } => {
            let config = Config::load(&config)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
