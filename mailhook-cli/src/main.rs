//! mailhook CLI tool

#![allow(clippy::multiple_crate_versions)]

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use commands::{CheckCommand, OutboxCommand, SendCommand};
use mailhook::observability::{self, LogFormat, ObservabilityConfig};

#[derive(Parser)]
#[command(name = "mailhook")]
#[command(version)]
#[command(about = "Check mail configuration, send templates and inspect captured mail", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./mailhook.toml and the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration and list transports
    Check(CheckCommand),
    /// Render a template and send it
    Send(SendCommand),
    /// Show messages recorded by capture transports
    Outbox(OutboxCommand),
}

fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info,mailhook=debug",
        _ => "debug,mailhook=trace",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    observability::init_with(
        &ObservabilityConfig::new(log_filter(cli.verbose)).with_format(LogFormat::Compact),
    )?;

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Check(cmd) => cmd.execute(config),
        Commands::Send(cmd) => cmd.execute(config).await,
        Commands::Outbox(cmd) => cmd.execute(&config).await,
    }
}
