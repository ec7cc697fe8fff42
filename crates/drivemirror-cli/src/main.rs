//! Drive Mirror CLI - Command-line interface for Drive Mirror
//!
//! Provides commands for:
//! - Mirroring a Google Drive account into a local directory
//! - Viewing and validating configuration
//! - Generating shell completions

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use drivemirror_core::config::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{completions::CompletionsCommand, config::ConfigCommand, mirror::MirrorCommand};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "drivemirror",
    version,
    about = "Mirror a Google Drive account into a local directory"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Download every file of the account into the mirror root
    Mirror(MirrorCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

/// Settings shared by every command
#[derive(Debug)]
pub struct CliContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub format: OutputFormat,
    pub quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config_path, mut config) = match &cli.config {
        Some(path) => {
            let config = Config::load(path).context("Could not load the requested config file")?;
            (path.clone(), config)
        }
        None => {
            let path = Config::default_path();
            let config = Config::load_or_default(&path);
            (path, config)
        }
    };
    config.apply_env_overrides();

    init_tracing(log_filter(cli.verbose, &config.logging.level), cli.json);

    let ctx = CliContext {
        config,
        config_path,
        format: if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        },
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Mirror(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
        Commands::Completions(cmd) => cmd.execute(&ctx).await,
    }
}

/// Log filter: `RUST_LOG` wins, then `-v`, then the configured level
fn log_filter(verbose: u8, configured: &str) -> EnvFilter {
    let level = match verbose {
        0 => configured,
        1 => "debug",
        _ => "trace",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Logs go to stderr; stdout carries the mirror output
fn init_tracing(filter: EnvFilter, json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
