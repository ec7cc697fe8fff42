//! Mirror command - Download a Google Drive account into a local directory
//!
//! Provides the `drivemirror mirror` CLI command which:
//! 1. Merges command-line overrides into the loaded configuration
//! 2. Picks a credential provider (token file or a bare access token)
//! 3. Starts a [`DriveMirror`] run and streams its messages to stdout
//! 4. Keeps a progress line on stderr and prints a summary

use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Args;
use drivemirror_core::config::Config;
use drivemirror_core::domain::message::MirrorMessage;
use drivemirror_core::domain::session::{SessionEndpoints, SessionToken};
use drivemirror_core::ports::credentials::{CredentialProvider, StaticCredentialProvider};
use drivemirror_drive::auth::TokenFileCredentialProvider;
use drivemirror_sync::engine::{DriveMirror, MirrorOptions, MirrorSummary};
use tracing::info;

use crate::output::{get_formatter, OutputFormat};
use crate::CliContext;

/// Mirror command with clap options
#[derive(Debug, Args)]
pub struct MirrorCommand {
    /// Local directory to mirror into
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Maximum number of parallel execution units
    #[arg(long)]
    pub units: Option<usize>,

    /// Concurrent transfers inside each execution unit
    #[arg(long)]
    pub sub_concurrency: Option<usize>,

    /// JSON token file holding the OAuth2 session
    #[arg(long, conflicts_with = "access_token")]
    pub token_file: Option<PathBuf>,

    /// Use this access token as is (no refresh)
    #[arg(long)]
    pub access_token: Option<String>,
}

impl MirrorCommand {
    /// Execute the mirror command
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format == OutputFormat::Json);

        let mut config = ctx.config.clone();
        self.apply_to(&mut config);

        let errors = config.validate();
        if !errors.is_empty() {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            bail!("Invalid configuration: {}", messages.join("; "));
        }

        let credentials = self.credentials(&config);
        let options = MirrorOptions::from_config(&config);

        info!(
            root = %options.root.display(),
            max_units = ?options.scheduler.max_units,
            sub_concurrency = options.scheduler.unit.sub_concurrency,
            "Starting mirror"
        );
        if ctx.format == OutputFormat::Human && !ctx.quiet {
            formatter.info(&format!("Mirroring into {}", options.root.display()));
        }

        let started = Instant::now();
        let mirror = DriveMirror::new(credentials, options);
        let mut run = mirror
            .start()
            .await
            .context("Mirror run could not start")?;

        let show_progress =
            ctx.format == OutputFormat::Human && !ctx.quiet && std::io::stderr().is_terminal();

        let mut summary = MirrorSummary::default();
        while let Some(message) = run.next().await {
            summary.record(&message);
            if show_progress {
                clear_progress();
            }
            if should_print(&message, ctx.quiet) {
                formatter.mirror_message(&message);
            }
            if show_progress && !message.is_sentinel() {
                draw_progress(run.progress().completed(), run.progress().total());
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if ctx.format == OutputFormat::Json {
            formatter.print_json(&serde_json::json!({
                "downloaded": summary.downloaded,
                "skipped_existing": summary.skipped_existing,
                "skipped_no_export": summary.skipped_no_export,
                "errors": summary.errors,
                "warnings": summary.warnings,
                "duration_ms": elapsed_ms,
            }));
        } else {
            let line = summary_line(&summary, elapsed_ms);
            if summary.has_errors() {
                formatter.warn(&line);
            } else {
                formatter.success(&line);
            }
        }

        Ok(())
    }

    /// Folds command-line overrides into `config`
    fn apply_to(&self, config: &mut Config) {
        if let Some(root) = &self.root {
            config.mirror.root = root.clone();
        }
        if let Some(units) = self.units {
            config.mirror.max_units = Some(units);
        }
        if let Some(n) = self.sub_concurrency {
            config.mirror.sub_concurrency = n;
        }
        if let Some(path) = &self.token_file {
            config.auth.token_file = path.clone();
        }
    }

    fn credentials(&self, config: &Config) -> Arc<dyn CredentialProvider> {
        let endpoints = SessionEndpoints {
            token_uri: config.api.token_uri.clone(),
            api_base_url: config.api.base_url.clone(),
        };

        match &self.access_token {
            Some(token) => {
                let session = SessionToken::new(token.clone()).with_endpoints(endpoints);
                Arc::new(StaticCredentialProvider::new(session))
            }
            None => Arc::new(
                TokenFileCredentialProvider::new(&config.auth.token_file).with_endpoints(endpoints),
            ),
        }
    }
}

/// In quiet mode only problems and the sentinel are printed
fn should_print(message: &MirrorMessage, quiet: bool) -> bool {
    !quiet
        || matches!(
            message,
            MirrorMessage::Error { .. }
                | MirrorMessage::Warning { .. }
                | MirrorMessage::Finished
                | MirrorMessage::NoFiles
        )
}

fn clear_progress() {
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "\r\x1b[2K");
    let _ = stderr.flush();
}

fn draw_progress(completed: usize, total: usize) {
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "{}", progress_line(completed, total));
    let _ = stderr.flush();
}

fn progress_line(completed: usize, total: usize) -> String {
    let percent = if total == 0 {
        100.0
    } else {
        completed as f64 * 100.0 / total as f64
    };
    format!("[{}/{}] {:.0}%", completed, total, percent)
}

fn summary_line(summary: &MirrorSummary, elapsed_ms: u64) -> String {
    let duration = if elapsed_ms >= 1000 {
        format!("{:.1}s", elapsed_ms as f64 / 1000.0)
    } else {
        format!("{}ms", elapsed_ms)
    };
    format!(
        "{} downloaded, {} already present, {} without export, {} failed in {}",
        summary.downloaded,
        summary.skipped_existing,
        summary.skipped_no_export,
        summary.errors,
        duration
    )
}
