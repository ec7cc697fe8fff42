//! Config command - View and validate Drive Mirror configuration
//!
//! Provides the `drivemirror config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Validates the configuration file and reports errors
//! 3. Prints the path of the configuration file

use anyhow::{Context, Result};
use clap::Subcommand;
use drivemirror_core::config::Config;
use tracing::info;

use crate::output::{get_formatter, OutputFormat};
use crate::CliContext;

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx),
            ConfigCommand::Validate => self.execute_validate(ctx),
            ConfigCommand::Path => self.execute_path(ctx),
        }
    }

    /// Show the configuration after file, defaults and environment overrides
    fn execute_show(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format == OutputFormat::Json);

        info!(config_path = %ctx.config_path.display(), "Showing configuration");

        if ctx.format == OutputFormat::Json {
            let json = serde_json::to_value(&ctx.config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
            formatter.info("");

            let yaml = serde_yaml::to_string(&ctx.config)
                .context("Failed to serialize configuration to YAML")?;

            for line in yaml.lines() {
                formatter.info(line);
            }
        }

        Ok(())
    }

    /// Validate the configuration file on disk
    fn execute_validate(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format == OutputFormat::Json);
        let config_path = &ctx.config_path;

        // Load explicitly so parse errors are reported instead of defaulted
        let mut config = match Config::load(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                if !config_path.exists() {
                    if ctx.format == OutputFormat::Json {
                        let json = serde_json::json!({
                            "valid": false,
                            "config_path": config_path.display().to_string(),
                            "errors": ["Configuration file not found. Using defaults."],
                        });
                        formatter.print_json(&json);
                    } else {
                        formatter.info(&format!(
                            "Configuration file not found at {}",
                            config_path.display()
                        ));
                        formatter.info("Using default configuration.");
                    }
                    return Ok(());
                }

                if ctx.format == OutputFormat::Json {
                    let json = serde_json::json!({
                        "valid": false,
                        "config_path": config_path.display().to_string(),
                        "errors": [format!("{:#}", e)],
                    });
                    formatter.print_json(&json);
                } else {
                    formatter.error(&format!("{:#}", e));
                }
                return Ok(());
            }
        };
        config.apply_env_overrides();

        info!(config_path = %config_path.display(), "Validating configuration");

        let errors = config.validate();

        if ctx.format == OutputFormat::Json {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            let json = serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": config_path.display().to_string(),
                "errors": error_strings,
            });
            formatter.print_json(&json);
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", config_path.display()));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            formatter.info(&format!("File: {}", config_path.display()));
            formatter.info("");
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }

        Ok(())
    }

    fn execute_path(&self, ctx: &CliContext) -> Result<()> {
        if ctx.format == OutputFormat::Json {
            let formatter = get_formatter(true);
            formatter.print_json(&serde_json::json!({
                "config_path": ctx.config_path.display().to_string(),
                "exists": ctx.config_path.exists(),
            }));
        } else {
            println!("{}", ctx.config_path.display());
        }
        Ok(())
    }
}
