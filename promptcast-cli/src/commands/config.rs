//! Configuration management CLI commands.
//!
//! Provides `config path`, `config init` and `config show` for locating,
//! creating and inspecting the configuration file.

use clap::Subcommand;
use promptcast::config::{config_file_path, ConfigFile};
use std::path::{Path, PathBuf};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,

        /// Where to write the file instead of ~/.promptcast/config.ini
        #[arg(long, value_name = "FILE")]
        path: Option<PathBuf>,
    },

    /// Show the effective configuration
    Show {
        /// Config file to read instead of ~/.promptcast/config.ini
        #[arg(long, value_name = "FILE")]
        path: Option<PathBuf>,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => run_path(),
        ConfigCommands::Init { force, path } => {
            run_init(&path.unwrap_or_else(config_file_path), force)
        }
        ConfigCommands::Show { path } => run_show(&path.unwrap_or_else(config_file_path)),
    }
}

/// Show the configuration file path.
fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}

/// Write the default configuration.
fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    let written = if force {
        ConfigFile::default().save_to(path)?;
        true
    } else {
        ConfigFile::ensure_exists_at(path)?
    };

    if written {
        println!("Wrote default configuration to {}", path.display());
    } else {
        println!(
            "Configuration already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    Ok(())
}

/// Print every setting with its effective value.
fn run_show(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(path)?;

    println!("Configuration Settings");
    println!("======================");
    if path.exists() {
        println!("File: {}", path.display());
    } else {
        println!("File: {} (not found, using defaults)", path.display());
    }
    println!();

    for (section, entries) in settings(&config) {
        println!("[{}]", section);
        for (key, value) in entries {
            println!("  {} = {}", key, value);
        }
        println!();
    }

    Ok(())
}

/// Effective settings grouped by section, in file order.
fn settings(config: &ConfigFile) -> Vec<(&'static str, Vec<(&'static str, String)>)> {
    vec![
        (
            "generator",
            vec![
                ("url", config.generator.url.clone()),
                ("timeout", config.generator.timeout.to_string()),
            ],
        ),
        (
            "upscaler",
            vec![
                ("url", config.upscaler.url.clone()),
                ("timeout", config.upscaler.timeout.to_string()),
            ],
        ),
        (
            "pipeline",
            vec![
                (
                    "generate_workers",
                    config.pipeline.generate_workers.to_string(),
                ),
                ("upscale_workers", config.pipeline.upscale_workers.to_string()),
                ("request_timeout", config.pipeline.request_timeout.to_string()),
                ("failure_policy", config.pipeline.failure_policy.to_string()),
                ("max_retries", config.pipeline.max_retries.to_string()),
                ("retry_backoff_ms", config.pipeline.retry_backoff_ms.to_string()),
            ],
        ),
        (
            "output",
            vec![("directory", config.output.directory.display().to_string())],
        ),
        (
            "logging",
            vec![("file", config.logging.file.display().to_string())],
        ),
    ]
}
