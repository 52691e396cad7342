//! Database and Web Data to Amazon S3 Backup Tool
//!
//! Dumps configured MySQL databases and web folders, packages each into a
//! zip archive, and ships the archives to S3-compatible object storage.

// backuptool/src/main.rs
mod backup;
mod config;
mod errors;
mod utils;

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use backup::RunSummary;
use config::RunConfig;

const DEFAULT_CONFIG_FILE: &str = "backup-to-s3.json";
const USAGE: &str = "Usage: backuptool [CONFIG_FILE] [--databases] [--folders] [-v|--verbose]";

/// Main entry point for the backup tool
#[tokio::main]
async fn main() -> ExitCode {
    let options = match CliOptions::parse(env::args().skip(1)) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("❌ {}", message);
            eprintln!("{}", USAGE);
            return ExitCode::FAILURE;
        }
    };

    match run_app(&options).await {
        Ok(summary) if summary.has_failures() => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app(options: &CliOptions) -> Result<RunSummary> {
    let config = RunConfig::load_from_json(&options.config_path, options.verbose)
        .context("Failed to load backup configuration")?;

    if options.verbose {
        println!("🚀 Starting backup run ({})", options.config_path.display());
    }

    let summary =
        backup::run_backup_flow(&config, options.run_databases, options.run_folders).await?;
    Ok(summary)
}

#[derive(Debug)]
struct CliOptions {
    config_path: PathBuf,
    run_databases: bool,
    run_folders: bool,
    verbose: bool,
}

impl CliOptions {
    /// Parses the argument list. With neither `--databases` nor
    /// `--folders` given, both unit groups run.
    fn parse(args: impl Iterator<Item = String>) -> std::result::Result<Self, String> {
        let mut config_path: Option<PathBuf> = None;
        let mut databases_flag = false;
        let mut folders_flag = false;
        let mut verbose = false;

        for arg in args {
            match arg.as_str() {
                "--databases" => databases_flag = true,
                "--folders" => folders_flag = true,
                "-v" | "--verbose" => verbose = true,
                other if other.starts_with('-') => {
                    return Err(format!("Unknown option: {}", other));
                }
                _ => {
                    if config_path.is_some() {
                        return Err(format!("Unexpected argument: {}", arg));
                    }
                    config_path = Some(PathBuf::from(arg));
                }
            }
        }

        let (run_databases, run_folders) = if databases_flag || folders_flag {
            (databases_flag, folders_flag)
        } else {
            (true, true)
        };

        Ok(CliOptions {
            config_path: config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE)),
            run_databases,
            run_folders,
            verbose,
        })
    }
}
