//! MongoDB dump and multi-cloud replication tool
//!
//! Dumps a MongoDB deployment with `mongodump`, replicates the dated dump
//! folder to every configured storage provider and reports the outcome.

// mongodumptool/src/main.rs
mod backup;
mod cli;
mod config;
mod errors;
mod log;
mod notify;
mod storage;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

use cli::Cli;

/// Main entry point for the dump tool
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    log::init(cli.verbose);

    match run_app(cli).await {
        Ok(true) => {
            info!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            error!("❌ Operation finished with errors.");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("❌ Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app(cli: Cli) -> Result<bool> {
    let flags = cli.to_settings()?;
    let app_config = config::load(cli.env.as_deref(), cli.config.as_deref(), flags)
        .context("Failed to load application configuration")?;
    app_config.log_summary();

    info!("🚀 Starting dump process...");
    let report = backup::run_backup_flow(&app_config).await;

    let notifiers = notify::create_notifiers(&app_config.notifications);
    if !notifiers.is_empty() {
        let message = notify::status_message(&report);
        notify::dispatch(&notifiers, &message).await;
    }

    Ok(report.succeeded())
}
