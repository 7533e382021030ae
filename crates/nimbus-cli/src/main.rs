#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod commands;
mod config;

use std::process;

use crate::config::Cli;

// Tracing target constants
pub const TRACING_TARGET_CONFIG: &str = "nimbus_cli::config";
pub const TRACING_TARGET_TRANSFER: &str = "nimbus_cli::transfer";
pub const TRACING_TARGET_SHUTDOWN: &str = "nimbus_cli::shutdown";

#[tokio::main]
async fn main() {
    let error = match run().await {
        Ok(true) => process::exit(0),
        Ok(false) => process::exit(1),
        Err(error) => error,
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = %format!("{error:#}"),
            "command failed"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<bool> {
    let cli = Cli::init();

    Cli::init_tracing();
    cli.log();

    let client = cli.connect()?;
    let outcome = cli.command.execute(&client).await;
    client.close();

    outcome
}
