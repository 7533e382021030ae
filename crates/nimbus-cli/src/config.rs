//! CLI configuration.
//!
//! All transport options can be provided via CLI arguments or environment
//! variables. Use `--help` to see all available options.

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use nimbus_client::{ClientConfig, Credentials, NimbusClient};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::TRACING_TARGET_CONFIG;
use crate::commands::Command;

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "nimbus")]
#[command(about = "Command-line client for nimbus.io object storage")]
#[command(version)]
pub struct Cli {
    /// Credentials file to read instead of ~/.nimbus.io
    #[arg(long = "config", env = "NIMBUS_IO_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Transport options shared by every request.
    #[clap(flatten)]
    pub client: ClientConfig,

    /// Operation to perform.
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Initializes tracing with environment-based filtering.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    /// Loads credentials and builds the client.
    pub fn connect(&self) -> anyhow::Result<NimbusClient> {
        let credentials = match &self.config {
            Some(path) => Credentials::load_from(path)
                .with_context(|| format!("failed to load credentials from {}", path.display()))?,
            None => Credentials::load().context("failed to load credentials")?,
        };

        NimbusClient::new(credentials, self.client.clone()).context("failed to create client")
    }

    /// Logs configuration at debug level (no sensitive information).
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_CONFIG,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            features = ?Self::enabled_features(),
            "Build information"
        );

        tracing::debug!(
            target: TRACING_TARGET_CONFIG,
            service_domain = %self.client.service_domain,
            base_address = ?self.client.base_address.as_ref().map(|u| u.as_str()),
            http_timeout_secs = self.client.http_timeout,
            credentials_file = ?self.config,
            "Client configuration"
        );
    }

    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}
