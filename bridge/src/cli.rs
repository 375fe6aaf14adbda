//! Command-line interface of the standalone bridge binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{self, BridgeConfig, Deployment, FRIGATE_RTC_URL_ENV, FRIGATE_URL_ENV};

/// Top-level command-line interface definition.
#[derive(Debug, Parser)]
#[command(name = "frigate_bridge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    /// Format of the log output on stderr
    #[arg(long, value_enum, default_value_t, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Keep discovering cameras until interrupted, printing state events as JSON lines.
    Run(RunArgs),

    /// Run a single discovery cycle and print the resulting devices and entities.
    Discover(SourceArgs),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Where to find Frigate.
#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Path to an optional TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Base URL of the Frigate API (overrides the config file and persisted state)
    #[arg(long, env = FRIGATE_URL_ENV)]
    pub frigate_url: Option<String>,

    /// Base URL used for stream discovery, when it differs from the Frigate URL
    #[arg(long, env = FRIGATE_RTC_URL_ENV)]
    pub frigate_rtc_url: Option<String>,
}

impl SourceArgs {
    /// URLs given on the command line or in the environment.
    #[must_use]
    pub fn deployment(&self) -> Deployment {
        Deployment::new(self.frigate_url.clone(), self.frigate_rtc_url.clone())
    }

    /// Loads the config file if one was given.
    ///
    /// # Errors
    ///
    /// Returns an error if the given file cannot be read or parsed.
    pub async fn load_config(&self) -> eyre::Result<BridgeConfig> {
        match self.config {
            Some(ref path) => config::load(path).await,
            None => Ok(BridgeConfig::default()),
        }
    }
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// State file restored on start and written on shutdown (overrides `state_path` in the config)
    #[arg(short, long)]
    pub state: Option<PathBuf>,
}
