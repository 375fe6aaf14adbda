//! Library entry for the `frigate_bridge` crate.
//!
//! Discovers the cameras of a Frigate NVR, keeps them in a registry and
//! presents them to a host platform as devices and entities. Hosts embed
//! [`plugin::FrigatePlugin`]; `inner_main` runs the same engine standalone
//! from a workspace-level shim binary.
#![cfg_attr(
    test,
    expect(clippy::indexing_slicing, reason = "This is not problematic in tests",)
)]

extern crate alloc;
extern crate core;

pub mod cli;
pub mod codec;
pub mod config;
pub mod emitter;
pub mod error;
pub mod host;
pub mod model;
pub mod plugin;
pub mod presentation;
pub mod reconcile;
pub mod registry;
pub mod remote;
mod run;

use std::{io, sync::Once};

use eyre::Result;
use tracing::Instrument as _;
use tracing_subscriber::{EnvFilter, fmt::time::ChronoLocal};

use cli::{Cli, Command, LogFormat};

pub use error::BridgeError;
pub use plugin::FrigatePlugin;

static INIT_TRACING: Once = Once::new();

fn init_tracing(log_format: LogFormat) {
    INIT_TRACING.call_once(move || {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_timer(ChronoLocal::rfc_3339())
            // stdout carries the event and listing output
            .with_writer(io::stderr);

        match log_format {
            LogFormat::Compact => builder.compact().init(),
            LogFormat::Json => builder.json().init(),
            LogFormat::Pretty => builder.pretty().init(),
        }
    });
}

/// The bridge's main function; can be called from a shim binary.
///
/// # Errors
///
/// Returns an error if configuration or state cannot be loaded, or discovery fails in `discover` mode.
pub async fn inner_main(invocation: Cli) -> Result<()> {
    init_tracing(invocation.log_format);

    let span = tracing::info_span!(
        "bridge",
        pid = ?std::process::id(),
        version = env!("CARGO_PKG_VERSION")
    );
    match invocation.command {
        Command::Run(args) => run::run(args).instrument(span).await,
        Command::Discover(args) => run::discover(args).instrument(span).await,
    }
}
