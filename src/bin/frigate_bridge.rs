//! Shim binary that calls into the `frigate_bridge` library's `inner_main`.
use clap::Parser as _;
use eyre::Result;
use frigate_bridge::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    frigate_bridge::inner_main(Cli::parse()).await
}
