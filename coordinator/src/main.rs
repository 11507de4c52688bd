//! Shim binary that calls into the coordinator library's `inner_main`.
use clap::Parser as _;
use eyre::Result;
use hostplane_coordinator::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    hostplane_coordinator::inner_main(Cli::parse()).await
}
