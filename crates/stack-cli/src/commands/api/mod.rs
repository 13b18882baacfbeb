//! API subcommand implementations.

mod diagnostics;
mod request;

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cli::ConnectionArgs;

#[derive(Args, Debug)]
pub struct ApiCommand {
    #[command(subcommand)]
    pub command: ApiSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum ApiSubcommand {
    /// Send a request through the retrying pipeline
    Request(request::RequestArgs),

    /// Run the network self-test
    Diagnostics(diagnostics::DiagnosticsArgs),
}

pub async fn handle(cmd: ApiCommand, connection: &ConnectionArgs) -> Result<()> {
    match cmd.command {
        ApiSubcommand::Request(args) => request::run(args, connection).await,
        ApiSubcommand::Diagnostics(args) => diagnostics::run(args, connection).await,
    }
}
