//! Diagnostics command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use stack_client::ClientInterface;

use crate::cli::ConnectionArgs;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct DiagnosticsArgs {
    /// Probe the API root without the stored session
    #[arg(long)]
    pub anonymous: bool,
}

pub async fn run(args: DiagnosticsArgs, connection: &ConnectionArgs) -> Result<()> {
    let client = ClientInterface::new(&connection.load()?).context("Failed to create client")?;
    let session = if args.anonymous {
        None
    } else {
        session::restore_if_present(&client)?
    };

    eprintln!("{}", "Running network diagnostics...".dimmed());
    let report = client.run_network_diagnostics(session.as_ref()).await;

    output::json_pretty(&report)
}
