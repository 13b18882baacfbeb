//! Logout command implementation.

use anyhow::{Context, Result};
use clap::Args;

use stack_client::ClientInterface;

use crate::cli::ConnectionArgs;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct LogoutArgs {
    /// Only forget the local session, without telling the server
    #[arg(long)]
    pub local: bool,
}

pub async fn run(args: LogoutArgs, connection: &ConnectionArgs) -> Result<()> {
    if args.local {
        session::storage::clear_session()?;
        output::success("Local session removed");
        return Ok(());
    }

    let client = ClientInterface::new(&connection.load()?).context("Failed to create client")?;
    let session = session::restore(&client)?;

    client
        .sign_out(&session)
        .await
        .context("Failed to sign out")?;
    session::storage::clear_session()?;

    output::success("Signed out");
    Ok(())
}
