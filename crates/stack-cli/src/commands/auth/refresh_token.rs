//! Refresh token command implementation.

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;

use stack_client::ClientInterface;

use crate::cli::ConnectionArgs;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct RefreshTokenArgs {}

pub async fn run(_args: RefreshTokenArgs, connection: &ConnectionArgs) -> Result<()> {
    let client = ClientInterface::new(&connection.load()?).context("Failed to create client")?;
    let session = session::restore(&client)?;

    eprintln!("{}", "Refreshing session...".dimmed());

    let tokens = session
        .fetch_new_tokens()
        .await
        .context("Failed to refresh session")?;

    let Some(tokens) = tokens else {
        session::storage::clear_session()?;
        bail!("The refresh token was rejected. Run 'stack auth login' again.");
    };

    session::save(&client, &session).context("Failed to save refreshed session")?;

    output::success("Session refreshed successfully");
    match tokens.access_token.expires_at() {
        Some(expires_at) => output::field("Expires", &expires_at.to_rfc3339()),
        None => output::field("Expires", "unknown"),
    }

    Ok(())
}
