//! Login command implementation.

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;

use stack_client::ClientInterface;

use crate::cli::ConnectionArgs;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account email
    #[arg(long)]
    pub email: String,

    /// Account password
    #[arg(long, env = "STACK_PASSWORD", hide_env_values = true)]
    pub password: String,
}

pub async fn run(args: LoginArgs, connection: &ConnectionArgs) -> Result<()> {
    let config = connection.load()?;
    let client = ClientInterface::new(&config).context("Failed to create client")?;

    eprintln!("{}", "Signing in...".dimmed());

    let tokens = match client
        .sign_in_with_credential(&args.email, &args.password)
        .await
        .context("Failed to sign in")?
    {
        Ok(tokens) => tokens,
        Err(error) => bail!("Sign-in rejected: {error}"),
    };

    let session = client.create_session(tokens.refresh_token, Some(tokens.access_token));
    session::save(&client, &session)?;

    output::success("Signed in successfully");
    output::field("Project", config.project_id.as_str());
    output::field("API", config.api_url.as_str());

    Ok(())
}
