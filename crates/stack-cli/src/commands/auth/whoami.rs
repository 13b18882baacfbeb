//! Whoami command implementation.

use anyhow::{Context, Result};
use clap::Args;

use stack_client::ClientInterface;

use crate::cli::ConnectionArgs;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct WhoamiArgs {
    /// Print the user as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: WhoamiArgs, connection: &ConnectionArgs) -> Result<()> {
    let client = ClientInterface::new(&connection.load()?).context("Failed to create client")?;
    let session = session::restore(&client)?;

    let user = client
        .get_current_user(Some(&session))
        .await
        .context("Failed to fetch the current user")?;

    // The request may have refreshed or invalidated the session.
    if session.is_known_to_be_invalid() {
        session::storage::clear_session()?;
    } else {
        session::save(&client, &session)?;
    }

    let user = user.context("Not signed in. Run 'stack auth login' first.")?;

    if args.json {
        return output::json_pretty(&user);
    }
    output::field("User", &user.id);
    output::optional_field("Name", user.display_name.as_deref());
    output::optional_field("Email", user.primary_email.as_deref());
    if let Some(millis) = user.signed_up_at_millis {
        if let Some(signed_up_at) = chrono::DateTime::from_timestamp_millis(millis) {
            output::field("Signed up", &signed_up_at.to_rfc3339());
        }
    }

    Ok(())
}
