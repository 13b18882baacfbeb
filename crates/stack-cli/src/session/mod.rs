//! Persisted sign-in state.

pub mod storage;

use anyhow::{Context, Result, bail};

use stack_client::{ClientInterface, Session};
use stack_core::{AccessToken, RefreshToken};

use storage::StoredSession;

/// Restore the stored session for `client`'s project.
///
/// Fails if nobody is signed in or the stored session belongs to another
/// project or API.
pub fn restore(client: &ClientInterface) -> Result<Session> {
    let stored = storage::load_session()
        .context("Failed to load session")?
        .context("No active session. Run 'stack auth login' first.")?;

    if stored.project_id != client.project_id().as_str() {
        bail!(
            "The stored session belongs to project '{}'. Run 'stack auth login' for '{}'.",
            stored.project_id,
            client.project_id()
        );
    }
    let api_url = client.pipeline().api_url().as_str();
    if stored.api_url != api_url {
        bail!(
            "The stored session was created against {}, not {api_url}.",
            stored.api_url
        );
    }

    Ok(client.create_session(
        stored.refresh_token.map(RefreshToken::new),
        stored.access_token.map(AccessToken::new),
    ))
}

/// Persist the current tokens of `session`.
pub fn save(client: &ClientInterface, session: &Session) -> Result<()> {
    let stored = StoredSession {
        api_url: client.pipeline().api_url().as_str().to_string(),
        project_id: client.project_id().as_str().to_string(),
        access_token: session.access_token().map(|t| t.as_str().to_string()),
        refresh_token: session.refresh_token().map(|t| t.as_str().to_string()),
        saved_at: chrono::Utc::now(),
    };
    storage::save_session(&stored).context("Failed to save session")
}

/// Like [`restore`], but `None` when nobody is signed in.
pub fn restore_if_present(client: &ClientInterface) -> Result<Option<Session>> {
    if storage::load_session()
        .context("Failed to load session")?
        .is_none()
    {
        return Ok(None);
    }
    restore(client).map(Some)
}
