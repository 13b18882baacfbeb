//! Token refresh trait.

use async_trait::async_trait;

use crate::Result;
use crate::tokens::{AccessToken, RefreshToken};

/// Exchanges a refresh token for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Returns `Ok(None)` if the server rejected the refresh token, meaning
    /// the session is over. Any other failure is an error.
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<Option<AccessToken>>;
}
