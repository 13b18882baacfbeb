//! Token types for Stack Auth authentication.

use std::fmt;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// An access token for authenticated API requests.
///
/// Access tokens are short-lived JWTs. The client only reads the payload to
/// judge freshness; it never verifies the signature.
///
/// # Security
///
/// - Never logged or displayed in Debug output
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

/// The subset of access token claims the client looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AccessTokenClaims {
    /// The user id the token was issued for.
    #[serde(default)]
    pub sub: Option<String>,
    /// Expiry, in seconds since the Unix epoch.
    #[serde(default)]
    pub exp: Option<i64>,
    /// Issue time, in seconds since the Unix epoch.
    #[serde(default)]
    pub iat: Option<i64>,
}

impl AccessToken {
    /// Create a new access token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token value for use in request headers.
    ///
    /// # Security
    ///
    /// Use only when constructing HTTP headers or persisting a session.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the JWT payload. Returns `None` if the token is not a
    /// structurally valid JWT.
    pub fn claims(&self) -> Option<AccessTokenClaims> {
        let mut segments = self.0.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return None;
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Returns true if the token can be parsed as a JWT.
    pub fn is_parseable(&self) -> bool {
        self.claims().is_some()
    }

    /// Returns when the token expires, or `None` if it is unparseable or
    /// carries no `exp` claim.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.claims()?
            .exp
            .and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// Returns true if the token has expired at `now`.
    ///
    /// Unparseable tokens count as expired; tokens without `exp` never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.claims() {
            None => true,
            Some(claims) => match claims.exp.and_then(|exp| DateTime::from_timestamp(exp, 0)) {
                None => false,
                Some(expires_at) => expires_at <= now,
            },
        }
    }

    /// Time left until expiry at `now`. Zero once expired, `None` if the
    /// token never expires or cannot be parsed.
    pub fn expires_in(&self, now: DateTime<Utc>) -> Option<Duration> {
        let expires_at = self.expires_at()?;
        Some((expires_at - now).to_std().unwrap_or(Duration::ZERO))
    }

    /// Returns true if the token is likely to still be accepted for at least
    /// `min_validity` after `now`.
    pub fn is_likely_valid_for(&self, now: DateTime<Utc>, min_validity: Duration) -> bool {
        let Some(claims) = self.claims() else {
            return false;
        };
        match claims.exp.and_then(|exp| DateTime::from_timestamp(exp, 0)) {
            None => true,
            Some(expires_at) => match (expires_at - now).to_std() {
                Ok(remaining) => remaining >= min_validity,
                Err(_) => false,
            },
        }
    }
}

// Hide token value in Debug output
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccessToken").field(&"[REDACTED]").finish()
    }
}

/// A refresh token for obtaining new access tokens.
///
/// Refresh tokens are opaque and long-lived.
///
/// # Security
///
/// - Never logged or displayed in Debug output
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshToken(String);

impl RefreshToken {
    /// Create a new refresh token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token value for use in refresh requests.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A refresh token is usable if it is not empty.
    pub fn is_valid(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

// Hide token value in Debug output
impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RefreshToken").field(&"[REDACTED]").finish()
    }
}

/// A snapshot of a session's tokens, as attached to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: AccessToken,
    pub refresh_token: Option<RefreshToken>,
}
