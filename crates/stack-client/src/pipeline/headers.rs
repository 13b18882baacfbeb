//! Request header construction.

use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};

use stack_core::error::InvalidInputError;
use stack_core::{AccessType, Result, TokenPair};

use super::RequestIdentity;

pub const PROJECT_ID: &str = "x-stack-project-id";
pub const ACCESS_TYPE: &str = "x-stack-access-type";
pub const ACCESS_TOKEN: &str = "x-stack-access-token";
pub const REFRESH_TOKEN: &str = "x-stack-refresh-token";
pub const ADMIN_ACCESS_TOKEN: &str = "x-stack-admin-access-token";
pub const PUBLISHABLE_CLIENT_KEY: &str = "x-stack-publishable-client-key";
pub const SECRET_SERVER_KEY: &str = "x-stack-secret-server-key";
pub const SUPER_SECRET_ADMIN_KEY: &str = "x-stack-super-secret-admin-key";
pub const ALLOW_ANONYMOUS_USER: &str = "x-stack-allow-anonymous-user";
pub const OVERRIDE_ERROR_STATUS: &str = "x-stack-override-error-status";
pub const RANDOM_NONCE: &str = "x-stack-random-nonce";
pub const CLIENT_VERSION: &str = "x-stack-client-version";

pub const ACTUAL_STATUS: &str = "x-stack-actual-status";
pub const KNOWN_ERROR: &str = "x-stack-known-error";

/// Headers for one attempt.
///
/// Caller headers go in first, so identity headers always win.
pub(crate) fn build(
    caller: &HeaderMap,
    identity: &RequestIdentity,
    tokens: Option<&TokenPair>,
    admin_tokens: Option<&TokenPair>,
    client_version: &str,
    has_body: bool,
) -> Result<HeaderMap> {
    let mut headers = caller.clone();

    if has_body && !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));

    set(&mut headers, PROJECT_ID, identity.project_id.as_str())?;
    set(&mut headers, ACCESS_TYPE, identity.access_type.as_str())?;

    if let Some(tokens) = tokens {
        set(&mut headers, ACCESS_TOKEN, tokens.access_token.as_str())?;
        if let Some(refresh_token) = &tokens.refresh_token {
            set(&mut headers, REFRESH_TOKEN, refresh_token.as_str())?;
        }
    }
    if let Some(admin_tokens) = admin_tokens {
        set(&mut headers, ADMIN_ACCESS_TOKEN, admin_tokens.access_token.as_str())?;
    }

    let keys = &identity.keys;
    if let Some(key) = &keys.publishable_client_key {
        set(&mut headers, PUBLISHABLE_CLIENT_KEY, key)?;
    }
    if matches!(identity.access_type, AccessType::Server | AccessType::Admin) {
        if let Some(key) = &keys.secret_server_key {
            set(&mut headers, SECRET_SERVER_KEY, key)?;
        }
    }
    if identity.access_type == AccessType::Admin {
        if let Some(key) = &keys.super_secret_admin_key {
            set(&mut headers, SUPER_SECRET_ADMIN_KEY, key)?;
        }
    }

    set(&mut headers, RANDOM_NONCE, &uuid::Uuid::new_v4().to_string())?;
    set(&mut headers, ALLOW_ANONYMOUS_USER, "true")?;
    set(&mut headers, OVERRIDE_ERROR_STATUS, "true")?;
    set(&mut headers, CLIENT_VERSION, client_version)?;

    Ok(headers)
}

fn set(headers: &mut HeaderMap, name: &'static str, value: &str) -> Result<()> {
    let value = HeaderValue::from_str(value).map_err(|_| InvalidInputError::Header {
        name: name.to_string(),
    })?;
    headers.insert(HeaderName::from_static(name), value);
    Ok(())
}
