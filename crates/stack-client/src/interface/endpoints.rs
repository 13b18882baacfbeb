//! API paths and request/response types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Paths
// ============================================================================

/// OAuth token endpoint, used for the refresh-token grant.
pub const OAUTH_TOKEN: &str = "/auth/oauth/token";

/// Email/password sign-in.
pub const PASSWORD_SIGN_IN: &str = "/auth/password/sign-in";

/// The session the request is authenticated with.
pub const CURRENT_SESSION: &str = "/auth/sessions/current";

/// The signed-in user.
pub const CURRENT_USER: &str = "/users/me";

/// All users of the project.
pub const USERS: &str = "/users";

/// The project the request is authenticated for.
pub const CURRENT_PROJECT: &str = "/internal/projects/current";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response from the OAuth token endpoint.
#[derive(Debug, Deserialize)]
pub struct OAuthTokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Request body for password sign-in.
#[derive(Debug, Serialize)]
pub struct PasswordSignInRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Response from a sign-in.
#[derive(Debug, Deserialize)]
pub struct SignInResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// A user as returned by the users endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub primary_email: Option<String>,
    #[serde(default)]
    pub primary_email_verified: bool,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub signed_up_at_millis: Option<i64>,
    #[serde(default)]
    pub client_metadata: Value,
}

/// Pagination data of list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// A page of users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserList {
    pub items: Vec<User>,
    #[serde(default)]
    pub pagination: Pagination,
}

/// A project as returned by the admin endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at_millis: Option<i64>,
    #[serde(default)]
    pub is_production_mode: bool,
}
