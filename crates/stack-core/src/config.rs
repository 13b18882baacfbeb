//! Client configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, InvalidInputError};
use crate::types::{AccessType, ApiUrl, ProjectId};

/// Environment variable names read by [`ClientConfig::from_env`].
pub mod env {
    pub const API_URL: &str = "STACK_API_URL";
    pub const PROJECT_ID: &str = "STACK_PROJECT_ID";
    pub const PUBLISHABLE_CLIENT_KEY: &str = "STACK_PUBLISHABLE_CLIENT_KEY";
    pub const SECRET_SERVER_KEY: &str = "STACK_SECRET_SERVER_KEY";
    pub const SUPER_SECRET_ADMIN_KEY: &str = "STACK_SUPER_SECRET_ADMIN_KEY";
}

/// Configuration of one Stack Auth project, as found in a JSON config file.
///
/// ```json
/// {
///   "apiUrl": "https://api.stack-auth.com",
///   "projectId": "6fbbf22e-f4b2-4c6e-95a1-beab6fa41063",
///   "publishableClientKey": "pck_..."
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    #[serde(default)]
    pub api_url: ApiUrl,
    pub project_id: ProjectId,
    #[serde(flatten)]
    pub keys: ProjectKeys,
    /// Sent as `X-Stack-Client-Version`; defaults to this crate's version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_version: Option<String>,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

/// The project keys available to a client.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectKeys {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publishable_client_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_server_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub super_secret_admin_key: Option<String>,
}

// Hide key values in Debug output
impl fmt::Debug for ProjectKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("ProjectKeys")
            .field("publishable_client_key", &redact(&self.publishable_client_key))
            .field("secret_server_key", &redact(&self.secret_server_key))
            .field("super_secret_admin_key", &redact(&self.super_secret_admin_key))
            .finish()
    }
}

impl ProjectKeys {
    /// The strongest access type these keys allow.
    pub fn strongest_access_type(&self) -> Option<AccessType> {
        if self.super_secret_admin_key.is_some() {
            Some(AccessType::Admin)
        } else if self.secret_server_key.is_some() {
            Some(AccessType::Server)
        } else if self.publishable_client_key.is_some() {
            Some(AccessType::Client)
        } else {
            None
        }
    }
}

/// Probe targets for network diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiagnosticsConfig {
    /// A well-known external connectivity check.
    pub connectivity_check_url: String,
    pub prod_dashboard_health_url: String,
    pub prod_backend_health_url: String,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            connectivity_check_url: "https://1.1.1.1/cdn-cgi/trace".to_string(),
            prod_dashboard_health_url: "https://app.stack-auth.com/health".to_string(),
            prod_backend_health_url: "https://api.stack-auth.com/health".to_string(),
        }
    }
}

impl ClientConfig {
    /// A config for `project_id` against the production API, without keys.
    pub fn new(project_id: ProjectId) -> Self {
        Self {
            api_url: ApiUrl::default(),
            project_id,
            keys: ProjectKeys::default(),
            client_version: None,
            diagnostics: DiagnosticsConfig::default(),
        }
    }

    /// Parse a JSON config object.
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| {
            InvalidInputError::Config {
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Build a config from `STACK_*` environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from any variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let project_id = get(env::PROJECT_ID).ok_or_else(|| InvalidInputError::Config {
            message: format!("{} is not set", env::PROJECT_ID),
        })?;

        let mut config = Self::new(ProjectId::new(project_id)?);
        if let Some(api_url) = get(env::API_URL) {
            config.api_url = ApiUrl::new(api_url)?;
        }
        config.keys = ProjectKeys {
            publishable_client_key: get(env::PUBLISHABLE_CLIENT_KEY),
            secret_server_key: get(env::SECRET_SERVER_KEY),
            super_secret_admin_key: get(env::SUPER_SECRET_ADMIN_KEY),
        };
        Ok(config)
    }

    /// The client version header value.
    pub fn client_version(&self) -> String {
        self.client_version
            .clone()
            .unwrap_or_else(|| format!("rust stack-client@{}", env!("CARGO_PKG_VERSION")))
    }
}
