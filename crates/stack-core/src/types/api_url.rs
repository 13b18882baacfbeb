//! API URL type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::{Error, InvalidInputError};

/// The production Stack Auth API.
pub const DEFAULT_API_URL: &str = "https://api.stack-auth.com";

/// A validated Stack Auth API base URL.
///
/// Must use HTTPS, or HTTP for localhost. Normalised without a trailing
/// slash, so a self-hosted deployment under a path prefix keeps its prefix.
///
/// # Example
///
/// ```
/// use stack_core::ApiUrl;
///
/// let api = ApiUrl::new("https://api.stack-auth.com/").unwrap();
/// assert_eq!(api.endpoint_url("/users/me"),
///            "https://api.stack-auth.com/api/v1/users/me");
/// assert_eq!(api.health_url(), "https://api.stack-auth.com/health");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ApiUrl(Url);

impl ApiUrl {
    /// Create a new API URL from a string, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not valid or doesn't meet requirements.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref();
        let mut url = Url::parse(s).map_err(|e| InvalidInputError::ApiUrl {
            value: s.to_string(),
            reason: e.to_string(),
        })?;

        Self::validate(&url, s)?;

        if url.query().is_some() || url.fragment().is_some() {
            return Err(InvalidInputError::ApiUrl {
                value: s.to_string(),
                reason: "must not have a query or fragment".to_string(),
            }
            .into());
        }

        let path = url.path().trim_end_matches('/').to_string();
        url.set_path(&path);

        Ok(Self(url))
    }

    /// Returns the URL of an API endpoint, e.g. `/users/me`.
    pub fn endpoint_url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("{}/api/v1/{}", self.base(), path)
            .trim_end_matches('/')
            .to_string()
    }

    /// Returns the backend health check URL.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.base())
    }

    /// Returns the base URL as a string, without trailing slash.
    pub fn as_str(&self) -> &str {
        self.base()
    }

    /// Returns the inner URL.
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Returns the host string.
    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }

    // The url crate always renders a root path as "/".
    fn base(&self) -> &str {
        self.0.as_str().trim_end_matches('/')
    }

    fn validate(url: &Url, original: &str) -> Result<(), Error> {
        if url.cannot_be_a_base() {
            return Err(InvalidInputError::ApiUrl {
                value: original.to_string(),
                reason: "must be an absolute URL".to_string(),
            }
            .into());
        }

        let scheme = url.scheme();
        let is_localhost = url
            .host_str()
            .is_some_and(|h| h == "localhost" || h == "127.0.0.1" || h == "[::1]");

        if scheme != "https" && !(scheme == "http" && is_localhost) {
            return Err(InvalidInputError::ApiUrl {
                value: original.to_string(),
                reason: "must use HTTPS (HTTP allowed only for localhost)".to_string(),
            }
            .into());
        }

        if url.host_str().is_none() {
            return Err(InvalidInputError::ApiUrl {
                value: original.to_string(),
                reason: "must have a host".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

impl Default for ApiUrl {
    fn default() -> Self {
        Self(Url::parse(DEFAULT_API_URL).unwrap_or_else(|_| unreachable!("constant URL parses")))
    }
}

impl fmt::Display for ApiUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base())
    }
}

impl FromStr for ApiUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for ApiUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.base())
    }
}

impl<'de> Deserialize<'de> for ApiUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ApiUrl::new(&s).map_err(serde::de::Error::custom)
    }
}

impl AsRef<str> for ApiUrl {
    fn as_ref(&self) -> &str {
        self.base()
    }
}
