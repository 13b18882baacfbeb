//! Project identity types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, InvalidInputError};

/// The id of the Stack Auth project that hosts admin users and dashboards.
pub const INTERNAL_PROJECT_ID: &str = "internal";

/// A Stack Auth project id.
///
/// Project ids are sent in the `X-Stack-Project-Id` header and as the OAuth
/// `client_id`, so they must be non-empty and free of whitespace and control
/// characters.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// Create a new project id, validating the format.
    pub fn new(s: impl Into<String>) -> Result<Self, Error> {
        let s = s.into();
        if s.is_empty() {
            return Err(InvalidInputError::ProjectId {
                value: s,
                reason: "must not be empty".to_string(),
            }
            .into());
        }
        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(InvalidInputError::ProjectId {
                value: s,
                reason: "must not contain whitespace".to_string(),
            }
            .into());
        }
        Ok(Self(s))
    }

    /// The internal project.
    pub fn internal() -> Self {
        Self(INTERNAL_PROJECT_ID.to_string())
    }

    /// Returns true for the internal project.
    pub fn is_internal(&self) -> bool {
        self.0 == INTERNAL_PROJECT_ID
    }

    /// Returns the id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for ProjectId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ProjectId::new(s).map_err(serde::de::Error::custom)
    }
}

/// The access level a request is made with (`X-Stack-Access-Type`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    Client,
    Server,
    Admin,
}

impl AccessType {
    /// The header value.
    pub fn as_str(self) -> &'static str {
        match self {
            AccessType::Client => "client",
            AccessType::Server => "server",
            AccessType::Admin => "admin",
        }
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(AccessType::Client),
            "server" => Ok(AccessType::Server),
            "admin" => Ok(AccessType::Admin),
            other => Err(InvalidInputError::AccessType {
                value: other.to_string(),
            }
            .into()),
        }
    }
}
