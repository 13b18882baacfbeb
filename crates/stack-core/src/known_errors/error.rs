//! Known error values and their wire encoding.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::ProtocolError;

use super::kind::KnownErrorKind;

/// The JSON body of a known-error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownErrorBody {
    pub code: String,
    /// Human readable message. Older servers call this field `error`.
    #[serde(default, alias = "error")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// A typed error returned by the Stack Auth API.
///
/// Each variant is a concrete kind carrying the arguments it was constructed
/// with. Status code, message and details are derived from those arguments,
/// and [`KnownError::from_body`] reconstructs them from the wire form.
#[derive(Debug, Clone, PartialEq)]
pub enum KnownError {
    /// A code this client does not know, e.g. from a newer server.
    Unsupported { original_code: String },
    BodyParsingError { message: String },
    SchemaError { message: String },
    AllOverloadsFailed { overload_errors: Vec<Value> },

    ProjectKeyWithoutAccessType,
    InvalidAccessType { access_type: String },
    AccessTypeWithoutProjectId { access_type: String },
    AccessTypeRequired,
    InsufficientAccessType {
        actual_access_type: String,
        allowed_access_types: Vec<String>,
    },
    InvalidPublishableClientKey { project_id: String },
    InvalidSecretServerKey { project_id: String },
    InvalidSuperSecretAdminKey { project_id: String },
    UnparsableAdminAccessToken,
    AdminAccessTokenExpired { expired_at: Option<DateTime<Utc>> },
    InvalidProjectForAdminAccessToken,
    AdminAccessTokenIsNotAdmin,
    ClientAuthenticationRequired,
    ServerAuthenticationRequired,
    ClientOrServerAuthenticationRequired,
    AdminAuthenticationRequired,
    ExpectedInternalProject,

    UnparsableAccessToken,
    AccessTokenExpired { expired_at: Option<DateTime<Utc>> },
    InvalidProjectForAccessToken,
    RefreshTokenNotFoundOrExpired,
    ProviderRejected,
    UserAuthenticationRequired,
    CannotGetOwnUserWithoutUser,

    ProjectNotFound { project_id: String },
    ApiKeyNotFound,
    UserNotFound,
    UserIdDoesNotExist { user_id: String },
    UserEmailAlreadyExists,
    EmailPasswordMismatch,
    PasswordAuthenticationNotEnabled,
    TeamNotFound { team_id: String },
    ItemNotFound { item_id: String },
}

impl KnownError {
    /// The concrete kind of this error.
    pub fn kind(&self) -> KnownErrorKind {
        use KnownErrorKind as K;
        match self {
            KnownError::Unsupported { .. } => K::UnsupportedError,
            KnownError::BodyParsingError { .. } => K::BodyParsingError,
            KnownError::SchemaError { .. } => K::SchemaError,
            KnownError::AllOverloadsFailed { .. } => K::AllOverloadsFailed,
            KnownError::ProjectKeyWithoutAccessType => K::ProjectKeyWithoutAccessType,
            KnownError::InvalidAccessType { .. } => K::InvalidAccessType,
            KnownError::AccessTypeWithoutProjectId { .. } => K::AccessTypeWithoutProjectId,
            KnownError::AccessTypeRequired => K::AccessTypeRequired,
            KnownError::InsufficientAccessType { .. } => K::InsufficientAccessType,
            KnownError::InvalidPublishableClientKey { .. } => K::InvalidPublishableClientKey,
            KnownError::InvalidSecretServerKey { .. } => K::InvalidSecretServerKey,
            KnownError::InvalidSuperSecretAdminKey { .. } => K::InvalidSuperSecretAdminKey,
            KnownError::UnparsableAdminAccessToken => K::UnparsableAdminAccessToken,
            KnownError::AdminAccessTokenExpired { .. } => K::AdminAccessTokenExpired,
            KnownError::InvalidProjectForAdminAccessToken => K::InvalidProjectForAdminAccessToken,
            KnownError::AdminAccessTokenIsNotAdmin => K::AdminAccessTokenIsNotAdmin,
            KnownError::ClientAuthenticationRequired => K::ClientAuthenticationRequired,
            KnownError::ServerAuthenticationRequired => K::ServerAuthenticationRequired,
            KnownError::ClientOrServerAuthenticationRequired => {
                K::ClientOrServerAuthenticationRequired
            }
            KnownError::AdminAuthenticationRequired => K::AdminAuthenticationRequired,
            KnownError::ExpectedInternalProject => K::ExpectedInternalProject,
            KnownError::UnparsableAccessToken => K::UnparsableAccessToken,
            KnownError::AccessTokenExpired { .. } => K::AccessTokenExpired,
            KnownError::InvalidProjectForAccessToken => K::InvalidProjectForAccessToken,
            KnownError::RefreshTokenNotFoundOrExpired => K::RefreshTokenNotFoundOrExpired,
            KnownError::ProviderRejected => K::ProviderRejected,
            KnownError::UserAuthenticationRequired => K::UserAuthenticationRequired,
            KnownError::CannotGetOwnUserWithoutUser => K::CannotGetOwnUserWithoutUser,
            KnownError::ProjectNotFound { .. } => K::ProjectNotFound,
            KnownError::ApiKeyNotFound => K::ApiKeyNotFound,
            KnownError::UserNotFound => K::UserNotFound,
            KnownError::UserIdDoesNotExist { .. } => K::UserIdDoesNotExist,
            KnownError::UserEmailAlreadyExists => K::UserEmailAlreadyExists,
            KnownError::EmailPasswordMismatch => K::EmailPasswordMismatch,
            KnownError::PasswordAuthenticationNotEnabled => K::PasswordAuthenticationNotEnabled,
            KnownError::TeamNotFound { .. } => K::TeamNotFound,
            KnownError::ItemNotFound { .. } => K::ItemNotFound,
        }
    }

    /// The wire code. Always the code of a concrete kind.
    pub fn code(&self) -> &'static str {
        self.kind().code().unwrap_or("UNSUPPORTED_ERROR")
    }

    /// Returns true if this error is of `kind` or one of its descendants.
    pub fn is(&self, kind: KnownErrorKind) -> bool {
        self.kind().is_a(kind)
    }

    /// The HTTP status code the server uses for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            KnownError::Unsupported { .. } => 500,
            KnownError::BodyParsingError { .. }
            | KnownError::SchemaError { .. }
            | KnownError::AllOverloadsFailed { .. }
            | KnownError::ProjectKeyWithoutAccessType
            | KnownError::InvalidAccessType { .. }
            | KnownError::AccessTypeWithoutProjectId { .. }
            | KnownError::AccessTypeRequired
            | KnownError::CannotGetOwnUserWithoutUser
            | KnownError::UserIdDoesNotExist { .. }
            | KnownError::UserEmailAlreadyExists
            | KnownError::EmailPasswordMismatch
            | KnownError::PasswordAuthenticationNotEnabled => 400,
            KnownError::ProjectNotFound { .. }
            | KnownError::ApiKeyNotFound
            | KnownError::UserNotFound
            | KnownError::TeamNotFound { .. }
            | KnownError::ItemNotFound { .. } => 404,
            _ => 401,
        }
    }

    /// The human readable message.
    pub fn message(&self) -> String {
        match self {
            KnownError::Unsupported { original_code } => format!(
                "An error occurred that is not currently supported (possibly because it was added in a version of Stack Auth that is newer than this client). The original unsupported error code was: {original_code}"
            ),
            KnownError::BodyParsingError { message } | KnownError::SchemaError { message } => {
                message.clone()
            }
            KnownError::AllOverloadsFailed { .. } => {
                "This endpoint has multiple overloads, but they all failed to process the request."
                    .to_string()
            }
            KnownError::ProjectKeyWithoutAccessType => {
                "Either an API key or an admin access token was provided, but the x-stack-access-type header is missing. Set it to 'client', 'server', or 'admin' as appropriate.".to_string()
            }
            KnownError::InvalidAccessType { access_type } => format!(
                "The x-stack-access-type header must be 'client', 'server', or 'admin', but was '{access_type}'."
            ),
            KnownError::AccessTypeWithoutProjectId { access_type } => format!(
                "The x-stack-access-type header was '{access_type}', but the x-stack-project-id header was not provided."
            ),
            KnownError::AccessTypeRequired => {
                "You must specify an access level for this Stack Auth project. Make sure project API keys are provided and the x-stack-access-type header is set.".to_string()
            }
            KnownError::InsufficientAccessType {
                actual_access_type,
                allowed_access_types,
            } => format!(
                "The x-stack-access-type header must be {}, but was '{actual_access_type}'.",
                allowed_access_types
                    .iter()
                    .map(|t| format!("'{t}'"))
                    .collect::<Vec<_>>()
                    .join(" or ")
            ),
            KnownError::InvalidPublishableClientKey { project_id } => format!(
                "The publishable key is not valid for the project '{project_id}'. Does the project and/or the key exist?"
            ),
            KnownError::InvalidSecretServerKey { project_id } => format!(
                "The secret server key is not valid for the project '{project_id}'. Does the project and/or the key exist?"
            ),
            KnownError::InvalidSuperSecretAdminKey { project_id } => format!(
                "The super secret admin key is not valid for the project '{project_id}'. Does the project and/or the key exist?"
            ),
            KnownError::UnparsableAdminAccessToken => {
                "Admin access token is not parsable.".to_string()
            }
            KnownError::AdminAccessTokenExpired { expired_at } => {
                with_expiry("Admin access token has expired.", expired_at)
            }
            KnownError::InvalidProjectForAdminAccessToken => {
                "Admin access tokens must be created on the internal project.".to_string()
            }
            KnownError::AdminAccessTokenIsNotAdmin => {
                "Admin access token does not have the required permissions to access this project."
                    .to_string()
            }
            KnownError::ClientAuthenticationRequired => {
                "The publishable client key must be provided.".to_string()
            }
            KnownError::ServerAuthenticationRequired => {
                "The secret server key must be provided.".to_string()
            }
            KnownError::ClientOrServerAuthenticationRequired => {
                "Either the publishable client key or the secret server key must be provided."
                    .to_string()
            }
            KnownError::AdminAuthenticationRequired => {
                "An admin access token or super secret admin key must be provided.".to_string()
            }
            KnownError::ExpectedInternalProject => {
                "The project ID is expected to be internal.".to_string()
            }
            KnownError::UnparsableAccessToken => "Access token is not parsable.".to_string(),
            KnownError::AccessTokenExpired { expired_at } => {
                with_expiry("Access token has expired. Please refresh it and try again.", expired_at)
            }
            KnownError::InvalidProjectForAccessToken => {
                "Access token not valid for this project.".to_string()
            }
            KnownError::RefreshTokenNotFoundOrExpired => {
                "Refresh token not found for this project, or the session has expired/been revoked."
                    .to_string()
            }
            KnownError::ProviderRejected => {
                "The provider refused to refresh their token. This usually means that the provider used to authenticate the user no longer regards this session as valid, and the user must re-authenticate.".to_string()
            }
            KnownError::UserAuthenticationRequired => {
                "User authentication required for this endpoint.".to_string()
            }
            KnownError::CannotGetOwnUserWithoutUser => {
                "You have specified 'me' as a userId, but did not provide authentication for a user."
                    .to_string()
            }
            KnownError::ProjectNotFound { project_id } => {
                format!("Project {project_id} not found or is not accessible with the current user.")
            }
            KnownError::ApiKeyNotFound => "API key not found.".to_string(),
            KnownError::UserNotFound => "User not found.".to_string(),
            KnownError::UserIdDoesNotExist { user_id } => {
                format!("The given user with the ID {user_id} does not exist.")
            }
            KnownError::UserEmailAlreadyExists => {
                "A user with the same email already exists.".to_string()
            }
            KnownError::EmailPasswordMismatch => "Wrong e-mail or password.".to_string(),
            KnownError::PasswordAuthenticationNotEnabled => {
                "Password authentication is not enabled for this project.".to_string()
            }
            KnownError::TeamNotFound { team_id } => format!("Team {team_id} not found."),
            KnownError::ItemNotFound { item_id } => format!("Item with ID \"{item_id}\" not found."),
        }
    }

    /// The structured details sent alongside the message, if any.
    pub fn details(&self) -> Option<Value> {
        let details = match self {
            KnownError::Unsupported { original_code } => json!({ "original_code": original_code }),
            KnownError::AllOverloadsFailed { overload_errors } => {
                json!({ "overload_errors": overload_errors })
            }
            KnownError::InvalidAccessType { access_type }
            | KnownError::AccessTypeWithoutProjectId { access_type } => {
                json!({ "access_type": access_type })
            }
            KnownError::InsufficientAccessType {
                actual_access_type,
                allowed_access_types,
            } => json!({
                "actual_access_type": actual_access_type,
                "allowed_access_types": allowed_access_types,
            }),
            KnownError::InvalidPublishableClientKey { project_id }
            | KnownError::InvalidSecretServerKey { project_id }
            | KnownError::InvalidSuperSecretAdminKey { project_id }
            | KnownError::ProjectNotFound { project_id } => json!({ "project_id": project_id }),
            KnownError::AdminAccessTokenExpired { expired_at }
            | KnownError::AccessTokenExpired { expired_at } => {
                json!({ "expired_at_millis": expired_at.map(|at| at.timestamp_millis()) })
            }
            KnownError::UserIdDoesNotExist { user_id } => json!({ "user_id": user_id }),
            KnownError::TeamNotFound { team_id } => json!({ "team_id": team_id }),
            KnownError::ItemNotFound { item_id } => json!({ "item_id": item_id }),
            _ => return None,
        };
        Some(details)
    }

    /// Encode into the wire body.
    pub fn to_body(&self) -> KnownErrorBody {
        KnownErrorBody {
            code: self.code().to_string(),
            message: self.message(),
            details: self.details(),
        }
    }

    /// Encode into a JSON value.
    pub fn to_json(&self) -> Value {
        // KnownErrorBody only holds strings and JSON values
        serde_json::to_value(self.to_body()).unwrap_or(Value::Null)
    }

    /// Decode a JSON value, see [`KnownError::from_body`].
    pub fn from_json(value: &Value) -> Result<Self, ProtocolError> {
        let body: KnownErrorBody =
            serde_json::from_value(value.clone()).map_err(|e| ProtocolError::InvalidBody {
                reason: format!("known error body: {e}"),
            })?;
        Self::from_body(body)
    }

    /// Decode the wire body.
    ///
    /// Codes this client does not know become [`KnownError::Unsupported`]
    /// rather than failing. A known code with details that do not match its
    /// constructor arguments is a protocol violation.
    pub fn from_body(body: KnownErrorBody) -> Result<Self, ProtocolError> {
        use KnownErrorKind as K;

        let Some(kind) = K::from_code(&body.code) else {
            return Ok(KnownError::Unsupported {
                original_code: body.code,
            });
        };
        let details = Details {
            code: &body.code,
            value: body.details.as_ref(),
        };

        let error = match kind {
            K::UnsupportedError => KnownError::Unsupported {
                original_code: details.get("original_code")?,
            },
            K::BodyParsingError => KnownError::BodyParsingError {
                message: body.message,
            },
            K::SchemaError => KnownError::SchemaError {
                message: body.message,
            },
            K::AllOverloadsFailed => KnownError::AllOverloadsFailed {
                overload_errors: details.get("overload_errors")?,
            },
            K::ProjectKeyWithoutAccessType => KnownError::ProjectKeyWithoutAccessType,
            K::InvalidAccessType => KnownError::InvalidAccessType {
                access_type: details.get("access_type")?,
            },
            K::AccessTypeWithoutProjectId => KnownError::AccessTypeWithoutProjectId {
                access_type: details.get("access_type")?,
            },
            K::AccessTypeRequired => KnownError::AccessTypeRequired,
            K::InsufficientAccessType => KnownError::InsufficientAccessType {
                actual_access_type: details.get("actual_access_type")?,
                allowed_access_types: details.get("allowed_access_types")?,
            },
            K::InvalidPublishableClientKey => KnownError::InvalidPublishableClientKey {
                project_id: details.get("project_id")?,
            },
            K::InvalidSecretServerKey => KnownError::InvalidSecretServerKey {
                project_id: details.get("project_id")?,
            },
            K::InvalidSuperSecretAdminKey => KnownError::InvalidSuperSecretAdminKey {
                project_id: details.get("project_id")?,
            },
            K::UnparsableAdminAccessToken => KnownError::UnparsableAdminAccessToken,
            K::AdminAccessTokenExpired => KnownError::AdminAccessTokenExpired {
                expired_at: details.expired_at()?,
            },
            K::InvalidProjectForAdminAccessToken => KnownError::InvalidProjectForAdminAccessToken,
            K::AdminAccessTokenIsNotAdmin => KnownError::AdminAccessTokenIsNotAdmin,
            K::ClientAuthenticationRequired => KnownError::ClientAuthenticationRequired,
            K::ServerAuthenticationRequired => KnownError::ServerAuthenticationRequired,
            K::ClientOrServerAuthenticationRequired => {
                KnownError::ClientOrServerAuthenticationRequired
            }
            K::AdminAuthenticationRequired => KnownError::AdminAuthenticationRequired,
            K::ExpectedInternalProject => KnownError::ExpectedInternalProject,
            K::UnparsableAccessToken => KnownError::UnparsableAccessToken,
            K::AccessTokenExpired => KnownError::AccessTokenExpired {
                expired_at: details.expired_at()?,
            },
            K::InvalidProjectForAccessToken => KnownError::InvalidProjectForAccessToken,
            K::RefreshTokenNotFoundOrExpired => KnownError::RefreshTokenNotFoundOrExpired,
            K::ProviderRejected => KnownError::ProviderRejected,
            K::UserAuthenticationRequired => KnownError::UserAuthenticationRequired,
            K::CannotGetOwnUserWithoutUser => KnownError::CannotGetOwnUserWithoutUser,
            K::ProjectNotFound => KnownError::ProjectNotFound {
                project_id: details.get("project_id")?,
            },
            K::ApiKeyNotFound => KnownError::ApiKeyNotFound,
            K::UserNotFound => KnownError::UserNotFound,
            K::UserIdDoesNotExist => KnownError::UserIdDoesNotExist {
                user_id: details.get("user_id")?,
            },
            K::UserEmailAlreadyExists => KnownError::UserEmailAlreadyExists,
            K::EmailPasswordMismatch => KnownError::EmailPasswordMismatch,
            K::PasswordAuthenticationNotEnabled => KnownError::PasswordAuthenticationNotEnabled,
            K::TeamNotFound => KnownError::TeamNotFound {
                team_id: details.get("team_id")?,
            },
            K::ItemNotFound => KnownError::ItemNotFound {
                item_id: details.get("item_id")?,
            },
            abstract_kind => {
                return Err(ProtocolError::MalformedKnownError {
                    code: body.code.clone(),
                    reason: format!("{abstract_kind} is abstract and cannot be decoded"),
                });
            }
        };
        Ok(error)
    }
}

fn with_expiry(message: &str, expired_at: &Option<DateTime<Utc>>) -> String {
    match expired_at {
        Some(at) => format!("{message} (The access token expired at {}.)", at.to_rfc3339()),
        None => message.to_string(),
    }
}

/// Typed access to a known error's `details` object.
struct Details<'a> {
    code: &'a str,
    value: Option<&'a Value>,
}

impl Details<'_> {
    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, ProtocolError> {
        let empty = Map::new();
        let object = match self.value {
            None | Some(Value::Null) => &empty,
            Some(Value::Object(object)) => object,
            Some(_) => return Err(self.malformed("details must be an object".to_string())),
        };
        let field = object.get(key).cloned().unwrap_or(Value::Null);
        serde_json::from_value(field).map_err(|e| self.malformed(format!("{key}: {e}")))
    }

    fn expired_at(&self) -> Result<Option<DateTime<Utc>>, ProtocolError> {
        let millis: Option<i64> = self.get("expired_at_millis")?;
        millis
            .map(|ms| {
                DateTime::from_timestamp_millis(ms)
                    .ok_or_else(|| self.malformed(format!("expired_at_millis out of range: {ms}")))
            })
            .transpose()
    }

    fn malformed(&self, reason: String) -> ProtocolError {
        ProtocolError::MalformedKnownError {
            code: self.code.to_string(),
            reason,
        }
    }
}

impl fmt::Display for KnownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code(), self.status_code(), self.message())
    }
}

impl std::error::Error for KnownError {}
