//! Server interface, authenticated with a secret server key.

use tracing::instrument;

use stack_core::error::InvalidInputError;
use stack_core::{AccessType, ClientConfig, KnownErrorKind, Outcome, Result};

use super::client::ClientInterface;
use super::endpoints::{USERS, User, UserList};
use crate::pipeline::{ApiRequest, ApiResponse, RequestIdentity};
use crate::session::Session;

/// Talks to the API from a trusted backend.
///
/// Wraps a [`ClientInterface`] for the same project, which refreshes user
/// sessions.
#[derive(Debug, Clone)]
pub struct ServerInterface {
    client: ClientInterface,
}

impl ServerInterface {
    /// Create a server interface. `config` must carry a secret server key.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::from_client(ClientInterface::new(config)?)
    }

    /// Wrap an existing client interface whose keys include a secret server key.
    pub fn from_client(client: ClientInterface) -> Result<Self> {
        if client.keys().secret_server_key.is_none() {
            return Err(InvalidInputError::Config {
                message: "a secret server key is required for server requests".to_string(),
            }
            .into());
        }
        Ok(Self { client })
    }

    pub fn client(&self) -> &ClientInterface {
        &self.client
    }

    fn identity(&self, session: Option<&Session>) -> RequestIdentity {
        self.client.identity(AccessType::Server, session)
    }

    /// Send a server request, propagating every known error.
    pub async fn send_server_request(
        &self,
        request: &ApiRequest,
        session: Option<&Session>,
    ) -> Result<ApiResponse> {
        self.client
            .pipeline()
            .send(request, &self.identity(session))
            .await
    }

    /// Send a server request, returning known errors of the `catch` kinds.
    pub async fn send_server_request_and_catch_known_error(
        &self,
        request: &ApiRequest,
        session: Option<&Session>,
        catch: &[KnownErrorKind],
    ) -> Result<Outcome<ApiResponse>> {
        self.client
            .pipeline()
            .send_and_catch(request, &self.identity(session), catch)
            .await
    }

    /// A user by id, or `None` if there is no such user.
    #[instrument(skip(self))]
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let path = format!("{USERS}/{}", encode_segment(user_id));
        let outcome = self
            .send_server_request_and_catch_known_error(
                &ApiRequest::get(path),
                None,
                &[KnownErrorKind::UserNotFound],
            )
            .await?;
        match outcome {
            Ok(response) => Ok(Some(response.json()?)),
            Err(_) => Ok(None),
        }
    }

    /// One page of users.
    #[instrument(skip(self))]
    pub async fn list_users(&self, limit: Option<u32>, cursor: Option<&str>) -> Result<UserList> {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        if let Some(limit) = limit {
            query.append_pair("limit", &limit.to_string());
        }
        if let Some(cursor) = cursor {
            query.append_pair("cursor", cursor);
        }
        let query = query.finish();
        let path = if query.is_empty() {
            USERS.to_string()
        } else {
            format!("{USERS}?{query}")
        };
        self.send_server_request(&ApiRequest::get(path), None)
            .await?
            .json()
    }
}

/// Percent-encode one path segment.
pub(crate) fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
