//! Admin interface, authenticated with a super secret admin key or an admin
//! session.

use stack_core::error::InvalidInputError;
use stack_core::{AccessType, ClientConfig, KnownErrorKind, Outcome, Result};

use super::client::ClientInterface;
use super::endpoints::{CURRENT_PROJECT, Project};
use crate::pipeline::{ApiRequest, ApiResponse, RequestIdentity};
use crate::session::Session;

/// Manages a project.
///
/// An admin session belongs to a user of the internal project, so it must be
/// created by a [`ClientInterface`] of that project.
#[derive(Debug, Clone)]
pub struct AdminInterface {
    client: ClientInterface,
    admin_session: Option<Session>,
}

impl AdminInterface {
    /// Create an admin interface from a config carrying a super secret admin key.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::from_client(ClientInterface::new(config)?, None)
    }

    /// Wrap a client interface. Needs a super secret admin key or an admin
    /// session.
    pub fn from_client(client: ClientInterface, admin_session: Option<Session>) -> Result<Self> {
        if client.keys().super_secret_admin_key.is_none() && admin_session.is_none() {
            return Err(InvalidInputError::Config {
                message: "admin requests need a super secret admin key or an admin session"
                    .to_string(),
            }
            .into());
        }
        Ok(Self {
            client,
            admin_session,
        })
    }

    pub fn client(&self) -> &ClientInterface {
        &self.client
    }

    fn identity(&self, session: Option<&Session>) -> RequestIdentity {
        self.client
            .identity(AccessType::Admin, session)
            .with_admin_session(self.admin_session.clone())
    }

    /// Send an admin request, propagating every known error.
    pub async fn send_admin_request(
        &self,
        request: &ApiRequest,
        session: Option<&Session>,
    ) -> Result<ApiResponse> {
        self.client
            .pipeline()
            .send(request, &self.identity(session))
            .await
    }

    /// Send an admin request, returning known errors of the `catch` kinds.
    pub async fn send_admin_request_and_catch_known_error(
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

    /// The managed project.
    pub async fn get_project(&self) -> Result<Project> {
        self.send_admin_request(&ApiRequest::get(CURRENT_PROJECT), None)
            .await?
            .json()
    }
}
