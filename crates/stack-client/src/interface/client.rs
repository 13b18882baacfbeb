//! Client interface, authenticated with a publishable client key.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use stack_core::error::{AuthError, ProtocolError};
use stack_core::{
    AccessToken, AccessType, ClientConfig, KnownErrorKind, KnownErrorRegistry, Outcome, ProjectId,
    ProjectKeys, RefreshToken, Result, TokenPair, TokenRefresher,
};

use super::endpoints::{
    CURRENT_SESSION, CURRENT_USER, OAUTH_TOKEN, OAuthTokenResponse, PASSWORD_SIGN_IN,
    PasswordSignInRequest, SignInResponse, User,
};
use crate::diagnostics::NetworkDiagnostics;
use crate::pipeline::{ApiRequest, ApiResponse, RequestIdentity, RequestPipeline};
use crate::session::Session;

/// Talks to the API on behalf of end users.
///
/// Also refreshes their sessions: [`ClientInterface::create_session`] hands
/// out sessions that refresh through this interface.
#[derive(Debug, Clone)]
pub struct ClientInterface {
    pipeline: RequestPipeline,
    project_id: ProjectId,
    keys: ProjectKeys,
}

impl ClientInterface {
    /// Create a client interface with the default transport and clock.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self::from_parts(
            RequestPipeline::new(config)?,
            config.project_id.clone(),
            config.keys.clone(),
        ))
    }

    /// Create a client interface on an existing pipeline.
    pub fn from_parts(pipeline: RequestPipeline, project_id: ProjectId, keys: ProjectKeys) -> Self {
        // Fail at construction, not on the first error response, if the
        // taxonomy is broken.
        KnownErrorRegistry::global();
        Self {
            pipeline,
            project_id,
            keys,
        }
    }

    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    pub(crate) fn keys(&self) -> &ProjectKeys {
        &self.keys
    }

    /// The identity of requests made with `access_type` on behalf of `session`.
    pub fn identity(&self, access_type: AccessType, session: Option<&Session>) -> RequestIdentity {
        RequestIdentity::new(self.project_id.clone(), access_type, self.keys.clone())
            .with_session(session.cloned())
    }

    /// A session that refreshes through this interface.
    pub fn create_session(
        &self,
        refresh_token: Option<RefreshToken>,
        access_token: Option<AccessToken>,
    ) -> Session {
        Session::new(
            Arc::new(self.clone()),
            Arc::clone(self.pipeline.clock()),
            refresh_token,
            access_token,
        )
    }

    /// Send a client request, propagating every known error.
    pub async fn send_client_request(
        &self,
        request: &ApiRequest,
        session: Option<&Session>,
    ) -> Result<ApiResponse> {
        self.pipeline
            .send(request, &self.identity(AccessType::Client, session))
            .await
    }

    /// Send a client request, returning known errors of the `catch` kinds.
    pub async fn send_client_request_and_catch_known_error(
        &self,
        request: &ApiRequest,
        session: Option<&Session>,
        catch: &[KnownErrorKind],
    ) -> Result<Outcome<ApiResponse>> {
        self.pipeline
            .send_and_catch(request, &self.identity(AccessType::Client, session), catch)
            .await
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// Returns `None` if the server rejected the refresh token.
    #[instrument(skip_all, fields(project = %self.project_id))]
    pub async fn fetch_new_access_token(
        &self,
        refresh_token: &RefreshToken,
    ) -> Result<Option<AccessToken>> {
        let publishable_client_key = self
            .keys
            .publishable_client_key
            .as_deref()
            .ok_or(AuthError::MissingPublishableClientKey)?;

        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "refresh_token")
            .append_pair("refresh_token", refresh_token.as_str())
            .append_pair("client_id", self.project_id.as_str())
            .append_pair("client_secret", publishable_client_key)
            .finish();
        let request = ApiRequest::post(OAUTH_TOKEN)
            .body("application/x-www-form-urlencoded", form)
            .retry_safe();

        let outcome = self
            .pipeline
            .send_and_catch(
                &request,
                &self.identity(AccessType::Client, None),
                &[KnownErrorKind::RefreshTokenError],
            )
            .await?;

        let response = match outcome {
            Ok(response) => response,
            Err(error) => {
                info!(code = error.code(), "refresh token rejected");
                return Ok(None);
            }
        };

        let body: OAuthTokenResponse = response.json()?;
        let access_token = body.access_token.ok_or_else(|| ProtocolError::MissingField {
            context: "token endpoint response".to_string(),
            field: "access_token".to_string(),
        })?;
        debug!("fetched new access token");
        Ok(Some(AccessToken::new(access_token)))
    }

    /// Sign in with email and password.
    ///
    /// Wrong credentials and projects without password authentication come
    /// back as `Err` in the outcome.
    #[instrument(skip(self, password), fields(project = %self.project_id))]
    pub async fn sign_in_with_credential(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Outcome<TokenPair>> {
        let request =
            ApiRequest::post(PASSWORD_SIGN_IN).json(&PasswordSignInRequest { email, password })?;
        let outcome = self
            .send_client_request_and_catch_known_error(
                &request,
                None,
                &[
                    KnownErrorKind::EmailPasswordMismatch,
                    KnownErrorKind::PasswordAuthenticationNotEnabled,
                ],
            )
            .await?;

        let response = match outcome {
            Ok(response) => response,
            Err(error) => return Ok(Err(error)),
        };
        let body: SignInResponse = response.json()?;
        info!(user_id = ?body.user_id, "signed in");
        Ok(Ok(TokenPair {
            access_token: AccessToken::new(body.access_token),
            refresh_token: Some(RefreshToken::new(body.refresh_token)),
        }))
    }

    /// Sign the session out on the server, then locally.
    ///
    /// A session whose refresh token is already gone counts as signed out.
    #[instrument(skip_all, fields(project = %self.project_id))]
    pub async fn sign_out(&self, session: &Session) -> Result<()> {
        let outcome = self
            .send_client_request_and_catch_known_error(
                &ApiRequest::delete(CURRENT_SESSION).json(&serde_json::json!({}))?,
                Some(session),
                &[KnownErrorKind::RefreshTokenError],
            )
            .await?;
        if let Err(error) = outcome {
            debug!(code = error.code(), "session already gone on the server");
        }
        session.mark_invalid();
        info!("signed out");
        Ok(())
    }

    /// The signed-in user, or `None` when the session has no user.
    pub async fn get_current_user(&self, session: Option<&Session>) -> Result<Option<User>> {
        let outcome = self
            .send_client_request_and_catch_known_error(
                &ApiRequest::get(CURRENT_USER),
                session,
                &[KnownErrorKind::CannotGetOwnUserWithoutUser],
            )
            .await?;
        match outcome {
            Ok(response) => Ok(Some(response.json()?)),
            Err(_) => Ok(None),
        }
    }

    /// Run network diagnostics, probing the API root with `session`.
    pub async fn run_network_diagnostics(&self, session: Option<&Session>) -> NetworkDiagnostics {
        let identity = self.identity(AccessType::Client, session);
        NetworkDiagnostics::run(&self.pipeline, Some(&identity)).await
    }
}

#[async_trait]
impl TokenRefresher for ClientInterface {
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<Option<AccessToken>> {
        self.fetch_new_access_token(refresh_token).await
    }
}
