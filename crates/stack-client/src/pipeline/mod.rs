//! The request pipeline: identity headers, transport, classification and the
//! retry driver.

mod classify;
pub mod headers;
mod retry;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use stack_core::error::{InvalidInputError, NetworkError, ProtocolError};
use stack_core::{
    AccessType, ApiUrl, AssumeOnline, ClientConfig, Clock, Connectivity, ConnectivityState,
    DiagnosticsConfig, Error, KnownErrorKind, Outcome, ProjectId, ProjectKeys, Result,
    SystemClock, TokenPair,
};

use crate::diagnostics::NetworkDiagnostics;
use crate::session::Session;
use crate::transport::{HttpRequest, ReqwestTransport, Transport, is_idempotent};

pub use classify::INFINITE_LOOP_DETECTED;
pub use retry::RetryPolicy;

/// How long an attached access token must stay valid for a request to use it.
pub const TOKEN_FRESHNESS_WINDOW: Duration = Duration::from_secs(20);

/// The credentials attached to one request.
#[derive(Debug, Clone)]
pub struct RequestIdentity {
    pub project_id: ProjectId,
    pub access_type: AccessType,
    pub keys: ProjectKeys,
    /// The caller's session.
    pub session: Option<Session>,
    /// An independent admin session, refreshed on its own.
    pub admin_session: Option<Session>,
}

impl RequestIdentity {
    /// An identity without sessions.
    pub fn new(project_id: ProjectId, access_type: AccessType, keys: ProjectKeys) -> Self {
        Self {
            project_id,
            access_type,
            keys,
            session: None,
            admin_session: None,
        }
    }

    /// Attach the caller's session.
    pub fn with_session(mut self, session: Option<Session>) -> Self {
        self.session = session;
        self
    }

    /// Attach an admin session.
    pub fn with_admin_session(mut self, admin_session: Option<Session>) -> Self {
        self.admin_session = admin_session;
        self
    }
}

/// A call against an API path such as `/users/me`.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    /// Retry transport faults even though the method is not idempotent.
    pub retry_safe: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            retry_safe: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Set a JSON body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let bytes = serde_json::to_vec(body).map_err(|e| InvalidInputError::Other {
            message: format!("request body is not serialisable: {e}"),
        })?;
        self.body = Some(bytes);
        Ok(self)
    }

    /// Set a raw body with its content type.
    pub fn body(mut self, content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        self.headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static(content_type),
        );
        self.body = Some(body.into());
        self
    }

    /// Add a caller header. Identity headers set by the pipeline take precedence.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let invalid = || InvalidInputError::Header {
            name: name.to_string(),
        };
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    /// Mark the request as safe to resend after a transport fault.
    pub fn retry_safe(mut self) -> Self {
        self.retry_safe = true;
        self
    }

    fn may_retry_transport_faults(&self) -> bool {
        self.retry_safe || is_idempotent(&self.method)
    }
}

/// A successful response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// The application status, after `x-stack-actual-status` rewriting.
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// The caller's tokens that were attached to the successful attempt.
    pub used_tokens: Option<TokenPair>,
}

impl ApiResponse {
    /// Parse the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            ProtocolError::InvalidBody {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// The body as text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The result of one attempt.
#[derive(Debug)]
pub(crate) enum Attempt {
    /// A final answer for the caller.
    Done(Outcome<ApiResponse>),
    /// Worth another attempt, after waiting `retry_after` if given.
    Retry {
        error: Error,
        retry_after: Option<Duration>,
    },
    /// A transport fault on a request that must not be resent.
    Unreachable(Error),
}

/// Sends requests to the Stack Auth API.
///
/// Cloning is cheap; clones share the transport, clock and connectivity
/// source.
#[derive(Clone)]
pub struct RequestPipeline {
    api_url: ApiUrl,
    client_version: String,
    diagnostics: DiagnosticsConfig,
    retry_policy: RetryPolicy,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    connectivity: Arc<dyn Connectivity>,
}

impl RequestPipeline {
    /// A pipeline for `config` using reqwest, the system clock and no
    /// connectivity source.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new()?;
        Ok(Self {
            api_url: config.api_url.clone(),
            client_version: config.client_version(),
            diagnostics: config.diagnostics.clone(),
            retry_policy: RetryPolicy::default(),
            transport: Arc::new(transport),
            clock: Arc::new(SystemClock),
            connectivity: Arc::new(AssumeOnline),
        })
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = connectivity;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn api_url(&self) -> &ApiUrl {
        &self.api_url
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub(crate) fn diagnostics_config(&self) -> &DiagnosticsConfig {
        &self.diagnostics
    }

    pub(crate) fn connectivity(&self) -> &Arc<dyn Connectivity> {
        &self.connectivity
    }

    /// Send a request, propagating every known error.
    pub async fn send(&self, request: &ApiRequest, identity: &RequestIdentity) -> Result<ApiResponse> {
        self.send_and_catch(request, identity, &[])
            .await?
            .map_err(Error::Known)
    }

    /// Send a request, returning known errors of the `catch` kinds (or their
    /// descendants) as `Err` in the outcome.
    ///
    /// Transient failures are retried with backoff. When retries run out, or
    /// a non-idempotent request hits a transport fault, the failure is
    /// reported as a [`NetworkError`].
    #[instrument(skip_all, fields(method = %request.method, path = %request.path))]
    pub async fn send_and_catch(
        &self,
        request: &ApiRequest,
        identity: &RequestIdentity,
        catch: &[KnownErrorKind],
    ) -> Result<Outcome<ApiResponse>> {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let (error, retry_after) = match self.attempt(request, identity).await? {
                Attempt::Done(Ok(response)) => return Ok(Ok(response)),
                Attempt::Done(Err(known)) => {
                    return if catch.iter().any(|kind| known.is(*kind)) {
                        Ok(Err(known))
                    } else {
                        Err(known.into())
                    };
                }
                Attempt::Unreachable(error) => {
                    return Err(self.network_error(error, identity).await.into());
                }
                Attempt::Retry { error, retry_after } => (error, retry_after),
            };

            attempt += 1;
            if attempt >= max_attempts {
                warn!(attempts = attempt, %error, "giving up");
                return Err(self.network_error(error, identity).await.into());
            }

            if let Some(retry_after) = retry_after {
                debug!(?retry_after, "waiting for Retry-After");
                self.clock.sleep(retry_after).await;
            }
            let delay = self.retry_policy.delay_after(attempt - 1);
            warn!(attempt, ?delay, %error, "request failed, retrying");
            self.clock.sleep(delay).await;
        }
    }

    /// Send a JSON request and parse a JSON response.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        identity: &RequestIdentity,
    ) -> Result<T> {
        self.send(request, identity).await?.json()
    }

    /// One attempt: Building, Sent, classification.
    pub(crate) async fn attempt(
        &self,
        request: &ApiRequest,
        identity: &RequestIdentity,
    ) -> Result<Attempt> {
        // The built-in refresher retries on its own and surfaces exhaustion as
        // `Error::Network`, which stays fatal here. Only a bare transport error
        // from a custom `TokenRefresher` retries the attempt.
        let tokens = match fresh_tokens(identity.session.as_ref()).await {
            Ok(tokens) => tokens,
            Err(error) if error.is_transport() => {
                return Ok(Attempt::Retry {
                    error,
                    retry_after: None,
                });
            }
            Err(error) => return Err(error),
        };
        let admin_tokens = match fresh_tokens(identity.admin_session.as_ref()).await {
            Ok(tokens) => tokens,
            Err(error) if error.is_transport() => {
                return Ok(Attempt::Retry {
                    error,
                    retry_after: None,
                });
            }
            Err(error) => return Err(error),
        };

        let url = self.api_url.endpoint_url(&request.path);
        let method = request.method.to_string();
        let headers = headers::build(
            &request.headers,
            identity,
            tokens.as_ref(),
            admin_tokens.as_ref(),
            &self.client_version,
            request.body.is_some(),
        )?;

        let http_request = HttpRequest {
            method: request.method.clone(),
            url: url.clone(),
            headers,
            body: request.body.clone(),
        };

        let response = match self.transport.send(http_request).await {
            Ok(response) => response,
            Err(error) => {
                let error = Error::from(error);
                return Ok(if request.may_retry_transport_faults() {
                    Attempt::Retry {
                        error,
                        retry_after: None,
                    }
                } else {
                    debug!(%error, "transport fault on a request that is not retry safe");
                    Attempt::Unreachable(error)
                });
            }
        };

        let attempt = match classify::classify(&method, &url, response)? {
            classify::Classified::Success(response) => Attempt::Done(Ok(ApiResponse {
                status: response.status,
                headers: response.headers,
                body: response.body,
                used_tokens: tokens,
            })),
            classify::Classified::Known(error) if error.is(KnownErrorKind::InvalidAccessToken) => {
                let (Some(session), Some(tokens)) = (&identity.session, &tokens) else {
                    return Err(ProtocolError::Assertion(format!(
                        "received {} although no access token was sent",
                        error.code()
                    ))
                    .into());
                };
                session.mark_access_token_expired(&tokens.access_token);
                Attempt::Retry {
                    error: error.into(),
                    retry_after: None,
                }
            }
            classify::Classified::Known(error)
                if classify::rejects_admin_access_token(&error) && admin_tokens.is_some() =>
            {
                if let (Some(admin_session), Some(admin_tokens)) =
                    (&identity.admin_session, &admin_tokens)
                {
                    admin_session.mark_access_token_expired(&admin_tokens.access_token);
                }
                Attempt::Retry {
                    error: error.into(),
                    retry_after: None,
                }
            }
            classify::Classified::Known(error) => Attempt::Done(Err(error)),
            classify::Classified::RateLimited { error, retry_after } => Attempt::Retry {
                error: error.into(),
                retry_after,
            },
            classify::Classified::Transient(error) => Attempt::Retry {
                error: error.into(),
                retry_after: None,
            },
        };
        Ok(attempt)
    }

    /// The error reported when the server cannot be reached.
    async fn network_error(&self, cause: Error, identity: &RequestIdentity) -> NetworkError {
        let cause = Box::new(cause);
        let connectivity = ConnectivityState::probe(self.connectivity.as_ref()).await;
        if connectivity.is_offline() {
            return NetworkError::Offline { cause };
        }
        let diagnostics = NetworkDiagnostics::run(self, Some(identity)).await;
        NetworkError::Unreachable {
            cause,
            diagnostics: diagnostics.to_pretty_json(),
        }
    }
}

async fn fresh_tokens(session: Option<&Session>) -> Result<Option<TokenPair>> {
    let Some(session) = session else {
        return Ok(None);
    };
    session
        .get_or_fetch_likely_valid_tokens(TOKEN_FRESHNESS_WINDOW)
        .await
}

impl std::fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("api_url", &self.api_url)
            .field("client_version", &self.client_version)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}
