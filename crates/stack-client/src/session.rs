//! Session token lifecycle with single-flight refresh.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tracing::{debug, info, instrument, warn};

use stack_core::error::InvalidInputError;
use stack_core::{AccessToken, Clock, RefreshToken, Result, TokenPair, TokenRefresher};

/// Freshness windows must stay below this; access tokens may live that short.
pub const MAX_FRESHNESS_WINDOW: Duration = Duration::from_secs(60);

type RefreshFuture = Shared<BoxFuture<'static, Result<Option<AccessToken>>>>;

/// A user's tokens, shared by every request made on their behalf.
///
/// Cloning is cheap and clones share state: a refresh started through one
/// clone is awaited by all of them. A session is anonymous until it has a
/// refresh token and signed out once [`Session::mark_invalid`] is called or
/// the server rejects its refresh token.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    refresher: Arc<dyn TokenRefresher>,
    clock: Arc<dyn Clock>,
    state: Mutex<SessionState>,
}

#[derive(Default)]
struct SessionState {
    access_token: Option<AccessToken>,
    refresh_token: Option<RefreshToken>,
    known_invalid: bool,
    refreshing: Option<InFlightRefresh>,
    next_refresh_id: u64,
}

struct InFlightRefresh {
    id: u64,
    future: RefreshFuture,
}

impl Session {
    /// Create a session from whatever tokens are known.
    pub fn new(
        refresher: Arc<dyn TokenRefresher>,
        clock: Arc<dyn Clock>,
        refresh_token: Option<RefreshToken>,
        access_token: Option<AccessToken>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                refresher,
                clock,
                state: Mutex::new(SessionState {
                    access_token,
                    refresh_token: refresh_token.filter(RefreshToken::is_valid),
                    ..SessionState::default()
                }),
            }),
        }
    }

    /// Returns the current tokens if the access token is likely valid for at
    /// least `min_validity`, refreshing first if it is not.
    ///
    /// Returns `None` if the session has no credentials or its refresh token
    /// was rejected. Concurrent callers share a single refresh.
    #[instrument(skip(self), fields(session = %self.log_id()))]
    pub async fn get_or_fetch_likely_valid_tokens(
        &self,
        min_validity: Duration,
    ) -> Result<Option<TokenPair>> {
        if min_validity >= MAX_FRESHNESS_WINDOW {
            return Err(InvalidInputError::FreshnessWindow {
                requested_ms: min_validity.as_millis(),
                max_ms: MAX_FRESHNESS_WINDOW.as_millis(),
            }
            .into());
        }

        let refresh_token = {
            let state = self.inner.state();
            if state.known_invalid {
                return Ok(None);
            }
            if let Some(access_token) = &state.access_token {
                if access_token.is_likely_valid_for(self.inner.clock.now(), min_validity) {
                    return Ok(Some(TokenPair {
                        access_token: access_token.clone(),
                        refresh_token: state.refresh_token.clone(),
                    }));
                }
            }
            match &state.refresh_token {
                Some(refresh_token) => refresh_token.clone(),
                None => {
                    debug!("no usable access token and no refresh token");
                    return Ok(None);
                }
            }
        };

        debug!("access token stale, refreshing");
        let Some(access_token) = self.refresh().await? else {
            return Ok(None);
        };
        if self.is_known_to_be_invalid() {
            return Ok(None);
        }

        if !access_token.is_likely_valid_for(self.inner.clock.now(), min_validity) {
            warn!(
                min_validity_ms = min_validity.as_millis() as u64,
                "refreshed access token expires sooner than requested"
            );
        }

        Ok(Some(TokenPair {
            access_token,
            refresh_token: Some(refresh_token),
        }))
    }

    /// Refresh now, regardless of freshness.
    ///
    /// Joins a refresh that is already in flight instead of starting another.
    #[instrument(skip(self), fields(session = %self.log_id()))]
    pub async fn fetch_new_tokens(&self) -> Result<Option<TokenPair>> {
        let refresh_token = self.inner.state().refresh_token.clone();
        let access_token = self.refresh().await?;
        Ok(access_token.map(|access_token| TokenPair {
            access_token,
            refresh_token,
        }))
    }

    /// Drop `access_token` if it is still the current one, so the next call
    /// refreshes instead of reusing a token the server just rejected.
    pub fn mark_access_token_expired(&self, access_token: &AccessToken) {
        let mut state = self.inner.state();
        if state.access_token.as_ref() == Some(access_token) {
            debug!("marking access token expired");
            state.access_token = None;
        }
    }

    /// Sign the session out. No further refreshes are attempted.
    pub fn mark_invalid(&self) {
        let mut state = self.inner.state();
        state.access_token = None;
        state.known_invalid = true;
        // A refresh still in flight must not resurrect the session.
        state.refreshing = None;
        info!("session marked invalid");
    }

    /// Returns true once the session is signed out.
    pub fn is_known_to_be_invalid(&self) -> bool {
        self.inner.state().known_invalid
    }

    /// The current access token, fresh or not.
    pub fn access_token(&self) -> Option<AccessToken> {
        self.inner.state().access_token.clone()
    }

    /// The refresh token, if the session has one.
    pub fn refresh_token(&self) -> Option<RefreshToken> {
        self.inner.state().refresh_token.clone()
    }

    /// A key identifying the credentials of this session, for per-session
    /// caches.
    pub fn session_key(&self) -> String {
        let state = self.inner.state();
        match (&state.refresh_token, &state.access_token) {
            (Some(refresh_token), _) => format!("refresh-{}", refresh_token.as_str()),
            (None, Some(access_token)) => format!("access-{}", access_token.as_str()),
            (None, None) => "not-logged-in".to_string(),
        }
    }

    /// Returns true if both handles share the same state.
    pub fn ptr_eq(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    async fn refresh(&self) -> Result<Option<AccessToken>> {
        match self.start_or_join_refresh() {
            Some(future) => future.await,
            None => Ok(None),
        }
    }

    fn start_or_join_refresh(&self) -> Option<RefreshFuture> {
        let mut state = self.inner.state();
        if state.known_invalid {
            return None;
        }
        let refresh_token = state.refresh_token.clone()?;

        if let Some(in_flight) = &state.refreshing {
            debug!("joining in-flight refresh");
            return Some(in_flight.future.clone());
        }

        state.next_refresh_id += 1;
        let id = state.next_refresh_id;
        let refresher = Arc::clone(&self.inner.refresher);
        let session = Arc::downgrade(&self.inner);

        info!("refreshing access token");
        let future = async move {
            let result = refresher.refresh(&refresh_token).await;
            if let Some(session) = Weak::upgrade(&session) {
                session.finish_refresh(id, &result);
            }
            result
        }
        .boxed()
        .shared();

        state.refreshing = Some(InFlightRefresh {
            id,
            future: future.clone(),
        });
        Some(future)
    }

    fn log_id(&self) -> &'static str {
        let state = self.inner.state();
        if state.known_invalid {
            "signed-out"
        } else if state.refresh_token.is_some() {
            "signed-in"
        } else if state.access_token.is_some() {
            "access-only"
        } else {
            "anonymous"
        }
    }
}

impl SessionInner {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        // State is only mutated by plain assignments, so a poisoned lock
        // still guards consistent data.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn finish_refresh(&self, id: u64, result: &Result<Option<AccessToken>>) {
        let mut state = self.state();
        if state.refreshing.as_ref().map(|r| r.id) != Some(id) {
            return;
        }
        state.refreshing = None;

        match result {
            Ok(Some(access_token)) => {
                debug!("access token refreshed");
                state.access_token = Some(access_token.clone());
            }
            Ok(None) => {
                info!("refresh token rejected, signing out");
                state.access_token = None;
                state.known_invalid = true;
            }
            Err(error) => {
                warn!(%error, "token refresh failed");
            }
        }
    }
}

// Hide token values in Debug output
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state();
        f.debug_struct("Session")
            .field("access_token", &state.access_token)
            .field("refresh_token", &state.refresh_token)
            .field("known_invalid", &state.known_invalid)
            .field("refreshing", &state.refreshing.is_some())
            .finish()
    }
}
