//! Request pipeline tests against a scripted transport and a recording clock.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;

use common::*;
use stack_client::pipeline::headers::{ACCESS_TOKEN, ADMIN_ACCESS_TOKEN, RANDOM_NONCE};
use stack_client::{AdminInterface, ApiRequest, ClientInterface, RetryPolicy, Session};
use stack_core::error::{NetworkError, ProtocolError};
use stack_core::{
    AccessToken, AccessType, Error, KnownError, KnownErrorKind, ProjectId, ProjectKeys,
    RefreshToken, TokenRefresher,
};

fn user() -> serde_json::Value {
    json!({"id": "user-1", "display_name": "Alice", "primary_email": "alice@example.com"})
}

// ============================================================================
// Retry bounds
// ============================================================================

#[tokio::test]
async fn idempotent_request_is_attempted_five_times() {
    let transport = ScriptedTransport::new(|_| Err(connection_refused()));
    let clock = RecordingClock::new();
    let client = client(transport.clone(), clock.clone());

    let result = client
        .send_client_request(&ApiRequest::get("/users/me"), None)
        .await;

    assert!(matches!(
        result,
        Err(Error::Network(NetworkError::Unreachable { .. }))
    ));
    assert_eq!(transport.requests_to("/users/me").len(), 5);
    assert_eq!(clock.sleeps().len(), 4);
}

#[tokio::test]
async fn backoff_grows_exponentially() {
    let transport = ScriptedTransport::new(|_| Err(connection_refused()));
    let clock = RecordingClock::new();
    let pipeline = pipeline(transport, clock.clone()).with_retry_policy(RetryPolicy {
        jitter: false,
        ..RetryPolicy::default()
    });
    let config = config();
    let client = ClientInterface::from_parts(pipeline, config.project_id, config.keys);

    let _ = client
        .send_client_request(&ApiRequest::get("/users/me"), None)
        .await;

    assert_eq!(
        clock.sleeps(),
        vec![
            Duration::from_millis(1000),
            Duration::from_millis(2000),
            Duration::from_millis(4000),
            Duration::from_millis(8000),
        ]
    );
}

#[tokio::test]
async fn non_idempotent_request_fails_on_first_transport_error() {
    let transport = ScriptedTransport::new(|_| Err(connection_refused()));
    let clock = RecordingClock::new();
    let client = client(transport.clone(), clock.clone());

    let request = ApiRequest::post("/teams").json(&json!({"display_name": "A"})).unwrap();
    let result = client.send_client_request(&request, None).await;

    let Err(Error::Network(error)) = result else {
        panic!("expected a network error, got {result:?}");
    };
    assert!(error.cause().is_transport());
    assert_eq!(transport.requests_to("/teams").len(), 1);
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn exhaustion_message_embeds_diagnostics() {
    let transport = ScriptedTransport::new(|request| {
        if request.url.ends_with("/health") {
            Ok(json_response(200, json!({"status": "ok"})))
        } else {
            Err(connection_refused())
        }
    });
    let client = client(transport.clone(), RecordingClock::new());

    let error = client
        .send_client_request(&ApiRequest::get("/users/me"), None)
        .await
        .unwrap_err();

    let message = error.to_string();
    assert!(message.contains("unable to connect"));
    assert!(message.contains("connection refused"));
    assert!(message.contains("\"cfTrace\""));
    assert!(message.contains("\"baseUrlBackend\": \"OK\""));
    assert!(message.contains("\"apiRoot\""));
}

#[tokio::test]
async fn offline_short_circuits_diagnostics() {
    let transport = ScriptedTransport::new(|_| Err(connection_refused()));
    let pipeline = pipeline(transport.clone(), RecordingClock::new())
        .with_connectivity(Arc::new(FixedConnectivity(Some(false))));
    let config = config();
    let client = ClientInterface::from_parts(pipeline, config.project_id, config.keys);

    let result = client
        .send_client_request(&ApiRequest::get("/users/me"), None)
        .await;

    let Err(Error::Network(error @ NetworkError::Offline { .. })) = result else {
        panic!("expected the offline error, got {result:?}");
    };
    assert!(error.to_string().contains("offline"));
    // Only the five attempts; no diagnostics probes.
    assert_eq!(transport.requests().len(), 5);
}

#[tokio::test]
async fn diagnostics_leave_the_session_alone() {
    let transport = ScriptedTransport::new(|request| {
        if request.url.ends_with("/auth/oauth/token") {
            Ok(json_response(200, json!({"access_token": jwt_expiring_in(3600, "new")})))
        } else {
            Ok(json_response(200, json!({})))
        }
    });
    let client = client(transport.clone(), RecordingClock::new());
    let stale = AccessToken::new(jwt_expiring_in(5, "stale"));
    let session = client.create_session(Some(RefreshToken::new("refresh-1")), Some(stale.clone()));

    let report = client.run_network_diagnostics(Some(&session)).await;

    assert_eq!(report.api_root, "OK");
    assert!(transport.requests_to("/auth/oauth/token").is_empty());
    assert_eq!(session.access_token(), Some(stale));

    let root = &transport.requests_to("")[0];
    assert_eq!(header(root, "x-stack-project-id"), Some(PROJECT_ID));
    assert_eq!(header(root, ACCESS_TOKEN), None);
}

// ============================================================================
// Classification
// ============================================================================

#[tokio::test]
async fn rate_limit_waits_for_retry_after() {
    let calls = AtomicUsize::new(0);
    let transport = ScriptedTransport::new(move |_| {
        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(with_header(json_response(429, json!({})), "retry-after", "2"))
        } else {
            Ok(json_response(200, user()))
        }
    });
    let clock = RecordingClock::new();
    let client = client(transport.clone(), clock.clone());

    let response = client
        .send_client_request(&ApiRequest::get("/users/me"), None)
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert!(clock.sleeps().contains(&Duration::from_secs(2)));
    assert!(clock.total_slept() >= Duration::from_secs(2));
    assert_eq!(transport.requests_to("/users/me").len(), 2);
}

#[tokio::test]
async fn rate_limit_without_retry_after_still_retries() {
    let transport = ScriptedTransport::new(|_| Ok(json_response(429, json!({}))));
    let clock = RecordingClock::new();
    let client = client(transport.clone(), clock.clone());

    let result = client
        .send_client_request(&ApiRequest::get("/users/me"), None)
        .await;

    let Err(Error::Network(error)) = result else {
        panic!("expected a network error, got {result:?}");
    };
    assert!(matches!(
        error.cause(),
        Error::Protocol(ProtocolError::RateLimited { .. })
    ));
    assert_eq!(transport.requests_to("/users/me").len(), 5);
}

#[tokio::test]
async fn unknown_error_code_becomes_unsupported() {
    let transport = ScriptedTransport::new(|_| {
        let response = json_response(
            400,
            json!({"code": "FUTURE_ERROR_X", "message": "from a newer server"}),
        );
        Ok(with_header(
            response,
            stack_client::pipeline::headers::KNOWN_ERROR,
            "FUTURE_ERROR_X",
        ))
    });
    let client = client(transport.clone(), RecordingClock::new());

    let result = client
        .send_client_request(&ApiRequest::get("/users/me"), None)
        .await;

    let Err(Error::Known(KnownError::Unsupported { original_code })) = result else {
        panic!("expected an unsupported known error, got {result:?}");
    };
    assert_eq!(original_code, "FUTURE_ERROR_X");
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn known_error_header_must_match_body() {
    let transport = ScriptedTransport::new(|_| {
        let response = known_error_response(&KnownError::UserNotFound);
        Ok(with_header(
            response,
            stack_client::pipeline::headers::KNOWN_ERROR,
            "TEAM_NOT_FOUND",
        ))
    });
    let client = client(transport.clone(), RecordingClock::new());

    let result = client
        .send_client_request(&ApiRequest::get("/users/me"), None)
        .await;

    assert!(matches!(
        result,
        Err(Error::Protocol(ProtocolError::KnownErrorCodeMismatch { .. }))
    ));
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn caught_known_errors_are_returned_as_outcome() {
    let transport = ScriptedTransport::new(|_| {
        Ok(known_error_response(&KnownError::TeamNotFound {
            team_id: "team-1".to_string(),
        }))
    });
    let client = client(transport.clone(), RecordingClock::new());
    let request = ApiRequest::get("/teams/team-1");

    let outcome = client
        .send_client_request_and_catch_known_error(&request, None, &[KnownErrorKind::TeamNotFound])
        .await
        .unwrap();
    assert_eq!(
        outcome.unwrap_err(),
        KnownError::TeamNotFound {
            team_id: "team-1".to_string()
        }
    );

    let uncaught = client
        .send_client_request_and_catch_known_error(&request, None, &[KnownErrorKind::UserNotFound])
        .await;
    assert!(matches!(uncaught, Err(Error::Known(KnownError::TeamNotFound { .. }))));
    // Known errors are never retried.
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn actual_status_header_rewrites_status() {
    let transport = ScriptedTransport::new(|_| {
        Ok(with_header(
            json_response(200, json!({"id": "team-1"})),
            stack_client::pipeline::headers::ACTUAL_STATUS,
            "201",
        ))
    });
    let client = client(transport, RecordingClock::new());

    let response = client
        .send_client_request(&ApiRequest::post("/teams").json(&json!({})).unwrap(), None)
        .await
        .unwrap();
    assert_eq!(response.status, 201);
}

#[tokio::test]
async fn unexpected_status_is_fatal() {
    let transport = ScriptedTransport::new(|_| Ok(json_response(500, json!({"oops": true}))));
    let client = client(transport.clone(), RecordingClock::new());

    let result = client
        .send_client_request(&ApiRequest::get("/users/me"), None)
        .await;

    let Err(Error::Protocol(ProtocolError::UnexpectedStatus { status, url, .. })) = result else {
        panic!("expected an unexpected status error, got {result:?}");
    };
    assert_eq!(status, 500);
    assert_eq!(url, format!("{API}/api/v1/users/me"));
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn infinite_loop_508_is_retried() {
    let calls = AtomicUsize::new(0);
    let transport = ScriptedTransport::new(move |_| {
        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(json_response(508, json!({"code": "INFINITE_LOOP_DETECTED"})))
        } else {
            Ok(json_response(200, user()))
        }
    });
    let client = client(transport.clone(), RecordingClock::new());

    let response = client
        .send_client_request(&ApiRequest::get("/users/me"), None)
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(transport.requests_to("/users/me").len(), 2);
}

#[tokio::test]
async fn every_attempt_gets_a_fresh_nonce() {
    let transport = ScriptedTransport::new(|_| Ok(json_response(429, json!({}))));
    let client = client(transport.clone(), RecordingClock::new());

    let _ = client
        .send_client_request(&ApiRequest::get("/users/me"), None)
        .await;

    let requests = transport.requests_to("/users/me");
    let nonces: std::collections::HashSet<_> = requests
        .iter()
        .map(|r| header(r, RANDOM_NONCE).unwrap().to_string())
        .collect();
    assert_eq!(nonces.len(), requests.len());
}

// ============================================================================
// Token lifecycle through the pipeline
// ============================================================================

#[tokio::test]
async fn rejected_access_token_is_refreshed_transparently() {
    let old_token = jwt_expiring_in(3600, "old");
    let new_token = jwt_expiring_in(3600, "new");

    let transport = {
        let old_token = old_token.clone();
        let new_token = new_token.clone();
        ScriptedTransport::new(move |request| {
            if request.url.ends_with("/auth/oauth/token") {
                return Ok(json_response(
                    200,
                    json!({"access_token": new_token, "token_type": "Bearer"}),
                ));
            }
            match header(request, ACCESS_TOKEN) {
                Some(token) if token == old_token => Ok(known_error_response(
                    &KnownError::AccessTokenExpired { expired_at: None },
                )),
                Some(token) if token == new_token => Ok(json_response(200, user())),
                other => panic!("unexpected access token {other:?}"),
            }
        })
    };
    let clock = RecordingClock::new();
    let client = client(transport.clone(), clock);
    let session = client.create_session(
        Some(RefreshToken::new("refresh-1")),
        Some(AccessToken::new(old_token)),
    );

    let user = client.get_current_user(Some(&session)).await.unwrap();

    assert_eq!(user.unwrap().id, "user-1");
    assert_eq!(transport.requests_to("/auth/oauth/token").len(), 1);
    assert_eq!(session.access_token(), Some(AccessToken::new(new_token)));

    let refresh = &transport.requests_to("/auth/oauth/token")[0];
    let form = String::from_utf8(refresh.body.clone().unwrap()).unwrap();
    assert!(form.contains("grant_type=refresh_token"));
    assert!(form.contains("refresh_token=refresh-1"));
    assert!(form.contains(&format!("client_id={PROJECT_ID}")));
    assert!(form.contains("client_secret=pck_test"));
}

#[tokio::test]
async fn invalid_access_token_without_session_is_an_assertion() {
    let transport =
        ScriptedTransport::new(|_| Ok(known_error_response(&KnownError::UnparsableAccessToken)));
    let client = client(transport, RecordingClock::new());

    let result = client
        .send_client_request(&ApiRequest::get("/users/me"), None)
        .await;
    assert!(matches!(result, Err(Error::Protocol(ProtocolError::Assertion(_)))));
}

#[tokio::test]
async fn concurrent_requests_share_one_refresh() {
    let fresh = jwt_expiring_in(3600, "fresh");
    let transport = {
        let fresh = fresh.clone();
        ScriptedTransport::new(move |request| {
            if request.url.ends_with("/auth/oauth/token") {
                Ok(json_response(200, json!({"access_token": fresh})))
            } else {
                Ok(json_response(200, user()))
            }
        })
    };
    let client = client(transport.clone(), RecordingClock::new());
    // Expires within the freshness window, so every request needs a refresh.
    let session = client.create_session(
        Some(RefreshToken::new("refresh-1")),
        Some(AccessToken::new(jwt_expiring_in(5, "stale"))),
    );

    let requests = (0..8).map(|_| {
        let client = client.clone();
        let session = session.clone();
        async move {
            client
                .send_client_request(&ApiRequest::get("/users/me"), Some(&session))
                .await
        }
    });
    let results = futures_util::future::join_all(requests).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(transport.requests_to("/auth/oauth/token").len(), 1);
    for request in transport.requests_to("/users/me") {
        assert_eq!(header(&request, ACCESS_TOKEN), Some(fresh.as_str()));
    }
}

/// Fails the first refresh with a connection error, then hands out `token`.
struct FlakyRefresher {
    calls: AtomicUsize,
    token: String,
}

#[async_trait::async_trait]
impl TokenRefresher for FlakyRefresher {
    async fn refresh(&self, _refresh_token: &RefreshToken) -> stack_core::Result<Option<AccessToken>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(connection_refused().into());
        }
        Ok(Some(AccessToken::new(self.token.clone())))
    }
}

#[tokio::test]
async fn refresher_transport_failure_retries_the_attempt() {
    let fresh = jwt_expiring_in(3600, "fresh");
    let transport = ScriptedTransport::new(|_| Ok(json_response(200, user())));
    let clock = RecordingClock::new();
    let client = client(transport.clone(), clock.clone());
    let refresher = Arc::new(FlakyRefresher {
        calls: AtomicUsize::new(0),
        token: fresh.clone(),
    });
    let session = Session::new(
        refresher.clone(),
        clock.clone(),
        Some(RefreshToken::new("refresh-1")),
        None,
    );

    let response = client
        .send_client_request(&ApiRequest::get("/users/me"), Some(&session))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(refresher.calls.load(Ordering::SeqCst), 2);
    assert_eq!(clock.sleeps().len(), 1);
    let requests = transport.requests_to("/users/me");
    assert_eq!(requests.len(), 1);
    assert_eq!(header(&requests[0], ACCESS_TOKEN), Some(fresh.as_str()));
}

#[tokio::test]
async fn exhausted_built_in_refresh_is_fatal() {
    let transport = ScriptedTransport::new(|request| {
        if request.url.ends_with("/auth/oauth/token") {
            Err(connection_refused())
        } else {
            Ok(json_response(200, user()))
        }
    });
    let client = client(transport.clone(), RecordingClock::new());
    let session = client.create_session(Some(RefreshToken::new("refresh-1")), None);

    let result = client
        .send_client_request(&ApiRequest::get("/users/me"), Some(&session))
        .await;

    assert!(matches!(result, Err(Error::Network(_))));
    // The refresh ran its own retries once; the request was never sent.
    assert_eq!(transport.requests_to("/auth/oauth/token").len(), 5);
    assert!(transport.requests_to("/users/me").is_empty());
}

#[tokio::test]
async fn rejected_refresh_token_signs_the_session_out() {
    let transport = ScriptedTransport::new(|request| {
        if request.url.ends_with("/auth/oauth/token") {
            Ok(known_error_response(&KnownError::RefreshTokenNotFoundOrExpired))
        } else {
            Ok(known_error_response(&KnownError::CannotGetOwnUserWithoutUser))
        }
    });
    let client = client(transport.clone(), RecordingClock::new());
    let session = client.create_session(Some(RefreshToken::new("revoked")), None);

    let user = client.get_current_user(Some(&session)).await.unwrap();

    assert!(user.is_none());
    assert!(session.is_known_to_be_invalid());
    // The request went out anonymously.
    let request = &transport.requests_to("/users/me")[0];
    assert_eq!(header(request, ACCESS_TOKEN), None);
}

#[tokio::test]
async fn stale_admin_token_is_refreshed_on_the_admin_session() {
    let old_admin = jwt_expiring_in(3600, "admin-old");
    let new_admin = jwt_expiring_in(3600, "admin-new");

    let transport = {
        let old_admin = old_admin.clone();
        let new_admin = new_admin.clone();
        ScriptedTransport::new(move |request| {
            if request.url.ends_with("/auth/oauth/token") {
                assert_eq!(header(request, "x-stack-project-id"), Some("internal"));
                return Ok(json_response(200, json!({"access_token": new_admin})));
            }
            match header(request, ADMIN_ACCESS_TOKEN) {
                Some(token) if token == old_admin => {
                    Ok(known_error_response(&KnownError::ApiKeyNotFound))
                }
                Some(token) if token == new_admin => Ok(json_response(
                    200,
                    json!({"id": PROJECT_ID, "display_name": "Test"}),
                )),
                other => panic!("unexpected admin token {other:?}"),
            }
        })
    };
    let clock = RecordingClock::new();

    let internal = ClientInterface::from_parts(
        pipeline(transport.clone(), clock.clone()),
        ProjectId::internal(),
        ProjectKeys {
            publishable_client_key: Some("pck_internal".to_string()),
            ..Default::default()
        },
    );
    let admin_session = internal.create_session(
        Some(RefreshToken::new("admin-refresh")),
        Some(AccessToken::new(old_admin)),
    );
    let admin = AdminInterface::from_client(client(transport.clone(), clock), Some(admin_session))
        .unwrap();

    let project = admin.get_project().await.unwrap();

    assert_eq!(project.id, PROJECT_ID);
    assert_eq!(transport.requests_to("/auth/oauth/token").len(), 1);
    let project_requests = transport.requests_to("/internal/projects/current");
    assert_eq!(project_requests.len(), 2);
    assert_eq!(header(&project_requests[1], "x-stack-access-type"), Some("admin"));
}

#[tokio::test]
async fn server_requests_send_the_secret_key() {
    let transport = ScriptedTransport::new(|_| Ok(json_response(200, user())));
    let config = config();
    let client = ClientInterface::from_parts(
        pipeline(transport.clone(), RecordingClock::new()),
        config.project_id,
        ProjectKeys {
            secret_server_key: Some("ssk_test".to_string()),
            ..config.keys
        },
    );
    let server = stack_client::ServerInterface::from_client(client).unwrap();

    let user = server.get_user("user-1").await.unwrap().unwrap();
    assert_eq!(user.display_name.as_deref(), Some("Alice"));

    let request = &transport.requests_to("/users/user-1")[0];
    assert_eq!(header(request, "x-stack-secret-server-key"), Some("ssk_test"));
    assert_eq!(
        header(request, "x-stack-access-type"),
        Some(AccessType::Server.as_str())
    );
}
