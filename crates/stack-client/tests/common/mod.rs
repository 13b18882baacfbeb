//! Shared test doubles for pipeline and session tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde_json::{Value, json};

use stack_client::pipeline::headers::{ACTUAL_STATUS, KNOWN_ERROR};
use stack_client::{ClientInterface, HttpRequest, HttpResponse, RequestPipeline, Transport};
use stack_core::error::TransportError;
use stack_core::{Clock, ClientConfig, Connectivity, KnownError};

pub const API: &str = "https://api.example.com";
pub const PROJECT_ID: &str = "test-project";

/// The instant every test starts at.
pub fn start() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

/// An unsigned JWT expiring `secs` after [`start`].
pub fn jwt_expiring_in(secs: i64, id: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let claims = json!({"sub": "user-1", "exp": start().timestamp() + secs, "jti": id});
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.sig")
}

/// A clock that never waits: sleeping advances `now` and records the delay.
pub struct RecordingClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(start()),
            sleeps: Mutex::new(Vec::new()),
        })
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(duration).unwrap();
    }
}

type Handler = dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync;

/// A transport answering from a closure and recording every request.
pub struct ScriptedTransport {
    handler: Box<Handler>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(
        handler: impl Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests to an API path such as `/users/me`.
    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        let url = format!("{API}/api/v1{path}");
        self.requests()
            .into_iter()
            .filter(|request| request.url == url)
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        // Let concurrent callers interleave.
        tokio::task::yield_now().await;
        self.requests.lock().unwrap().push(request.clone());
        (self.handler)(&request)
    }
}

pub struct FixedConnectivity(pub Option<bool>);

#[async_trait]
impl Connectivity for FixedConnectivity {
    async fn is_online(&self) -> Option<bool> {
        self.0
    }
}

pub fn connection_refused() -> TransportError {
    TransportError::Connection {
        message: "connection refused".to_string(),
    }
}

pub fn json_response(status: u16, body: Value) -> HttpResponse {
    HttpResponse {
        status,
        headers: HeaderMap::new(),
        body: body.to_string().into_bytes(),
    }
}

pub fn with_header(mut response: HttpResponse, name: &'static str, value: &str) -> HttpResponse {
    response.headers.insert(name, value.parse().unwrap());
    response
}

/// A known error the way the server sends it: 200 with the real status out
/// of band.
pub fn known_error_response(error: &KnownError) -> HttpResponse {
    let response = json_response(200, error.to_json());
    let response = with_header(response, ACTUAL_STATUS, &error.status_code().to_string());
    with_header(response, KNOWN_ERROR, error.code())
}

pub fn header<'a>(request: &'a HttpRequest, name: &str) -> Option<&'a str> {
    request.headers.get(name).and_then(|v| v.to_str().ok())
}

pub fn config() -> ClientConfig {
    ClientConfig::from_json_str(&format!(
        r#"{{"apiUrl": "{API}", "projectId": "{PROJECT_ID}", "publishableClientKey": "pck_test"}}"#
    ))
    .unwrap()
}

pub fn pipeline(transport: Arc<ScriptedTransport>, clock: Arc<RecordingClock>) -> RequestPipeline {
    RequestPipeline::new(&config())
        .unwrap()
        .with_transport(transport)
        .with_clock(clock)
}

pub fn client(transport: Arc<ScriptedTransport>, clock: Arc<RecordingClock>) -> ClientInterface {
    let config = config();
    ClientInterface::from_parts(
        pipeline(transport, clock),
        config.project_id.clone(),
        config.keys.clone(),
    )
}
