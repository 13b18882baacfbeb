//! Best-effort network self-test, used to enrich fatal network errors.

use serde::Serialize;
use tokio::join;
use tracing::{debug, instrument};

use stack_core::ConnectivityState;

use crate::pipeline::{ApiRequest, Attempt, RequestIdentity, RequestPipeline};
use crate::transport::HttpRequest;

/// The result of every probe: `"OK"` or the stringified failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDiagnostics {
    /// The platform's own connectivity report.
    pub navigator: ConnectivityState,
    pub cf_trace: String,
    /// One unretried `GET /` through the pipeline with the project keys but
    /// no user or admin session.
    pub api_root: String,
    pub base_url_backend: String,
    pub prod_dashboard: String,
    pub prod_backend: String,
}

/// Probe result for probes that were skipped.
pub const NOT_TESTED: &str = "Not tested";

const OK: &str = "OK";

impl NetworkDiagnostics {
    /// Run all probes concurrently. Never fails.
    #[instrument(skip_all)]
    pub async fn run(pipeline: &RequestPipeline, identity: Option<&RequestIdentity>) -> Self {
        let config = pipeline.diagnostics_config();
        let health_url = pipeline.api_url().health_url();
        let (navigator, cf_trace, api_root, base_url_backend, prod_dashboard, prod_backend) = join!(
            ConnectivityState::probe(pipeline.connectivity().as_ref()),
            probe(pipeline, &config.connectivity_check_url),
            probe_api_root(pipeline, identity),
            probe(pipeline, &health_url),
            probe(pipeline, &config.prod_dashboard_health_url),
            probe(pipeline, &config.prod_backend_health_url),
        );

        let diagnostics = Self {
            navigator,
            cf_trace,
            api_root,
            base_url_backend,
            prod_dashboard,
            prod_backend,
        };
        debug!(?diagnostics, "network diagnostics");
        diagnostics
    }

    /// Pretty JSON, as embedded in error messages.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{self:?} ({e})"))
    }
}

async fn probe(pipeline: &RequestPipeline, url: &str) -> String {
    match pipeline.transport().send(HttpRequest::get(url)).await {
        Ok(response) if response.is_success() => OK.to_string(),
        Ok(response) => format!("{}: {}", response.status, response.text()),
        Err(error) => error.to_string(),
    }
}

async fn probe_api_root(pipeline: &RequestPipeline, identity: Option<&RequestIdentity>) -> String {
    let Some(identity) = identity else {
        return NOT_TESTED.to_string();
    };
    // Sessions stay out so the probe can neither refresh nor expire tokens.
    let identity = identity
        .clone()
        .with_session(None)
        .with_admin_session(None);
    match pipeline.attempt(&ApiRequest::get("/"), &identity).await {
        Ok(Attempt::Done(Ok(_))) => OK.to_string(),
        Ok(Attempt::Done(Err(known))) => known.to_string(),
        Ok(Attempt::Retry { error, .. } | Attempt::Unreachable(error)) | Err(error) => {
            error.to_string()
        }
    }
}
