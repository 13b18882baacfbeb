//! Response classification.

use std::time::Duration;

use tracing::{debug, trace};

use stack_core::error::ProtocolError;
use stack_core::{KnownError, KnownErrorBody, KnownErrorKind, Result};

use super::headers::{ACTUAL_STATUS, KNOWN_ERROR};
use crate::transport::HttpResponse;

/// Marker in the body of transient 508 responses.
pub const INFINITE_LOOP_DETECTED: &str = "INFINITE_LOOP_DETECTED";

/// What a completed round trip means for the request.
#[derive(Debug)]
pub(crate) enum Classified {
    /// 2xx, with the status already rewritten from `x-stack-actual-status`.
    Success(HttpResponse),
    /// The server answered with a known error.
    Known(KnownError),
    /// 429; `retry_after` is the server's requested wait.
    RateLimited {
        error: ProtocolError,
        retry_after: Option<Duration>,
    },
    /// A platform hiccup worth another attempt.
    Transient(ProtocolError),
}

/// Classify a response. Protocol violations and unexpected statuses are
/// returned as errors.
pub(crate) fn classify(method: &str, url: &str, mut response: HttpResponse) -> Result<Classified> {
    if let Some(actual) = response.header(ACTUAL_STATUS) {
        let actual = actual
            .trim()
            .parse::<u16>()
            .map_err(|_| ProtocolError::InvalidBody {
                reason: format!("{ACTUAL_STATUS} header is not a status code: {actual}"),
            })?;
        trace!(visible = response.status, actual, "rewriting status");
        response.status = actual;
    }

    if let Some(header_code) = response.header(KNOWN_ERROR) {
        let header_code = header_code.to_string();
        let body: KnownErrorBody = response.json()?;
        if body.code != header_code {
            return Err(ProtocolError::KnownErrorCodeMismatch {
                header: header_code,
                body: body.code,
            }
            .into());
        }
        let error = KnownError::from_body(body)?;
        debug!(code = error.code(), status = response.status, "known error");
        return Ok(Classified::Known(error));
    }

    if response.is_success() {
        return Ok(Classified::Success(response));
    }

    match response.status {
        429 => {
            let retry_after = response
                .header("retry-after")
                .and_then(|value| value.trim().parse::<f64>().ok())
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
            debug!(?retry_after, "rate limited");
            Ok(Classified::RateLimited {
                error: ProtocolError::RateLimited {
                    url: url.to_string(),
                },
                retry_after,
            })
        }
        508 if response.text().contains(INFINITE_LOOP_DETECTED) => {
            debug!("infinite loop detected, treating as transient");
            Ok(Classified::Transient(unexpected(method, url, &response)))
        }
        _ => Err(unexpected(method, url, &response).into()),
    }
}

/// Whether a known error means the admin session's access token was rejected.
///
/// `API_KEY_NOT_FOUND` is what older servers answer for a stale admin token.
pub(crate) fn rejects_admin_access_token(error: &KnownError) -> bool {
    error.is(KnownErrorKind::InvalidAdminAccessToken) || error.is(KnownErrorKind::ApiKeyNotFound)
}

fn unexpected(method: &str, url: &str, response: &HttpResponse) -> ProtocolError {
    ProtocolError::UnexpectedStatus {
        method: method.to_string(),
        url: url.to_string(),
        status: response.status,
        body: response.text(),
    }
}
