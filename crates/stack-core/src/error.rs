//! Error types for the Stack Auth client.
//!
//! This module provides a unified error type with explicit variants for
//! transport, known (typed server) errors, protocol violations, fatal network
//! failures, authentication state and input validation.
//!
//! Every error is `Clone`: a single failed token refresh is handed to every
//! caller that was waiting on it.

use thiserror::Error;

use crate::known_errors::{KnownError, KnownErrorKind};

/// The unified error type for Stack Auth client operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Network transport errors (connection, timeout, body read).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A typed error returned by the server that the caller did not catch.
    #[error("known error: {0}")]
    Known(#[from] KnownError),

    /// Contract violations and unexpected responses.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The server could not be reached, even after retrying.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Authentication state errors on the client side.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Input validation errors (bad URL, project id, configuration).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),
}

impl Error {
    /// Returns the known error carried by this error, if any.
    pub fn as_known(&self) -> Option<&KnownError> {
        match self {
            Error::Known(known) => Some(known),
            _ => None,
        }
    }

    /// Returns true if this is a known error of `kind` or one of its descendants.
    ///
    /// Errors outside the known-error taxonomy never match.
    pub fn is_known(&self, kind: KnownErrorKind) -> bool {
        self.as_known().is_some_and(|known| known.is(kind))
    }

    /// Returns true if this error was raised by the transport layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

/// Transport-level errors.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out: {message}")]
    Timeout { message: String },

    /// The response body could not be read.
    #[error("failed to read response body: {message}")]
    Body { message: String },

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

/// Protocol-level errors: the server or client broke the wire contract, or
/// the server answered with a status the pipeline cannot turn into a value.
#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    /// The `x-stack-known-error` header disagrees with the body's code.
    #[error(
        "mismatch between x-stack-known-error header ({header}) and error code in body ({body}); the server's response is invalid"
    )]
    KnownErrorCodeMismatch { header: String, body: String },

    /// A recognised known error carried details that cannot be decoded.
    #[error("malformed details for known error {code}: {reason}")]
    MalformedKnownError { code: String, reason: String },

    /// A non-2xx status that is neither a known error nor retryable.
    #[error("failed to send request to {method} {url}: {status} {body}")]
    UnexpectedStatus {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// The server rate limited the request.
    #[error("rate limited by {url}")]
    RateLimited { url: String },

    /// A successful response was missing a required field.
    #[error("{context} is missing required field `{field}`")]
    MissingField { context: String, field: String },

    /// A response body could not be parsed.
    #[error("invalid response body: {reason}")]
    InvalidBody { reason: String },

    /// An internal invariant of the exchange did not hold.
    #[error("assertion failed: {0}")]
    Assertion(String),
}

/// The server could not be reached.
///
/// The `Display` output is the multi-paragraph message surfaced to end users.
#[derive(Debug, Clone, Error)]
pub enum NetworkError {
    /// The platform reports that the device is offline.
    #[error(
        "Failed to send Stack Auth network request. It seems like you are offline, please check your internet connection and try again. This is not an error with Stack Auth. (the platform reports no connectivity)"
    )]
    Offline {
        #[source]
        cause: Box<Error>,
    },

    /// The server was unreachable; `diagnostics` is a pretty-printed report.
    #[error(
        "Stack Auth is unable to connect to the server. Please check your internet connection and try again.\n\nIf the problem persists, please contact support and include this error message.\n\n{cause}\n\n{diagnostics}"
    )]
    Unreachable {
        #[source]
        cause: Box<Error>,
        diagnostics: String,
    },
}

impl NetworkError {
    /// Returns the underlying failure that made the server unreachable.
    pub fn cause(&self) -> &Error {
        match self {
            NetworkError::Offline { cause } | NetworkError::Unreachable { cause, .. } => cause,
        }
    }
}

/// Authentication-related errors raised on the client side.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Refreshing tokens requires a publishable client key.
    #[error(
        "a publishable client key is required to refresh access tokens; sessions of admin-key clients must be refreshed by a client of the internal project"
    )]
    MissingPublishableClientKey,

    /// The operation requires a signed-in session.
    #[error("not signed in")]
    NotSignedIn,
}

/// Input validation errors.
#[derive(Debug, Clone, Error)]
pub enum InvalidInputError {
    /// Invalid API URL format.
    #[error("invalid API URL '{value}': {reason}")]
    ApiUrl { value: String, reason: String },

    /// Invalid project id.
    #[error("invalid project id '{value}': {reason}")]
    ProjectId { value: String, reason: String },

    /// Invalid access type.
    #[error("invalid access type '{value}': expected client, server or admin")]
    AccessType { value: String },

    /// A value cannot be sent as an HTTP header.
    #[error("invalid value for header {name}")]
    Header { name: String },

    /// The requested token freshness window is too long.
    #[error("token freshness window of {requested_ms}ms must be below {max_ms}ms")]
    FreshnessWindow { requested_ms: u128, max_ms: u128 },

    /// Invalid client configuration.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}
