//! stack-core - Core types, errors and traits for the Stack Auth API client.
//!
//! This crate holds everything the request pipeline needs that is not tied to
//! a particular HTTP stack: token value objects, the validated API URL and
//! project identity types, the unified [`Error`], the [`KnownError`] taxonomy
//! and the collaborator traits ([`Clock`], [`Connectivity`],
//! [`TokenRefresher`]).

pub mod config;
pub mod error;
pub mod known_errors;
pub mod tokens;
pub mod traits;
pub mod types;

pub use config::{ClientConfig, DiagnosticsConfig, ProjectKeys};
pub use error::Error;
pub use known_errors::{KnownError, KnownErrorBody, KnownErrorKind, KnownErrorRegistry, is_instance};
pub use tokens::{AccessToken, RefreshToken, TokenPair};
pub use traits::{
    AssumeOnline, Clock, Connectivity, ConnectivityState, SystemClock, TokenRefresher,
};
pub use types::{AccessType, ApiUrl, DEFAULT_API_URL, INTERNAL_PROJECT_ID, ProjectId};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// The value of a call whose caller opted into branching on known errors.
///
/// `Ok` carries the successful value, `Err` one of the known errors the caller
/// asked to catch. Anything else travels in the outer [`Result`].
pub type Outcome<T, E = KnownError> = std::result::Result<T, E>;
