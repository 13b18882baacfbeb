//! stack-client - Resilient authenticated client for the Stack Auth API.
//!
//! # Overview
//!
//! A [`RequestPipeline`] turns calls against API paths into typed outcomes.
//! Each attempt attaches the project identity and the caller's [`Session`]
//! tokens, refreshing them first when stale. Responses are classified into
//! success, known errors and retryable conditions. Transient failures are
//! retried with exponential backoff; when retries run out the error carries a
//! [`NetworkDiagnostics`] report.
//!
//! # Example
//!
//! ```no_run
//! use stack_client::ClientInterface;
//! use stack_core::{ClientConfig, KnownErrorKind};
//!
//! # async fn example() -> stack_core::Result<()> {
//! let config = ClientConfig::from_json_str(
//!     r#"{"projectId": "my-project", "publishableClientKey": "pck_..."}"#,
//! )?;
//! let client = ClientInterface::new(&config)?;
//!
//! match client.sign_in_with_credential("alice@example.com", "hunter2").await? {
//!     Ok(tokens) => {
//!         let session = client.create_session(tokens.refresh_token, Some(tokens.access_token));
//!         let user = client.get_current_user(Some(&session)).await?;
//!         println!("signed in as {:?}", user.map(|u| u.id));
//!     }
//!     Err(error) if error.is(KnownErrorKind::EmailPasswordMismatch) => {
//!         println!("wrong password");
//!     }
//!     Err(error) => println!("cannot sign in: {error}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod diagnostics;
pub mod interface;
pub mod pipeline;
pub mod session;
pub mod transport;

pub use diagnostics::NetworkDiagnostics;
pub use reqwest::Method;
pub use interface::{AdminInterface, ClientInterface, ServerInterface};
pub use pipeline::{
    ApiRequest, ApiResponse, RequestIdentity, RequestPipeline, RetryPolicy, TOKEN_FRESHNESS_WINDOW,
};
pub use session::Session;
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
