//! Core Stack Auth types.
//!
//! These types validate at construction time, so a pipeline never holds an
//! API URL or project id it cannot put on the wire.

mod api_url;
mod project;

pub use api_url::{ApiUrl, DEFAULT_API_URL};
pub use project::{AccessType, INTERNAL_PROJECT_ID, ProjectId};
