//! Subcommand implementations.

pub mod api;
pub mod auth;
pub mod known_errors;
