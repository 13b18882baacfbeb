//! Typed interfaces over the request pipeline, one per access type.

mod admin;
mod client;
pub mod endpoints;
mod server;

pub use admin::AdminInterface;
pub use client::ClientInterface;
pub use server::ServerInterface;
