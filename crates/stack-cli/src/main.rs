//! stack - CLI tool for exploring the Stack Auth API.
//!
//! A thin wrapper over `stack-client`, intended for manual exploration and
//! debugging: signing in, inspecting the session, sending raw requests and
//! running the network self-test.

mod cli;
mod commands;
mod output;
mod session;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use commands::{api, auth, known_errors};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json_logs);
    tracing::debug!(version = env!("STACK_CLI_VERSION"), "starting");

    match cli.command {
        Commands::Auth(cmd) => auth::handle(cmd, &cli.connection).await,
        Commands::Api(cmd) => api::handle(cmd, &cli.connection).await,
        Commands::KnownErrors(args) => known_errors::run(args),
    }
}

fn init_logging(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so command output stays pipeable.
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}
