//! CLI argument definitions.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use stack_core::config::env;
use stack_core::{ApiUrl, ClientConfig, ProjectId};

use crate::commands::api::ApiCommand;
use crate::commands::auth::AuthCommand;
use crate::commands::known_errors::KnownErrorsArgs;

/// Stack Auth CLI tool for API exploration.
#[derive(Parser, Debug)]
#[command(name = "stack")]
#[command(author, version = env!("STACK_CLI_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in, inspect and sign out sessions
    Auth(AuthCommand),

    /// Raw API access and network diagnostics
    Api(ApiCommand),

    /// List the known error codes
    KnownErrors(KnownErrorsArgs),
}

/// Which project to talk to, and with which keys.
#[derive(Args, Debug, Default)]
pub struct ConnectionArgs {
    /// JSON config file (camelCase `ClientConfig`); flags override its values
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// API base URL
    #[arg(long, env = env::API_URL, global = true)]
    pub api_url: Option<String>,

    /// Project id
    #[arg(long, env = env::PROJECT_ID, global = true)]
    pub project_id: Option<String>,

    /// Publishable client key
    #[arg(long, env = env::PUBLISHABLE_CLIENT_KEY, global = true, hide_env_values = true)]
    pub publishable_client_key: Option<String>,

    /// Secret server key
    #[arg(long, env = env::SECRET_SERVER_KEY, global = true, hide_env_values = true)]
    pub secret_server_key: Option<String>,

    /// Super secret admin key
    #[arg(long, env = env::SUPER_SECRET_ADMIN_KEY, global = true, hide_env_values = true)]
    pub super_secret_admin_key: Option<String>,
}

impl ConnectionArgs {
    /// Resolve the client config from the config file and flags.
    pub fn load(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                ClientConfig::from_json_str(&json).context("Invalid config file")?
            }
            None => {
                let project_id = self.project_id.as_deref().with_context(|| {
                    format!(
                        "No project id. Pass --project-id, set {} or use --config.",
                        env::PROJECT_ID
                    )
                })?;
                ClientConfig::new(ProjectId::new(project_id).context("Invalid project id")?)
            }
        };

        if let Some(project_id) = non_empty(&self.project_id) {
            config.project_id = ProjectId::new(project_id).context("Invalid project id")?;
        }
        if let Some(api_url) = non_empty(&self.api_url) {
            config.api_url = ApiUrl::new(api_url).context("Invalid API URL")?;
        }
        if let Some(key) = non_empty(&self.publishable_client_key) {
            config.keys.publishable_client_key = Some(key.to_string());
        }
        if let Some(key) = non_empty(&self.secret_server_key) {
            config.keys.secret_server_key = Some(key.to_string());
        }
        if let Some(key) = non_empty(&self.super_secret_admin_key) {
            config.keys.super_secret_admin_key = Some(key.to_string());
        }
        if config.client_version.is_none() {
            config.client_version = Some(format!("stack-cli@{}", env!("STACK_CLI_VERSION")));
        }

        Ok(config)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}
