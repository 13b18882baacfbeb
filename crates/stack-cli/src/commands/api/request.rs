//! Raw request command implementation.

use anyhow::{Context, Result, bail};
use clap::Args;

use stack_client::{ApiRequest, ClientInterface, Method};
use stack_core::{AccessType, Error};

use crate::cli::ConnectionArgs;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// HTTP method
    pub method: String,

    /// Path below /api/v1 (e.g., /users/me)
    pub path: String,

    /// JSON request body
    #[arg(long)]
    pub data: Option<String>,

    /// Extra header as `name: value` (repeatable)
    #[arg(long = "header", short = 'H')]
    pub headers: Vec<String>,

    /// Access type: client, server or admin
    #[arg(long, default_value = "client")]
    pub access_type: AccessType,

    /// Do not attach the stored session
    #[arg(long)]
    pub anonymous: bool,

    /// Print the response status before the body
    #[arg(long, short = 'i')]
    pub include: bool,
}

pub async fn run(args: RequestArgs, connection: &ConnectionArgs) -> Result<()> {
    let client = ClientInterface::new(&connection.load()?).context("Failed to create client")?;
    let session = if args.anonymous {
        None
    } else {
        session::restore_if_present(&client)?
    };

    let request = build_request(&args)?;
    let identity = client.identity(args.access_type, session.as_ref());

    let result = client.pipeline().send(&request, &identity).await;

    if let Some(session) = &session {
        if session.is_known_to_be_invalid() {
            session::storage::clear_session()?;
        } else {
            session::save(&client, session)?;
        }
    }

    match result {
        Ok(response) => {
            if args.include {
                output::field("Status", &response.status.to_string());
            }
            output::body(&response.body)
        }
        Err(Error::Known(error)) => {
            output::warning(&format!("{} {}", error.status_code(), error.code()));
            output::json_pretty(&error.to_json())?;
            bail!("Request failed with a known error");
        }
        Err(error) => Err(error).context("Request failed"),
    }
}

fn build_request(args: &RequestArgs) -> Result<ApiRequest> {
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method '{}'", args.method))?;

    let mut request = ApiRequest::new(method, args.path.clone());
    if let Some(data) = &args.data {
        let body: serde_json::Value =
            serde_json::from_str(data).context("--data is not valid JSON")?;
        request = request.json(&body)?;
    }
    for header in &args.headers {
        let (name, value) = header
            .split_once(':')
            .with_context(|| format!("Invalid header '{header}', expected 'name: value'"))?;
        request = request
            .header(name.trim(), value.trim())
            .with_context(|| format!("Invalid header '{header}'"))?;
    }
    Ok(request)
}
