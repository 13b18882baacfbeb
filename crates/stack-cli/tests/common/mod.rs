#![allow(dead_code)]

use std::path::Path;
use std::process::{Command, Output};

/// An unsigned JWT without `exp`, so the CLI never refreshes it on its own.
pub const ACCESS_TOKEN: &str = "eyJhbGciOiJub25lIn0.eyJzdWIiOiJ1c2VyLTEifQ.sig";

pub const PROJECT_ID: &str = "cli-project";

const STACK_VARS: &[&str] = &[
    "STACK_API_URL",
    "STACK_PROJECT_ID",
    "STACK_PUBLISHABLE_CLIENT_KEY",
    "STACK_SECRET_SERVER_KEY",
    "STACK_SUPER_SECRET_ADMIN_KEY",
    "STACK_PASSWORD",
];

/// Run the CLI with a custom HOME directory for isolated session storage.
pub fn run_cli_with_env(args: &[&str], home: &Path, api_url: &str) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_stack"));
    cmd.args(args);
    for var in STACK_VARS {
        cmd.env_remove(var);
    }
    cmd.env("HOME", home);
    cmd.env("XDG_DATA_HOME", home.join("data"));
    cmd.env("NO_COLOR", "1");
    cmd.env("STACK_API_URL", api_url);
    cmd.env("STACK_PROJECT_ID", PROJECT_ID);
    cmd.env("STACK_PUBLISHABLE_CLIENT_KEY", "pck_cli");
    cmd.output().expect("Failed to execute CLI")
}

/// Run the CLI with a custom HOME and expect success.
pub fn run_cli_with_env_success(args: &[&str], home: &Path, api_url: &str) -> String {
    let output = run_cli_with_env(args, home, api_url);
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!("CLI command failed: {:?}\nstderr: {}", args, stderr);
    }
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Run the CLI with a custom HOME and expect failure. Returns stderr.
pub fn run_cli_with_env_failure(args: &[&str], home: &Path, api_url: &str) -> String {
    let output = run_cli_with_env(args, home, api_url);
    if output.status.success() {
        panic!("CLI command should have failed: {:?}", args);
    }
    String::from_utf8_lossy(&output.stderr).to_string()
}
