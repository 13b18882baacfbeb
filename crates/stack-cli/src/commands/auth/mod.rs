//! Auth subcommand implementations.

mod login;
mod logout;
mod refresh_token;
mod whoami;

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cli::ConnectionArgs;

#[derive(Args, Debug)]
pub struct AuthCommand {
    #[command(subcommand)]
    pub command: AuthSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthSubcommand {
    /// Sign in with email and password
    Login(login::LoginArgs),

    /// Display the signed-in user
    Whoami(whoami::WhoamiArgs),

    /// Exchange the refresh token for a new access token
    RefreshToken(refresh_token::RefreshTokenArgs),

    /// Sign out and forget the stored session
    Logout(logout::LogoutArgs),
}

pub async fn handle(cmd: AuthCommand, connection: &ConnectionArgs) -> Result<()> {
    match cmd.command {
        AuthSubcommand::Login(args) => login::run(args, connection).await,
        AuthSubcommand::Whoami(args) => whoami::run(args, connection).await,
        AuthSubcommand::RefreshToken(args) => refresh_token::run(args, connection).await,
        AuthSubcommand::Logout(args) => logout::run(args, connection).await,
    }
}
