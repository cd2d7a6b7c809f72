//! Issue access tokens for connecting to `/ws` during development.

use clap::{Args, Subcommand};
use serde::Serialize;

use crate::output::{self, OutputFormat};
use signalhub_auth::{IssuedToken, JwtEncoder};
use signalhub_core::error::AppError;
use signalhub_core::types::UserRole;

/// Arguments for token commands
#[derive(Debug, Args)]
pub struct TokenArgs {
    /// Token subcommand
    #[command(subcommand)]
    pub command: TokenCommand,
}

/// Token subcommands
#[derive(Debug, Subcommand)]
pub enum TokenCommand {
    /// Sign an access token with the configured secret
    Issue {
        /// Subject user id (must exist in the identity store to connect)
        #[arg(long)]
        user_id: String,

        /// Role claim: USER, ADMIN or SUPER_ADMIN
        #[arg(long, default_value = "USER")]
        role: UserRole,

        /// Lifetime in minutes (defaults to `auth.jwt_access_ttl_minutes`)
        #[arg(long)]
        ttl_minutes: Option<i64>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenOutput<'a> {
    user_id: &'a str,
    role: UserRole,
    #[serde(flatten)]
    token: IssuedToken,
}

/// Execute token commands
pub fn execute(
    args: &TokenArgs,
    config_path: &str,
    env: Option<&str>,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        TokenCommand::Issue {
            user_id,
            role,
            ttl_minutes,
        } => {
            let config = super::load_config(config_path, env)?;
            let encoder = JwtEncoder::new(&config.auth);

            let issued = match ttl_minutes {
                Some(minutes) if *minutes <= 0 => {
                    return Err(AppError::validation("--ttl-minutes must be positive"));
                }
                Some(minutes) => {
                    encoder.issue_with_ttl(user_id, *role, chrono::Duration::minutes(*minutes))?
                }
                None => encoder.issue(user_id, *role)?,
            };

            match format {
                OutputFormat::Text => {
                    println!("{}", issued.token);
                    output::print_kv("Expires", &issued.expires_at.to_rfc3339());
                }
                OutputFormat::Json => output::print_item(
                    &TokenOutput {
                        user_id,
                        role: *role,
                        token: issued,
                    },
                    format,
                ),
            }
        }
    }

    Ok(())
}
