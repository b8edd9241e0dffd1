//! Backend session commands

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde::Serialize;

use crate::api::ApiClient;
use crate::cli::output::{OutputFormat, print_formatted, print_status, print_success};
use crate::config::Config;
use crate::jwt;

#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Log in and store the returned tokens
    Login {
        /// Email or username
        identifier: String,

        /// Account password
        #[arg(long)]
        password: String,
    },

    /// Show whether the stored session is usable
    Status,

    /// Forget the stored tokens
    Logout,
}

#[derive(Serialize)]
struct StatusResult {
    hostname: String,
    has_token: bool,
    valid: bool,
    expires_at: Option<DateTime<Utc>>,
}

pub async fn run(command: AuthCommands, format: OutputFormat, quiet: bool) -> Result<()> {
    match command {
        AuthCommands::Login {
            identifier,
            password,
        } => login(&identifier, &password, quiet).await,
        AuthCommands::Status => status(format).await,
        AuthCommands::Logout => logout(quiet).await,
    }
}

async fn login(identifier: &str, password: &str, quiet: bool) -> Result<()> {
    let mut config = Config::load()?;
    let client = ApiClient::new(&config.api)?;

    let auth = client
        .login(identifier, password)
        .await
        .context("Login failed")?;

    config.api.access_token = Some(auth.access_token);
    config.api.refresh_token = Some(auth.refresh_token);
    config.save()?;

    print_success(&format!("Logged in as {}", identifier), quiet);
    Ok(())
}

async fn status(format: OutputFormat) -> Result<()> {
    let config = Config::load()?;
    let client = ApiClient::new(&config.api)?;

    let expires_at = config
        .api
        .access_token
        .as_deref()
        .and_then(|token| jwt::parse(token).ok())
        .and_then(|token| token.payload)
        .and_then(|payload| payload.expires_at());

    let result = StatusResult {
        hostname: config.api.hostname.clone(),
        has_token: config.api.access_token.is_some(),
        valid: client.has_valid_session(),
        expires_at,
    };

    match format {
        OutputFormat::Json => print_formatted(&result, format, |_| String::new()),
        OutputFormat::Text => {
            println!("Backend: {}", result.hostname);
            print_status(result.has_token, "Access token stored");
            let expiry = result
                .expires_at
                .map(|t| format!(" (expires {})", t.to_rfc3339()))
                .unwrap_or_default();
            print_status(result.valid, &format!("Session valid{}", expiry));
        }
    }

    Ok(())
}

async fn logout(quiet: bool) -> Result<()> {
    let mut config = Config::load()?;
    config.api.access_token = None;
    config.api.refresh_token = None;
    config.save()?;

    print_success("Logged out", quiet);
    Ok(())
}
