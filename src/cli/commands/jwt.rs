//! Access token inspection commands

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde::Serialize;

use crate::cli::output::{OutputFormat, print_formatted};
use crate::config::Config;
use crate::jwt::{self, DecodedToken};

#[derive(Subcommand, Debug)]
pub enum JwtCommands {
    /// Decode a token's header and payload (without verifying the signature)
    Decode {
        /// Token to decode; the stored access token when omitted
        token: Option<String>,
    },
}

#[derive(Serialize)]
struct DecodeResult {
    #[serde(flatten)]
    token: DecodedToken,
    created_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    valid: bool,
}

pub async fn run(command: JwtCommands, format: OutputFormat, _quiet: bool) -> Result<()> {
    match command {
        JwtCommands::Decode { token } => decode(token, format),
    }
}

fn decode(token: Option<String>, format: OutputFormat) -> Result<()> {
    let token = match token {
        Some(token) => token,
        None => Config::load()?
            .api
            .access_token
            .context("No token given and no access token stored. Run `unicorns auth login` first.")?,
    };

    let result = decode_result(jwt::parse(&token)?, Utc::now());
    print_formatted(&result, format, format_decode_text);
    Ok(())
}

fn decode_result(token: DecodedToken, now: DateTime<Utc>) -> DecodeResult {
    let payload = token.payload.as_ref();
    DecodeResult {
        created_at: payload.and_then(|p| p.created_at()),
        expires_at: payload.and_then(|p| p.expires_at()),
        valid: token.is_valid_at(now),
        token,
    }
}

fn format_decode_text(result: &DecodeResult) -> String {
    let header = result.token.header.as_ref();
    let payload = result.token.payload.as_ref();
    let or_none = |value: Option<String>| value.unwrap_or_else(|| "<none>".to_string());

    [
        format!("Algorithm:  {}", or_none(header.and_then(|h| h.algorithm.clone()))),
        format!("Type:       {}", or_none(header.and_then(|h| h.token_type.clone()))),
        format!("User id:    {}", or_none(payload.and_then(|p| p.id).map(|id| id.to_string()))),
        format!("Issued:     {}", or_none(result.created_at.map(|t| t.to_rfc3339()))),
        format!("Expires:    {}", or_none(result.expires_at.map(|t| t.to_rfc3339()))),
        format!("Valid:      {}", if result.valid { "yes" } else { "no" }),
    ]
    .join("\n")
}
