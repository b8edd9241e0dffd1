//! Access token inspection.
//!
//! Tokens are only decoded, never verified: the backend owns the signature.
//! The client just needs the expiry to decide whether a stored session is
//! still worth sending.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while decoding a token
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Malformed token header: {0}")]
    Header(#[source] serde_json::Error),

    #[error("Malformed token payload: {0}")]
    Payload(#[source] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenHeader {
    #[serde(rename = "alg", default)]
    pub algorithm: Option<String>,
    #[serde(rename = "typ", default)]
    pub token_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPayload {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(rename = "iat", default)]
    pub created: Option<i64>,
    #[serde(rename = "exp", default)]
    pub expires: Option<i64>,
}

impl TokenPayload {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

/// Decoded header and payload. Either part is `None` when the token did not
/// contain a decodable chunk for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedToken {
    pub header: Option<TokenHeader>,
    pub payload: Option<TokenPayload>,
}

impl DecodedToken {
    /// A token is valid while its expiry lies strictly in the future
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.payload
            .as_ref()
            .and_then(TokenPayload::expires_at)
            .is_some_and(|expires| expires > now)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

/// Decode the header and payload of a JWT.
///
/// Chunks that are not base64 or decode to blank text are skipped, and the
/// first two remaining chunks are read as header and payload.
pub fn parse(token: &str) -> Result<DecodedToken, JwtError> {
    let mut chunks = token.split('.').filter_map(decode_chunk);

    let header = chunks
        .next()
        .map(|text| serde_json::from_str::<TokenHeader>(&text))
        .transpose()
        .map_err(JwtError::Header)?;

    let payload = chunks
        .next()
        .map(|text| serde_json::from_str::<TokenPayload>(&text))
        .transpose()
        .map_err(JwtError::Payload)?;

    Ok(DecodedToken { header, payload })
}

fn decode_chunk(chunk: &str) -> Option<String> {
    let trimmed = chunk.trim().trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .ok()?;
    let text = String::from_utf8(bytes).ok()?;
    if text.trim().is_empty() { None } else { Some(text) }
}
