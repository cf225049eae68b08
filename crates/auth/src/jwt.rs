//! Credential decoding and token extraction helpers
//!
//! The console never verifies signatures. It only reads the payload segment
//! to learn when the credential expires and which identity claims it carries.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use shelfdesk_gateway::ApiResponse;

use crate::claims::DecodedToken;
use crate::error::DecodeError;

/// Strip an optional `Bearer ` scheme prefix
pub fn strip_bearer(raw: &str) -> &str {
    let raw = raw.trim();
    raw.strip_prefix("Bearer ").unwrap_or(raw).trim()
}

/// Decode the payload of a three-segment credential
pub fn decode_token(token: &str) -> Result<DecodedToken, DecodeError> {
    let token = strip_bearer(token);
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(DecodeError::Malformed(segments.len()));
    }

    let payload = URL_SAFE_NO_PAD.decode(segments[1].trim_end_matches('='))?;
    let value: Value = serde_json::from_slice(&payload)?;
    let claims: Map<String, Value> = match value {
        Value::Object(map) => map,
        _ => return Err(DecodeError::NotAnObject),
    };

    let expires_at = expiry_of(&claims)?;
    Ok(DecodedToken { expires_at, claims })
}

fn expiry_of(claims: &Map<String, Value>) -> Result<DateTime<Utc>, DecodeError> {
    let exp = claims.get("exp").ok_or(DecodeError::MissingExpiry)?;
    let secs = match exp {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .ok_or(DecodeError::InvalidExpiry)?,
        _ => return Err(DecodeError::InvalidExpiry),
    };
    DateTime::from_timestamp(secs, 0).ok_or(DecodeError::InvalidExpiry)
}

/// Pull the issued credential out of a login or refresh response
///
/// The `Authorization` header wins; a bare token in the body is the fallback.
pub fn extract_issued_token(response: &ApiResponse) -> Option<String> {
    if let Some(header) = response.header("authorization") {
        let token = strip_bearer(header);
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    let body = response.text();
    let token = strip_bearer(&body);
    if token.split('.').count() == 3 {
        Some(token.to_string())
    } else {
        None
    }
}
