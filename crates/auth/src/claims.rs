//! Credential claims

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Claims decoded from a credential payload
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToken {
    /// Absolute expiry derived from the `exp` claim
    pub expires_at: DateTime<Utc>,
    /// Every claim in the payload, `exp` included
    pub claims: Map<String, Value>,
}

impl DecodedToken {
    /// Administrator number (`adminNo`), issued as a string or a number
    pub fn admin_no(&self) -> Option<String> {
        match self.claims.get("adminNo")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn email(&self) -> Option<&str> {
        self.claims.get("email").and_then(Value::as_str)
    }

    /// Role names from the `authorities` claim; empty when absent
    pub fn authorities(&self) -> Vec<String> {
        self.claims
            .get("authorities")
            .and_then(Value::as_array)
            .map(|roles| {
                roles
                    .iter()
                    .filter_map(|r| r.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Seconds left until expiry, negative once expired
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        seconds_until(self.expires_at, now)
    }
}

/// Whole seconds from `now` until `at`, rounding a partial second up
pub fn seconds_until(at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (at - now).num_milliseconds();
    if millis > 0 {
        (millis + 999) / 1000
    } else {
        millis / 1000
    }
}
