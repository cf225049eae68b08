//! Cache telemetry carried in list response headers

use serde::Serialize;
use shelfdesk_gateway::ApiResponse;

pub const CACHE_HEADER: &str = "x-cache";
pub const TTL_HEADER: &str = "x-ttl";
pub const RESPONSE_TIME_HEADER: &str = "x-response-time";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hit => write!(f, "HIT"),
            Self::Miss => write!(f, "MISS"),
        }
    }
}

/// Display-only projection of one response's cache headers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheTelemetry {
    pub status: CacheStatus,
    /// Seconds the cached page has left; only reported on a hit
    pub ttl_remaining: Option<u64>,
    /// Server-measured handling time, e.g. `12ms`
    pub latency: Option<String>,
}

impl CacheTelemetry {
    /// Read telemetry headers; `None` when the response carries no cache status
    pub fn from_response(response: &ApiResponse) -> Option<Self> {
        let status = match response.header(CACHE_HEADER)?.trim() {
            s if s.eq_ignore_ascii_case("HIT") => CacheStatus::Hit,
            s if s.eq_ignore_ascii_case("MISS") => CacheStatus::Miss,
            other => {
                tracing::warn!(value = %other, "Unrecognised cache status header");
                return None;
            }
        };

        let ttl_remaining = match status {
            CacheStatus::Hit => response.header(TTL_HEADER).and_then(parse_ttl),
            CacheStatus::Miss => None,
        };

        let latency = response
            .header(RESPONSE_TIME_HEADER)
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string);

        Some(Self {
            status,
            ttl_remaining,
            latency,
        })
    }
}

/// `No TTL` and other non-numeric values mean the TTL is unknown
fn parse_ttl(raw: &str) -> Option<u64> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(secs),
        Ok(_) => None,
        Err(_) => {
            tracing::debug!(value = %raw, "TTL header is not a number");
            None
        }
    }
}
