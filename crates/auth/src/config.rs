//! Session configuration

use std::time::Duration;

use shelfdesk_common::ConsoleConfig;

/// Session timing configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Remaining seconds at or below which the renewal prompt appears
    pub warning_threshold_secs: i64,
    /// Countdown granularity
    pub tick: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            warning_threshold_secs: 60,
            tick: Duration::from_secs(1),
        }
    }
}

impl From<&ConsoleConfig> for SessionConfig {
    fn from(config: &ConsoleConfig) -> Self {
        Self {
            warning_threshold_secs: config.expiry_warning_secs,
            ..Self::default()
        }
    }
}
