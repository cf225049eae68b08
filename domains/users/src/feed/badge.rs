//! Cache telemetry badge
//!
//! Every new telemetry value supersedes the previous one: the badge hides,
//! reappears after a short reveal delay, and hides again once the display
//! window passes. A cache hit with a known TTL also starts a one-second
//! countdown that flips the badge to a locally simulated "expired" state when
//! it reaches zero. The server is never asked again for that flip, so the
//! displayed TTL is an approximation of server truth.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use shelfdesk_common::ConsoleConfig;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::domain::telemetry::{CacheStatus, CacheTelemetry};

/// Badge timing configuration
#[derive(Debug, Clone)]
pub struct BadgeConfig {
    pub reveal_delay: Duration,
    pub display_window: Duration,
    pub ttl_tick: Duration,
}

impl Default for BadgeConfig {
    fn default() -> Self {
        Self {
            reveal_delay: Duration::from_millis(200),
            display_window: Duration::from_millis(4000),
            ttl_tick: Duration::from_secs(1),
        }
    }
}

impl From<&ConsoleConfig> for BadgeConfig {
    fn from(config: &ConsoleConfig) -> Self {
        Self {
            reveal_delay: Duration::from_millis(config.badge_reveal_ms),
            display_window: Duration::from_millis(config.badge_display_ms),
            ..Self::default()
        }
    }
}

/// How the badge is styled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeKind {
    Hit,
    Miss,
    /// A hit whose TTL ran out locally; styled like a miss
    Expired,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BadgeState {
    pub visible: bool,
    pub telemetry: Option<CacheTelemetry>,
    /// Locally counted down TTL
    pub ttl_remaining: Option<u64>,
    pub expired: bool,
}

impl BadgeState {
    pub fn kind(&self) -> Option<BadgeKind> {
        let telemetry = self.telemetry.as_ref()?;
        Some(match (telemetry.status, self.expired) {
            (_, true) => BadgeKind::Expired,
            (CacheStatus::Hit, false) => BadgeKind::Hit,
            (CacheStatus::Miss, false) => BadgeKind::Miss,
        })
    }

    /// Text a front end can render as-is
    pub fn label(&self) -> Option<String> {
        let telemetry = self.telemetry.as_ref()?;
        let mut label = match self.kind()? {
            BadgeKind::Hit => "Cache HIT".to_string(),
            BadgeKind::Miss => "Cache MISS".to_string(),
            BadgeKind::Expired => "Cache expired".to_string(),
        };
        if let Some(latency) = &telemetry.latency {
            label.push_str(&format!(" - response time: {latency}"));
        }
        if let (Some(BadgeKind::Hit), Some(ttl)) = (self.kind(), self.ttl_remaining) {
            label.push_str(&format!(", TTL: {ttl}s"));
        }
        Some(label)
    }
}

#[derive(Default)]
struct BadgeInner {
    state: BadgeState,
    generation: u64,
    display: Option<JoinHandle<()>>,
    countdown: Option<JoinHandle<()>>,
}

impl BadgeInner {
    fn cancel_tasks(&mut self) {
        if let Some(handle) = self.display.take() {
            handle.abort();
        }
        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }
    }
}

struct BadgeShared {
    config: BadgeConfig,
    inner: Mutex<BadgeInner>,
}

impl Drop for BadgeShared {
    fn drop(&mut self) {
        self.inner
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel_tasks();
    }
}

/// Transient cache telemetry indicator
#[derive(Clone)]
pub struct TelemetryBadge {
    shared: Arc<BadgeShared>,
}

impl TelemetryBadge {
    pub fn new(config: BadgeConfig) -> Self {
        Self {
            shared: Arc::new(BadgeShared {
                config,
                inner: Mutex::new(BadgeInner::default()),
            }),
        }
    }

    fn lock(shared: &BadgeShared) -> MutexGuard<'_, BadgeInner> {
        shared.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> BadgeState {
        Self::lock(&self.shared).state.clone()
    }

    /// Replace whatever is displayed with fresh telemetry
    pub fn show(&self, telemetry: CacheTelemetry) {
        tracing::debug!(
            status = %telemetry.status,
            ttl = ?telemetry.ttl_remaining,
            latency = ?telemetry.latency,
            "Cache telemetry received"
        );

        let mut inner = Self::lock(&self.shared);
        inner.cancel_tasks();
        inner.generation += 1;
        let generation = inner.generation;

        let countdown_from = match telemetry.status {
            CacheStatus::Hit => telemetry.ttl_remaining,
            CacheStatus::Miss => None,
        };
        inner.state = BadgeState {
            visible: false,
            ttl_remaining: telemetry.ttl_remaining,
            telemetry: Some(telemetry),
            expired: false,
        };

        let weak = Arc::downgrade(&self.shared);
        inner.display = Some(tokio::spawn(run_display(weak.clone(), generation)));
        if let Some(ttl) = countdown_from {
            inner.countdown = Some(tokio::spawn(run_countdown(weak, generation, ttl)));
        }
    }

    /// Hide the badge and stop its timers
    pub fn hide(&self) {
        let mut inner = Self::lock(&self.shared);
        inner.cancel_tasks();
        inner.generation += 1;
        inner.state.visible = false;
    }

    /// Stop timers; the last state stays readable
    pub fn teardown(&self) {
        Self::lock(&self.shared).cancel_tasks();
    }
}

impl std::fmt::Debug for TelemetryBadge {
    #[mutants::skip] // Debug output only
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryBadge")
            .field("state", &self.snapshot())
            .finish()
    }
}

/// Apply `f` only while `generation` is still the current badge
fn with_current<F>(weak: &Weak<BadgeShared>, generation: u64, f: F) -> bool
where
    F: FnOnce(&mut BadgeState),
{
    let Some(shared) = weak.upgrade() else {
        return false;
    };
    let mut inner = TelemetryBadge::lock(&shared);
    if inner.generation != generation {
        return false;
    }
    f(&mut inner.state);
    true
}

async fn run_display(weak: Weak<BadgeShared>, generation: u64) {
    let Some((reveal, window)) = weak
        .upgrade()
        .map(|s| (s.config.reveal_delay, s.config.display_window))
    else {
        return;
    };

    tokio::time::sleep(reveal).await;
    if !with_current(&weak, generation, |state| state.visible = true) {
        return;
    }
    tokio::time::sleep(window).await;
    with_current(&weak, generation, |state| state.visible = false);
}

async fn run_countdown(weak: Weak<BadgeShared>, generation: u64, ttl: u64) {
    let Some(tick) = weak.upgrade().map(|s| s.config.ttl_tick) else {
        return;
    };

    let mut interval = tokio::time::interval_at(Instant::now() + tick, tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut remaining = ttl;
    while remaining > 0 {
        interval.tick().await;
        remaining -= 1;
        let alive = with_current(&weak, generation, |state| {
            state.ttl_remaining = Some(remaining);
            if remaining == 0 {
                state.expired = true;
            }
        });
        if !alive {
            return;
        }
    }
    tracing::debug!("Cached page TTL ran out locally");
}
