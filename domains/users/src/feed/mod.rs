//! Cursor-paged, append-only record feed
//!
//! A front end calls [`CursorFeed::on_sentinel_visible`] whenever the marker at
//! the end of its rendered list scrolls into view. The `loading` flag is the
//! only mutual exclusion: a trigger that arrives while a load is in flight is
//! dropped, not queued. An empty page ends the stream until [`CursorFeed::reset`].

pub mod badge;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use shelfdesk_common::config::DEFAULT_PAGE_SIZE;
use shelfdesk_common::ConsoleConfig;
use shelfdesk_gateway::RequestError;

use crate::domain::entities::{FeedRecord, PageRecord};
use crate::domain::telemetry::CacheTelemetry;
use badge::{BadgeConfig, BadgeState, TelemetryBadge};

/// Parameters of one page fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Identity key of the last record seen; `None` means from the start
    pub cursor: Option<i64>,
    /// 0-based page index, for sources that page by offset
    pub page: u32,
    pub size: u32,
}

/// One fetched page
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub telemetry: Option<CacheTelemetry>,
}

/// Where a feed gets its pages from
#[async_trait]
pub trait PageSource<T>: Send + Sync {
    async fn fetch_page(&self, request: PageRequest) -> Result<Page<T>, RequestError>;

    /// Total number of records, fetched outside the cursor stream
    async fn total_count(&self) -> Result<u64, RequestError>;
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub page_size: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl From<&ConsoleConfig> for FeedConfig {
    fn from(config: &ConsoleConfig) -> Self {
        Self {
            page_size: config.page_size,
        }
    }
}

/// Result of one load trigger
#[derive(Debug)]
pub enum LoadOutcome {
    /// A load was already in flight or the stream is exhausted
    Skipped,
    /// The feed was reset or cleared while this load was in flight
    Stale,
    /// This many records were appended
    Loaded(usize),
    /// An empty page arrived; no further loads until reset
    Exhausted,
    Failed(RequestError),
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}

/// Snapshot of a feed for rendering
#[derive(Debug, Clone)]
pub struct FeedState<T> {
    pub records: Vec<PageRecord<T>>,
    pub cursor: Option<i64>,
    pub has_more: bool,
    pub loading: bool,
    pub total_count: Option<u64>,
    pub badge: BadgeState,
}

struct FeedInner<T> {
    records: Vec<T>,
    cursor: Option<i64>,
    next_page: u32,
    has_more: bool,
    loading: bool,
    total_count: Option<u64>,
    /// Bumped by reset and clear so that in-flight loads can tell they are stale
    epoch: u64,
}

impl<T> Default for FeedInner<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            cursor: None,
            next_page: 0,
            has_more: true,
            loading: false,
            total_count: None,
            epoch: 0,
        }
    }
}

impl<T> FeedInner<T> {
    fn restart(&mut self) {
        self.records.clear();
        self.cursor = None;
        self.next_page = 0;
        self.has_more = true;
        self.loading = false;
        self.epoch += 1;
    }
}

/// Releases the loading gate if a load future is dropped before it completes
struct InFlight<'a, T> {
    inner: &'a Mutex<FeedInner<T>>,
    epoch: u64,
    armed: bool,
}

impl<T> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.epoch == self.epoch {
            inner.loading = false;
        }
    }
}

/// Append-only feed over a [`PageSource`]
pub struct CursorFeed<T> {
    source: Arc<dyn PageSource<T>>,
    config: FeedConfig,
    badge: TelemetryBadge,
    inner: Arc<Mutex<FeedInner<T>>>,
}

impl<T> Clone for CursorFeed<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            config: self.config.clone(),
            badge: self.badge.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<T: FeedRecord> CursorFeed<T> {
    pub fn new(source: Arc<dyn PageSource<T>>, config: FeedConfig, badge: BadgeConfig) -> Self {
        Self {
            source,
            config,
            badge: TelemetryBadge::new(badge),
            inner: Arc::new(Mutex::new(FeedInner::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FeedInner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn badge(&self) -> &TelemetryBadge {
        &self.badge
    }

    pub fn has_more(&self) -> bool {
        self.lock().has_more
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub fn total_count(&self) -> Option<u64> {
        self.lock().total_count
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Loaded records with their positions
    pub fn records(&self) -> Vec<PageRecord<T>> {
        positioned(&self.lock().records)
    }

    pub fn snapshot(&self) -> FeedState<T> {
        let inner = self.lock();
        FeedState {
            records: positioned(&inner.records),
            cursor: inner.cursor,
            has_more: inner.has_more,
            loading: inner.loading,
            total_count: inner.total_count,
            badge: self.badge.snapshot(),
        }
    }

    /// Fetch the total count, then the first page
    pub async fn start(&self) -> LoadOutcome {
        self.refresh_total().await;
        self.reset().await
    }

    /// Re-fetch the total count; a failure leaves the previous value in place
    pub async fn refresh_total(&self) {
        match self.source.total_count().await {
            Ok(total) => {
                tracing::debug!(total, "Total record count fetched");
                self.lock().total_count = Some(total);
            }
            Err(e) => tracing::warn!(error = %e, "Failed to fetch total record count"),
        }
    }

    /// Start over from the first page
    pub async fn reset(&self) -> LoadOutcome {
        self.lock().restart();
        tracing::info!("Feed reset");
        self.on_sentinel_visible().await
    }

    /// Drop everything loaded and hide the badge without loading again
    pub fn clear(&self) {
        {
            let mut inner = self.lock();
            inner.restart();
            inner.total_count = None;
        }
        self.badge.hide();
    }

    /// The end-of-list marker became visible
    pub async fn on_sentinel_visible(&self) -> LoadOutcome {
        let (request, epoch) = {
            let mut inner = self.lock();
            if inner.loading || !inner.has_more {
                tracing::trace!(
                    loading = inner.loading,
                    has_more = inner.has_more,
                    "Load trigger dropped"
                );
                return LoadOutcome::Skipped;
            }
            inner.loading = true;
            (
                PageRequest {
                    cursor: inner.cursor,
                    page: inner.next_page,
                    size: self.config.page_size,
                },
                inner.epoch,
            )
        };

        let mut in_flight = InFlight {
            inner: &self.inner,
            epoch,
            armed: true,
        };

        tracing::debug!(cursor = ?request.cursor, page = request.page, size = request.size, "Loading page");
        let result = self.source.fetch_page(request).await;

        let mut inner = self.lock();
        in_flight.armed = false;
        if inner.epoch != epoch {
            tracing::debug!("Discarding page loaded before a reset");
            return LoadOutcome::Stale;
        }
        inner.loading = false;

        let page = match result {
            Ok(page) => page,
            Err(e) => return LoadOutcome::Failed(e),
        };

        if let Some(telemetry) = page.telemetry {
            self.badge.show(telemetry);
        }

        let Some(last) = page.records.last() else {
            inner.has_more = false;
            tracing::info!(loaded = inner.records.len(), "Feed exhausted");
            return LoadOutcome::Exhausted;
        };

        inner.cursor = Some(last.record_id());
        inner.next_page += 1;
        inner.has_more = true;
        let count = page.records.len();
        inner.records.extend(page.records);
        LoadOutcome::Loaded(count)
    }

    /// Apply `edit` to every loaded record with this identity key
    pub fn update_record<F>(&self, id: i64, edit: F) -> usize
    where
        F: Fn(&mut T),
    {
        let mut inner = self.lock();
        let mut matched = 0;
        for record in inner.records.iter_mut().filter(|r| r.record_id() == id) {
            edit(record);
            matched += 1;
        }
        matched
    }

    /// Remove the first loaded record matching `predicate`
    pub fn remove_first<P>(&self, predicate: P) -> Option<T>
    where
        P: Fn(&T) -> bool,
    {
        let mut inner = self.lock();
        let index = inner.records.iter().position(predicate)?;
        Some(inner.records.remove(index))
    }

    /// Account for one record deleted on the server, loaded or not
    pub fn decrement_total(&self) {
        let mut inner = self.lock();
        inner.total_count = inner.total_count.map(|t| t.saturating_sub(1));
    }

    /// Stop badge timers
    pub fn teardown(&self) {
        self.badge.teardown();
    }
}

fn positioned<T: Clone>(records: &[T]) -> Vec<PageRecord<T>> {
    records
        .iter()
        .enumerate()
        .map(|(position, record)| PageRecord {
            position,
            record: record.clone(),
        })
        .collect()
}

impl<T> std::fmt::Debug for CursorFeed<T> {
    #[mutants::skip] // Debug output only
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("CursorFeed")
            .field("records", &inner.records.len())
            .field("cursor", &inner.cursor)
            .field("has_more", &inner.has_more)
            .field("loading", &inner.loading)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::UserRecord;
    use crate::domain::telemetry::CacheStatus;
    use shelfdesk_gateway::{Method, RequestErrorKind};
    use std::collections::VecDeque;
    use std::time::Duration;

    fn user(id: i64, name: &str) -> UserRecord {
        UserRecord {
            id,
            name: name.to_string(),
            age: Some(30),
        }
    }

    fn users(ids: std::ops::RangeInclusive<i64>) -> Vec<UserRecord> {
        ids.map(|id| user(id, &format!("user-{id}"))).collect()
    }

    /// Scripted page source recording every request
    #[derive(Default)]
    struct StubSource {
        pages: Mutex<VecDeque<Result<Page<UserRecord>, RequestError>>>,
        requests: Mutex<Vec<PageRequest>>,
        delay: Option<Duration>,
        total: u64,
    }

    impl StubSource {
        fn with_pages(pages: Vec<Vec<UserRecord>>) -> Self {
            Self {
                pages: Mutex::new(
                    pages
                        .into_iter()
                        .map(|records| {
                            Ok(Page {
                                records,
                                telemetry: None,
                            })
                        })
                        .collect(),
                ),
                ..Self::default()
            }
        }

        fn push(&self, page: Result<Page<UserRecord>, RequestError>) {
            self.pages.lock().unwrap().push_back(page);
        }

        fn requests(&self) -> Vec<PageRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource<UserRecord> for StubSource {
        async fn fetch_page(&self, request: PageRequest) -> Result<Page<UserRecord>, RequestError> {
            self.requests.lock().unwrap().push(request);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.pages.lock().unwrap().pop_front().unwrap_or(Ok(Page {
                records: Vec::new(),
                telemetry: None,
            }))
        }

        async fn total_count(&self) -> Result<u64, RequestError> {
            Ok(self.total)
        }
    }

    fn feed(source: Arc<StubSource>, page_size: u32) -> CursorFeed<UserRecord> {
        CursorFeed::new(source, FeedConfig { page_size }, BadgeConfig::default())
    }

    #[tokio::test]
    async fn test_pages_append_in_order_and_advance_cursor() {
        let source = Arc::new(StubSource::with_pages(vec![users(1..=3), users(4..=5)]));
        let feed = feed(source.clone(), 3);

        assert!(matches!(feed.on_sentinel_visible().await, LoadOutcome::Loaded(3)));
        assert!(matches!(feed.on_sentinel_visible().await, LoadOutcome::Loaded(2)));

        let ids: Vec<i64> = feed.records().iter().map(|r| r.record.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(feed.records()[4].position, 4);
        assert_eq!(feed.snapshot().cursor, Some(5));

        let requests = source.requests();
        assert_eq!(
            requests[0],
            PageRequest {
                cursor: None,
                page: 0,
                size: 3
            }
        );
        assert_eq!(requests[1].cursor, Some(3));
        assert_eq!(requests[1].page, 1);
    }

    #[tokio::test]
    async fn test_has_more_flips_once() {
        let source = Arc::new(StubSource::with_pages(vec![users(1..=2)]));
        let feed = feed(source.clone(), 2);

        assert!(feed.on_sentinel_visible().await.is_loaded());
        assert!(feed.has_more());
        assert!(matches!(feed.on_sentinel_visible().await, LoadOutcome::Exhausted));
        assert!(!feed.has_more());

        source.push(Ok(Page {
            records: users(3..=4),
            telemetry: None,
        }));
        for _ in 0..3 {
            assert!(matches!(feed.on_sentinel_visible().await, LoadOutcome::Skipped));
        }
        assert!(!feed.has_more());
        assert_eq!(source.requests().len(), 2);
        assert_eq!(feed.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_at_most_one_load_in_flight() {
        let source = Arc::new(StubSource {
            delay: Some(Duration::from_millis(500)),
            ..StubSource::with_pages(vec![users(1..=3)])
        });
        let feed = feed(source.clone(), 3);

        let (a, b, c) = tokio::join!(
            feed.on_sentinel_visible(),
            feed.on_sentinel_visible(),
            feed.on_sentinel_visible()
        );

        let loaded = [&a, &b, &c].iter().filter(|o| o.is_loaded()).count();
        let skipped = [&a, &b, &c]
            .iter()
            .filter(|o| matches!(o, LoadOutcome::Skipped))
            .count();
        assert_eq!(loaded, 1);
        assert_eq!(skipped, 2);
        assert_eq!(source.requests().len(), 1);
        assert!(!feed.is_loading());
    }

    #[tokio::test]
    async fn test_failure_releases_gate_and_keeps_records() {
        let source = Arc::new(StubSource::with_pages(vec![users(1..=2)]));
        source.push(Err(RequestError {
            kind: RequestErrorKind::ServerFault,
            method: Method::Get,
            path: "/user".to_string(),
            response: None,
            detail: None,
        }));
        source.push(Ok(Page {
            records: users(3..=3),
            telemetry: None,
        }));
        let feed = feed(source, 2);

        assert!(feed.on_sentinel_visible().await.is_loaded());
        assert!(matches!(feed.on_sentinel_visible().await, LoadOutcome::Failed(_)));
        assert!(!feed.is_loading());
        assert!(feed.has_more());
        assert!(matches!(feed.on_sentinel_visible().await, LoadOutcome::Loaded(1)));
        assert_eq!(feed.len(), 3);
    }

    #[tokio::test]
    async fn test_reset_starts_over() {
        let source = Arc::new(StubSource {
            total: 5,
            ..StubSource::with_pages(vec![users(1..=2), Vec::new(), users(1..=2)])
        });
        let feed = feed(source.clone(), 2);

        feed.start().await;
        feed.on_sentinel_visible().await;
        assert!(!feed.has_more());

        assert!(matches!(feed.reset().await, LoadOutcome::Loaded(2)));
        assert!(feed.has_more());
        assert_eq!(feed.len(), 2);
        assert_eq!(feed.total_count(), Some(5));
        let last = source.requests().pop().unwrap();
        assert_eq!(last.cursor, None);
        assert_eq!(last.page, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_started_before_clear_is_stale() {
        let source = Arc::new(StubSource {
            delay: Some(Duration::from_millis(500)),
            ..StubSource::with_pages(vec![users(1..=3)])
        });
        let feed = feed(source, 3);

        let pending = feed.on_sentinel_visible();
        let clearing = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            feed.clear();
        };
        let (outcome, ()) = tokio::join!(pending, clearing);

        assert!(matches!(outcome, LoadOutcome::Stale));
        assert!(feed.is_empty());
        assert!(!feed.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_load_releases_gate() {
        let source = Arc::new(StubSource {
            delay: Some(Duration::from_secs(5)),
            ..StubSource::with_pages(vec![users(1..=3)])
        });
        let feed = feed(source, 3);

        let timed_out =
            tokio::time::timeout(Duration::from_millis(100), feed.on_sentinel_visible()).await;
        assert!(timed_out.is_err());
        assert!(!feed.is_loading());
    }

    #[tokio::test]
    async fn test_delete_by_name_removes_one_record() {
        let mut page = users(1..=4);
        page[2].name = "user-2".to_string();
        let source = Arc::new(StubSource {
            total: 10,
            ..StubSource::with_pages(vec![page])
        });
        let feed = feed(source.clone(), 4);
        feed.start().await;
        let requests_before = source.requests().len();

        let removed = feed.remove_first(|u| u.name == "user-2").unwrap();
        feed.decrement_total();

        assert_eq!(removed.id, 2);
        let ids: Vec<i64> = feed.records().iter().map(|r| r.record.id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
        assert_eq!(feed.total_count(), Some(9));
        assert_eq!(source.requests().len(), requests_before);

        assert!(feed.remove_first(|u| u.name == "nobody").is_none());
        assert_eq!(feed.len(), 3);
    }

    #[tokio::test]
    async fn test_decrement_total_saturates() {
        let source = Arc::new(StubSource {
            total: 1,
            ..StubSource::with_pages(vec![users(1..=1)])
        });
        let feed = feed(source, 4);
        feed.start().await;

        feed.decrement_total();
        feed.decrement_total();

        assert_eq!(feed.total_count(), Some(0));
        assert_eq!(feed.len(), 1);
    }

    #[tokio::test]
    async fn test_update_in_place_leaves_total() {
        let source = Arc::new(StubSource {
            total: 3,
            ..StubSource::with_pages(vec![users(1..=3)])
        });
        let feed = feed(source, 3);
        feed.start().await;

        let matched = feed.update_record(2, |u| u.name = "renamed".to_string());

        assert_eq!(matched, 1);
        assert_eq!(feed.records()[1].record.name, "renamed");
        assert_eq!(feed.records()[1].position, 1);
        assert_eq!(feed.total_count(), Some(3));
        assert_eq!(feed.update_record(99, |u| u.age = None), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_telemetry_drives_badge() {
        let source = Arc::new(StubSource::default());
        source.push(Ok(Page {
            records: users(1..=1),
            telemetry: Some(CacheTelemetry {
                status: CacheStatus::Hit,
                ttl_remaining: Some(300),
                latency: Some("1ms".to_string()),
            }),
        }));
        let feed = feed(source, 1);

        feed.on_sentinel_visible().await;
        tokio::time::sleep(Duration::from_millis(250)).await;
        tokio::task::yield_now().await;

        let state = feed.snapshot();
        assert!(state.badge.visible);
        assert_eq!(state.badge.ttl_remaining, Some(300));

        feed.clear();
        assert!(!feed.snapshot().badge.visible);
    }
}
