//! Users domain for the Shelfdesk console
//!
//! This crate contains:
//! - The generic cursor-paged feed and its cache telemetry badge
//! - The `/user` API and the persisted paging strategy
//! - The user list controller that ties them to the session

pub mod controller;
pub mod domain;
pub mod feed;
pub mod repository;

pub use controller::UserListController;
pub use domain::entities::{FeedRecord, PageRecord, PagingType, UnknownPagingType, UserRecord};
pub use domain::telemetry::{CacheStatus, CacheTelemetry};
pub use feed::badge::{BadgeConfig, BadgeKind, BadgeState, TelemetryBadge};
pub use feed::{CursorFeed, FeedConfig, FeedState, LoadOutcome, Page, PageRequest, PageSource};
pub use repository::{PagingPreference, UsersApi, USER_COUNT_PATH, USER_PATH};
