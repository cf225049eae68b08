//! User list paging, telemetry and reconciliation against the stub backend

use std::time::Duration;

use serde_json::json;
use shelfdesk_auth::SessionPhase;
use shelfdesk_common::storage::{ACCESS_TOKEN_KEY, PAGING_TYPE_KEY};
use shelfdesk_users::{BadgeKind, CacheStatus, LoadOutcome, PagingType};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{user_page, TestConsole, PAGE_SIZE};

/// Mount three cursor pages: 1..=3, 4..=6, then empty
async fn mount_cursor_pages(t: &TestConsole) {
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(query_param("cursor", "3"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Cache", "MISS")
                .insert_header("X-Response-Time", "38ms")
                .set_body_json(user_page(4..=6)),
        )
        .mount(&t.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(query_param("cursor", "6"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&t.server)
        .await;
    // First page: no cursor parameter
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(query_param("type", "cache-cursor"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Cache", "HIT")
                .insert_header("X-TTL", "300")
                .insert_header("X-Response-Time", "2ms")
                .set_body_json(user_page(1..=3)),
        )
        .with_priority(10)
        .mount(&t.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user/count"))
        .respond_with(ResponseTemplate::new(200).set_body_string("6"))
        .mount(&t.server)
        .await;
}

#[test_log::test(tokio::test)]
async fn test_pages_stream_until_exhausted() {
    let t = TestConsole::start().await;
    t.logged_in(3600).await;
    mount_cursor_pages(&t).await;
    let users = &t.console.users;

    assert!(matches!(users.start().await, LoadOutcome::Loaded(3)));
    let badge = users.feed().badge().snapshot();
    assert_eq!(badge.telemetry.as_ref().map(|b| b.status), Some(CacheStatus::Hit));
    assert_eq!(badge.ttl_remaining, Some(300));

    assert!(matches!(users.load_more().await, LoadOutcome::Loaded(3)));
    assert_eq!(users.feed().badge().snapshot().kind(), Some(BadgeKind::Miss));
    assert!(matches!(users.load_more().await, LoadOutcome::Exhausted));
    assert!(matches!(users.load_more().await, LoadOutcome::Skipped));

    let ids: Vec<i64> = users.feed().records().iter().map(|r| r.record.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(users.feed().total_count(), Some(6));
    assert_eq!(t.received("GET", "/user").await, 3);
}

#[tokio::test]
async fn test_badge_reveals_after_delay() {
    let t = TestConsole::start().await;
    t.logged_in(3600).await;
    mount_cursor_pages(&t).await;

    t.console.users.start().await;
    assert!(!t.console.users.feed().badge().snapshot().visible);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(t.console.users.feed().badge().snapshot().visible);
}

#[tokio::test]
async fn test_delete_by_name_reconciles_without_reload() {
    let t = TestConsole::start().await;
    t.logged_in(3600).await;
    mount_cursor_pages(&t).await;
    Mock::given(method("DELETE"))
        .and(path("/user"))
        .and(body_json(json!({"name": "user-2", "pageSize": PAGE_SIZE})))
        .respond_with(ResponseTemplate::new(200).set_body_string("User deleted"))
        .expect(1)
        .mount(&t.server)
        .await;
    t.console.users.start().await;

    let removed = t.console.users.delete_user("user-2").await.unwrap();

    assert_eq!(removed.map(|u| u.id), Some(2));
    let ids: Vec<i64> = t
        .console
        .users
        .feed()
        .records()
        .iter()
        .map(|r| r.record.id)
        .collect();
    assert_eq!(ids, vec![1, 3]);
    assert_eq!(t.console.users.feed().total_count(), Some(5));
    assert_eq!(t.received("GET", "/user").await, 1);
    assert_eq!(t.ui.notices()[0].text, "User deleted");
}

#[tokio::test]
async fn test_rename_failure_surfaces_server_message() {
    let t = TestConsole::start().await;
    t.logged_in(3600).await;
    mount_cursor_pages(&t).await;
    Mock::given(method("PUT"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(400).set_body_string("That name is already taken"))
        .mount(&t.server)
        .await;
    t.console.users.start().await;

    assert!(t.console.users.rename_user(1, "user-3").await.is_err());

    let notices = t.ui.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].text, "That name is already taken");
    assert_eq!(t.console.users.feed().records()[0].record.name, "user-1");
}

#[tokio::test]
async fn test_offset_paging_sends_page_index() {
    let t = TestConsole::start().await;
    t.logged_in(3600).await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(query_param("type", "offset"))
        .and(query_param("page", "0"))
        .and(query_param("size", PAGE_SIZE.to_string().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_page(1..=3)))
        .expect(1)
        .mount(&t.server)
        .await;

    let outcome = t
        .console
        .users
        .set_paging_type(PagingType::Offset)
        .await
        .unwrap();

    assert!(outcome.is_loaded());
    assert_eq!(t.stored(PAGING_TYPE_KEY).as_deref(), Some("offset"));
}

#[tokio::test]
async fn test_unauthorized_page_ends_session() {
    let t = TestConsole::start().await;
    t.logged_in(3600).await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&t.server)
        .await;

    assert!(matches!(t.console.users.load_more().await, LoadOutcome::Failed(_)));

    assert_eq!(t.console.session.phase(), SessionPhase::Unauthenticated);
    assert_eq!(t.stored(ACCESS_TOKEN_KEY), None);
    assert!(t.console.users.feed().is_empty());
    assert!(t.ui.routes().is_empty());
}
