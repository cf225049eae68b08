//! Book registration and loans against the stub backend

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use shelfdesk_app::Console;
use shelfdesk_common::mock::MockConsoleUi;
use shelfdesk_common::{Clock, ConsoleConfig, MemoryStore};
use shelfdesk_gateway::client::ReqwestTransport;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::TestConsole;

#[tokio::test]
async fn test_loan_then_return() {
    let t = TestConsole::start().await;
    t.logged_in(3600).await;
    Mock::given(method("POST"))
        .and(path("/book/loan"))
        .and(body_json(json!({"userName": "kim", "bookName": "Dune"})))
        .respond_with(ResponseTemplate::new(200).set_body_string("Loan complete"))
        .expect(1)
        .mount(&t.server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/book/return"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Return complete"))
        .expect(1)
        .mount(&t.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/book"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "userName": "kim", "bookName": "Dune", "isReturn": false,
             "loanedAt": "2026-03-02T09:15:30"}
        ])))
        .mount(&t.server)
        .await;

    t.console.loans.lend("kim", "Dune").await.unwrap();
    assert_eq!(t.console.loans.outstanding().len(), 1);

    t.console.loans.return_book("kim", "Dune").await.unwrap();
    assert_eq!(
        t.ui.notice_titles(),
        vec!["Book loaned".to_string(), "Book returned".to_string()]
    );
    assert_eq!(t.received("GET", "/book").await, 2);
}

#[tokio::test]
async fn test_duplicate_book_shows_server_message() {
    let t = TestConsole::start().await;
    Mock::given(method("POST"))
        .and(path("/book"))
        .respond_with(ResponseTemplate::new(400).set_body_string("That book already exists"))
        .mount(&t.server)
        .await;

    assert!(t.console.loans.add_book("Dune").await.is_err());

    let notices = t.ui.notices();
    assert_eq!(notices[0].title, "Failed to register book");
    assert_eq!(notices[0].text, "That book already exists");
}

#[tokio::test]
async fn test_unreachable_backend_is_notified_once() {
    let ui = MockConsoleUi::new();
    // Port 9 (discard) on localhost is not expected to accept HTTP
    let transport = ReqwestTransport::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
    let console = Console::assemble(
        &ConsoleConfig::default(),
        Arc::new(MemoryStore::new()),
        Arc::new(transport),
        Arc::new(ui.clone()),
        Clock::system(),
    );

    assert!(console.loans.refresh().await.is_err());
    assert_eq!(ui.notice_titles(), vec!["Network error".to_string()]);
}
