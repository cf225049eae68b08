//! Session lifecycle against the stub backend

use shelfdesk_auth::{SessionError, SessionPhase};
use shelfdesk_common::storage::ACCESS_TOKEN_KEY;
use shelfdesk_common::Route;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{mint, TestConsole, EMAIL, PASSWORD};

#[test_log::test(tokio::test)]
async fn test_login_sends_bearer_on_identity_check() {
    let t = TestConsole::start().await;
    let token = mint(3600);
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("Authorization", format!("Bearer {token}")),
        )
        .expect(1)
        .mount(&t.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/info"))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(crate::common::admin_info("Front Desk")),
        )
        .expect(1)
        .mount(&t.server)
        .await;

    t.console.session.login(EMAIL, PASSWORD).await.unwrap();

    let state = t.console.session.snapshot();
    assert!(state.authenticated);
    assert_eq!(state.identity.unwrap().display_name, "Front Desk");
    assert!(state.roles.is_admin);
    assert_eq!(t.stored(ACCESS_TOKEN_KEY), Some(token));
    assert_eq!(t.ui.routes(), vec![Route::Main]);
    let remaining = t.console.session.remaining_seconds().unwrap();
    assert!((3590..=3600).contains(&remaining), "remaining = {remaining}");
}

#[tokio::test]
async fn test_stored_session_survives_restart() {
    let t = TestConsole::start().await;
    t.logged_in(3600).await;

    let (restarted, _ui) = t.restarted();

    assert_eq!(restarted.session.initialize().await, SessionPhase::Authenticated);
    assert_eq!(t.received("GET", "/admin/info").await, 2);
    restarted.teardown();
}

#[tokio::test]
async fn test_no_stored_credential_makes_no_identity_call() {
    let t = TestConsole::start().await;

    assert_eq!(
        t.console.session.initialize().await,
        SessionPhase::Unauthenticated
    );
    assert_eq!(t.received("GET", "/admin/info").await, 0);
}

#[tokio::test]
async fn test_rejected_login_stays_unauthenticated() {
    let t = TestConsole::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&t.server)
        .await;
    t.console.session.initialize().await;

    let result = t.console.session.login(EMAIL, "wrong").await;

    assert!(matches!(result, Err(SessionError::AuthFailure)));
    assert_eq!(t.console.session.phase(), SessionPhase::Unauthenticated);
    assert_eq!(t.ui.notice_titles(), vec!["Login failed".to_string()]);
    assert_eq!(t.stored(ACCESS_TOKEN_KEY), None);
}

#[tokio::test]
async fn test_renewal_installs_new_credential() {
    let t = TestConsole::start().await;
    t.logged_in(600).await;
    let renewed = mint(7200);
    Mock::given(method("POST"))
        .and(path("/token/refresh-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Authorization", format!("Bearer {renewed}"))
                .set_body_string(format!("\"{renewed}\"")),
        )
        .expect(1)
        .mount(&t.server)
        .await;

    t.console.session.renew().await.unwrap();

    assert!(t.console.session.is_authenticated());
    assert_eq!(t.stored(ACCESS_TOKEN_KEY), Some(renewed));
    assert!(t.console.session.remaining_seconds().unwrap() > 7000);
    assert_eq!(t.ui.notice_titles(), vec!["Session extended".to_string()]);
}

#[tokio::test]
async fn test_failed_renewal_forces_logout() {
    let t = TestConsole::start().await;
    t.logged_in(600).await;
    Mock::given(method("POST"))
        .and(path("/token/refresh-token"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&t.server)
        .await;

    let result = t.console.session.renew().await;

    assert!(matches!(result, Err(SessionError::RenewalFailure(_))));
    assert_eq!(t.console.session.phase(), SessionPhase::Unauthenticated);
    assert_eq!(t.stored(ACCESS_TOKEN_KEY), None);
    assert_eq!(t.ui.routes(), vec![Route::Landing]);
    assert!(t.ui.prompts().is_empty());
}

#[tokio::test]
async fn test_forced_logout_is_idempotent() {
    let t = TestConsole::start().await;
    t.logged_in(3600).await;

    assert!(t.console.session.logout(true).await);
    let after_first = t.console.session.snapshot();
    assert!(!t.console.session.logout(true).await);

    assert_eq!(t.console.session.snapshot().phase, after_first.phase);
    assert_eq!(t.console.session.phase(), SessionPhase::Unauthenticated);
    assert_eq!(t.ui.routes(), vec![Route::Landing]);
    assert_eq!(t.stored(ACCESS_TOKEN_KEY), None);
}
