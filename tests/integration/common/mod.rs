//! Common fixtures for the console integration tests
//!
//! - A wiremock server standing in for the lending backend
//! - A console assembled over the real reqwest transport and in-memory storage
//! - Token minting and canned backend responses

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shelfdesk_app::Console;
use shelfdesk_common::mock::MockConsoleUi;
use shelfdesk_common::{Clock, ConsoleConfig, CredentialStore, KeyValueStore, MemoryStore};
use shelfdesk_gateway::client::ReqwestTransport;

pub const EMAIL: &str = "desk@shelf.dev";
pub const PASSWORD: &str = "correct horse"; // pragma: allowlist secret
pub const PAGE_SIZE: u32 = 3;

/// A console wired to a stub backend
pub struct TestConsole {
    pub server: MockServer,
    pub console: Console,
    pub ui: MockConsoleUi,
    pub store: Arc<MemoryStore>,
}

impl TestConsole {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryStore::new());
        let (console, ui) = Self::console_for(&server, store.clone(), MockConsoleUi::new());
        Self {
            server,
            console,
            ui,
            store,
        }
    }

    /// A second console over the same backend and storage, as after a restart
    pub fn restarted(&self) -> (Console, MockConsoleUi) {
        Self::console_for(&self.server, self.store.clone(), MockConsoleUi::new())
    }

    fn console_for(
        server: &MockServer,
        store: Arc<MemoryStore>,
        ui: MockConsoleUi,
    ) -> (Console, MockConsoleUi) {
        let config = ConsoleConfig {
            api_base_url: server.uri(),
            page_size: PAGE_SIZE,
            ..ConsoleConfig::default()
        };
        let transport = ReqwestTransport::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let console = Console::assemble(
            &config,
            store,
            Arc::new(transport),
            Arc::new(ui.clone()),
            Clock::system(),
        );
        (console, ui)
    }

    pub fn credentials(&self) -> CredentialStore {
        CredentialStore::new(self.store.clone())
    }

    pub fn stored(&self, key: &str) -> Option<String> {
        self.store.get(key).unwrap()
    }

    /// Mount a login that issues `token` and an identity check that accepts it
    pub async fn accept_login(&self, token: &str) {
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("Authorization", format!("Bearer {token}")),
            )
            .mount(&self.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/admin/info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(admin_info("Front Desk")))
            .mount(&self.server)
            .await;
    }

    /// Log in with a credential valid for `lifetime_secs`
    pub async fn logged_in(&self, lifetime_secs: i64) -> String {
        let token = mint(lifetime_secs);
        self.accept_login(&token).await;
        self.console.session.login(EMAIL, PASSWORD).await.unwrap();
        self.ui.reset_history();
        token
    }

    /// Requests the backend received for one method and path
    pub async fn received(&self, http_method: &str, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == http_method && r.url.path() == request_path)
            .count()
    }
}

impl Drop for TestConsole {
    fn drop(&mut self) {
        self.console.teardown();
    }
}

/// A signed credential expiring `lifetime_secs` from now
pub fn mint(lifetime_secs: i64) -> String {
    let exp = Utc::now() + chrono::Duration::seconds(lifetime_secs);
    encode(
        &Header::default(),
        &json!({
            "exp": exp.timestamp(),
            "adminNo": 1,
            "email": EMAIL,
            "authorities": ["ROLE_ADMIN"],
        }),
        &EncodingKey::from_secret(b"integration-secret"),
    )
    .unwrap()
}

pub fn admin_info(name: &str) -> Value {
    json!({
        "id": 1,
        "email": EMAIL,
        "name": name,
        "authorities": [{"authority": "ROLE_ADMIN"}],
    })
}

/// A `/user` page of consecutive ids
pub fn user_page(ids: std::ops::RangeInclusive<i64>) -> Value {
    let users: Vec<Value> = ids
        .map(|id| json!({"id": id, "name": format!("user-{id}"), "age": 20 + id}))
        .collect();
    json!(users)
}
