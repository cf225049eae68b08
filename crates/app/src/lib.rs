//! Shelfdesk composition root
//!
//! Wires storage, transport, gateway and the controllers into one [`Console`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use shelfdesk_auth::{SessionConfig, SessionController};
use shelfdesk_books::LoanDesk;
use shelfdesk_common::{Clock, ConsoleConfig, ConsoleUi, CredentialStore, FileStore, KeyValueStore};
use shelfdesk_gateway::client::ReqwestTransport;
use shelfdesk_gateway::{Gateway, Transport};
use shelfdesk_users::{BadgeConfig, FeedConfig, UserListController};

/// Every controller of the console, sharing one gateway and one session
#[derive(Clone)]
pub struct Console {
    pub session: SessionController,
    pub users: UserListController,
    pub loans: LoanDesk,
}

impl Console {
    /// File storage and the reqwest transport, as configured
    pub fn from_config(config: &ConsoleConfig, ui: Arc<dyn ConsoleUi>) -> anyhow::Result<Self> {
        let store = FileStore::open(&config.storage_path).with_context(|| {
            format!(
                "Failed to open storage at {}",
                config.storage_path.display()
            )
        })?;
        let transport = ReqwestTransport::new(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
        )
        .context("Failed to build HTTP transport")?;

        tracing::info!(
            api = %config.api_base_url,
            storage = %config.storage_path.display(),
            page_size = config.page_size,
            "Console configured"
        );

        Ok(Self::assemble(
            config,
            Arc::new(store),
            Arc::new(transport),
            ui,
            Clock::system(),
        ))
    }

    /// Build from explicit parts
    pub fn assemble(
        config: &ConsoleConfig,
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn Transport>,
        ui: Arc<dyn ConsoleUi>,
        clock: Clock,
    ) -> Self {
        let credentials = CredentialStore::new(store.clone());
        let gateway = Gateway::new(transport, credentials.clone(), ui.clone());
        let session = SessionController::new(
            gateway.clone(),
            credentials,
            store.clone(),
            ui.clone(),
            clock,
            SessionConfig::from(config),
        );
        let users = UserListController::new(
            gateway.clone(),
            store,
            session.clone(),
            ui.clone(),
            FeedConfig::from(config),
            BadgeConfig::from(config),
        );
        let loans = LoanDesk::new(gateway, session.clone(), ui);

        Self {
            session,
            users,
            loans,
        }
    }

    /// Cancel every timer the controllers own
    pub fn teardown(&self) {
        self.users.teardown();
        self.session.teardown();
        tracing::info!("Console torn down");
    }
}

impl std::fmt::Debug for Console {
    #[mutants::skip] // Debug output only
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("session", &self.session)
            .field("users", &self.users)
            .finish()
    }
}
