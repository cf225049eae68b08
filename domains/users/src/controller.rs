//! User list controller
//!
//! Binds the user API to a [`CursorFeed`] and reconciles local edits into the
//! loaded records. Loads started while a session is active are abandoned,
//! and the feed cleared, as soon as that session ends.

use std::future::Future;
use std::sync::Arc;

use shelfdesk_auth::{SessionController, SessionPhase};
use shelfdesk_common::{ConsoleUi, KeyValueStore, Notice, NoticeLevel};
use shelfdesk_gateway::{Gateway, RequestError};
use tokio::sync::watch;

use crate::domain::entities::{PagingType, UserRecord};
use crate::feed::badge::BadgeConfig;
use crate::feed::{CursorFeed, FeedConfig, LoadOutcome};
use crate::repository::{PagingPreference, UsersApi};

#[derive(Clone)]
pub struct UserListController {
    feed: CursorFeed<UserRecord>,
    api: UsersApi,
    preference: PagingPreference,
    session: SessionController,
    ui: Arc<dyn ConsoleUi>,
    page_size: u32,
}

impl UserListController {
    /// `store` holds the paging preference
    pub fn new(
        gateway: Gateway,
        store: Arc<dyn KeyValueStore>,
        session: SessionController,
        ui: Arc<dyn ConsoleUi>,
        feed_config: FeedConfig,
        badge_config: BadgeConfig,
    ) -> Self {
        let preference = PagingPreference::new(store);
        let api = UsersApi::new(gateway, preference.clone());
        let page_size = feed_config.page_size;
        let feed = CursorFeed::new(Arc::new(api.clone()), feed_config, badge_config);
        Self {
            feed,
            api,
            preference,
            session,
            ui,
            page_size,
        }
    }

    pub fn feed(&self) -> &CursorFeed<UserRecord> {
        &self.feed
    }

    pub fn paging_type(&self) -> PagingType {
        self.preference.get()
    }

    /// Fetch the total count and the first page
    pub async fn start(&self) -> LoadOutcome {
        let outcome = self.watched(self.feed.start()).await;
        self.report(outcome)
    }

    /// Load the next page if none is in flight and the list is not exhausted
    pub async fn load_more(&self) -> LoadOutcome {
        let outcome = self.watched(self.feed.on_sentinel_visible()).await;
        self.report(outcome)
    }

    pub async fn reset(&self) -> LoadOutcome {
        let outcome = self.watched(self.feed.reset()).await;
        self.report(outcome)
    }

    /// Persist a new paging strategy and reload from the first page
    pub async fn set_paging_type(&self, paging: PagingType) -> shelfdesk_common::Result<LoadOutcome> {
        self.preference.set(paging)?;
        tracing::info!(paging = %paging, "Paging type changed");
        Ok(self.reset().await)
    }

    pub async fn create_user(&self, name: &str, age: Option<i32>) -> Result<(), RequestError> {
        let message = self
            .api
            .create(name, age, self.page_size)
            .await
            .map_err(|e| self.fail(e, "Failed to add user"))?;
        self.ui
            .notify(Notice::new(NoticeLevel::Success, "User added", message));
        self.feed.refresh_total().await;
        Ok(())
    }

    /// Rename on the server, then in every loaded copy; returns how many were updated
    pub async fn rename_user(&self, id: i64, name: &str) -> Result<usize, RequestError> {
        let message = self
            .api
            .rename(id, name, self.page_size)
            .await
            .map_err(|e| self.fail(e, "Failed to update user"))?;
        let updated = self
            .feed
            .update_record(id, |user| user.name = name.to_string());
        tracing::debug!(id, updated, "Renamed user reconciled into feed");
        self.ui
            .notify(Notice::new(NoticeLevel::Success, "User updated", message));
        Ok(updated)
    }

    /// Delete on the server, then drop the first loaded record with that name
    ///
    /// The total goes down even when the deleted record was never loaded.
    pub async fn delete_user(&self, name: &str) -> Result<Option<UserRecord>, RequestError> {
        let message = self
            .api
            .delete(name, self.page_size)
            .await
            .map_err(|e| self.fail(e, "Failed to delete user"))?;
        self.feed.decrement_total();
        let removed = self.feed.remove_first(|user| user.name == name);
        if removed.is_none() {
            tracing::debug!(name = %name, "Deleted user was not loaded");
        }
        self.ui
            .notify(Notice::new(NoticeLevel::Success, "User deleted", message));
        Ok(removed)
    }

    pub fn teardown(&self) {
        self.feed.teardown();
    }

    /// Race `load` against the end of the session that was active when it started
    async fn watched<F>(&self, load: F) -> LoadOutcome
    where
        F: Future<Output = LoadOutcome>,
    {
        if !self.session.is_authenticated() {
            return load.await;
        }
        let phase = self.session.subscribe();
        tokio::select! {
            outcome = load => outcome,
            () = session_ended(phase) => {
                tracing::info!("Session ended during a page load, clearing the user list");
                self.feed.clear();
                LoadOutcome::Stale
            }
        }
    }

    fn report(&self, outcome: LoadOutcome) -> LoadOutcome {
        if let LoadOutcome::Failed(e) = &outcome {
            self.handle_failure(e, "Failed to load users");
        }
        outcome
    }

    fn fail(&self, error: RequestError, title: &str) -> RequestError {
        self.handle_failure(&error, title);
        error
    }

    fn handle_failure(&self, error: &RequestError, title: &str) {
        if error.is_unauthorized() && self.session.invalidate() {
            self.feed.clear();
            return;
        }
        if let Some(notice) = error.caller_notice(title) {
            self.ui.notify(notice);
        }
    }
}

async fn session_ended(mut phase: watch::Receiver<SessionPhase>) {
    if phase
        .wait_for(|p| *p != SessionPhase::Authenticated)
        .await
        .is_err()
    {
        // The session controller is gone; nothing will end this load early
        std::future::pending::<()>().await;
    }
}

impl std::fmt::Debug for UserListController {
    #[mutants::skip] // Debug output only
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserListController")
            .field("feed", &self.feed)
            .field("paging", &self.preference.get())
            .field("page_size", &self.page_size)
            .finish()
    }
}
