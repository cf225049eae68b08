//! Session controller
//!
//! Owns the session lifecycle: restoring a stored credential, login,
//! the one-second expiry countdown, the one-time renewal prompt, renewal,
//! and logout. All session state lives behind one mutex that is never held
//! across an await point. Timer tasks hold a weak reference, so dropping the
//! last controller handle stops them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{DateTime, Utc};
use shelfdesk_common::storage::EXPIRY_WARNING_SHOWN_KEY;
use shelfdesk_common::{
    Clock, ConsoleUi, CredentialStore, KeyValueStore, Notice, NoticeLevel, Prompt, Route,
};
use shelfdesk_gateway::{Gateway, Method, RequestErrorKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::admin::AdminApi;
use crate::claims::{seconds_until, DecodedToken};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::jwt::{decode_token, extract_issued_token};
use crate::state::{SessionEvent, SessionGuardContext, SessionPhase, SessionStateMachine};
use crate::types::{AdminForm, AdminInfo, Identity, IdentityPatch, LoginRequest, RoleSet};

pub const LOGIN_PATH: &str = "/login";
pub const REFRESH_PATH: &str = "/token/refresh-token";

/// Observable session state
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub authenticated: bool,
    pub identity: Option<Identity>,
    pub roles: RoleSet,
    pub expires_at: Option<DateTime<Utc>>,
    pub loading: bool,
}

struct Inner {
    phase: SessionPhase,
    phase_tx: watch::Sender<SessionPhase>,
    identity: Option<Identity>,
    authorities: Vec<String>,
    expires_at: Option<DateTime<Utc>>,
    remaining: Option<i64>,
    loading: bool,
    warning_shown: bool,
    countdown: Option<JoinHandle<()>>,
    prompt: Option<JoinHandle<()>>,
}

impl Inner {
    fn new() -> Self {
        let (phase_tx, _) = watch::channel(SessionPhase::default());
        Self {
            phase: SessionPhase::default(),
            phase_tx,
            identity: None,
            authorities: Vec::new(),
            expires_at: None,
            remaining: None,
            loading: false,
            warning_shown: false,
            countdown: None,
            prompt: None,
        }
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        self.phase = phase;
        self.phase_tx.send_replace(phase);
    }

    fn cancel_timers(&mut self) {
        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }
        if let Some(handle) = self.prompt.take() {
            handle.abort();
        }
    }

    /// Drop everything tied to the current credential; the phase is left to the caller
    fn clear_session(&mut self) {
        self.cancel_timers();
        self.identity = None;
        self.authorities.clear();
        self.expires_at = None;
        self.remaining = None;
        self.loading = false;
        self.warning_shown = false;
    }

    fn apply(&mut self, event: SessionEvent, has_credential: bool) -> bool {
        let ctx = SessionGuardContext { has_credential };
        match SessionStateMachine::transition(self.phase, event, Some(&ctx)) {
            Ok(next) => {
                tracing::debug!(from = %self.phase, to = %next, event = %event, "Session transition");
                self.set_phase(next);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session transition rejected");
                false
            }
        }
    }

    fn snapshot(&self) -> SessionState {
        SessionState {
            phase: self.phase,
            authenticated: self.phase == SessionPhase::Authenticated,
            identity: self.identity.clone(),
            roles: RoleSet::from_authorities(&self.authorities),
            expires_at: self.expires_at,
            loading: self.loading,
        }
    }
}

struct Shared {
    gateway: Gateway,
    admin: AdminApi,
    credentials: CredentialStore,
    store: Arc<dyn KeyValueStore>,
    ui: Arc<dyn ConsoleUi>,
    clock: Clock,
    config: SessionConfig,
    inner: Mutex<Inner>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.inner
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel_timers();
    }
}

/// Session controller handle; clones share one session
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
}

impl SessionController {
    /// `gateway` and `credentials` must be backed by `store`
    pub fn new(
        gateway: Gateway,
        credentials: CredentialStore,
        store: Arc<dyn KeyValueStore>,
        ui: Arc<dyn ConsoleUi>,
        clock: Clock,
        config: SessionConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                admin: AdminApi::new(gateway.clone()),
                gateway,
                credentials,
                store,
                ui,
                clock,
                config,
                inner: Mutex::new(Inner::new()),
            }),
        }
    }

    fn upgrade(weak: &Weak<Shared>) -> Option<Self> {
        weak.upgrade().map(|shared| Self { shared })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> SessionState {
        self.lock().snapshot()
    }

    pub fn phase(&self) -> SessionPhase {
        self.lock().phase
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase() == SessionPhase::Authenticated
    }

    /// Seconds left as of the last countdown tick
    pub fn remaining_seconds(&self) -> Option<i64> {
        self.lock().remaining
    }

    pub fn admin_api(&self) -> &AdminApi {
        &self.shared.admin
    }

    /// Watch phase changes, e.g. to abandon work when the session ends
    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.lock().phase_tx.subscribe()
    }

    /// Clean up after an authenticated call was answered with 401
    ///
    /// Ends the session without asking. The current view is left to the
    /// caller; subscribers see the phase change.
    pub fn invalidate(&self) -> bool {
        if !self.end_session(SessionEvent::IdentityRejected) {
            return false;
        }
        tracing::warn!("Credential rejected by the server, session ended");
        self.shared.ui.notify(Notice::new(
            NoticeLevel::Warning,
            "Session ended",
            "Please log in again.",
        ));
        true
    }

    /// Restore the session from the stored credential
    pub async fn initialize(&self) -> SessionPhase {
        let warning_shown = self.read_warning_flag();
        {
            let mut inner = self.lock();
            inner.clear_session();
            inner.set_phase(SessionPhase::Initializing);
            inner.loading = true;
            inner.warning_shown = warning_shown;
        }

        match self.stored_credential() {
            None => {
                tracing::info!("No stored credential, starting unauthenticated");
                self.settle(SessionEvent::CredentialMissing, false);
            }
            Some(token) => {
                if let Err(e) = self.check_identity(&token).await {
                    tracing::info!(code = e.error_code(), "Stored session not restored");
                }
            }
        }

        let mut inner = self.lock();
        inner.loading = false;
        inner.phase
    }

    /// Exchange email and password for a credential and establish the session
    pub async fn login(&self, email: &str, password: &str) -> Result<(), SessionError> {
        tracing::info!(email = %email, "Login requested");
        self.lock().loading = true;
        let result = self.authenticate(email, password).await;
        self.lock().loading = false;

        match &result {
            Ok(()) => {
                tracing::info!(email = %email, "Login succeeded");
                self.shared.ui.navigate(Route::Main);
            }
            Err(e) => {
                tracing::warn!(email = %email, code = e.error_code(), "Login failed");
                let gateway_notified = matches!(e, SessionError::Request(r) if r.kind.gateway_notifies());
                if !gateway_notified {
                    self.shared.ui.notify(Notice::error(
                        "Login failed",
                        "The email or password is incorrect.",
                    ));
                }
            }
        }
        result
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<(), SessionError> {
        let request = LoginRequest { email, password };
        let response = self
            .shared
            .gateway
            .send_json(Method::Post, LOGIN_PATH, &request)
            .await
            .map_err(|e| match e.kind {
                RequestErrorKind::Unclassified => SessionError::AuthFailure,
                _ => SessionError::Request(e),
            })?;

        let token = extract_issued_token(&response).ok_or(SessionError::AuthFailure)?;
        decode_token(&token)?;

        self.shared.credentials.set(&token)?;
        self.write_warning_flag(false);
        self.lock().warning_shown = false;

        // A login that cannot confirm the identity leaves nothing behind
        if let Err(e) = self.check_identity(&token).await {
            self.discard_credential();
            self.write_warning_flag(false);
            return Err(e);
        }
        Ok(())
    }

    /// Request a fresh credential and restart the countdown
    ///
    /// Any failure ends the session the same way natural expiry does.
    pub async fn renew(&self) -> Result<(), SessionError> {
        if !SessionStateMachine::can_transition(self.phase(), SessionEvent::Renewed, None) {
            return Err(SessionError::NotAuthenticated);
        }
        tracing::info!("Renewing session");

        let renewed = match self.fetch_renewed_credential().await {
            Ok((token, decoded)) => self.install_renewed(&token, &decoded),
            Err(e) => Err(e),
        };

        match renewed {
            Ok(()) => Ok(()),
            Err(SessionError::NotAuthenticated) => Err(SessionError::NotAuthenticated),
            Err(e) => {
                tracing::warn!(error = %e, "Session renewal failed");
                if self.end_session(SessionEvent::Expired) {
                    self.shared.ui.notify(Notice::error(
                        "Session renewal failed",
                        "Please log in again.",
                    ));
                    self.shared.ui.navigate(Route::Landing);
                }
                Err(SessionError::RenewalFailure(e.to_string()))
            }
        }
    }

    async fn fetch_renewed_credential(&self) -> Result<(String, DecodedToken), SessionError> {
        let response = self
            .shared
            .gateway
            .request(Method::Post, REFRESH_PATH, &[], None)
            .await?;
        let token = extract_issued_token(&response).ok_or_else(|| {
            SessionError::RenewalFailure("response carried no credential".to_string())
        })?;
        let decoded = decode_token(&token)?;
        Ok((token, decoded))
    }

    fn install_renewed(&self, token: &str, decoded: &DecodedToken) -> Result<(), SessionError> {
        if !self.is_authenticated() {
            return Err(SessionError::NotAuthenticated);
        }
        self.shared.credentials.set(token)?;

        let expires_at = decoded.expires_at;
        {
            let mut inner = self.lock();
            if !inner.apply(SessionEvent::Renewed, true) {
                return Err(SessionError::NotAuthenticated);
            }
            inner.expires_at = Some(expires_at);
            inner.remaining = Some(decoded.remaining_secs(self.shared.clock.now()));
        }
        self.arm_countdown(expires_at);

        tracing::info!(expires_at = %expires_at, "Session renewed");
        self.shared.ui.notify(Notice::success("Session extended"));
        Ok(())
    }

    /// End the session; returns whether a session was actually ended
    ///
    /// Without `force` the user is asked first. Calling this while not
    /// authenticated does nothing.
    pub async fn logout(&self, force: bool) -> bool {
        if !SessionStateMachine::can_transition(self.phase(), SessionEvent::LoggedOut, None) {
            tracing::debug!("Logout requested without a session");
            return false;
        }

        if !force {
            let prompt = Prompt::new("Logout", "Do you want to log out?").with_confirm_label("Logout");
            if !self.shared.ui.confirm(prompt).await {
                tracing::debug!("Logout declined");
                return false;
            }
        }

        if !self.end_session(SessionEvent::LoggedOut) {
            return false;
        }
        tracing::info!(forced = force, "Logged out");
        if !force {
            self.shared.ui.notify(Notice::success("Logged out"));
        }
        self.shared.ui.navigate(Route::Landing);
        true
    }

    /// Merge a partial identity update, then re-check with the server
    ///
    /// A failed re-check keeps the merged identity unless the server
    /// rejects the credential outright.
    pub async fn update_identity(&self, patch: IdentityPatch) -> Result<(), SessionError> {
        {
            let mut inner = self.lock();
            if inner.phase != SessionPhase::Authenticated {
                return Err(SessionError::NotAuthenticated);
            }
            if let Some(identity) = inner.identity.as_mut() {
                patch.apply_to(identity);
            }
        }
        tracing::debug!("Identity patched");
        self.revalidate().await
    }

    async fn revalidate(&self) -> Result<(), SessionError> {
        match self.shared.admin.info().await {
            Ok(info) => {
                let mut inner = self.lock();
                if inner.phase == SessionPhase::Authenticated
                    && inner.apply(SessionEvent::IdentityConfirmed, true)
                {
                    inner.identity = Some(info.identity());
                    inner.authorities = info.authority_names();
                }
                Ok(())
            }
            Err(e) if e.is_unauthorized() => {
                tracing::warn!("Identity re-check rejected the credential");
                if self.end_session(SessionEvent::IdentityRejected) {
                    self.shared.ui.navigate(Route::Landing);
                }
                Err(SessionError::Unauthorized)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Identity re-check failed, keeping merged identity");
                Err(SessionError::Request(e))
            }
        }
    }

    /// Register a new administrator, then send the user to the login view
    pub async fn join(&self, form: &AdminForm) -> Result<(), SessionError> {
        match self.shared.admin.join(form).await {
            Ok(_) => {
                self.shared.ui.notify(Notice::success("Registration complete"));
                self.shared.ui.navigate(Route::Login);
                Ok(())
            }
            Err(e) => {
                if let Some(notice) = e.caller_notice("Registration failed") {
                    self.shared.ui.notify(notice);
                }
                Err(e.into())
            }
        }
    }

    /// Save the signed-in administrator's profile
    pub async fn update_admin(&self, form: &AdminForm) -> Result<(), SessionError> {
        if !self.is_authenticated() {
            return Err(SessionError::NotAuthenticated);
        }

        if let Err(e) = self.shared.admin.update(form).await {
            if let Some(notice) = e.caller_notice("Update failed") {
                self.shared.ui.notify(notice);
            }
            return Err(e.into());
        }

        self.shared.ui.notify(Notice::success("Profile updated"));
        match self.update_identity(form.patch()).await {
            Err(SessionError::Request(e)) => {
                tracing::debug!(error = %e, "Profile saved, identity reconciliation deferred");
                Ok(())
            }
            other => other,
        }
    }

    /// Delete the signed-in administrator after confirmation, then log out
    ///
    /// Returns `Ok(false)` when the user declines.
    pub async fn remove_admin(&self, email: &str) -> Result<bool, SessionError> {
        if !self.is_authenticated() {
            return Err(SessionError::NotAuthenticated);
        }

        let prompt = Prompt::new(
            "Delete account",
            "Your account will be deleted and you will be logged out.",
        )
        .with_confirm_label("Delete");
        if !self.shared.ui.confirm(prompt).await {
            return Ok(false);
        }

        match self.shared.admin.remove(email).await {
            Ok(_) => {
                self.shared.ui.notify(Notice::success("Account deleted"));
                self.logout(true).await;
                Ok(true)
            }
            Err(e) => {
                if let Some(notice) = e.caller_notice("Account deletion failed") {
                    self.shared.ui.notify(notice);
                }
                Err(e.into())
            }
        }
    }

    /// Stop every timer this controller armed; session state is kept
    pub fn teardown(&self) {
        tracing::debug!("Session controller torn down");
        self.lock().cancel_timers();
    }

    async fn check_identity(&self, token: &str) -> Result<(), SessionError> {
        let decoded = match decode_token(token) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(error = %e, "Stored credential is malformed, discarding it");
                self.discard_credential();
                self.settle(SessionEvent::IdentityRejected, false);
                return Err(e.into());
            }
        };

        match self.shared.admin.info().await {
            Ok(info) => {
                self.establish(&info, &decoded);
                Ok(())
            }
            Err(e) if e.is_unauthorized() => {
                tracing::warn!("Identity check rejected the credential");
                self.discard_credential();
                self.settle(SessionEvent::IdentityRejected, false);
                Err(SessionError::Unauthorized)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Identity check failed, keeping credential");
                self.settle(SessionEvent::IdentityRejected, true);
                Err(SessionError::Request(e))
            }
        }
    }

    fn establish(&self, info: &AdminInfo, decoded: &DecodedToken) {
        let expires_at = decoded.expires_at;
        // Roles come from the identity payload, else from the credential itself
        let mut authorities = info.authority_names();
        if authorities.is_empty() {
            authorities = decoded.authorities();
        }
        if decoded.email().is_some_and(|claimed| claimed != info.email) {
            tracing::warn!(email = %info.email, "Credential was issued for a different email");
        }
        {
            let mut inner = self.lock();
            if !inner.apply(SessionEvent::IdentityConfirmed, true) {
                return;
            }
            inner.identity = Some(info.identity());
            inner.authorities = authorities;
            inner.expires_at = Some(expires_at);
            inner.remaining = Some(decoded.remaining_secs(self.shared.clock.now()));
        }
        self.arm_countdown(expires_at);
        tracing::info!(
            email = %info.email,
            admin_no = decoded.admin_no().as_deref().unwrap_or("-"),
            expires_at = %expires_at,
            "Session established"
        );
    }

    /// Move to the unauthenticated baseline without touching storage or the UI
    fn settle(&self, event: SessionEvent, has_credential: bool) {
        let mut inner = self.lock();
        if !inner.apply(event, has_credential) {
            inner.set_phase(SessionPhase::Unauthenticated);
        }
        inner.clear_session();
    }

    /// Shared cleanup for logout, expiry, failed renewal and a rejected re-check
    fn end_session(&self, event: SessionEvent) -> bool {
        {
            let mut inner = self.lock();
            if inner.phase != SessionPhase::Authenticated {
                return false;
            }
            inner.apply(event, true);
            inner.clear_session();
        }
        self.discard_credential();
        self.write_warning_flag(false);
        self.shared.ui.dismiss_prompts();
        true
    }

    fn arm_countdown(&self, expires_at: DateTime<Utc>) {
        let weak = Arc::downgrade(&self.shared);
        let tick = self.shared.config.tick;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(controller) = SessionController::upgrade(&weak) else {
                    break;
                };
                if !controller.on_tick(expires_at) {
                    break;
                }
            }
        });

        if let Some(previous) = self.lock().countdown.replace(handle) {
            previous.abort();
        }
    }

    /// One countdown step; returns whether the countdown keeps running
    fn on_tick(&self, expires_at: DateTime<Utc>) -> bool {
        let remaining = seconds_until(expires_at, self.shared.clock.now());
        let mut inner = self.lock();
        if inner.phase != SessionPhase::Authenticated || inner.expires_at != Some(expires_at) {
            return false;
        }
        inner.remaining = Some(remaining);
        tracing::trace!(remaining, "Session countdown");

        if remaining <= 0 {
            drop(inner);
            self.expire();
            return false;
        }

        if remaining <= self.shared.config.warning_threshold_secs {
            if !inner.warning_shown {
                inner.warning_shown = true;
                self.write_warning_flag(true);
                let handle = self.spawn_renewal_prompt(remaining);
                if let Some(previous) = inner.prompt.replace(handle) {
                    previous.abort();
                }
            }
        } else if inner.warning_shown {
            inner.warning_shown = false;
            self.write_warning_flag(false);
        }
        true
    }

    fn spawn_renewal_prompt(&self, remaining: i64) -> JoinHandle<()> {
        tracing::info!(remaining, "Session about to expire, offering renewal");
        let weak = Arc::downgrade(&self.shared);
        let ui = self.shared.ui.clone();
        let prompt = Prompt::new(
            "Session expiring",
            format!(
                "You will be logged out automatically in {remaining} seconds. Extend the session?"
            ),
        )
        .with_confirm_label("Extend");

        tokio::spawn(async move {
            let extend = ui.confirm(prompt).await;
            let Some(controller) = SessionController::upgrade(&weak) else {
                return;
            };
            controller.lock().prompt = None;
            if !extend {
                tracing::debug!("Renewal declined");
                return;
            }
            if let Err(e) = controller.renew().await {
                tracing::debug!(code = e.error_code(), "Renewal from prompt did not succeed");
            }
        })
    }

    fn expire(&self) {
        if !self.end_session(SessionEvent::Expired) {
            return;
        }
        tracing::info!("Session expired, logged out");
        self.shared.ui.notify(Notice::new(
            NoticeLevel::Warning,
            "Session expired",
            "You have been logged out automatically.",
        ));
        self.shared.ui.navigate(Route::Landing);
    }

    fn stored_credential(&self) -> Option<String> {
        self.shared.credentials.get().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Credential store unreadable");
            None
        })
    }

    fn discard_credential(&self) {
        if let Err(e) = self.shared.credentials.clear() {
            tracing::warn!(error = %e, "Failed to clear credential");
        }
    }

    fn read_warning_flag(&self) -> bool {
        matches!(
            self.shared.store.get(EXPIRY_WARNING_SHOWN_KEY),
            Ok(Some(flag)) if flag == "true"
        )
    }

    fn write_warning_flag(&self, shown: bool) {
        let result = if shown {
            self.shared.store.set(EXPIRY_WARNING_SHOWN_KEY, "true")
        } else {
            self.shared.store.remove(EXPIRY_WARNING_SHOWN_KEY)
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to persist expiry warning flag");
        }
    }
}

impl std::fmt::Debug for SessionController {
    #[mutants::skip] // Debug output only
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.snapshot())
            .finish()
    }
}
