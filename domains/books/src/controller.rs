//! Loan desk controller
//!
//! Keeps the last fetched loan history and refreshes it after every
//! successful loan or return.

use std::sync::{Arc, Mutex, PoisonError};

use shelfdesk_auth::SessionController;
use shelfdesk_common::{ConsoleUi, Notice, NoticeLevel};
use shelfdesk_gateway::{Gateway, RequestError};

use crate::domain::entities::LoanRecord;
use crate::repository::BooksApi;

#[derive(Clone)]
pub struct LoanDesk {
    api: BooksApi,
    session: SessionController,
    ui: Arc<dyn ConsoleUi>,
    loans: Arc<Mutex<Vec<LoanRecord>>>,
}

impl LoanDesk {
    pub fn new(gateway: Gateway, session: SessionController, ui: Arc<dyn ConsoleUi>) -> Self {
        Self {
            api: BooksApi::new(gateway),
            session,
            ui,
            loans: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Loan history as last fetched
    pub fn loans(&self) -> Vec<LoanRecord> {
        self.loans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn outstanding(&self) -> Vec<LoanRecord> {
        self.loans()
            .into_iter()
            .filter(LoanRecord::is_outstanding)
            .collect()
    }

    /// Re-fetch the loan history; returns the number of entries
    pub async fn refresh(&self) -> Result<usize, RequestError> {
        let loans = self
            .api
            .loans()
            .await
            .map_err(|e| self.fail(e, "Failed to load loans"))?;
        let count = loans.len();
        *self.loans.lock().unwrap_or_else(PoisonError::into_inner) = loans;
        tracing::debug!(count, "Loan history refreshed");
        Ok(count)
    }

    pub async fn add_book(&self, name: &str) -> Result<(), RequestError> {
        let message = self
            .api
            .add(name)
            .await
            .map_err(|e| self.fail(e, "Failed to register book"))?;
        self.succeed("Book registered", message);
        Ok(())
    }

    pub async fn lend(&self, user_name: &str, book_name: &str) -> Result<(), RequestError> {
        let message = self
            .api
            .loan(user_name, book_name)
            .await
            .map_err(|e| self.fail(e, "Loan failed"))?;
        self.succeed("Book loaned", message);
        self.refresh_quietly().await;
        Ok(())
    }

    pub async fn return_book(&self, user_name: &str, book_name: &str) -> Result<(), RequestError> {
        let message = self
            .api
            .return_book(user_name, book_name)
            .await
            .map_err(|e| self.fail(e, "Return failed"))?;
        self.succeed("Book returned", message);
        self.refresh_quietly().await;
        Ok(())
    }

    async fn refresh_quietly(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "Loan history not refreshed");
        }
    }

    fn succeed(&self, title: &str, message: String) {
        self.ui
            .notify(Notice::new(NoticeLevel::Success, title, message));
    }

    fn fail(&self, error: RequestError, title: &str) -> RequestError {
        if error.is_unauthorized() && self.session.invalidate() {
            self.loans
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        } else if let Some(notice) = error.caller_notice(title) {
            self.ui.notify(notice);
        }
        error
    }
}

impl std::fmt::Debug for LoanDesk {
    #[mutants::skip] // Debug output only
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoanDesk")
            .field("loans", &self.loans().len())
            .finish()
    }
}
