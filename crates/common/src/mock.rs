//! Mock Console UI
//!
//! Programmable front end for controller tests:
//! - records every notice, prompt and navigation
//! - `MockAnswer` decides how confirmation prompts resolve

use crate::ui::{ConsoleUi, Notice, Prompt, Route};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::Notify;

/// How the mock resolves confirmation prompts
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum MockAnswer {
    Confirm,
    #[default]
    Decline,
    /// Stay open until `dismiss_prompts` is called, then resolve as declined
    Pending,
}

/// Recording UI with programmable prompt answers
#[derive(Debug, Clone, Default)]
pub struct MockConsoleUi {
    answer: Arc<RwLock<MockAnswer>>,
    notices: Arc<Mutex<Vec<Notice>>>,
    prompts: Arc<Mutex<Vec<Prompt>>>,
    routes: Arc<Mutex<Vec<Route>>>,
    dismissals: Arc<AtomicUsize>,
    dismissed: Arc<Notify>,
}

impl MockConsoleUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_answer(&self, answer: MockAnswer) {
        *self.answer.write().unwrap() = answer;
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn notice_titles(&self) -> Vec<String> {
        self.notices().into_iter().map(|n| n.title).collect()
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().unwrap().clone()
    }

    pub fn dismissals(&self) -> usize {
        self.dismissals.load(Ordering::SeqCst)
    }

    /// Clear all recordings, keep the configured answer
    pub fn reset_history(&self) {
        self.notices.lock().unwrap().clear();
        self.prompts.lock().unwrap().clear();
        self.routes.lock().unwrap().clear();
        self.dismissals.store(0, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ConsoleUi for MockConsoleUi {
    fn notify(&self, notice: Notice) {
        tracing::debug!(title = %notice.title, "Mock UI: notice");
        self.notices.lock().unwrap().push(notice);
    }

    async fn confirm(&self, prompt: Prompt) -> bool {
        tracing::debug!(title = %prompt.title, "Mock UI: prompt");
        // Register interest before recording so a dismissal racing the
        // recording cannot be missed.
        let dismissed = self.dismissed.notified();
        self.prompts.lock().unwrap().push(prompt);

        let answer = *self.answer.read().unwrap();
        match answer {
            MockAnswer::Confirm => true,
            MockAnswer::Decline => false,
            MockAnswer::Pending => {
                dismissed.await;
                false
            }
        }
    }

    fn dismiss_prompts(&self) {
        self.dismissals.fetch_add(1, Ordering::SeqCst);
        self.dismissed.notify_waiters();
    }

    fn navigate(&self, route: Route) {
        tracing::debug!(route = %route, "Mock UI: navigate");
        self.routes.lock().unwrap().push(route);
    }
}
