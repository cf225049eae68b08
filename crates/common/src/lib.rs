//! Shared infrastructure for Shelfdesk
//!
//! This crate provides what every controller of the console needs:
//! - Configuration loaded from the environment
//! - Durable key/value storage and the credential store on top of it
//! - A wall clock that advances with tokio time
//! - The UI seam (notices, prompts, navigation) and its recording mock
//! - Shared error types

pub mod clock;
pub mod config;
pub mod credential;
pub mod error;
pub mod mock;
pub mod state;
pub mod storage;
pub mod ui;

pub use clock::Clock;
pub use config::ConsoleConfig;
pub use credential::CredentialStore;
pub use error::{Error, Result};
pub use state::StateError;
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use ui::{ConsoleUi, Notice, NoticeLevel, Prompt, Route};
