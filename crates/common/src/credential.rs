//! Credential store
//!
//! Thin wrapper over the durable store for the bearer token. No validation
//! happens here; decoding and expiry live in the auth crate.

use std::sync::Arc;

use crate::error::Result;
use crate::storage::{KeyValueStore, ACCESS_TOKEN_KEY};

/// Process-wide handle to the persisted credential.
///
/// Cloning shares the underlying store. Readers (the request gateway) only
/// call [`CredentialStore::get`]; the session controller is the only writer.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for CredentialStore {
    #[mutants::skip] // Debug output only
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Current token, `None` when absent or blank
    pub fn get(&self) -> Result<Option<String>> {
        Ok(self
            .store
            .get(ACCESS_TOKEN_KEY)?
            .filter(|token| !token.trim().is_empty()))
    }

    pub fn set(&self, token: &str) -> Result<()> {
        self.store.set(ACCESS_TOKEN_KEY, token)
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(ACCESS_TOKEN_KEY)
    }
}
