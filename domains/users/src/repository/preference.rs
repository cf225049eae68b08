//! Persisted paging strategy

use std::sync::Arc;

use shelfdesk_common::storage::PAGING_TYPE_KEY;
use shelfdesk_common::{KeyValueStore, Result};

use crate::domain::entities::PagingType;

#[derive(Clone)]
pub struct PagingPreference {
    store: Arc<dyn KeyValueStore>,
}

impl PagingPreference {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Stored strategy; an absent, unreadable or unknown value falls back to the default
    pub fn get(&self) -> PagingType {
        match self.store.get(PAGING_TYPE_KEY) {
            Ok(Some(raw)) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Ignoring stored paging type");
                PagingType::default()
            }),
            Ok(None) => PagingType::default(),
            Err(e) => {
                tracing::warn!(error = %e, "Paging preference unreadable");
                PagingType::default()
            }
        }
    }

    pub fn set(&self, paging: PagingType) -> Result<()> {
        self.store.set(PAGING_TYPE_KEY, paging.as_str())
    }
}

impl std::fmt::Debug for PagingPreference {
    #[mutants::skip] // Debug output only
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagingPreference")
            .field("paging", &self.get())
            .finish()
    }
}
