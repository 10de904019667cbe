//! Notification recipient resolution.
//!
//! Recipients come from two places: registry entries that opted in, and a
//! static fallback list configured by the operator. Addresses are trimmed
//! and compared exactly; no case folding, since local parts may be case
//! sensitive.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use stockwatch_storage::{StockStore, StorageError};

/// Produces the set of addresses a notification goes to.
///
/// An empty set is a valid answer.
#[async_trait]
pub trait RecipientSource: Send + Sync {
    async fn resolve(&self) -> Result<BTreeSet<String>, StorageError>;
}

/// Recipients from the store's registry plus a fallback list.
pub struct RegistryRecipients<S> {
    store: Arc<S>,
    fallback: Vec<String>,
}

impl<S: StockStore> RegistryRecipients<S> {
    pub fn new(store: Arc<S>, fallback: Vec<String>) -> Self {
        Self { store, fallback }
    }
}

#[async_trait]
impl<S: StockStore> RecipientSource for RegistryRecipients<S> {
    async fn resolve(&self) -> Result<BTreeSet<String>, StorageError> {
        let registry = self.store.list_recipients(true).await?;
        Ok(merge_recipients(
            registry.iter().filter(|r| r.notify).map(|r| r.email.as_str()),
            self.fallback.iter().map(String::as_str),
        ))
    }
}

/// Split a comma-separated address list, dropping blank entries.
pub fn parse_recipient_list(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Union two address sources into a deduplicated set of trimmed addresses.
pub fn merge_recipients<'a>(
    registry: impl IntoIterator<Item = &'a str>,
    fallback: impl IntoIterator<Item = &'a str>,
) -> BTreeSet<String> {
    registry
        .into_iter()
        .chain(fallback)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
