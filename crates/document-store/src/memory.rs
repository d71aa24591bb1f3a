use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    CounterBounds, CounterKey, Document, DocumentQuery, DocumentStoreError, Result, Version,
    store::{DocumentStore, PutOptions},
};

#[derive(Default)]
struct State {
    documents: HashMap<(String, String), Document>,
    /// (collection, key name, key value) -> owning document id
    unique_keys: HashMap<(String, String, String), String>,
    counters: HashMap<CounterKey, i64>,
}

/// In-memory document store implementation for testing.
///
/// Every operation runs under a single write lock, so each call is atomic
/// with respect to every other call, matching the transactional guarantees of
/// the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of documents in a collection.
    pub async fn document_count(&self, collection: &str) -> usize {
        self.state
            .read()
            .await
            .documents
            .keys()
            .filter(|(c, _)| c == collection)
            .count()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn put(&self, mut document: Document, options: PutOptions) -> Result<Version> {
        let mut state = self.state.write().await;
        let slot = (document.collection.clone(), document.id.clone());

        let existing = state.documents.get(&slot);
        let current_version = existing.map(|d| d.version).unwrap_or(Version::initial());

        if let Some(expected) = options.expected_version
            && current_version != expected
        {
            return Err(DocumentStoreError::ConcurrencyConflict {
                collection: document.collection,
                id: document.id,
                expected,
                actual: current_version,
            });
        }

        for key in document.keys.iter().filter(|k| k.unique) {
            let unique = (document.collection.clone(), key.name.clone(), key.value.clone());
            if let Some(owner) = state.unique_keys.get(&unique)
                && owner != &document.id
            {
                return Err(DocumentStoreError::UniqueViolation {
                    collection: document.collection,
                    key: key.name.clone(),
                    value: key.value.clone(),
                });
            }
        }

        if let Some(created_at) = existing.map(|d| d.created_at) {
            document.created_at = created_at;
        }

        // Release unique keys held by the previous revision
        state
            .unique_keys
            .retain(|(collection, _, _), owner| !(collection == &slot.0 && owner == &slot.1));
        for key in document.keys.iter().filter(|k| k.unique) {
            state.unique_keys.insert(
                (document.collection.clone(), key.name.clone(), key.value.clone()),
                document.id.clone(),
            );
        }

        let new_version = current_version.next();
        document.version = new_version;
        document.updated_at = Utc::now();
        state.documents.insert(slot, document);

        Ok(new_version)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let state = self.state.read().await;
        Ok(state
            .documents
            .get(&(collection.to_string(), id.to_string()))
            .cloned())
    }

    async fn find(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        let state = self.state.read().await;
        let mut docs: Vec<_> = state
            .documents
            .values()
            .filter(|d| query.matches(d))
            .cloned()
            .collect();

        docs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        if query.newest_first {
            docs.reverse();
        }

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(docs.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, query: DocumentQuery) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state.documents.values().filter(|d| query.matches(d)).count() as u64)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        let removed = state
            .documents
            .remove(&(collection.to_string(), id.to_string()))
            .is_some();
        state
            .unique_keys
            .retain(|(c, _, _), owner| !(c == collection && owner == id));
        state
            .counters
            .retain(|key, _| !(key.collection == collection && key.document_id == id));
        Ok(removed)
    }

    async fn set_counter(&self, key: &CounterKey, value: i64) -> Result<()> {
        self.state.write().await.counters.insert(key.clone(), value);
        Ok(())
    }

    async fn get_counter(&self, key: &CounterKey) -> Result<Option<i64>> {
        Ok(self.state.read().await.counters.get(key).copied())
    }

    async fn adjust_counter(
        &self,
        key: &CounterKey,
        delta: i64,
        bounds: CounterBounds,
    ) -> Result<Option<i64>> {
        let mut state = self.state.write().await;
        let value = state
            .counters
            .get_mut(key)
            .ok_or_else(|| DocumentStoreError::CounterNotFound(key.clone()))?;

        let next = *value + delta;
        if !bounds.admits(next) {
            return Ok(None);
        }
        *value = next;
        Ok(Some(next))
    }
}
