use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::{CounterBounds, CounterKey, Document, DocumentQuery, Result, Version};

/// Options for writing a document.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Version the stored document must be at for the write to proceed.
    /// If None, the write overwrites unconditionally (use with caution).
    pub expected_version: Option<Version>,
}

impl PutOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the stored document to be at a specific version.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Creates options expecting the document not to exist yet.
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// Core trait for document store implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Writes a document, replacing any stored body and keys.
    ///
    /// Fails with `ConcurrencyConflict` if `options.expected_version` is set
    /// and does not match, and with `UniqueViolation` if a unique key is held
    /// by another document. Returns the new version.
    async fn put(&self, document: Document, options: PutOptions) -> Result<Version>;

    /// Retrieves a document by collection and id.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Retrieves documents matching a query.
    async fn find(&self, query: DocumentQuery) -> Result<Vec<Document>>;

    /// Counts documents matching a query, ignoring limit and offset.
    async fn count(&self, query: DocumentQuery) -> Result<u64>;

    /// Deletes a document together with its keys and counters.
    ///
    /// Returns false if nothing was stored under the id.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool>;

    /// Creates or resets a counter.
    async fn set_counter(&self, key: &CounterKey, value: i64) -> Result<()>;

    /// Reads a counter.
    async fn get_counter(&self, key: &CounterKey) -> Result<Option<i64>>;

    /// Atomically adds `delta` to a counter if the result stays within `bounds`.
    ///
    /// Returns the new value, or None if the adjustment was refused. Fails
    /// with `CounterNotFound` if the counter does not exist.
    async fn adjust_counter(
        &self,
        key: &CounterKey,
        delta: i64,
        bounds: CounterBounds,
    ) -> Result<Option<i64>>;
}

/// Extension trait providing convenience methods for document stores.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Returns the first document holding a key value.
    async fn find_one(&self, collection: &str, key: &str, value: &str) -> Result<Option<Document>> {
        let mut docs = self
            .find(DocumentQuery::collection(collection).key(key, value).limit(1))
            .await?;
        Ok(docs.pop())
    }

    /// Loads and decodes a document body.
    async fn get_decoded<T>(&self, collection: &str, id: &str) -> Result<Option<(T, Version)>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(collection, id).await? {
            Some(doc) => Ok(Some((doc.decode()?, doc.version))),
            None => Ok(None),
        }
    }

    /// Checks if a document exists.
    async fn exists(&self, collection: &str, id: &str) -> Result<bool> {
        Ok(self.get(collection, id).await?.is_some())
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}
