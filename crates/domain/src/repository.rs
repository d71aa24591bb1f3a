//! Typed access to aggregates in the document store.

use std::marker::PhantomData;

use document_store::{
    Document, DocumentQuery, DocumentStore, DocumentStoreExt, PutOptions, Version,
};

use crate::aggregate::Aggregate;
use crate::error::DomainError;

/// Times [`Repository::update`] tries before giving up on a contended aggregate.
pub const UPDATE_ATTEMPTS: u32 = 3;

/// Loads and saves one aggregate type.
///
/// Saving always writes the full aggregate and expects the stored version to
/// be the one the aggregate was loaded at; a concurrent write in between
/// fails with a concurrency conflict instead of being overwritten.
pub struct Repository<S, A>
where
    S: DocumentStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> Clone for Repository<S, A>
where
    S: DocumentStore + Clone,
    A: Aggregate,
{
    fn clone(&self) -> Self {
        Self::new(self.store.clone())
    }
}

impl<S, A> Repository<S, A>
where
    S: DocumentStore,
    A: Aggregate,
{
    /// Creates a new repository over the given store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn decode(document: Document) -> Result<A, DomainError> {
        let mut aggregate: A = document.decode()?;
        aggregate.set_version(document.version);
        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load(&self, id: &str) -> Result<Option<A>, DomainError> {
        match self.store.get(A::aggregate_type(), id).await? {
            Some(document) => Ok(Some(Self::decode(document)?)),
            None => Ok(None),
        }
    }

    /// Loads the aggregate holding a key value.
    pub async fn find_one(&self, key: &str, value: &str) -> Result<Option<A>, DomainError> {
        match self.store.find_one(A::aggregate_type(), key, value).await? {
            Some(document) => Ok(Some(Self::decode(document)?)),
            None => Ok(None),
        }
    }

    /// Loads every aggregate matching a query.
    ///
    /// The query's collection is forced to this aggregate type.
    pub async fn find(&self, mut query: DocumentQuery) -> Result<Vec<A>, DomainError> {
        query.collection = A::aggregate_type().to_string();
        self.store
            .find(query)
            .await?
            .into_iter()
            .map(Self::decode)
            .collect()
    }

    /// Counts aggregates matching a query.
    pub async fn count(&self, mut query: DocumentQuery) -> Result<u64, DomainError> {
        query.collection = A::aggregate_type().to_string();
        Ok(self.store.count(query).await?)
    }

    /// Writes the aggregate with optimistic concurrency.
    ///
    /// On success the aggregate carries its new version.
    pub async fn save(&self, aggregate: &mut A) -> Result<Version, DomainError> {
        let document = Document::from_entity(A::aggregate_type(), aggregate.id(), &*aggregate)?
            .with_keys(aggregate.index_keys())
            .with_created_at(aggregate.created_at());

        let options = if aggregate.version() == Version::initial() {
            PutOptions::expect_new()
        } else {
            PutOptions::expect_version(aggregate.version())
        };

        let new_version = self.store.put(document, options).await?;
        aggregate.set_version(new_version);
        Ok(new_version)
    }

    /// Loads an aggregate, applies `change` and saves it.
    ///
    /// When a concurrent write wins, the change is re-applied to a fresh copy,
    /// up to [`UPDATE_ATTEMPTS`] times, so `change` must be safe to run more
    /// than once and must re-check its preconditions against the aggregate it
    /// is given.
    pub async fn update<T, E, F>(&self, id: &str, mut change: F) -> Result<(A, T), DomainError>
    where
        F: FnMut(&mut A) -> Result<T, E> + Send,
        E: Into<DomainError>,
        T: Send,
    {
        let mut attempt = 1;
        loop {
            let mut aggregate = self
                .load(id)
                .await?
                .ok_or_else(|| DomainError::not_found(A::aggregate_type(), id))?;

            let output = change(&mut aggregate).map_err(Into::into)?;

            match self.save(&mut aggregate).await {
                Ok(_) => return Ok((aggregate, output)),
                Err(e) if e.is_conflict() && attempt < UPDATE_ATTEMPTS => {
                    tracing::debug!(
                        collection = A::aggregate_type(),
                        id,
                        attempt,
                        "concurrent write, retrying update"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Deletes an aggregate. Returns false if it did not exist.
    pub async fn delete(&self, id: &str) -> Result<bool, DomainError> {
        Ok(self.store.delete(A::aggregate_type(), id).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use document_store::{DocumentStoreError, IndexKey, InMemoryDocumentStore};
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Note {
        id: String,
        tag: String,
        created_at: DateTime<Utc>,
        #[serde(skip)]
        version: Version,
    }

    impl Aggregate for Note {
        fn aggregate_type() -> &'static str {
            "notes"
        }

        fn id(&self) -> String {
            self.id.clone()
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn created_at(&self) -> DateTime<Utc> {
            self.created_at
        }

        fn index_keys(&self) -> Vec<IndexKey> {
            vec![IndexKey::new("tag", self.tag.clone())]
        }
    }

    fn note(id: &str, tag: &str) -> Note {
        Note {
            id: id.into(),
            tag: tag.into(),
            created_at: Utc::now(),
            version: Version::initial(),
        }
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let repo: Repository<_, Note> = Repository::new(InMemoryDocumentStore::new());
        let mut n = note("n-1", "red");

        repo.save(&mut n).await.unwrap();
        assert_eq!(n.version, Version::first());

        let loaded = repo.load("n-1").await.unwrap().unwrap();
        assert_eq!(loaded.version, Version::first());
        assert_eq!(loaded.tag, "red");

        let by_tag = repo.find_one("tag", "red").await.unwrap().unwrap();
        assert_eq!(by_tag.id, "n-1");
        assert!(repo.load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_copy_cannot_overwrite() {
        let repo: Repository<_, Note> = Repository::new(InMemoryDocumentStore::new());
        let mut original = note("n-1", "red");
        repo.save(&mut original).await.unwrap();

        let mut first = repo.load("n-1").await.unwrap().unwrap();
        let mut second = repo.load("n-1").await.unwrap().unwrap();

        first.tag = "blue".into();
        repo.save(&mut first).await.unwrap();

        second.tag = "green".into();
        let result = repo.save(&mut second).await;
        assert!(matches!(
            result,
            Err(DomainError::Store(DocumentStoreError::ConcurrencyConflict { .. }))
        ));

        let current = repo.load("n-1").await.unwrap().unwrap();
        assert_eq!(current.tag, "blue");
    }

    #[tokio::test]
    async fn test_update_applies_change() {
        let repo: Repository<_, Note> = Repository::new(InMemoryDocumentStore::new());
        repo.save(&mut note("n-1", "red")).await.unwrap();

        let (updated, previous) = repo
            .update("n-1", |n| {
                let previous = std::mem::replace(&mut n.tag, "blue".into());
                Ok::<_, DomainError>(previous)
            })
            .await
            .unwrap();

        assert_eq!(previous, "red");
        assert_eq!(updated.version, Version::new(2));
        assert_eq!(repo.load("n-1").await.unwrap().unwrap().tag, "blue");
    }

    #[tokio::test]
    async fn test_update_missing_and_rejected() {
        let repo: Repository<_, Note> = Repository::new(InMemoryDocumentStore::new());
        let missing = repo
            .update("nope", |_| Ok::<_, DomainError>(()))
            .await
            .unwrap_err();
        assert!(matches!(missing, DomainError::NotFound { .. }));

        repo.save(&mut note("n-1", "red")).await.unwrap();
        let rejected = repo
            .update("n-1", |_| {
                Err::<(), _>(DomainError::InvalidInput("no".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(rejected, DomainError::InvalidInput(_)));
        assert_eq!(repo.load("n-1").await.unwrap().unwrap().version, Version::first());
    }

    #[tokio::test]
    async fn test_new_aggregate_with_existing_id_conflicts() {
        let repo: Repository<_, Note> = Repository::new(InMemoryDocumentStore::new());
        repo.save(&mut note("n-1", "red")).await.unwrap();

        let result = repo.save(&mut note("n-1", "blue")).await;
        assert!(result.unwrap_err().is_conflict());
    }
}
