//! Core aggregate trait.

use chrono::{DateTime, Utc};
use document_store::{IndexKey, Version};
use serde::{Serialize, de::DeserializeOwned};

/// Trait for aggregates persisted as whole documents.
///
/// An aggregate is a cluster of domain objects that is loaded, mutated and
/// written back as a single unit. Every write overwrites the full state and is
/// guarded by the version that was read, so concurrent writers to the same
/// aggregate cannot lose each other's updates.
pub trait Aggregate: Serialize + DeserializeOwned + Send + Sync {
    /// Returns the aggregate type name.
    ///
    /// Used as the document collection.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's storage identifier.
    fn id(&self) -> String;

    /// Returns the version the aggregate was loaded at.
    ///
    /// Version 0 means the aggregate has never been stored.
    fn version(&self) -> Version;

    /// Sets the aggregate version.
    ///
    /// Called by the repository after loading or saving.
    fn set_version(&mut self, version: Version);

    /// Creation timestamp, used to order listings.
    fn created_at(&self) -> DateTime<Utc>;

    /// Lookup keys written alongside the document.
    fn index_keys(&self) -> Vec<IndexKey> {
        Vec::new()
    }
}
