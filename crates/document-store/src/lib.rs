//! Document storage for the commerce backend.
//!
//! Entities are persisted as whole JSON documents guarded by a version for
//! optimistic concurrency. Hot numeric state that many requests mutate at once
//! (stock levels, coupon usage) lives in separate counters that only change
//! through atomic conditional updates.

pub mod counter;
pub mod document;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use counter::{CounterBounds, CounterKey};
pub use document::{Document, IndexKey, Version};
pub use error::{DocumentStoreError, Result};
pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use query::DocumentQuery;
pub use store::{DocumentStore, DocumentStoreExt, PutOptions};
