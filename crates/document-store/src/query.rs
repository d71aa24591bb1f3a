use chrono::{DateTime, Utc};

use crate::Document;

/// Builder for document queries.
///
/// All key filters must match. Results are ordered by creation time, oldest
/// first unless [`DocumentQuery::newest_first`] is set.
#[derive(Debug, Clone, Default)]
pub struct DocumentQuery {
    /// Collection to search.
    pub collection: String,

    /// Key equality filters (name, value).
    pub keys: Vec<(String, String)>,

    /// Only documents created at or after this time.
    pub created_from: Option<DateTime<Utc>>,

    /// Only documents created at or before this time.
    pub created_to: Option<DateTime<Utc>>,

    /// Order newest first.
    pub newest_first: bool,

    /// Maximum number of documents to return.
    pub limit: Option<usize>,

    /// Number of documents to skip.
    pub offset: Option<usize>,
}

impl DocumentQuery {
    /// Creates a query over every document of a collection.
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Default::default()
        }
    }

    /// Adds a key equality filter.
    pub fn key(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.keys.push((name.into(), value.into()));
        self
    }

    /// Filters by creation time range (inclusive).
    pub fn created_between(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.created_from = from;
        self.created_to = to;
        self
    }

    /// Orders results newest first.
    pub fn newest_first(mut self) -> Self {
        self.newest_first = true;
        self
    }

    /// Sets the maximum number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the number of results to skip.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Whether a document satisfies every filter (ignores paging).
    pub fn matches(&self, document: &Document) -> bool {
        if document.collection != self.collection {
            return false;
        }
        if let Some(from) = self.created_from
            && document.created_at < from
        {
            return false;
        }
        if let Some(to) = self.created_to
            && document.created_at > to
        {
            return false;
        }
        self.keys
            .iter()
            .all(|(name, value)| document.key(name) == Some(value.as_str()))
    }
}
