use serde::{Deserialize, Serialize};

/// Address of an atomic counter attached to a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CounterKey {
    pub collection: String,
    pub document_id: String,
    pub name: String,
}

impl CounterKey {
    pub fn new(
        collection: impl Into<String>,
        document_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            document_id: document_id.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for CounterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.collection, self.document_id, self.name)
    }
}

/// Inclusive range a counter must stay within after an adjustment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterBounds {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl CounterBounds {
    /// No bounds at all.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Counter may not drop below zero.
    pub fn non_negative() -> Self {
        Self {
            min: Some(0),
            max: None,
        }
    }

    /// Counter must stay in `0..=max`; `None` leaves the top open.
    pub fn capped(max: Option<i64>) -> Self {
        Self { min: Some(0), max }
    }

    /// Whether `value` lies within the bounds.
    pub fn admits(&self, value: i64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}
