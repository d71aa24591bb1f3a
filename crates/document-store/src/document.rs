use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Version number of a stored document, used for optimistic concurrency control.
///
/// A document that has never been written is at version 0; the first write
/// produces version 1 and every later write increments by one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) of a document that was never stored.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version (1) produced by the first write.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// A secondary lookup key attached to a document.
///
/// Unique keys may be held by at most one document per collection; the store
/// rejects a write that would give a second document the same unique value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexKey {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub unique: bool,
}

impl IndexKey {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            unique: false,
        }
    }

    pub fn unique(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            unique: true,
        }
    }
}

/// A stored entity: a JSON body plus the metadata the store needs to index
/// and version it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Logical collection, e.g. "carts" or "orders".
    pub collection: String,

    /// Identifier, unique within the collection.
    pub id: String,

    /// Version after the last successful write.
    pub version: Version,

    /// The serialized entity.
    pub body: serde_json::Value,

    /// Lookup keys, replaced wholesale on every write.
    pub keys: Vec<IndexKey>,

    /// Creation time; kept from the first write on overwrite.
    pub created_at: DateTime<Utc>,

    /// Time of the last write.
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Creates an unversioned document around a raw JSON body.
    pub fn new(
        collection: impl Into<String>,
        id: impl Into<String>,
        body: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            collection: collection.into(),
            id: id.into(),
            version: Version::initial(),
            body,
            keys: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates an unversioned document from a serializable entity.
    pub fn from_entity<T: Serialize>(
        collection: impl Into<String>,
        id: impl Into<String>,
        entity: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(collection, id, serde_json::to_value(entity)?))
    }

    /// Adds a non-unique lookup key.
    pub fn with_key(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.keys.push(IndexKey::new(name, value));
        self
    }

    /// Adds a unique lookup key.
    pub fn with_unique_key(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.keys.push(IndexKey::unique(name, value));
        self
    }

    /// Adds every key from an iterator.
    pub fn with_keys(mut self, keys: impl IntoIterator<Item = IndexKey>) -> Self {
        self.keys.extend(keys);
        self
    }

    /// Overrides the creation timestamp.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Returns the value of a lookup key, if present.
    pub fn key(&self, name: &str) -> Option<&str> {
        self.keys
            .iter()
            .find(|k| k.name == name)
            .map(|k| k.value.as_str())
    }

    /// Deserializes the body into an entity.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.body.clone())
    }
}
