//! Bucket namespaces and the shapes persisted in them.

use std::fmt;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// Extra context stored next to materialized items (typically the filter
/// that produced them).
pub type AdditionalContent = Map<String, Value>;

/// Query parameters cached by data-source buckets.
pub type BucketContent = Map<String, Value>;

/// Store namespace; each paginator variant writes to its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketNamespace {
    /// Buckets holding the full item collection.
    Materialized,
    /// Buckets holding only data-source query parameters.
    DataSource,
}

impl BucketNamespace {
    pub const ALL: [BucketNamespace; 2] = [BucketNamespace::Materialized, BucketNamespace::DataSource];

    pub fn as_str(&self) -> &'static str {
        match self {
            BucketNamespace::Materialized => "bucket_pagination",
            BucketNamespace::DataSource => "bucket_data_source_pagination",
        }
    }
}

impl fmt::Display for BucketNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored value of a materialized bucket.
#[derive(Debug, Clone, Serialize)]
pub struct MaterializedBucket<'a, T> {
    pub bucket_content: &'a [T],
    pub bucket_additional_content: &'a AdditionalContent,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMaterializedBucket {
    bucket_content: Value,
    bucket_additional_content: Value,
}

/// Result of reading a stored materialized bucket leniently.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBucket<T> {
    pub items: Vec<T>,
    pub additional_content: AdditionalContent,
    /// Set when any part of the stored value had to be discarded.
    pub malformed: bool,
}

impl<T: DeserializeOwned> DecodedBucket<T> {
    /// Decode a stored value, replacing every part that does not have the
    /// expected shape with an empty collection or mapping.
    pub fn from_stored(value: Value) -> Self {
        let raw = match serde_json::from_value::<RawMaterializedBucket>(value) {
            Ok(raw) => raw,
            Err(_) => {
                return Self {
                    items: Vec::new(),
                    additional_content: AdditionalContent::new(),
                    malformed: true,
                };
            }
        };

        let mut malformed = false;
        let items = match serde_json::from_value::<Vec<T>>(raw.bucket_content) {
            Ok(items) => items,
            Err(_) => {
                malformed = true;
                Vec::new()
            }
        };
        let additional_content = match raw.bucket_additional_content {
            Value::Object(map) => map,
            _ => {
                malformed = true;
                AdditionalContent::new()
            }
        };

        Self {
            items,
            additional_content,
            malformed,
        }
    }
}

/// Read a stored data-source bucket; anything but a JSON object is malformed.
pub fn content_from_stored(value: Value) -> Option<BucketContent> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
