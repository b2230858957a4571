//! Persistence contract for bucket payloads.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::buckets::BucketNamespace;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bucket `{id}` not found")]
    NotFound { id: String },
    #[error("bucket store unavailable: {message}")]
    Unavailable { message: String },
    #[error("bucket payload could not be encoded: {message}")]
    Encoding { message: String },
}

impl StoreError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: err.to_string(),
        }
    }

    pub fn encoding(err: impl std::fmt::Display) -> Self {
        Self::Encoding {
            message: err.to_string(),
        }
    }
}

/// How long a stored bucket lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifetime {
    /// The store's configured default.
    #[default]
    Default,
    /// Never expires.
    Unlimited,
    Finite(Duration),
}

impl Lifetime {
    /// Seconds-based constructor where zero means unlimited.
    pub fn from_secs(secs: u64) -> Self {
        if secs == 0 {
            Self::Unlimited
        } else {
            Self::Finite(Duration::from_secs(secs))
        }
    }

    /// Replace `Default` with the store's own default.
    pub fn resolve(self, default: Lifetime) -> Lifetime {
        match self {
            Lifetime::Default => default,
            other => other,
        }
    }

    /// Absolute expiry for an entry written at `now`; `None` never expires.
    pub fn expires_at(self, default: Lifetime, now: OffsetDateTime) -> Option<OffsetDateTime> {
        match self.resolve(default) {
            // lifetimes past the representable range never expire
            Lifetime::Finite(duration) => time::Duration::try_from(duration)
                .ok()
                .and_then(|duration| now.checked_add(duration)),
            Lifetime::Unlimited | Lifetime::Default => None,
        }
    }
}

/// Namespaced key-value storage for buckets.
///
/// Implementations are shared between concurrent requests but offer no
/// atomicity across calls: a `has` followed by a `set` can interleave with
/// another writer, and the last `set` wins.
#[async_trait]
pub trait BucketStore: Send + Sync {
    fn namespace(&self) -> BucketNamespace;

    /// Whether an unexpired bucket exists under `id`.
    async fn has(&self, id: &str) -> Result<bool, StoreError>;

    /// Fetch a bucket; unknown or expired IDs yield `StoreError::NotFound`.
    async fn get(&self, id: &str) -> Result<Value, StoreError>;

    /// Insert or replace the bucket stored under `id`.
    async fn set(&self, id: &str, value: Value, lifetime: Lifetime) -> Result<(), StoreError>;

    /// Remove expired buckets, returning how many were dropped.
    async fn collect_garbage(&self) -> Result<u64, StoreError>;
}

/// `get` with `NotFound` mapped to `None`.
pub(crate) async fn load(store: &dyn BucketStore, id: &str) -> Result<Option<Value>, StoreError> {
    if !store.has(id).await? {
        return Ok(None);
    }
    match store.get(id).await {
        Ok(value) => Ok(Some(value)),
        // expired between `has` and `get`
        Err(StoreError::NotFound { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}
