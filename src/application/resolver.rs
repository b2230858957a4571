//! Bucket reconciliation shared by both paginators.
//!
//! Given caller content and an optional bucket ID this decides whether to
//! load, create or overwrite the stored bucket, and which ID the paginator
//! ends up exposing.

use std::sync::Arc;

use metrics::counter;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::buckets::BucketNamespace;

use super::error::BucketError;
use super::identity::{ContentIdentity, IdentityError};
use super::store::{BucketStore, Lifetime, load};

pub(crate) const METRIC_BUCKET_HIT: &str = "bucket_pagination_hit_total";
pub(crate) const METRIC_BUCKET_MISS: &str = "bucket_pagination_miss_total";
pub(crate) const METRIC_BUCKET_CREATED: &str = "bucket_pagination_created_total";
pub(crate) const METRIC_BUCKET_DRIFT: &str = "bucket_pagination_drift_total";
pub(crate) const METRIC_BUCKET_MALFORMED: &str = "bucket_pagination_malformed_total";

/// Wiring mistakes detected while assembling [`BucketServices`].
#[derive(Debug, Error)]
pub enum ServicesError {
    #[error("store for `{expected}` is bound to namespace `{actual}`")]
    NamespaceMismatch {
        expected: BucketNamespace,
        actual: BucketNamespace,
    },
}

/// Stores and identity shared by every paginator in the process.
#[derive(Clone)]
pub struct BucketServices {
    materialized: Arc<dyn BucketStore>,
    data_source: Arc<dyn BucketStore>,
    identity: Arc<ContentIdentity>,
}

impl BucketServices {
    /// Both stores must report the namespace matching their role.
    pub fn new(
        materialized: Arc<dyn BucketStore>,
        data_source: Arc<dyn BucketStore>,
        identity: ContentIdentity,
    ) -> Result<Self, ServicesError> {
        for (store, expected) in [
            (&materialized, BucketNamespace::Materialized),
            (&data_source, BucketNamespace::DataSource),
        ] {
            let actual = store.namespace();
            if actual != expected {
                return Err(ServicesError::NamespaceMismatch { expected, actual });
            }
        }

        Ok(Self {
            materialized,
            data_source,
            identity: Arc::new(identity),
        })
    }

    pub fn store(&self, namespace: BucketNamespace) -> &dyn BucketStore {
        match namespace {
            BucketNamespace::Materialized => self.materialized.as_ref(),
            BucketNamespace::DataSource => self.data_source.as_ref(),
        }
    }

    pub fn identity(&self) -> &ContentIdentity {
        &self.identity
    }
}

/// Content a paginator caches, as seen by the reconciliation routine.
pub(crate) trait BucketPayload: Sized {
    /// Nothing usable was passed in; a caller-given ID should be loaded.
    fn is_empty(&self) -> bool;

    /// Whether an ID may be derived when the caller gave none.
    fn is_derivable(&self) -> bool {
        true
    }

    fn derive_id(&self, identity: &ContentIdentity) -> Result<String, IdentityError>;

    fn to_stored(&self) -> Result<Value, IdentityError>;

    /// Replace this payload with the stored one. Returns `false` when the
    /// stored value had to be partly or fully discarded.
    fn restore(&mut self, stored: Value) -> bool;

    /// Caller ID given but nothing stored under it.
    fn on_miss(&mut self) {}
}

/// Reconcile `payload` with the store and return the resolved bucket ID.
///
/// The returned ID is empty only when the caller gave no ID and the
/// payload is not derivable.
pub(crate) async fn resolve<P: BucketPayload>(
    store: &dyn BucketStore,
    identity: &ContentIdentity,
    bucket_id: &str,
    payload: &mut P,
) -> Result<String, BucketError> {
    let namespace = store.namespace().as_str();

    if !bucket_id.is_empty() {
        if payload.is_empty() {
            match load(store, bucket_id).await? {
                Some(stored) => {
                    counter!(METRIC_BUCKET_HIT, "namespace" => namespace).increment(1);
                    if !payload.restore(stored) {
                        counter!(METRIC_BUCKET_MALFORMED, "namespace" => namespace).increment(1);
                        warn!(
                            namespace,
                            bucket_id,
                            op = "load",
                            result = "malformed",
                            "Stored bucket had an unexpected shape; using empty content"
                        );
                    } else {
                        debug!(namespace, bucket_id, op = "load", result = "hit");
                    }
                }
                None => {
                    counter!(METRIC_BUCKET_MISS, "namespace" => namespace).increment(1);
                    debug!(namespace, bucket_id, op = "load", result = "miss");
                    payload.on_miss();
                }
            }
        } else if !store.has(bucket_id).await? {
            // trust the caller's ID for brand-new buckets
            store
                .set(bucket_id, payload.to_stored()?, Lifetime::Default)
                .await?;
            counter!(METRIC_BUCKET_CREATED, "namespace" => namespace).increment(1);
            debug!(namespace, bucket_id, op = "create", result = "caller_id");
        } else {
            let derived = payload.derive_id(identity)?;
            if derived != bucket_id {
                // last write wins; concurrent drift corrections are not ordered
                store
                    .set(bucket_id, payload.to_stored()?, Lifetime::Default)
                    .await?;
                counter!(METRIC_BUCKET_DRIFT, "namespace" => namespace).increment(1);
                warn!(
                    namespace,
                    bucket_id,
                    derived_id = %derived,
                    op = "overwrite",
                    result = "drift",
                    "Bucket content changed under a caller-supplied id; overwriting"
                );
            } else {
                debug!(namespace, bucket_id, op = "verify", result = "unchanged");
            }
        }
        return Ok(bucket_id.to_string());
    }

    if !payload.is_derivable() {
        return Ok(String::new());
    }

    let derived = payload.derive_id(identity)?;
    if !store.has(&derived).await? {
        store
            .set(&derived, payload.to_stored()?, Lifetime::Default)
            .await?;
        counter!(METRIC_BUCKET_CREATED, "namespace" => namespace).increment(1);
        debug!(namespace, bucket_id = %derived, op = "create", result = "derived_id");
    } else {
        debug!(namespace, bucket_id = %derived, op = "create", result = "exists");
    }
    Ok(derived)
}

#[cfg(test)]
mod tests {
    use crate::cache::{BucketStoreConfig, MemoryBucketStore};

    use super::*;

    fn store(namespace: BucketNamespace) -> Arc<dyn BucketStore> {
        Arc::new(MemoryBucketStore::new(
            namespace,
            &BucketStoreConfig::default(),
        ))
    }

    fn identity() -> ContentIdentity {
        ContentIdentity::new("resolver-test-key").expect("non-empty key")
    }

    #[test]
    fn swapped_stores_are_rejected() {
        let err = BucketServices::new(
            store(BucketNamespace::DataSource),
            store(BucketNamespace::Materialized),
            identity(),
        )
        .err()
        .expect("namespaces are swapped");

        assert!(matches!(
            err,
            ServicesError::NamespaceMismatch {
                expected: BucketNamespace::Materialized,
                actual: BucketNamespace::DataSource,
            }
        ));
    }

    #[test]
    fn matching_stores_are_accepted() {
        let services = BucketServices::new(
            store(BucketNamespace::Materialized),
            store(BucketNamespace::DataSource),
            identity(),
        )
        .expect("namespaces match");

        assert_eq!(
            services.store(BucketNamespace::DataSource).namespace(),
            BucketNamespace::DataSource
        );
    }
}
