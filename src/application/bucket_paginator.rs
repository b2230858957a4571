//! Paginator whose items live in the bucket itself.
//!
//! Suited to small and medium result sets: the whole collection plus the
//! context that produced it (for example a submitted filter) is cached, so
//! later page loads only need the bucket ID.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::instrument;

use crate::domain::buckets::{
    AdditionalContent, BucketNamespace, DecodedBucket, MaterializedBucket,
};

use super::error::BucketError;
use super::identity::{ContentIdentity, IdentityError, encode_value};
use super::pagination::{PageRequest, PageWindow, Paginator};
use super::resolver::{BucketPayload, BucketServices, resolve};
use super::store::load;

const NAMESPACE: BucketNamespace = BucketNamespace::Materialized;

#[derive(Debug, Clone)]
pub struct BucketPaginator<T> {
    bucket_id: String,
    items: Vec<T>,
    additional_content: AdditionalContent,
    window: PageWindow,
}

struct MaterializedPayload<T> {
    items: Option<Vec<T>>,
    additional_content: AdditionalContent,
}

impl<T> BucketPayload for MaterializedPayload<T>
where
    T: Serialize + DeserializeOwned,
{
    fn is_empty(&self) -> bool {
        self.items.as_ref().is_none_or(Vec::is_empty)
    }

    fn is_derivable(&self) -> bool {
        self.items.is_some()
    }

    fn derive_id(&self, identity: &ContentIdentity) -> Result<String, IdentityError> {
        identity.derive_id(self.items_slice(), &self.additional_content)
    }

    fn to_stored(&self) -> Result<Value, IdentityError> {
        encode_value(&MaterializedBucket {
            bucket_content: self.items_slice(),
            bucket_additional_content: &self.additional_content,
        })
    }

    fn restore(&mut self, stored: Value) -> bool {
        let decoded = DecodedBucket::from_stored(stored);
        self.items = Some(decoded.items);
        self.additional_content = decoded.additional_content;
        !decoded.malformed
    }

    fn on_miss(&mut self) {
        self.items = Some(Vec::new());
    }
}

impl<T> MaterializedPayload<T> {
    fn items_slice(&self) -> &[T] {
        self.items.as_deref().unwrap_or(&[])
    }
}

impl<T> BucketPaginator<T>
where
    T: Serialize + DeserializeOwned + Send,
{
    /// Resolve the bucket and compute the requested page.
    ///
    /// - With a `bucket_id` and no items, the stored bucket is loaded (a
    ///   missing bucket yields no items).
    /// - With a `bucket_id` and items, the bucket is created under that ID,
    ///   or overwritten if the items no longer hash to it.
    /// - Without a `bucket_id`, the ID is derived from the items and
    ///   additional content and the bucket is created when missing. Passing
    ///   `None` here stores nothing and leaves the ID empty.
    #[instrument(
        name = "bucket_paginator.new",
        skip(services, items, additional_content),
        fields(namespace = NAMESPACE.as_str())
    )]
    pub async fn new(
        services: &BucketServices,
        items: Option<Vec<T>>,
        additional_content: AdditionalContent,
        bucket_id: &str,
        page: PageRequest,
    ) -> Result<Self, BucketError> {
        let mut payload = MaterializedPayload {
            items,
            additional_content,
        };
        let bucket_id = resolve(
            services.store(NAMESPACE),
            services.identity(),
            bucket_id,
            &mut payload,
        )
        .await?;

        let items = payload.items.unwrap_or_default();
        let window = PageWindow::compute(items.len(), page);

        Ok(Self {
            bucket_id,
            items,
            additional_content: payload.additional_content,
            window,
        })
    }

    /// Whether a bucket exists, without building a paginator.
    pub async fn has_bucket(services: &BucketServices, bucket_id: &str) -> Result<bool, BucketError> {
        Ok(services.store(NAMESPACE).has(bucket_id).await?)
    }

    /// Stored items of a bucket; unknown IDs yield an empty collection.
    pub async fn bucket_contents_by_id(
        services: &BucketServices,
        bucket_id: &str,
    ) -> Result<Vec<T>, BucketError> {
        Ok(Self::stored(services, bucket_id).await?.items)
    }

    /// Stored additional content of a bucket; unknown IDs yield an empty
    /// mapping.
    pub async fn bucket_additional_contents_by_id(
        services: &BucketServices,
        bucket_id: &str,
    ) -> Result<AdditionalContent, BucketError> {
        Ok(Self::stored(services, bucket_id).await?.additional_content)
    }

    async fn stored(
        services: &BucketServices,
        bucket_id: &str,
    ) -> Result<DecodedBucket<T>, BucketError> {
        let decoded = match load(services.store(NAMESPACE), bucket_id).await? {
            Some(value) => DecodedBucket::from_stored(value),
            None => DecodedBucket {
                items: Vec::new(),
                additional_content: AdditionalContent::new(),
                malformed: false,
            },
        };
        Ok(decoded)
    }
}

impl<T> BucketPaginator<T> {
    pub fn bucket_id(&self) -> &str {
        &self.bucket_id
    }

    pub fn additional_content(&self) -> &AdditionalContent {
        &self.additional_content
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T> Paginator for BucketPaginator<T> {
    type Item = T;

    fn items(&self) -> &[T] {
        &self.items
    }

    fn window(&self) -> &PageWindow {
        &self.window
    }
}
