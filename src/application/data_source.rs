//! Paginator that caches only the query and asks a data source for items.
//!
//! Only the bucket content (typically filter values) is persisted; the item
//! collection is rebuilt from live data on every construction. This keeps
//! large result sets out of the store and always shows current data.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::domain::buckets::{BucketContent, BucketNamespace, content_from_stored};

use super::error::{BucketError, DataSourceError};
use super::identity::{ContentIdentity, IdentityError};
use super::pagination::{PageRequest, PageWindow, Paginator};
use super::resolver::{BucketPayload, BucketServices, resolve};
use super::store::load;

const NAMESPACE: BucketNamespace = BucketNamespace::DataSource;

/// Produces the items for a data-source bucket from its stored content.
///
/// Errors are passed through to the caller untouched.
#[async_trait]
pub trait DataSource: Send + Sync {
    type Item: Send;

    async fn items_from_data_source(
        &self,
        bucket_content: &BucketContent,
    ) -> Result<Vec<Self::Item>, DataSourceError>;
}

#[derive(Debug, Clone)]
pub struct DataSourcePaginator<T> {
    bucket_id: String,
    bucket_content: BucketContent,
    items: Vec<T>,
    window: PageWindow,
}

struct QueryPayload(BucketContent);

impl BucketPayload for QueryPayload {
    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn derive_id(&self, identity: &ContentIdentity) -> Result<String, IdentityError> {
        identity.derive_content_id(&self.0)
    }

    fn to_stored(&self) -> Result<Value, IdentityError> {
        Ok(Value::Object(self.0.clone()))
    }

    fn restore(&mut self, stored: Value) -> bool {
        match content_from_stored(stored) {
            Some(content) => {
                self.0 = content;
                true
            }
            None => {
                self.0 = BucketContent::new();
                false
            }
        }
    }
}

impl<T: Send> DataSourcePaginator<T> {
    /// Resolve the bucket content, fetch fresh items for it and compute the
    /// requested page.
    ///
    /// Without a `bucket_id` the ID is always derived, even from empty
    /// content.
    #[instrument(
        name = "data_source_paginator.new",
        skip(services, data_source, bucket_content),
        fields(namespace = NAMESPACE.as_str())
    )]
    pub async fn new<S>(
        services: &BucketServices,
        data_source: &S,
        bucket_content: BucketContent,
        bucket_id: &str,
        page: PageRequest,
    ) -> Result<Self, BucketError>
    where
        S: DataSource<Item = T> + ?Sized,
    {
        let mut payload = QueryPayload(bucket_content);
        let bucket_id = resolve(
            services.store(NAMESPACE),
            services.identity(),
            bucket_id,
            &mut payload,
        )
        .await?;
        let QueryPayload(bucket_content) = payload;

        let items = data_source
            .items_from_data_source(&bucket_content)
            .await
            .map_err(BucketError::DataSource)?;
        debug!(bucket_id = %bucket_id, items = items.len(), "Fetched items from data source");

        let window = PageWindow::compute(items.len(), page);
        Ok(Self {
            bucket_id,
            bucket_content,
            items,
            window,
        })
    }
}

impl<T> DataSourcePaginator<T> {
    /// Whether a bucket exists, without building a paginator.
    pub async fn has_bucket(services: &BucketServices, bucket_id: &str) -> Result<bool, BucketError> {
        Ok(services.store(NAMESPACE).has(bucket_id).await?)
    }

    /// Stored query of a bucket; unknown or malformed buckets yield an empty
    /// mapping.
    pub async fn bucket_contents_by_id(
        services: &BucketServices,
        bucket_id: &str,
    ) -> Result<BucketContent, BucketError> {
        let content = load(services.store(NAMESPACE), bucket_id)
            .await?
            .and_then(content_from_stored)
            .unwrap_or_default();
        Ok(content)
    }

    pub fn bucket_id(&self) -> &str {
        &self.bucket_id
    }

    /// The query the items were produced from.
    pub fn bucket_content(&self) -> &BucketContent {
        &self.bucket_content
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T> Paginator for DataSourcePaginator<T> {
    type Item = T;

    fn items(&self) -> &[T] {
        &self.items
    }

    fn window(&self) -> &PageWindow {
        &self.window
    }
}
