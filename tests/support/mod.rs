#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use bucket_pagination::application::{
    identity::ContentIdentity,
    resolver::BucketServices,
    store::{BucketStore, Lifetime, StoreError},
};
use bucket_pagination::cache::{BucketStoreConfig, MemoryBucketStore};
use bucket_pagination::domain::buckets::BucketNamespace;
use serde_json::{Map, Value};

pub const TEST_KEY: &str = "integration-test-hash-key";

pub struct Harness {
    pub services: BucketServices,
    pub materialized: Arc<MemoryBucketStore>,
    pub data_source: Arc<MemoryBucketStore>,
}

pub fn harness() -> Harness {
    let config = BucketStoreConfig::default();
    let materialized = Arc::new(MemoryBucketStore::new(
        BucketNamespace::Materialized,
        &config,
    ));
    let data_source = Arc::new(MemoryBucketStore::new(BucketNamespace::DataSource, &config));
    let identity = ContentIdentity::new(TEST_KEY).expect("test key is valid");

    let services = BucketServices::new(
        Arc::clone(&materialized) as Arc<dyn BucketStore>,
        Arc::clone(&data_source) as Arc<dyn BucketStore>,
        identity,
    )
    .expect("namespaces match");

    Harness {
        services,
        materialized,
        data_source,
    }
}

pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Which store call starts failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Has,
    Set,
}

/// Store whose connection drops on the chosen call; reads report nothing
/// stored.
pub struct FailingStore {
    namespace: BucketNamespace,
    fail_on: FailOn,
}

impl FailingStore {
    pub fn new(namespace: BucketNamespace, fail_on: FailOn) -> Self {
        Self { namespace, fail_on }
    }
}

#[async_trait]
impl BucketStore for FailingStore {
    fn namespace(&self) -> BucketNamespace {
        self.namespace
    }

    async fn has(&self, _id: &str) -> Result<bool, StoreError> {
        match self.fail_on {
            FailOn::Has => Err(StoreError::unavailable("connection refused")),
            FailOn::Set => Ok(false),
        }
    }

    async fn get(&self, id: &str) -> Result<Value, StoreError> {
        Err(StoreError::not_found(id))
    }

    async fn set(&self, _id: &str, _value: Value, _lifetime: Lifetime) -> Result<(), StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }

    async fn collect_garbage(&self) -> Result<u64, StoreError> {
        Ok(0)
    }
}

/// Services where both namespaces fail on `fail_on`.
pub fn failing_services(fail_on: FailOn) -> BucketServices {
    BucketServices::new(
        Arc::new(FailingStore::new(BucketNamespace::Materialized, fail_on)),
        Arc::new(FailingStore::new(BucketNamespace::DataSource, fail_on)),
        ContentIdentity::new(TEST_KEY).expect("test key is valid"),
    )
    .expect("namespaces match")
}
