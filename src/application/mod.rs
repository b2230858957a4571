//! Bucket pagination services.

pub mod bucket_paginator;
pub mod data_source;
pub mod error;
mod finite;
pub mod identity;
pub mod pagination;
pub mod resolver;
pub mod store;

pub use bucket_paginator::BucketPaginator;
pub use data_source::{DataSource, DataSourcePaginator};
pub use identity::ContentIdentity;
pub use pagination::{PageRequest, PageWindow, Paginator};
pub use resolver::BucketServices;
pub use store::{BucketStore, Lifetime, StoreError};
