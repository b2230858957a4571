use thiserror::Error;

use crate::{
    application::{identity::IdentityError, resolver::ServicesError, store::StoreError},
    config::LoadError,
    infra::error::InfraError,
};

/// Boxed failure raised by a caller-supplied data source.
pub type DataSourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Reasons a paginator could not be constructed.
#[derive(Debug, Error)]
pub enum BucketError {
    #[error("failed to derive bucket id: {0}")]
    IdentityDerivation(#[from] IdentityError),
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
    #[error("data source failed")]
    DataSource(#[source] DataSourceError),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Bucket(#[from] BucketError),
    #[error(transparent)]
    Services(#[from] ServicesError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        Self::Bucket(error.into())
    }
}

impl From<IdentityError> for AppError {
    fn from(error: IdentityError) -> Self {
        Self::Bucket(error.into())
    }
}
