//! Postgres-backed bucket storage.

mod util;

pub use util::map_sqlx_error;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    query, query_scalar,
    types::Json,
};
use time::OffsetDateTime;

use crate::application::store::{BucketStore, Lifetime, StoreError};
use crate::cache::BucketStoreConfig;
use crate::domain::buckets::BucketNamespace;

/// Shared pool plus helpers for connecting and migrating.
#[derive(Clone)]
pub struct PostgresDatabase {
    pool: Arc<PgPool>,
}

impl PostgresDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    /// Store bound to one namespace of the `bucket_cache` table.
    pub fn bucket_store(
        &self,
        namespace: BucketNamespace,
        config: &BucketStoreConfig,
    ) -> PostgresBucketStore {
        PostgresBucketStore {
            pool: Arc::clone(&self.pool),
            namespace,
            default_lifetime: config.default_lifetime(),
        }
    }
}

/// Buckets persisted in the `bucket_cache` table, one row per
/// `(namespace, identifier)`.
///
/// JSONB cannot hold `\u0000` inside strings; `set` reports such content as
/// `StoreError::Encoding`.
#[derive(Clone)]
pub struct PostgresBucketStore {
    pool: Arc<PgPool>,
    namespace: BucketNamespace,
    default_lifetime: Lifetime,
}

#[async_trait]
impl BucketStore for PostgresBucketStore {
    fn namespace(&self) -> BucketNamespace {
        self.namespace
    }

    async fn has(&self, id: &str) -> Result<bool, StoreError> {
        query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM bucket_cache
                WHERE namespace = $1
                  AND identifier = $2
                  AND (expires_at IS NULL OR expires_at > now())
            )
            "#,
        )
        .bind(self.namespace.as_str())
        .bind(id)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(map_sqlx_error)
    }

    async fn get(&self, id: &str) -> Result<Value, StoreError> {
        let row = query_scalar::<_, Json<Value>>(
            r#"
            SELECT content
            FROM bucket_cache
            WHERE namespace = $1
              AND identifier = $2
              AND (expires_at IS NULL OR expires_at > now())
            "#,
        )
        .bind(self.namespace.as_str())
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(map_sqlx_error)?;

        row.map(|Json(value)| value)
            .ok_or_else(|| StoreError::not_found(id))
    }

    async fn set(&self, id: &str, value: Value, lifetime: Lifetime) -> Result<(), StoreError> {
        query(
            r#"
            INSERT INTO bucket_cache (namespace, identifier, content, expires_at, updated_at)
            VALUES ($1, $2, $3, $4, now())
            ON CONFLICT (namespace, identifier) DO UPDATE SET
                content = EXCLUDED.content,
                expires_at = EXCLUDED.expires_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(self.namespace.as_str())
        .bind(id)
        .bind(Json(value))
        .bind(lifetime.expires_at(self.default_lifetime, OffsetDateTime::now_utc()))
        .execute(self.pool.as_ref())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn collect_garbage(&self) -> Result<u64, StoreError> {
        let result = query(
            r#"
            DELETE FROM bucket_cache
            WHERE namespace = $1
              AND expires_at IS NOT NULL
              AND expires_at <= now()
            "#,
        )
        .bind(self.namespace.as_str())
        .execute(self.pool.as_ref())
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}
