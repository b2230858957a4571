use std::{fs, path::Path, process, sync::Arc};

use bucket_pagination::{
    application::{
        bucket_paginator::BucketPaginator,
        data_source::DataSourcePaginator,
        error::AppError,
        identity::ContentIdentity,
        resolver::BucketServices,
        store::BucketStore,
    },
    cache::BucketStoreConfig,
    config::{self, StoreBackend},
    domain::buckets::{AdditionalContent, BucketContent, BucketNamespace},
    infra::{db::PostgresDatabase, error::InfraError, telemetry},
};
use serde_json::{Value, json};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        config::Command::Migrate(_) => run_migrate(&settings).await,
        config::Command::Exists(args) => run_exists(&settings, &args).await,
        config::Command::Show(args) => run_show(&settings, &args).await,
        config::Command::DeriveId(args) => run_derive_id(&settings, &args),
        config::Command::Purge(_) => run_purge(&settings).await,
    }
}

async fn run_migrate(settings: &config::Settings) -> Result<(), AppError> {
    let database = connect_database(settings).await?;
    PostgresDatabase::run_migrations(database.pool())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    info!(target = "bucket_pagination::migrate", "Migrations applied");
    Ok(())
}

async fn run_exists(
    settings: &config::Settings,
    args: &config::LookupArgs,
) -> Result<(), AppError> {
    let services = build_services(settings).await?;
    let exists = if args.data_source {
        DataSourcePaginator::<Value>::has_bucket(&services, &args.id).await?
    } else {
        BucketPaginator::<Value>::has_bucket(&services, &args.id).await?
    };
    println!("{exists}");
    Ok(())
}

async fn run_show(settings: &config::Settings, args: &config::LookupArgs) -> Result<(), AppError> {
    let services = build_services(settings).await?;
    let output = if args.data_source {
        Value::Object(DataSourcePaginator::<Value>::bucket_contents_by_id(&services, &args.id).await?)
    } else {
        let items = BucketPaginator::<Value>::bucket_contents_by_id(&services, &args.id).await?;
        let additional =
            BucketPaginator::<Value>::bucket_additional_contents_by_id(&services, &args.id).await?;
        json!({
            "bucket_content": items,
            "bucket_additional_content": additional,
        })
    };
    print_json(&output)
}

fn run_derive_id(settings: &config::Settings, args: &config::DeriveIdArgs) -> Result<(), AppError> {
    let identity = build_identity(settings)?;

    let id = if args.data_source {
        if args.additional.is_some() {
            return Err(AppError::validation(
                "--additional only applies to materialized buckets",
            ));
        }
        let content: BucketContent = read_json(&args.file)?;
        identity.derive_content_id(&content)?
    } else {
        let items: Vec<Value> = read_json(&args.file)?;
        let additional: AdditionalContent = match args.additional.as_deref() {
            Some(path) => read_json(path)?,
            None => AdditionalContent::new(),
        };
        identity.derive_id(&items, &additional)?
    };

    println!("{id}");
    Ok(())
}

async fn run_purge(settings: &config::Settings) -> Result<(), AppError> {
    let services = build_services(settings).await?;
    for namespace in BucketNamespace::ALL {
        let removed = services.store(namespace).collect_garbage().await?;
        info!(
            target = "bucket_pagination::purge",
            namespace = namespace.as_str(),
            removed,
            "Expired buckets removed"
        );
        println!("{namespace}: {removed}");
    }
    Ok(())
}

fn build_identity(settings: &config::Settings) -> Result<ContentIdentity, AppError> {
    let key = settings.buckets.hash_key.as_deref().ok_or_else(|| {
        AppError::from(InfraError::configuration(
            "buckets.hash_key is not configured",
        ))
    })?;
    Ok(ContentIdentity::new(key)?)
}

async fn build_services(settings: &config::Settings) -> Result<BucketServices, AppError> {
    require_shared_backend(settings)?;
    let identity = build_identity(settings)?;
    let store_config = BucketStoreConfig::from(&settings.buckets);

    let database = connect_database(settings).await?;
    let materialized: Arc<dyn BucketStore> =
        Arc::new(database.bucket_store(BucketNamespace::Materialized, &store_config));
    let data_source: Arc<dyn BucketStore> =
        Arc::new(database.bucket_store(BucketNamespace::DataSource, &store_config));

    Ok(BucketServices::new(materialized, data_source, identity)?)
}

/// The memory backend lives inside one process, so a fresh CLI run would
/// always see it empty.
fn require_shared_backend(settings: &config::Settings) -> Result<(), AppError> {
    match settings.buckets.backend {
        StoreBackend::Postgres => Ok(()),
        StoreBackend::Memory => Err(AppError::validation(
            "the memory backend is only reachable from the process that owns it; \
             use `--bucket-backend postgres` to inspect stored buckets",
        )),
    }
}

async fn connect_database(settings: &config::Settings) -> Result<PostgresDatabase, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresDatabase::connect(
        database_url,
        settings.database.max_connections.get(),
        settings.database.acquire_timeout,
    )
    .await
    .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(PostgresDatabase::new(pool))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let raw = fs::read(path).map_err(|err| AppError::from(InfraError::from(err)))?;
    serde_json::from_slice(&raw).map_err(|err| {
        AppError::validation(format!("{} is not valid JSON here: {err}", path.display()))
    })
}

fn print_json(value: &Value) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to render output: {err}")))?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{num::NonZeroU32, time::Duration};

    use bucket_pagination::config::{
        BucketSettings, DatabaseSettings, LogFormat, LoggingSettings, Settings,
    };
    use tracing::level_filters::LevelFilter;

    use super::*;

    fn settings(backend: StoreBackend) -> Settings {
        Settings {
            logging: LoggingSettings {
                level: LevelFilter::INFO,
                format: LogFormat::Compact,
            },
            database: DatabaseSettings {
                url: None,
                max_connections: NonZeroU32::MIN,
                acquire_timeout: Duration::from_secs(5),
            },
            buckets: BucketSettings {
                hash_key: Some("main-test-key".to_string()),
                default_lifetime_secs: 60,
                backend,
                memory_capacity: 16,
            },
        }
    }

    #[tokio::test]
    async fn memory_backend_is_rejected_for_store_commands() {
        let err = build_services(&settings(StoreBackend::Memory))
            .await
            .err()
            .expect("memory backend rejected");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn postgres_backend_is_accepted() {
        assert!(require_shared_backend(&settings(StoreBackend::Postgres)).is_ok());
    }

    #[test]
    fn derive_id_needs_a_hash_key() {
        let mut settings = settings(StoreBackend::Postgres);
        settings.buckets.hash_key = None;
        assert!(matches!(
            build_identity(&settings),
            Err(AppError::Infra(_))
        ));
    }
}
