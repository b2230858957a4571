//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::{DEFAULT_LIFETIME_SECS, DEFAULT_MEMORY_CAPACITY};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "bucket-pagination";
const ENV_PREFIX: &str = "BUCKET_PAGINATION";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 5;

/// Command-line arguments for the bucket-pagination tool.
#[derive(Debug, Parser)]
#[command(
    name = "bucket-pagination",
    version,
    about = "Inspect and maintain content-addressed pagination buckets"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "BUCKET_PAGINATION_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Apply database migrations for the bucket table.
    Migrate(MigrateArgs),
    /// Report whether a bucket exists.
    Exists(LookupArgs),
    /// Print the stored content of a bucket as JSON.
    Show(LookupArgs),
    /// Compute the bucket ID for JSON content on disk.
    #[command(name = "derive-id")]
    DeriveId(DeriveIdArgs),
    /// Remove expired buckets from both namespaces.
    Purge(PurgeArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct StoreOverrides {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Override the bucket store backend.
    #[arg(long = "bucket-backend", value_name = "BACKEND")]
    pub backend: Option<StoreBackend>,
}

#[derive(Debug, Args, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Clone)]
pub struct LookupArgs {
    #[command(flatten)]
    pub store: StoreOverrides,

    /// Look in the data-source namespace instead of the materialized one.
    #[arg(long = "data-source", action = clap::ArgAction::SetTrue)]
    pub data_source: bool,

    /// Bucket ID to look up.
    #[arg(value_name = "ID")]
    pub id: String,
}

#[derive(Debug, Args, Clone)]
pub struct DeriveIdArgs {
    /// Treat FILE as data-source bucket content (a JSON object) instead of
    /// an item list.
    #[arg(long = "data-source", action = clap::ArgAction::SetTrue)]
    pub data_source: bool,

    /// JSON object with additional content for materialized buckets.
    #[arg(long = "additional", value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub additional: Option<PathBuf>,

    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct PurgeArgs {
    #[command(flatten)]
    pub store: StoreOverrides,
}

/// Where buckets live. `Memory` suits hosts embedding the library; the
/// store inspection commands refuse it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub buckets: BucketSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
    pub acquire_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct BucketSettings {
    /// Secret for content-derived bucket IDs. Must stay stable while
    /// buckets are alive.
    pub hash_key: Option<String>,
    pub default_lifetime_secs: u64,
    pub backend: StoreBackend,
    pub memory_capacity: usize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    raw.apply_logging_overrides(&cli.logging);
    match &cli.command {
        Command::Migrate(args) => raw.apply_database_override(&args.database),
        Command::Exists(args) | Command::Show(args) => raw.apply_store_overrides(&args.store),
        Command::Purge(args) => raw.apply_store_overrides(&args.store),
        Command::DeriveId(_) => {}
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    buckets: RawBucketSettings,
}

impl RawSettings {
    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }

    fn apply_store_overrides(&mut self, overrides: &StoreOverrides) {
        self.apply_database_override(&overrides.database);
        if let Some(backend) = overrides.backend {
            self.buckets.backend = Some(backend);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            database,
            buckets,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let database = build_database_settings(database)?;
        let buckets = build_bucket_settings(buckets)?;

        Ok(Self {
            logging,
            database,
            buckets,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = NonZeroU32::new(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
    )
    .ok_or_else(|| LoadError::invalid("database.max_connections", "must be greater than zero"))?;

    let acquire_timeout_secs = database
        .acquire_timeout_seconds
        .unwrap_or(DEFAULT_DB_ACQUIRE_TIMEOUT_SECS);
    if acquire_timeout_secs == 0 {
        return Err(LoadError::invalid(
            "database.acquire_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(DatabaseSettings {
        url,
        max_connections,
        acquire_timeout: Duration::from_secs(acquire_timeout_secs),
    })
}

fn build_bucket_settings(buckets: RawBucketSettings) -> Result<BucketSettings, LoadError> {
    let hash_key = match buckets.hash_key {
        Some(key) if key.trim().is_empty() => {
            return Err(LoadError::invalid(
                "buckets.hash_key",
                "must not be empty when set",
            ));
        }
        other => other,
    };

    Ok(BucketSettings {
        hash_key,
        default_lifetime_secs: buckets
            .default_lifetime_seconds
            .unwrap_or(DEFAULT_LIFETIME_SECS),
        backend: buckets.backend.unwrap_or_default(),
        memory_capacity: buckets.memory_capacity.unwrap_or(DEFAULT_MEMORY_CAPACITY),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
    acquire_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBucketSettings {
    hash_key: Option<String>,
    default_lifetime_seconds: Option<u64>,
    backend: Option<StoreBackend>,
    memory_capacity: Option<usize>,
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
