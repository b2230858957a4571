use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register descriptions for every bucket counter. Safe to call repeatedly.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "bucket_pagination_hit_total",
            Unit::Count,
            "Buckets found in the store under the requested ID."
        );
        describe_counter!(
            "bucket_pagination_miss_total",
            Unit::Count,
            "Requested bucket IDs with no stored bucket."
        );
        describe_counter!(
            "bucket_pagination_created_total",
            Unit::Count,
            "Buckets written for content not stored before."
        );
        describe_counter!(
            "bucket_pagination_drift_total",
            Unit::Count,
            "Buckets overwritten because their content no longer matched their ID."
        );
        describe_counter!(
            "bucket_pagination_malformed_total",
            Unit::Count,
            "Stored buckets that could not be decoded and were treated as empty."
        );
        describe_counter!(
            "bucket_pagination_evict_total",
            Unit::Count,
            "In-memory buckets evicted due to capacity."
        );
    });
}
