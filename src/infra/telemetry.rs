use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "storefront_cache_hit_total",
            Unit::Count,
            "Total number of data cache hits."
        );
        describe_counter!(
            "storefront_cache_miss_total",
            Unit::Count,
            "Total number of data cache misses, including expired and invalidated entries."
        );
        describe_counter!(
            "storefront_cache_store_total",
            Unit::Count,
            "Total number of computed values written to the data cache."
        );
        describe_counter!(
            "storefront_cache_compute_error_total",
            Unit::Count,
            "Total number of failed computations that were not cached."
        );
        describe_counter!(
            "storefront_cache_evict_total",
            Unit::Count,
            "Total number of data cache evictions due to capacity."
        );
        describe_counter!(
            "storefront_cache_invalidate_total",
            Unit::Count,
            "Total number of tag and path invalidations applied."
        );
        describe_counter!(
            "storefront_render_cache_hit_total",
            Unit::Count,
            "Total number of rendered response cache hits."
        );
        describe_counter!(
            "storefront_render_cache_miss_total",
            Unit::Count,
            "Total number of rendered response cache misses."
        );
        describe_histogram!(
            "storefront_action_ms",
            Unit::Milliseconds,
            "Mutation action latency in milliseconds."
        );
    });
}
