//! Tracing subscriber and metric descriptions.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    application::layout::{METRIC_FETCH_ERROR, METRIC_FETCH_MS},
    cache::{METRIC_LAYOUT_CACHE_EVICT, METRIC_LAYOUT_CACHE_HIT, METRIC_LAYOUT_CACHE_MISS},
    config::{LogFormat, LoggingSettings},
};

use super::error::InfraError;

static DESCRIBED: Once = Once::new();

const COUNTERS: [(&str, &str); 4] = [
    (
        METRIC_LAYOUT_CACHE_HIT,
        "Layout documents served from the cache.",
    ),
    (
        METRIC_LAYOUT_CACHE_MISS,
        "Layout cache lookups that missed or found an expired entry.",
    ),
    (
        METRIC_LAYOUT_CACHE_EVICT,
        "Layout cache entries evicted to stay within capacity.",
    ),
    (
        METRIC_FETCH_ERROR,
        "Failed layout service calls, labelled by error kind.",
    ),
];

/// Install the global subscriber. `RUST_LOG` directives refine the configured level.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default());

    let installed = match logging.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(true))
            .try_init(),
    };
    installed.map_err(|err| InfraError::Telemetry(err.to_string()))
}

pub fn describe_metrics() {
    DESCRIBED.call_once(|| {
        for (name, help) in COUNTERS {
            describe_counter!(name, Unit::Count, help);
        }
        describe_histogram!(
            METRIC_FETCH_MS,
            Unit::Milliseconds,
            "Layout service call latency, labelled by handler."
        );
    });
}
