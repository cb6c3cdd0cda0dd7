use std::{
    any::Any,
    backtrace::Backtrace,
    panic::{self, PanicHookInfo},
    sync::Once,
};

use metrics::{Unit, describe_counter};
use tracing::error;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();
static PANIC_HOOK: Once = Once::new();

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

/// Route panic reports through tracing; in debug mode a backtrace is captured as well.
pub fn install_panic_hook(debug: bool) {
    PANIC_HOOK.call_once(|| {
        panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
            let message = panic_message(info.payload());
            let location = info
                .location()
                .map(|location| location.to_string())
                .unwrap_or_default();
            if debug {
                let backtrace = Backtrace::force_capture();
                error!(
                    target = "sitehook::panic",
                    %location,
                    %backtrace,
                    "panic: {message}"
                );
            } else {
                error!(target = "sitehook::panic", %location, "panic: {message}");
            }
        }));
    });
}

/// Text of a panic payload; payloads that are neither `&str` nor `String` get a placeholder.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "sitehook_site_cache_hit_total",
            Unit::Count,
            "Total number of site configuration cache hits."
        );
        describe_counter!(
            "sitehook_site_cache_miss_total",
            Unit::Count,
            "Total number of site configuration cache misses."
        );
        describe_counter!(
            "sitehook_site_cache_evict_total",
            Unit::Count,
            "Total number of site configuration cache evictions."
        );
        describe_counter!(
            "sitehook_request_panic_total",
            Unit::Count,
            "Total number of requests that ended in a caught panic."
        );
    });
}
