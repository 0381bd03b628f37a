// [libs/shared/common/src/lib.rs]
//! Tracing setup shared by the orchestrator and worker binaries.

use std::panic;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global tracing subscriber: compact output in debug
/// builds, flattened JSON in release. Also installs a panic hook that
/// logs the panic location before the default hook runs.
///
/// Panics if a global subscriber is already installed.
pub fn init_tracing(service_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "{service_name}={level},tower_http=warn,hyper=warn,libsql=warn",
            level = if cfg!(debug_assertions) { "debug" } else { "info" }
        )
        .into()
    });

    if cfg!(debug_assertions) {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().flatten_event(true))
            .init();
    }

    panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        tracing::error!(location = %location, "panic: {info}");
    }));
}
