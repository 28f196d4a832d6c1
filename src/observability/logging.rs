//! Structured logging.
//!
//! Uses the tracing crate; the level comes from `RUST_LOG` when set,
//! falling back to the configured default. Every denial is logged with
//! the rule/host/path that produced it, which is the audit trail.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber. Call once, before anything logs.
pub fn init(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("authgate={default_level},tower_http=warn").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
