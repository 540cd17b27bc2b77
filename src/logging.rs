// ABOUTME: tracing-subscriber setup for the binaries
// ABOUTME: RUST_LOG wins over the configured level; output is pretty or JSON

use crate::config::LoggingSettings;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(settings: &LoggingSettings) -> crate::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    if settings.json {
        registry
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .try_init()?;
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()?;
    }

    tracing::debug!(level = %settings.level, json = settings.json, "tracing initialized");
    Ok(())
}
