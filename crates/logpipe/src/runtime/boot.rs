//! Boot: logging init, config load, state creation.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::conf::{ConfigError, PipelineConfig};
use crate::source::StreamSource;
use crate::state::{PipelineState, SharedState};

/// Initialise the tracing / logging subsystem.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logpipe=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Load config and build shared state around `source`.
pub fn boot(source: Arc<dyn StreamSource>) -> Result<SharedState, ConfigError> {
    info!("Starting logpipe v{}", env!("CARGO_PKG_VERSION"));

    let config = PipelineConfig::load()?;
    info!(
        "Loaded configuration: max_buffer_lines={}, page_size={}, max_streams={}",
        config.max_buffer_lines, config.page_size, config.max_concurrent_streams
    );

    let state = Arc::new(PipelineState::new(config, source));
    info!("Initialized shared pipeline state");
    Ok(state)
}
