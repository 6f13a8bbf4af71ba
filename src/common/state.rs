use std::sync::Arc;

use crate::config::Config;
use crate::services::cache::{CacheBackend, DatasetStore};

/// Process-wide state, built once at startup and handed to whatever needs
/// the pipeline tables.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub datasets: Arc<DatasetStore>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let cache = CacheBackend::from_config(&config);

        match &cache {
            CacheBackend::Disk(c) => {
                tracing::info!(dir = %c.dir().display(), "Using disk dataset cache");
            }
            CacheBackend::Memory(_) => {
                tracing::info!(max_rows = config.cache_max_rows, "Using in-memory dataset cache");
            }
        }

        Self {
            datasets: Arc::new(DatasetStore::new(config.clone(), cache)),
            config,
        }
    }
}
