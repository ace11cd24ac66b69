use crate::config::Config;
use crate::indexer::Indexer;
use crate::metrics::Metrics;
use crate::watcher::WatcherManager;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub indexer: Arc<Indexer>,
    pub watcher: Arc<WatcherManager>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let indexer = Arc::new(Indexer::new(&config));
        let metrics = Arc::new(Metrics::new());
        let watcher = Arc::new(WatcherManager::new(
            config.project_root.clone(),
            indexer.clone(),
            metrics.clone(),
        ));

        Self {
            config,
            indexer,
            watcher,
            metrics,
        }
    }
}
