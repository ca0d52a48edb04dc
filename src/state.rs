use crate::analyzer::EmotionAnalyzer;
use crate::cache::ResultCache;
use crate::config::Config;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: ResultCache,
    pub analyzer: Arc<dyn EmotionAnalyzer>,
}

impl AppState {
    pub fn new(config: Config, analyzer: Arc<dyn EmotionAnalyzer>) -> Self {
        let cache = ResultCache::new(config.cache_size);
        Self {
            config: Arc::new(config),
            cache,
            analyzer,
        }
    }
}
