use std::time::Duration;

use nlq_core::{MatcherConfig, TranslatorConfig};

use crate::schema::{DEFAULT_SAMPLE_SIZE, DEFAULT_SAMPLE_TIMEOUT};

/// Query service configuration.
///
/// Controls which database is served, how schemas are sampled, and the
/// translator and matcher tuning.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Database queried when a request names none.
    pub database: String,
    /// Documents sampled per collection during schema inference.
    pub sample_size: usize,
    /// Upper bound on sampling one collection.
    pub schema_timeout: Duration,
    /// Sample collections in parallel tasks.
    pub concurrent_sampling: bool,
    pub translator: TranslatorConfig,
    pub matcher: MatcherConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database: "test".to_string(),
            sample_size: DEFAULT_SAMPLE_SIZE,
            schema_timeout: DEFAULT_SAMPLE_TIMEOUT,
            concurrent_sampling: true,
            translator: TranslatorConfig::default(),
            matcher: MatcherConfig::default(),
        }
    }
}
