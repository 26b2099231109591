use std::env;
use std::time::Duration;

use dotenvy::dotenv;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub kafka_brokers: String,
    pub consumer_group: String,
    pub openai_api_key: String,
    pub openai_model: String,
    /// How long a translation stays memoized.
    pub cache_ttl: Duration,
    /// Total attempts against the backend for rate-limited calls.
    pub max_attempts: u32,
    /// Delay before the first rate-limit retry; doubles per attempt.
    pub initial_backoff: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let kafka_brokers = env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".into());
        let consumer_group =
            env::var("CONSUMER_GROUP").unwrap_or_else(|_| "translation-workers".into());
        let openai_api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| AppError::Config("OPENAI_API_KEY missing".into()))?;
        let openai_model = env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());

        let cache_ttl_secs = env::var("TRANSLATION_CACHE_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300);
        let max_attempts = env::var("TRANSLATION_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);
        let initial_backoff_ms = env::var("TRANSLATION_INITIAL_BACKOFF_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1000);

        Ok(Self {
            kafka_brokers,
            consumer_group,
            openai_api_key,
            openai_model,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            max_attempts,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
        })
    }
}
