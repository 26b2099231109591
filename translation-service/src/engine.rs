//! Memoizing, retrying front for the translation backend.
//!
//! The cache is a pure memoization layer keyed by a content-addressed hash of
//! `(source_lang, target_lang, text)`; a miss only costs a backend call,
//! never correctness. Entries expire by TTL, they are not LRU-evicted.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

use crate::translator::{Translator, TranslatorError};

#[derive(Debug, Error)]
pub enum EngineError {
    /// Rate-limit retry budget exhausted; the event must not be dropped
    /// silently by the caller.
    #[error("rate limit retry budget exhausted after {attempts} attempts")]
    RateLimitExhausted { attempts: u32 },

    /// Non-retryable backend failure, surfaced on the first occurrence.
    #[error("translation backend failed: {0}")]
    Backend(String),
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Total attempts against the backend when it keeps rate-limiting.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles per attempt.
    pub initial_backoff: Duration,
    pub cache_ttl: Duration,
    pub cache_capacity: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            cache_ttl: Duration::from_secs(300),
            cache_capacity: 10_000,
        }
    }
}

pub struct TranslationEngine {
    translator: Arc<dyn Translator>,
    cache: Cache<String, String>,
    config: EngineConfig,
}

impl TranslationEngine {
    pub fn new(translator: Arc<dyn Translator>, config: EngineConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_capacity)
            .time_to_live(config.cache_ttl)
            .build();

        Self {
            translator,
            cache,
            config,
        }
    }

    fn cache_key(text: &str, source_lang: &str, target_lang: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source_lang.as_bytes());
        hasher.update(target_lang.as_bytes());
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Translate `text`, consulting the cache first and retrying only the
    /// rate-limit failure class with exponential backoff.
    pub async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, EngineError> {
        let key = Self::cache_key(text, source_lang, target_lang);

        if let Some(hit) = self.cache.get(&key).await {
            debug!(source_lang, target_lang, "translation cache hit");
            return Ok(hit);
        }

        let mut attempt = 0;
        let mut delay = self.config.initial_backoff;

        loop {
            attempt += 1;
            match self.translator.translate(text, source_lang, target_lang).await {
                Ok(translated) => {
                    self.cache.insert(key, translated.clone()).await;
                    return Ok(translated);
                }
                Err(TranslatorError::RateLimited) if attempt < self.config.max_attempts => {
                    warn!(
                        attempt,
                        max_attempts = self.config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "backend rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(TranslatorError::RateLimited) => {
                    return Err(EngineError::RateLimitExhausted { attempts: attempt });
                }
                Err(TranslatorError::Backend(reason)) => {
                    return Err(EngineError::Backend(reason));
                }
            }
        }
    }
}
