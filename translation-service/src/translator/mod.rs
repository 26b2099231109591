//! Capability interface for the external translation backend.
//!
//! The backend is a black-box text-in/text-out call that may fail or
//! rate-limit. Production uses the OpenAI-compatible implementation; tests
//! substitute deterministic stubs.

mod openai;

pub use openai::OpenAiTranslator;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranslatorError {
    /// The backend asked us to slow down. The only retryable class.
    #[error("backend rate limited")]
    RateLimited,

    /// Any other backend failure. Not retried.
    #[error("backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, TranslatorError>;
}
