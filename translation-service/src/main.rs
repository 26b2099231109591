use std::sync::Arc;

use event_channel::KafkaChannel;
use translation_service::engine::{EngineConfig, TranslationEngine};
use translation_service::translator::OpenAiTranslator;
use translation_service::worker::TranslationWorker;
use translation_service::{config, error::AppError, logging};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    logging::init_tracing();
    let cfg = config::Config::from_env()?;

    let channel = Arc::new(KafkaChannel::new(&cfg.kafka_brokers)?);
    let translator = Arc::new(OpenAiTranslator::new(&cfg.openai_api_key, &cfg.openai_model)?);
    let engine = Arc::new(TranslationEngine::new(
        translator,
        EngineConfig {
            max_attempts: cfg.max_attempts,
            initial_backoff: cfg.initial_backoff,
            cache_ttl: cfg.cache_ttl,
            ..EngineConfig::default()
        },
    ));

    let worker = TranslationWorker::new(channel, engine, cfg.consumer_group.clone());

    tracing::info!(group = %cfg.consumer_group, "starting translation-service");
    worker.run().await;

    Ok(())
}
