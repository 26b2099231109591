use std::sync::Arc;

use chat_service::consumer::TranslatedEventConsumer;
use chat_service::store::PgChatStore;
use chat_service::{config, db, error::ChatError, logging};
use event_channel::KafkaChannel;

#[tokio::main]
async fn main() -> Result<(), ChatError> {
    logging::init_tracing();
    let cfg = config::Config::from_env()?;

    let pool = db::init_pool(&cfg.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        ChatError::Config(format!("migrations failed: {e}"))
    })?;

    let store = Arc::new(PgChatStore::new(pool));
    let channel = Arc::new(KafkaChannel::new(&cfg.kafka_brokers)?);

    let consumer = TranslatedEventConsumer::new(store, channel, cfg.consumer_group.clone());

    tracing::info!(group = %cfg.consumer_group, "starting chat-service update consumer");
    consumer.run().await;

    Ok(())
}
