use std::env;

use dotenvy::dotenv;

use crate::error::ChatError;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub kafka_brokers: String,
    pub consumer_group: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ChatError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ChatError::Config("DATABASE_URL missing".into()))?;
        let kafka_brokers = env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".into());
        let consumer_group =
            env::var("CONSUMER_GROUP").unwrap_or_else(|_| "chat-translation-updates".into());

        Ok(Self {
            database_url,
            kafka_brokers,
            consumer_group,
        })
    }
}
