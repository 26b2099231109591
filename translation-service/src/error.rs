use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("channel error: {0}")]
    Channel(#[from] event_channel::ChannelError),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("translator error: {0}")]
    Translator(#[from] crate::translator::TranslatorError),
}
