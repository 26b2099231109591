use thiserror::Error;
use uuid::Uuid;

pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug, Error)]
pub enum ChatError {
    /// A required field is missing or malformed. Rejected before any side
    /// effect.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("chat {0} not found")]
    ChatNotFound(Uuid),

    #[error("message {0} not found")]
    MessageNotFound(Uuid),

    /// A different translation is already recorded for this message.
    /// First write wins; the new text is rejected.
    #[error("conflicting translation for message {0}")]
    TranslationConflict(Uuid),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("channel error: {0}")]
    Channel(#[from] event_channel::ChannelError),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}
