use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("publish to '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },

    #[error("subscribe to '{topic}' failed: {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("offset commit failed: {0}")]
    Commit(String),

    #[error("channel closed")]
    Closed,
}
