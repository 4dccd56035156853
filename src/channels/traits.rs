use async_trait::async_trait;

use crate::errors::{FetchError, ReplyError};

/// Outbound text reply to a conversation, addressed by the event's reply token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessage {
    pub content: String,
    pub reply_token: String,
}

impl SendMessage {
    pub fn new(content: impl Into<String>, reply_token: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            reply_token: reply_token.into(),
        }
    }
}

/// Outbound calls the webhook handler makes against the messaging platform.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Raw bytes of a media message, by its content identifier.
    async fn fetch_content(&self, content_id: &str) -> Result<Vec<u8>, FetchError>;

    async fn send(&self, message: &SendMessage) -> Result<(), ReplyError>;
}
