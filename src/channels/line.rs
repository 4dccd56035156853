//! LINE Messaging API: webhook signature, event decoding, content download
//! and reply.

use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;
use std::time::Duration;

use super::traits::{Channel, SendMessage};
use crate::config::Config;
use crate::errors::{FetchError, ReplyError};

pub const SIGNATURE_HEADER: &str = "X-Line-Signature";

/// Verify `X-Line-Signature`: base64 of HMAC-SHA256 over the raw body,
/// keyed by the channel secret. Comparison is constant-time.
pub fn verify_line_signature(channel_secret: &str, body: &[u8], signature_header: &str) -> bool {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let signature_header = signature_header.trim();
    if signature_header.is_empty() {
        return false;
    }

    let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(signature_header) else {
        return false;
    };

    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);

    mac.verify_slice(&expected).is_ok()
}

/// Message kinds the handler acts on. Everything else collapses to `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Text { text: String },
    Image { content_id: String },
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub reply_token: Option<String>,
    pub message: InboundMessage,
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    #[allow(dead_code)]
    destination: Option<String>,
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    reply_token: Option<String>,
    #[serde(default)]
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawMessage {
    Text {
        #[allow(dead_code)]
        id: String,
        text: String,
    },
    Image {
        id: String,
    },
    #[serde(other)]
    Other,
}

impl From<RawEvent> for InboundEvent {
    fn from(event: RawEvent) -> Self {
        let message = match (event.kind.as_str(), event.message) {
            ("message", Some(RawMessage::Text { text, .. })) => InboundMessage::Text { text },
            ("message", Some(RawMessage::Image { id })) => InboundMessage::Image { content_id: id },
            _ => InboundMessage::Other,
        };
        Self {
            reply_token: event
                .reply_token
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            message,
        }
    }
}

/// Decode a webhook body into its event batch, in payload order.
pub fn parse_webhook_payload(body: &[u8]) -> Result<Vec<InboundEvent>, serde_json::Error> {
    let payload: WebhookPayload = serde_json::from_slice(body)?;
    Ok(payload.events.into_iter().map(InboundEvent::from).collect())
}

#[derive(Clone)]
pub struct LineChannel {
    client: reqwest::Client,
    api_base: String,
    data_api_base: String,
    access_token: String,
}

impl LineChannel {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let access_token = config.channel_access_token.trim().to_string();
        if access_token.is_empty() {
            anyhow::bail!("LINE channel access token is empty");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim().trim_end_matches('/').to_string(),
            data_api_base: config.data_api_base.trim().trim_end_matches('/').to_string(),
            access_token,
        })
    }
}

#[async_trait]
impl Channel for LineChannel {
    fn name(&self) -> &str {
        "line"
    }

    async fn fetch_content(&self, content_id: &str) -> Result<Vec<u8>, FetchError> {
        let url = format!("{}/v2/bot/message/{}/content", self.data_api_base, content_id);
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status,
                body: body.trim().to_string(),
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }

    async fn send(&self, message: &SendMessage) -> Result<(), ReplyError> {
        let url = format!("{}/v2/bot/message/reply", self.api_base);
        let payload = serde_json::json!({
            "replyToken": message.reply_token,
            "messages": [{ "type": "text", "text": message.content }],
        });
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ReplyError::Status {
                status,
                body: body.trim().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn compute_line_signature(channel_secret: &str, body: &[u8]) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let mut mac = Hmac::<Sha256>::new_from_slice(channel_secret.as_bytes()).unwrap();
    mac.update(body);
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}
