//! Messaging platform integration: inbound payload model, signature
//! verification and the outbound client.

pub mod line;
pub mod traits;

pub use line::{
    parse_webhook_payload, verify_line_signature, InboundEvent, InboundMessage, LineChannel,
};
pub use traits::{Channel, SendMessage};
