//! LINE webhook receiver that records inbound text and images to SQLite and
//! serves a history view of what it received.

pub mod channels;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod history;
pub mod logging;
pub mod media;
pub mod storage;

pub use config::Config;
