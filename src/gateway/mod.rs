//! Axum HTTP gateway: LINE webhook ingestion, history view and static images.
//!
//! - `POST /callback` verifies `X-Line-Signature`, records text/image events
//!   and replies with a fixed acknowledgement
//! - `GET /history` renders every record newest first
//! - `GET /static/*` serves stored image bytes

use crate::channels::line::SIGNATURE_HEADER;
use crate::channels::{
    parse_webhook_payload, verify_line_signature, Channel, InboundEvent, InboundMessage,
    LineChannel, SendMessage,
};
use crate::config::Config;
use crate::errors::{StorageError, WebhookError};
use crate::history::render_history;
use crate::media::{MediaFetcher, StoredImage};
use crate::storage::{format_timestamp, SqliteRecordStore};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;

/// Maximum webhook body size (1 MiB). LINE batches are a few KB.
/// Larger bodies are answered with 413 before the signature is checked.
pub const MAX_BODY_SIZE: usize = 1_048_576;
pub const LIVENESS_TEXT: &str = "✅ LINE Bot Cloud is running.";

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub channel_secret: Arc<str>,
    pub reply_text: Arc<str>,
    pub store: Arc<SqliteRecordStore>,
    pub channel: Arc<dyn Channel>,
    pub media: Arc<MediaFetcher>,
}

impl AppState {
    pub fn new(config: &Config, channel: Arc<dyn Channel>) -> Self {
        Self {
            channel_secret: Arc::from(config.channel_secret.trim()),
            reply_text: Arc::from(config.reply_text.as_str()),
            store: Arc::new(SqliteRecordStore::new(&config.database_path)),
            media: Arc::new(MediaFetcher::new(channel.clone(), config.images_dir())),
            channel,
        }
    }
}

/// What happened to one event of a webhook batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Recorded { id: i64 },
    Ignored,
    Dropped,
}

/// Create the images directory and the `records` table.
pub async fn prepare_storage(config: &Config) -> Result<()> {
    let images_dir = config.images_dir();
    tokio::fs::create_dir_all(&images_dir)
        .await
        .with_context(|| format!("Failed to create images dir {}", images_dir.display()))?;

    if let Some(parent) = config.database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create database dir {}", parent.display()))?;
    }

    let store = SqliteRecordStore::new(&config.database_path);
    run_blocking(move || store.initialize())
        .await
        .context("Failed to initialize records schema")?;
    Ok(())
}

pub fn build_router(state: AppState, static_dir: &Path) -> Router {
    // No request timeout here: once a batch is verified it must run to the
    // 200. Each image download is bounded by the platform client instead.
    let webhook_router = Router::new()
        .route("/callback", post(handle_callback))
        .with_state(state.clone())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE));

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/history", get(handle_history))
        .with_state(state)
        .merge(webhook_router)
        .nest_service("/static", ServeDir::new(static_dir))
}

/// Run the HTTP gateway until Ctrl+C.
pub async fn run_gateway(config: Config) -> Result<()> {
    prepare_storage(&config).await?;

    let channel: Arc<dyn Channel> = Arc::new(LineChannel::new(&config)?);
    let state = AppState::new(&config, channel);
    let app = build_router(state, &config.static_dir);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let actual = listener.local_addr()?;

    println!("🦀 linelog gateway listening on http://{actual}");
    println!("  POST /callback  LINE webhook (X-Line-Signature)");
    println!("  GET  /history   received records, newest first");
    println!("  GET  /static/*  stored images ({})", config.static_dir.display());
    println!("  Press Ctrl+C to stop.\n");
    tracing::info!(
        database = %config.database_path.display(),
        images = %config.images_dir().display(),
        "gateway started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, StorageError>
where
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
}

// ══════════════════════════════════════════════════════════════════════════════
// AXUM HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// GET /: liveness
async fn handle_index() -> &'static str {
    LIVENESS_TEXT
}

/// GET /health: no secrets
async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "records_db": state.store.path().display().to_string(),
        "images_dir": state.media.images_dir().display().to_string(),
    }))
}

/// GET /history: HTML fragment of every record
async fn handle_history(State(state): State<AppState>) -> Response {
    let store = state.store.clone();
    match run_blocking(move || store.list_all()).await {
        Ok(records) => Html(render_history(&records)).into_response(),
        Err(e) => {
            tracing::error!("History read failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

/// Signature check, then payload decode. Both failures are 400s.
pub fn verify_and_parse(
    channel_secret: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Vec<InboundEvent>, WebhookError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !verify_line_signature(channel_secret, body, signature) {
        return Err(WebhookError::InvalidSignature);
    }
    Ok(parse_webhook_payload(body)?)
}

/// POST /callback: LINE webhook
async fn handle_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let events = match verify_and_parse(&state.channel_secret, &headers, &body) {
        Ok(events) => events,
        Err(err) => {
            match &err {
                WebhookError::InvalidSignature => tracing::warn!(
                    "LINE webhook signature verification failed (signature: {})",
                    if headers.contains_key(SIGNATURE_HEADER) {
                        "invalid"
                    } else {
                        "missing"
                    }
                ),
                WebhookError::Parse(e) => tracing::warn!("LINE webhook payload rejected: {e}"),
            }
            return err.into_response();
        }
    };

    tracing::debug!("LINE webhook accepted with {} event(s)", events.len());
    for (index, event) in events.into_iter().enumerate() {
        let outcome = process_event(&state, index, event).await;
        tracing::debug!(index, ?outcome, "LINE event processed");
    }

    (StatusCode::OK, "OK").into_response()
}

/// Record one event and acknowledge it. Failures past this point never
/// change the HTTP response.
pub async fn process_event(state: &AppState, index: usize, event: InboundEvent) -> EventOutcome {
    let channel = state.channel.name();
    let (text, image): (Option<String>, Option<StoredImage>) = match event.message {
        InboundMessage::Text { text } => (Some(text).filter(|t| !t.is_empty()), None),
        InboundMessage::Image { content_id } => {
            match state
                .media
                .fetch_and_store(&content_id, &chrono::Local::now())
                .await
            {
                Ok(stored) => (None, Some(stored)),
                Err(e) => {
                    tracing::warn!(index, channel, "Dropping image event: {e}");
                    return EventOutcome::Dropped;
                }
            }
        }
        InboundMessage::Other => return EventOutcome::Ignored,
    };

    if text.is_none() && image.is_none() {
        return EventOutcome::Ignored;
    }

    let timestamp = format_timestamp(&chrono::Local::now());
    let image_path = image.as_ref().map(|stored| stored.public_path.clone());
    let store = state.store.clone();
    let inserted = run_blocking(move || {
        store.insert(text.as_deref(), image_path.as_deref(), &timestamp)
    })
    .await;
    let id = match inserted {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(index, channel, "Failed to persist event: {e}");
            // Storage owns only the path; without a row the file is unreachable.
            if let Some(stored) = image {
                if let Err(e) = tokio::fs::remove_file(&stored.disk_path).await {
                    tracing::warn!(
                        index,
                        "Failed to remove orphaned image {}: {e}",
                        stored.disk_path.display()
                    );
                }
            }
            return EventOutcome::Dropped;
        }
    };
    tracing::info!(index, channel, id, "event recorded");

    match event.reply_token {
        Some(token) => {
            if let Err(e) = state
                .channel
                .send(&SendMessage::new(state.reply_text.as_ref(), token))
                .await
            {
                tracing::warn!(index, channel, "Failed to send reply: {e}");
            }
        }
        None => tracing::debug!(index, channel, "event has no reply token; skipping reply"),
    }

    EventOutcome::Recorded { id }
}
