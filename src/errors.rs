use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Rejections on `POST /callback`. Both variants answer 400; the split only
/// matters for logs.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing or invalid X-Line-Signature")]
    InvalidSignature,

    #[error("malformed webhook payload: {0}")]
    Parse(#[from] serde_json::Error),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, "Bad Request").into_response()
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("content request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("content API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("reply request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("reply API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("storage task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to write image file: {0}")]
    Write(#[from] std::io::Error),
}
