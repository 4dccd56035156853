//! Image download and on-disk storage.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use crate::channels::Channel;
use crate::errors::MediaError;

/// URL-relative prefix recorded in `records.image_path`; the static route
/// serves the images directory under `/static/images`.
pub const PUBLIC_IMAGES_PREFIX: &str = "static/images";
const IMAGE_PREFIX: &str = "image_";
const IMAGE_EXTENSION: &str = "jpg";
/// Same-second collisions beyond this many files give up.
const MAX_NAME_ATTEMPTS: u32 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub public_path: String,
    pub disk_path: PathBuf,
}

/// `image_<YYYYMMDDHHMMSS>.jpg`, with `_<n>` before the extension for the
/// n-th file of the same second (n >= 2).
pub fn image_file_name(now: &DateTime<Local>, attempt: u32) -> String {
    let stamp = now.format("%Y%m%d%H%M%S");
    if attempt <= 1 {
        format!("{IMAGE_PREFIX}{stamp}.{IMAGE_EXTENSION}")
    } else {
        format!("{IMAGE_PREFIX}{stamp}_{attempt}.{IMAGE_EXTENSION}")
    }
}

#[derive(Clone)]
pub struct MediaFetcher {
    channel: Arc<dyn Channel>,
    images_dir: PathBuf,
}

impl MediaFetcher {
    pub fn new(channel: Arc<dyn Channel>, images_dir: impl Into<PathBuf>) -> Self {
        Self {
            channel,
            images_dir: images_dir.into(),
        }
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Download the content behind `content_id` and write it to a fresh file.
    pub async fn fetch_and_store(
        &self,
        content_id: &str,
        now: &DateTime<Local>,
    ) -> Result<StoredImage, MediaError> {
        let bytes = self.channel.fetch_content(content_id).await?;
        self.store(&bytes, now).await
    }

    async fn store(&self, bytes: &[u8], now: &DateTime<Local>) -> Result<StoredImage, MediaError> {
        tokio::fs::create_dir_all(&self.images_dir).await?;

        for attempt in 1..=MAX_NAME_ATTEMPTS {
            let file_name = image_file_name(now, attempt);
            let disk_path = self.images_dir.join(&file_name);
            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&disk_path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };

            if let Err(e) = write_all(&mut file, bytes).await {
                let _ = tokio::fs::remove_file(&disk_path).await;
                return Err(e.into());
            }

            return Ok(StoredImage {
                public_path: format!("{PUBLIC_IMAGES_PREFIX}/{file_name}"),
                disk_path,
            });
        }

        Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("no free image file name for {}", now.format("%Y%m%d%H%M%S")),
        )
        .into())
    }
}

async fn write_all(file: &mut tokio::fs::File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::SendMessage;
    use crate::errors::{FetchError, ReplyError};
    use async_trait::async_trait;
    use chrono::TimeZone;

    struct StaticContent(Option<Vec<u8>>);

    #[async_trait]
    impl Channel for StaticContent {
        fn name(&self) -> &str {
            "static"
        }

        async fn fetch_content(&self, _content_id: &str) -> Result<Vec<u8>, FetchError> {
            self.0.clone().ok_or_else(|| FetchError::Status {
                status: reqwest::StatusCode::UNAUTHORIZED,
                body: "invalid token".into(),
            })
        }

        async fn send(&self, _message: &SendMessage) -> Result<(), ReplyError> {
            Ok(())
        }
    }

    fn fixed_now() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 1, 1, 10, 1, 0)
            .single()
            .unwrap()
    }

    #[test]
    fn file_name_uses_compact_timestamp() {
        assert_eq!(image_file_name(&fixed_now(), 1), "image_20240101100100.jpg");
        assert_eq!(image_file_name(&fixed_now(), 3), "image_20240101100100_3.jpg");
    }

    #[tokio::test]
    async fn fetch_and_store_writes_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        let fetcher = MediaFetcher::new(Arc::new(StaticContent(Some(b"jpeg".to_vec()))), &images);

        let stored = fetcher.fetch_and_store("m1", &fixed_now()).await.unwrap();

        assert_eq!(stored.public_path, "static/images/image_20240101100100.jpg");
        assert_eq!(stored.disk_path, images.join("image_20240101100100.jpg"));
        assert_eq!(std::fs::read(&stored.disk_path).unwrap(), b"jpeg");
    }

    #[tokio::test]
    async fn same_second_images_get_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MediaFetcher::new(
            Arc::new(StaticContent(Some(b"one".to_vec()))),
            dir.path(),
        );

        let first = fetcher.fetch_and_store("a", &fixed_now()).await.unwrap();
        let second = fetcher.fetch_and_store("b", &fixed_now()).await.unwrap();

        assert_ne!(first.disk_path, second.disk_path);
        assert_eq!(
            second.public_path,
            "static/images/image_20240101100100_2.jpg"
        );
        assert!(first.disk_path.exists());
        assert!(second.disk_path.exists());
    }

    #[tokio::test]
    async fn fetch_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        let fetcher = MediaFetcher::new(Arc::new(StaticContent(None)), &images);

        let err = fetcher.fetch_and_store("m1", &fixed_now()).await.unwrap_err();

        assert!(matches!(err, MediaError::Fetch(_)));
        assert!(!images.exists());
    }
}
