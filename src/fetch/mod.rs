//! Raw audio retrieval from a resolved source link.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Errors raised while retrieving raw audio.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to connect to source: {0}")]
    Connect(String),

    #[error("source responded with status {0}")]
    Status(u16),

    #[error("source returned an empty stream")]
    Empty,

    #[error("IO error while writing audio: {0}")]
    Io(#[from] std::io::Error),
}

/// Byte-progress callback: (bytes read so far, total if known).
pub type ProgressFn<'a> = &'a (dyn Fn(u64, Option<u64>) + Send + Sync);

/// The network-bound raw retrieval seam.
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    /// Stream the audio behind `source_link` into `dest`, reporting byte
    /// progress along the way. Returns the number of bytes written.
    async fn fetch(
        &self,
        source_link: &str,
        dest: &Path,
        on_progress: ProgressFn<'_>,
    ) -> Result<u64, FetchError>;
}

/// HTTP fetcher streaming the response body straight to disk.
pub struct HttpAudioFetcher {
    client: reqwest::Client,
}

impl HttpAudioFetcher {
    pub fn new(timeout_sec: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }
}

#[async_trait]
impl AudioFetcher for HttpAudioFetcher {
    async fn fetch(
        &self,
        source_link: &str,
        dest: &Path,
        on_progress: ProgressFn<'_>,
    ) -> Result<u64, FetchError> {
        let response = self
            .client
            .get(source_link)
            .send()
            .await
            .map_err(|e| FetchError::Connect(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let total = response.content_length();
        let mut stream = response.bytes_stream();
        let mut file = File::create(dest).await?;
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::Connect(e.to_string()))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            on_progress(written, total);
        }
        file.flush().await?;

        if written == 0 {
            return Err(FetchError::Empty);
        }

        debug!("fetched {} bytes from {}", written, source_link);
        Ok(written)
    }
}

/// Delete temporary files left behind by a failed fetch. Matching is by the
/// song's own artifact base name, so one song's cleanup can never touch
/// another's files.
pub fn clean_partials(temp_dir: &Path, base_name: &str) -> std::io::Result<()> {
    let Ok(entries) = std::fs::read_dir(temp_dir) else {
        return Ok(());
    };
    let prefix = format!("{}.", base_name);
    for entry in entries.flatten() {
        let name = entry.file_name();
        if name.to_string_lossy().starts_with(&prefix) {
            std::fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}
