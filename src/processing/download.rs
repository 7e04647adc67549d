use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::error::ProcessingError;
use super::processor::{JobContext, Processor};
use crate::state_machine::Artifact;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const FALLBACK_FILENAME: &str = "source.bin";

/// Downloads the source locator and stores a copy under `output_dir`.
pub struct DownloadProcessor {
    client: Client,
    output_dir: PathBuf,
}

impl DownloadProcessor {
    pub fn new(output_dir: impl Into<PathBuf>, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self::with_client(client, output_dir))
    }

    pub fn with_client(client: Client, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    async fn fetch_into(
        &self,
        url: &Url,
        location: &Path,
    ) -> Result<String, ProcessingError> {
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| ProcessingError::Transfer {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProcessingError::TransferStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let mut file = tokio::fs::File::create(location).await?;
        let mut written = 0usize;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|source| ProcessingError::Transfer {
                url: url.to_string(),
                source,
            })?
        {
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        file.flush().await?;
        debug!(url = %url, bytes = written, "Source downloaded");

        Ok(content_type)
    }
}

#[async_trait]
impl Processor for DownloadProcessor {
    fn name(&self) -> &str {
        "download"
    }

    async fn process(&self, ctx: JobContext) -> Result<Artifact, ProcessingError> {
        let url = parse_source(&ctx.input.source_url)?;
        let filename = filename_from_url(&url);

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let location = self.output_dir.join(format!("{}-{filename}", ctx.job_id));
        let partial =
            PartialDownload::new(self.output_dir.join(format!("{}-{filename}.part", ctx.job_id)));

        info!(job_id = %ctx.job_id, url = %url, "Downloading source");
        let content_type = self.fetch_into(&url, partial.path()).await?;
        partial.commit(&location).await?;
        Ok(Artifact {
            location,
            content_type,
            filename,
        })
    }
}

/// A download in progress. The file is removed on drop unless committed,
/// which also covers the future being dropped by a timeout or cancel.
struct PartialDownload {
    path: PathBuf,
    committed: bool,
}

impl PartialDownload {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Move the finished download to `dest`.
    async fn commit(mut self, dest: &Path) -> io::Result<()> {
        tokio::fs::rename(&self.path, dest).await?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartialDownload {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed partial download"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Could not remove partial download"),
        }
    }
}

fn parse_source(raw: &str) -> Result<Url, ProcessingError> {
    let url = Url::parse(raw.trim()).map_err(|e| ProcessingError::InvalidSource {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ProcessingError::InvalidSource {
            url: raw.to_string(),
            reason: format!("unsupported scheme `{}`", url.scheme()),
        });
    }
    Ok(url)
}

/// Last non-empty path segment, or a fixed fallback.
fn filename_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}
