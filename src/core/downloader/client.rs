use std::path::Path;

use futures_util::StreamExt;
use reqwest::header::LOCATION;
use reqwest::{Client, Url};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::build_http_client;

/// Hop limit when walking `Location` headers.
pub const MAX_REDIRECTS: usize = 10;

/// Progress of a single transfer. Only reported when the server declared a
/// content length.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DownloadProgress {
    pub url: String,
    pub bytes_downloaded: u64,
    pub total_bytes: u64,
    pub file_name: String,
}

impl DownloadProgress {
    /// Fraction received, `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.bytes_downloaded as f64 / self.total_bytes as f64).clamp(0.0, 1.0)
    }

    pub fn percent(&self) -> u8 {
        (self.fraction() * 100.0).round() as u8
    }
}

/// Streaming downloader that follows redirects itself.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    /// Maximum number of redirects followed before giving up.
    max_redirects: usize,
}

impl Downloader {
    pub fn new() -> LauncherResult<Self> {
        Ok(Self {
            client: build_http_client()?,
            max_redirects: MAX_REDIRECTS,
        })
    }

    pub fn with_max_redirects(mut self, n: usize) -> Self {
        self.max_redirects = n;
        self
    }

    /// Download `url` to `dest`, following 3xx responses that carry a
    /// `Location` header. Any other non-2xx status fails the call.
    ///
    /// Returns the number of bytes written. A partially written `dest` is
    /// removed when the transfer fails.
    pub async fn download_file<F>(
        &self,
        url: &str,
        dest: &Path,
        mut on_progress: F,
    ) -> LauncherResult<u64>
    where
        F: FnMut(&DownloadProgress),
    {
        let mut current = Url::parse(url)
            .map_err(|e| LauncherError::Other(format!("Invalid URL {url}: {e}")))?;
        let mut hops = 0usize;

        let response = loop {
            let response = self.client.get(current.clone()).send().await?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned);
                if let Some(location) = location {
                    if hops >= self.max_redirects {
                        return Err(LauncherError::TooManyRedirects {
                            url: url.to_string(),
                            limit: self.max_redirects,
                        });
                    }
                    let next = current.join(&location).map_err(|e| {
                        LauncherError::Other(format!("Invalid redirect target {location}: {e}"))
                    })?;
                    debug!("Redirect {} -> {}", current, next);
                    current = next;
                    hops += 1;
                    continue;
                }
            }

            if !status.is_success() {
                return Err(LauncherError::DownloadFailed {
                    url: current.to_string(),
                    status: status.as_u16(),
                });
            }
            break response;
        };

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }

        let total_bytes = response.content_length().filter(|len| *len > 0);
        let file_name = dest
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let result = async {
            let mut file = tokio::fs::File::create(dest)
                .await
                .map_err(|e| LauncherError::io(dest, e))?;
            let mut stream = response.bytes_stream();
            let mut downloaded = 0u64;

            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk)
                    .await
                    .map_err(|e| LauncherError::io(dest, e))?;
                downloaded += chunk.len() as u64;

                if let Some(total) = total_bytes {
                    on_progress(&DownloadProgress {
                        url: current.to_string(),
                        bytes_downloaded: downloaded,
                        total_bytes: total,
                        file_name: file_name.clone(),
                    });
                }
            }
            file.flush().await.map_err(|e| LauncherError::io(dest, e))?;
            // file is dropped here, before any rename/extract on Windows
            Ok::<u64, LauncherError>(downloaded)
        }
        .await;

        match result {
            Ok(bytes) => {
                info!("Downloaded {} ({} bytes) -> {:?}", current, bytes, dest);
                Ok(bytes)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(dest).await;
                Err(e)
            }
        }
    }
}
