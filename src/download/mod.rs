pub mod mirror;
pub mod publisher;

use std::path::{Path, PathBuf};

use futures::StreamExt;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("no PDF link found on {url}")]
    NoPdfLink { url: String },
    #[error("no embedded PDF frame found on {url}; check it manually in a browser")]
    NoFrame { url: String },
    #[error("{url} did not return a PDF (content type: {content_type})")]
    NotPdf { url: String, content_type: String },
    #[error("HTML selector error: {0}")]
    Html(String),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("failed to write file: {0}")]
    Io(#[from] std::io::Error),
}

/// Output file name for a DOI: every `/` becomes `_`, plus a `.pdf` suffix.
pub fn pdf_filename(doi: &str) -> String {
    format!("{}.pdf", doi.replace('/', "_"))
}

/// Fail with [`DownloadError::Status`] unless the response is 2xx.
fn ensure_success(response: &reqwest::Response) -> Result<(), DownloadError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(DownloadError::Status {
            url: response.url().to_string(),
            status,
        })
    }
}

/// Stream a response body into `dir/file_name`, chunk by chunk.
///
/// The file is created before the first chunk arrives, so a transport
/// failure mid-stream leaves a truncated file behind.
async fn save_body(
    response: reqwest::Response,
    dir: &Path,
    file_name: &str,
) -> Result<PathBuf, DownloadError> {
    let path = dir.join(file_name);
    let mut file = tokio::fs::File::create(&path).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    tracing::debug!("wrote {} bytes to {}", written, path.display());
    Ok(path)
}
