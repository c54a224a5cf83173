use std::path::PathBuf;

use reqwest::header::CONTENT_TYPE;
use scraper::{Html, Selector};
use url::Url;

use super::{ensure_success, pdf_filename, save_body, DownloadError};

pub const DEFAULT_MIRROR_URL: &str = "https://sci-hub.se";

/// Looks a DOI up on a mirror service that embeds the PDF in an `<iframe>`.
pub struct MirrorDownloader {
    client: reqwest::Client,
    base_url: String,
    out_dir: PathBuf,
}

impl MirrorDownloader {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            out_dir: out_dir.into(),
        }
    }

    pub fn page_url(&self, doi: &str) -> String {
        format!("{}/{}", self.base_url, doi)
    }

    /// Try to save the mirror's copy of `doi` as `<doi>.pdf`.
    /// Failures are logged and reported as `None`.
    pub async fn download(&self, doi: Option<&str>) -> Option<PathBuf> {
        let Some(doi) = doi else {
            tracing::info!("No DOI for this article, skipping the mirror");
            return None;
        };
        match self.try_download(doi).await {
            Ok(path) => {
                tracing::info!("Saved {} from the mirror", path.display());
                Some(path)
            }
            Err(e) => {
                tracing::warn!("Mirror download for {} failed: {}", doi, e);
                None
            }
        }
    }

    pub async fn try_download(&self, doi: &str) -> Result<PathBuf, DownloadError> {
        let page_url = self.page_url(doi);
        tracing::info!("Trying mirror: {}", page_url);

        let response = self.client.get(&page_url).send().await?;
        ensure_success(&response)?;
        let base = response.url().clone();
        let html = response.text().await?;
        let pdf_url = find_frame_source(&html, &base)?
            .ok_or_else(|| DownloadError::NoFrame { url: page_url.clone() })?;

        tracing::info!("Downloading PDF from {}", pdf_url);
        let response = self.client.get(pdf_url.as_str()).send().await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.contains("application/pdf") {
            return Err(DownloadError::NotPdf {
                url: pdf_url.to_string(),
                content_type,
            });
        }
        save_body(response, &self.out_dir, &pdf_filename(doi)).await
    }
}

/// `src` of the first `<iframe>`, if it has a non-empty one.
/// Protocol-relative sources get an `https:` scheme.
fn find_frame_source(html: &str, base: &Url) -> Result<Option<Url>, DownloadError> {
    let document = Html::parse_document(html);
    let iframe = Selector::parse("iframe").map_err(|e| DownloadError::Html(format!("{:?}", e)))?;

    let src = document
        .select(&iframe)
        .next()
        .and_then(|frame| frame.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty());

    match src {
        Some(src) if src.starts_with("//") => Ok(Some(Url::parse(&format!("https:{}", src))?)),
        Some(src) => Ok(Some(base.join(src)?)),
        None => Ok(None),
    }
}
