use std::path::PathBuf;

use scraper::{Html, Selector};
use url::Url;

use super::{ensure_success, save_body, DownloadError};

/// Downloads PDFs from the article's landing page on the publisher site.
pub struct PublisherDownloader {
    client: reqwest::Client,
    out_dir: PathBuf,
}

impl PublisherDownloader {
    pub fn new(client: reqwest::Client, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            out_dir: out_dir.into(),
        }
    }

    /// Try to save the PDF linked from `page_url` as `file_name`.
    /// Returns the written path, or `None` after logging why it failed.
    pub async fn download(&self, page_url: &str, file_name: &str) -> Option<PathBuf> {
        match self.try_download(page_url, file_name).await {
            Ok(path) => {
                tracing::info!("Saved {} from the publisher site", path.display());
                Some(path)
            }
            Err(e) => {
                tracing::warn!("Publisher download from {} failed: {}", page_url, e);
                None
            }
        }
    }

    pub async fn try_download(&self, page_url: &str, file_name: &str) -> Result<PathBuf, DownloadError> {
        let pdf_url = self.locate_pdf(page_url).await?;
        tracing::info!("Found PDF link: {}", pdf_url);

        let response = self.client.get(pdf_url.as_str()).send().await?;
        ensure_success(&response)?;
        save_body(response, &self.out_dir, file_name).await
    }

    /// Fetch the landing page and pick the first anchor that looks like a PDF.
    pub async fn locate_pdf(&self, page_url: &str) -> Result<Url, DownloadError> {
        let response = self.client.get(page_url).send().await?;
        ensure_success(&response)?;
        let base = response.url().clone();
        let html = response.text().await?;
        find_pdf_link(&html, &base)?.ok_or_else(|| DownloadError::NoPdfLink {
            url: page_url.to_string(),
        })
    }
}

/// First `<a href>` containing "pdf" (any case), resolved against `base`.
fn find_pdf_link(html: &str, base: &Url) -> Result<Option<Url>, DownloadError> {
    let document = Html::parse_document(html);
    let anchors = Selector::parse("a[href]").map_err(|e| DownloadError::Html(format!("{:?}", e)))?;

    let href = document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .find(|href| href.to_lowercase().contains("pdf"));

    match href {
        Some(href) => Ok(Some(base.join(href)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn page(anchors: &[&str]) -> String {
        let links: String = anchors
            .iter()
            .map(|href| format!(r#"<li><a href="{}">link</a></li>"#, href))
            .collect();
        format!("<html><body><a>no target</a><ul>{}</ul></body></html>", links)
    }

    #[test]
    fn test_relative_link_resolved_against_page() {
        let base = Url::parse("http://journal.example/article/42").unwrap();
        let html = page(&["/about", "/docs/file.pdf", "http://x.com/a.pdf"]);
        let found = find_pdf_link(&html, &base).unwrap().unwrap();
        assert_eq!(found.as_str(), "http://journal.example/docs/file.pdf");
    }

    #[test]
    fn test_document_order_decides() {
        let base = Url::parse("http://journal.example/article/42").unwrap();
        let html = page(&["http://x.com/a.pdf", "/docs/file.pdf"]);
        let found = find_pdf_link(&html, &base).unwrap().unwrap();
        assert_eq!(found.as_str(), "http://x.com/a.pdf");
    }

    #[test]
    fn test_pdf_match_is_case_insensitive() {
        let base = Url::parse("https://journal.example/article/42").unwrap();
        let html = page(&["/home", "download/PDF?id=7"]);
        let found = find_pdf_link(&html, &base).unwrap().unwrap();
        assert_eq!(found.as_str(), "https://journal.example/article/download/PDF?id=7");
    }

    #[test]
    fn test_no_pdf_anchor() {
        let base = Url::parse("https://journal.example/").unwrap();
        assert!(find_pdf_link(&page(&["/a", "/b.html"]), &base).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_download_saves_linked_pdf() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page(&["/files/paper.pdf"])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/paper.pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_bytes(b"%PDF-1.4 test".to_vec()),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().expect("failed to create temp dir");
        let downloader = PublisherDownloader::new(reqwest::Client::new(), dir.path());
        let saved = downloader
            .download(&format!("{}/article/1", server.uri()), "10.1000_xyz.pdf")
            .await
            .expect("download should succeed");

        assert_eq!(saved, dir.path().join("10.1000_xyz.pdf"));
        assert_eq!(std::fs::read(saved).unwrap(), b"%PDF-1.4 test");
    }

    #[tokio::test]
    async fn test_page_without_pdf_link_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page(&["/about"])))
            .mount(&server)
            .await;

        let dir = TempDir::new().expect("failed to create temp dir");
        let downloader = PublisherDownloader::new(reqwest::Client::new(), dir.path());
        let result = downloader.try_download(&server.uri(), "x.pdf").await;
        assert!(matches!(result, Err(DownloadError::NoPdfLink { .. })));
        assert!(!dir.path().join("x.pdf").exists());
    }

    #[tokio::test]
    async fn test_landing_page_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let dir = TempDir::new().expect("failed to create temp dir");
        let downloader = PublisherDownloader::new(reqwest::Client::new(), dir.path());
        assert!(downloader.download(&server.uri(), "x.pdf").await.is_none());
        assert!(!dir.path().join("x.pdf").exists());
    }

    #[tokio::test]
    async fn test_pdf_error_status_writes_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page(&["/paper.pdf"])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/paper.pdf"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = TempDir::new().expect("failed to create temp dir");
        let downloader = PublisherDownloader::new(reqwest::Client::new(), dir.path());
        let result = downloader
            .try_download(&format!("{}/article", server.uri()), "x.pdf")
            .await;
        assert!(matches!(result, Err(DownloadError::Status { .. })));
        assert!(!dir.path().join("x.pdf").exists());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_reported_not_raised() {
        let dir = TempDir::new().expect("failed to create temp dir");
        let downloader = PublisherDownloader::new(reqwest::Client::new(), dir.path());
        assert!(downloader
            .download("http://127.0.0.1:9/article", "x.pdf")
            .await
            .is_none());
    }
}
