use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::apis::{ArticleRecord, ArticleSource, SourceError};
use crate::download::mirror::MirrorDownloader;
use crate::download::pdf_filename;
use crate::download::publisher::PublisherDownloader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfSource {
    Publisher,
    Mirror,
}

/// What happened to one article id during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArticleOutcome {
    Saved {
        id: String,
        source: PdfSource,
        path: PathBuf,
    },
    NotFound {
        id: String,
    },
    MetadataFailed {
        id: String,
        error: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Search, then fetch metadata and a PDF for each hit, one article at a time.
pub struct Pipeline {
    source: Arc<dyn ArticleSource>,
    publisher: PublisherDownloader,
    mirror: Option<MirrorDownloader>,
    format: OutputFormat,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn ArticleSource>,
        publisher: PublisherDownloader,
        mirror: Option<MirrorDownloader>,
        format: OutputFormat,
    ) -> Self {
        Self {
            source,
            publisher,
            mirror,
            format,
        }
    }

    /// Fails only when the search itself fails. A metadata error for one id
    /// is recorded and the run moves on to the next id.
    pub async fn run(&self, query: &str, max_results: u32) -> Result<Vec<ArticleOutcome>, SourceError> {
        let ids = self.source.search_ids(query, max_results).await?;
        tracing::info!(
            "{} returned {} article ids for {:?}",
            self.source.name(),
            ids.len(),
            query
        );

        let mut outcomes = Vec::with_capacity(ids.len());
        for id in &ids {
            outcomes.push(self.process(id).await);
        }
        Ok(outcomes)
    }

    async fn process(&self, id: &str) -> ArticleOutcome {
        let record = match self.source.fetch_record(id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Failed to fetch metadata for {}: {}", id, e);
                return ArticleOutcome::MetadataFailed {
                    id: id.to_string(),
                    error: e.to_string(),
                };
            }
        };
        self.report(&record);

        if let Some(link) = record.full_text_link.as_deref() {
            let file_name = pdf_filename(record.doi.as_deref().unwrap_or(&record.id));
            if let Some(path) = self.publisher.download(link, &file_name).await {
                return ArticleOutcome::Saved {
                    id: record.id,
                    source: PdfSource::Publisher,
                    path,
                };
            }
        }

        if let Some(mirror) = &self.mirror {
            tracing::info!("Trying the mirror for {}", record.id);
            if let Some(path) = mirror.download(record.doi.as_deref()).await {
                return ArticleOutcome::Saved {
                    id: record.id,
                    source: PdfSource::Mirror,
                    path,
                };
            }
        }

        ArticleOutcome::NotFound { id: record.id }
    }

    fn report(&self, record: &ArticleRecord) {
        match self.format {
            OutputFormat::Text => {
                println!("\n--- {} ---", record.id);
                println!("Title: {}", record.title_or_placeholder());
                println!("Authors: {}", record.authors_display());
                println!("DOI: {}", record.doi_or_placeholder());
                println!("Full text: {}", record.full_text_link_or_placeholder());
                tracing::debug!("Abstract: {}", record.abstract_or_placeholder());
            }
            OutputFormat::Json => match serde_json::to_string(record) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!("Failed to serialize record {}: {}", record.id, e),
            },
        }
    }
}
