pub mod pubmed;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const NO_TITLE: &str = "No title available";
pub const NO_ABSTRACT: &str = "No abstract available";
pub const NO_AUTHORS: &str = "No authors available";
pub const NO_DOI: &str = "No DOI available";
pub const NO_FULL_TEXT_LINK: &str = "No full text link available";

/// Metadata for a single bibliographic record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: String,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub authors: Vec<String>,
    pub doi: Option<String>,
    pub full_text_link: Option<String>,
}

impl ArticleRecord {
    pub fn title_or_placeholder(&self) -> &str {
        self.title.as_deref().unwrap_or(NO_TITLE)
    }

    pub fn abstract_or_placeholder(&self) -> &str {
        self.abstract_text.as_deref().unwrap_or(NO_ABSTRACT)
    }

    /// Authors joined as `"Given Family, Given Family"`.
    pub fn authors_display(&self) -> String {
        if self.authors.is_empty() {
            NO_AUTHORS.to_string()
        } else {
            self.authors.join(", ")
        }
    }

    pub fn doi_or_placeholder(&self) -> &str {
        self.doi.as_deref().unwrap_or(NO_DOI)
    }

    pub fn full_text_link_or_placeholder(&self) -> &str {
        self.full_text_link.as_deref().unwrap_or(NO_FULL_TEXT_LINK)
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("API error: {0}")]
    Api(String),
}

/// A bibliographic database that can be searched for article ids and
/// queried for per-article metadata.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    fn name(&self) -> &str;
    async fn search_ids(&self, query: &str, max_results: u32) -> Result<Vec<String>, SourceError>;
    async fn fetch_record(&self, id: &str) -> Result<ArticleRecord, SourceError>;
}
