use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::apis::pubmed::{self, LinkBases, PubmedClient};
use crate::download::mirror::{self, MirrorDownloader};
use crate::download::publisher::PublisherDownloader;

const USER_AGENT: &str = concat!("pubmed-fetch/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub eutils_url: String,
    pub pmc_url: String,
    pub doi_url: String,
    pub mirror_url: String,
    pub out_dir: PathBuf,
    pub timeout: Duration,
    pub email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            eutils_url: pubmed::DEFAULT_EUTILS_URL.to_string(),
            pmc_url: pubmed::DEFAULT_PMC_URL.to_string(),
            doi_url: pubmed::DEFAULT_DOI_URL.to_string(),
            mirror_url: mirror::DEFAULT_MIRROR_URL.to_string(),
            out_dir: PathBuf::from("."),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            email: None,
        }
    }
}

impl Config {
    /// Load configuration from `PUBMED_FETCH_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let timeout = match non_empty("PUBMED_FETCH_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    tracing::warn!(
                        "Ignoring PUBMED_FETCH_TIMEOUT_SECS={:?}, using {}s",
                        raw,
                        DEFAULT_TIMEOUT_SECS
                    );
                    defaults.timeout
                }
            },
            None => defaults.timeout,
        };

        Self {
            eutils_url: non_empty("PUBMED_FETCH_EUTILS_URL").unwrap_or(defaults.eutils_url),
            pmc_url: non_empty("PUBMED_FETCH_PMC_URL").unwrap_or(defaults.pmc_url),
            doi_url: non_empty("PUBMED_FETCH_DOI_URL").unwrap_or(defaults.doi_url),
            mirror_url: non_empty("PUBMED_FETCH_MIRROR_URL").unwrap_or(defaults.mirror_url),
            out_dir: non_empty("PUBMED_FETCH_OUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.out_dir),
            timeout,
            email: non_empty("PUBMED_FETCH_EMAIL"),
        }
    }

    /// Shared HTTP client with connect and read timeouts applied to every call.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(self.timeout)
            .read_timeout(self.timeout)
            .build()
            .context("Failed to build HTTP client")
    }

    pub fn build_source(&self, client: reqwest::Client) -> PubmedClient {
        PubmedClient::with_endpoints(
            client,
            self.eutils_url.clone(),
            LinkBases {
                pmc: self.pmc_url.clone(),
                doi: self.doi_url.clone(),
            },
            self.email.clone(),
        )
    }

    pub fn build_publisher(&self, client: reqwest::Client) -> PublisherDownloader {
        PublisherDownloader::new(client, self.out_dir.clone())
    }

    pub fn build_mirror(&self, client: reqwest::Client) -> MirrorDownloader {
        MirrorDownloader::new(client, self.mirror_url.clone(), self.out_dir.clone())
    }
}
