use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod apis;
mod config;
mod download;
mod pipeline;

use config::Config;
use pipeline::{ArticleOutcome, OutputFormat, Pipeline};

/// Search PubMed and download a PDF for each matching article, from the
/// publisher site when possible and from a DOI mirror otherwise.
#[derive(Debug, Parser)]
#[command(name = "pubmed-fetch", version, about)]
struct Cli {
    /// PubMed search term
    #[arg(default_value = "physiotherapy AND pain")]
    query: String,

    /// Maximum number of articles to process
    #[arg(short = 'n', long, default_value_t = 5)]
    max_results: u32,

    /// Directory the PDFs are written to (must exist)
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Base URL of the DOI mirror
    #[arg(long)]
    mirror_url: Option<String>,

    /// Connect and read timeout for every request
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: Option<u64>,

    /// Do not fall back to the mirror
    #[arg(long)]
    no_mirror: bool,

    /// Print each record as a JSON line instead of a text summary
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.out_dir {
            config.out_dir = dir.clone();
        }
        if let Some(url) = &self.mirror_url {
            config.mirror_url = url.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    cli.apply(&mut config);
    tracing::debug!("{:?}", config);

    let client = config.http_client()?;
    let mirror = (!cli.no_mirror).then(|| config.build_mirror(client.clone()));
    let format = if cli.json { OutputFormat::Json } else { OutputFormat::Text };
    let pipeline = Pipeline::new(
        Arc::new(config.build_source(client.clone())),
        config.build_publisher(client),
        mirror,
        format,
    );

    let outcomes = pipeline
        .run(&cli.query, cli.max_results)
        .await
        .with_context(|| format!("Search for {:?} failed", cli.query))?;

    let saved = outcomes
        .iter()
        .filter(|o| matches!(o, ArticleOutcome::Saved { .. }))
        .count();
    tracing::info!("Done: saved {} of {} articles", saved, outcomes.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["pubmed-fetch"]);
        assert_eq!(cli.query, "physiotherapy AND pain");
        assert_eq!(cli.max_results, 5);
        assert!(!cli.no_mirror);
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "pubmed-fetch",
            "test",
            "-n",
            "1",
            "--out-dir",
            "/tmp/out",
            "--mirror-url",
            "https://mirror.example",
            "--timeout-secs",
            "3",
        ]);
        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(cli.query, "test");
        assert_eq!(cli.max_results, 1);
        assert_eq!(config.out_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.mirror_url, "https://mirror.example");
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(Cli::try_parse_from(["pubmed-fetch", "--timeout-secs", "0"]).is_err());
    }
}
