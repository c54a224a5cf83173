use super::{ArticleRecord, ArticleSource, SourceError};
use async_trait::async_trait;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;

pub const DEFAULT_EUTILS_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
pub const DEFAULT_PMC_URL: &str = "https://www.ncbi.nlm.nih.gov/pmc/articles";
pub const DEFAULT_DOI_URL: &str = "https://doi.org";

const TOOL_NAME: &str = "pubmed-fetch";

/// Base URLs used to turn article ids into full-text links.
#[derive(Debug, Clone)]
pub struct LinkBases {
    pub pmc: String,
    pub doi: String,
}

impl Default for LinkBases {
    fn default() -> Self {
        Self {
            pmc: DEFAULT_PMC_URL.to_string(),
            doi: DEFAULT_DOI_URL.to_string(),
        }
    }
}

impl LinkBases {
    fn pmc_link(&self, pmcid: &str) -> String {
        format!("{}/{}/", self.pmc.trim_end_matches('/'), pmcid)
    }

    fn doi_link(&self, doi: &str) -> String {
        format!("{}/{}", self.doi.trim_end_matches('/'), doi)
    }
}

/// PubMed through the NCBI E-utilities `esearch` and `efetch` endpoints.
pub struct PubmedClient {
    client: reqwest::Client,
    eutils_url: String,
    links: LinkBases,
    email: Option<String>,
}

impl PubmedClient {
    pub fn with_endpoints(
        client: reqwest::Client,
        eutils_url: impl Into<String>,
        links: LinkBases,
        email: Option<String>,
    ) -> Self {
        Self {
            client,
            eutils_url: eutils_url.into().trim_end_matches('/').to_string(),
            links,
            email,
        }
    }

    async fn get_xml(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String, SourceError> {
        let mut request = self
            .client
            .get(format!("{}/{}", self.eutils_url, endpoint))
            .query(params)
            .query(&[("tool", TOOL_NAME)]);
        if let Some(email) = self.email.as_deref() {
            request = request.query(&[("email", email)]);
        }
        let body = request.send().await?.error_for_status()?.text().await?;
        Ok(body)
    }
}

#[async_trait]
impl ArticleSource for PubmedClient {
    fn name(&self) -> &str {
        "pubmed"
    }

    async fn search_ids(&self, query: &str, max_results: u32) -> Result<Vec<String>, SourceError> {
        let retmax = max_results.to_string();
        let xml = self
            .get_xml(
                "esearch.fcgi",
                &[
                    ("db", "pubmed"),
                    ("term", query),
                    ("retmode", "xml"),
                    ("retmax", retmax.as_str()),
                ],
            )
            .await?;
        let mut ids = parse_search_ids(&xml)?;
        ids.truncate(max_results as usize);
        tracing::debug!("esearch returned {} ids for {:?}", ids.len(), query);
        Ok(ids)
    }

    async fn fetch_record(&self, id: &str) -> Result<ArticleRecord, SourceError> {
        let xml = self
            .get_xml("efetch.fcgi", &[("db", "pubmed"), ("id", id), ("retmode", "xml")])
            .await?;
        parse_article_record(id, &xml, &self.links)
    }
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

fn attr_value(e: &BytesStart, key: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == key.as_bytes())
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

fn text_of(e: &BytesText) -> String {
    match e.unescape() {
        Ok(text) => text.into_owned(),
        Err(_) => String::from_utf8_lossy(e).to_string(),
    }
}

fn normalize_whitespace(text: &str) -> Option<String> {
    let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

/// Extract every `<Id>` from an esearch response, in document order.
fn parse_search_ids(xml: &str) -> Result<Vec<String>, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut ids = Vec::new();
    let mut current = String::new();
    let mut in_id = false;
    let mut in_error = false;
    let mut error = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match local_name(&e).as_str() {
                "Id" => {
                    in_id = true;
                    current.clear();
                }
                "ERROR" => in_error = true,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_id {
                    current.push_str(&text_of(&e));
                } else if in_error {
                    error.push_str(&text_of(&e));
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"Id" => {
                    in_id = false;
                    let id = current.trim();
                    if !id.is_empty() {
                        ids.push(id.to_string());
                    }
                }
                b"ERROR" => in_error = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(SourceError::Parse(format!("XML parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    if ids.is_empty() && !error.trim().is_empty() {
        return Err(SourceError::Api(error.trim().to_string()));
    }
    Ok(ids)
}

enum Field {
    Title,
    Abstract,
    ForeName,
    LastName,
    Doi,
    ArticleId(String),
}

struct Capture {
    field: Field,
    depth: usize,
    text: String,
}

#[derive(Default)]
struct AuthorName {
    fore: Option<String>,
    last: Option<String>,
}

/// Build an [`ArticleRecord`] from an efetch response. Missing elements
/// leave the matching field empty; they are never an error.
fn parse_article_record(id: &str, xml: &str, links: &LinkBases) -> Result<ArticleRecord, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<String> = Vec::new();
    let mut capture: Option<Capture> = None;
    let mut author: Option<AuthorName> = None;

    let mut title = None;
    let mut abstract_text = None;
    let mut authors = Vec::new();
    let mut doi = None;
    let mut pmc_id: Option<String> = None;
    let mut doi_id: Option<String> = None;

    let mut saw_article = false;
    let mut in_error = false;
    let mut error = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                let parent = stack.last().map(String::as_str);
                if capture.is_none() {
                    let field = match name.as_str() {
                        "ArticleTitle" if title.is_none() => Some(Field::Title),
                        "AbstractText" if abstract_text.is_none() => Some(Field::Abstract),
                        "ForeName" if parent == Some("Author") => Some(Field::ForeName),
                        "LastName" if parent == Some("Author") => Some(Field::LastName),
                        "ELocationID"
                            if doi.is_none() && attr_value(&e, "EIdType").as_deref() == Some("doi") =>
                        {
                            Some(Field::Doi)
                        }
                        "ArticleId"
                            if parent == Some("ArticleIdList")
                                && !stack.iter().any(|s| s == "ReferenceList") =>
                        {
                            Some(Field::ArticleId(attr_value(&e, "IdType").unwrap_or_default()))
                        }
                        _ => None,
                    };
                    if let Some(field) = field {
                        capture = Some(Capture {
                            field,
                            depth: stack.len() + 1,
                            text: String::new(),
                        });
                    }
                }
                match name.as_str() {
                    "Author" => author = Some(AuthorName::default()),
                    "PubmedArticle" | "PubmedBookArticle" => saw_article = true,
                    "ERROR" => in_error = true,
                    _ => {}
                }
                stack.push(name);
            }
            Ok(Event::Text(e)) => {
                if let Some(c) = capture.as_mut() {
                    c.text.push_str(&text_of(&e));
                } else if in_error {
                    error.push_str(&text_of(&e));
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(c) = capture.as_mut() {
                    c.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(e)) => {
                if capture.as_ref().is_some_and(|c| c.depth == stack.len()) {
                    if let Some(done) = capture.take() {
                        let value = normalize_whitespace(&done.text);
                        match done.field {
                            Field::Title => title = value,
                            Field::Abstract => abstract_text = value,
                            Field::ForeName => {
                                if let Some(a) = author.as_mut() {
                                    a.fore = value;
                                }
                            }
                            Field::LastName => {
                                if let Some(a) = author.as_mut() {
                                    a.last = value;
                                }
                            }
                            Field::Doi => doi = value,
                            Field::ArticleId(kind) => match kind.as_str() {
                                "pmc" if pmc_id.is_none() => pmc_id = value,
                                "doi" if doi_id.is_none() => doi_id = value,
                                _ => {}
                            },
                        }
                    }
                }
                match e.local_name().as_ref() {
                    b"Author" => {
                        if let Some(AuthorName { fore: Some(fore), last: Some(last) }) = author.take() {
                            authors.push(format!("{} {}", fore, last));
                        }
                    }
                    b"ERROR" => in_error = false,
                    _ => {}
                }
                stack.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SourceError::Parse(format!("XML parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    if !saw_article && !error.trim().is_empty() {
        return Err(SourceError::Api(error.trim().to_string()));
    }

    // PMC first: open-access copies beat publisher landing pages.
    let full_text_link = pmc_id
        .map(|pmc| links.pmc_link(&pmc))
        .or_else(|| doi_id.map(|d| links.doi_link(&d)));

    Ok(ArticleRecord {
        id: id.to_string(),
        title,
        abstract_text,
        authors,
        doi,
        full_text_link,
    })
}
