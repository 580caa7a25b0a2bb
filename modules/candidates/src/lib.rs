//! Candidate edge ranges: fetch a plain-text range list and sanitize it into
//! scannable entries. Ranges are kept whole, never expanded into hosts.

use async_trait::async_trait;
use futures::future::join_all;
use reality_core::CandidateAddress;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;

/// The provider's published IPv4 and IPv6 edge ranges.
pub const DEFAULT_LIST_URLS: &[&str] = &[
    "https://www.cloudflare.com/ips-v4",
    "https://www.cloudflare.com/ips-v6",
];

/// Offline copy of the provider's IPv4 list.
pub const BUILTIN_EDGE_LIST: &str = "173.245.48.0/20
103.21.244.0/22
103.22.200.0/22
103.31.4.0/22
141.101.64.0/18
108.162.192.0/18
190.93.240.0/20
188.114.96.0/20
197.234.240.0/22
198.41.128.0/17
162.158.0.0/15
104.16.0.0/13
104.24.0.0/14
172.64.0.0/13
131.0.72.0/22";

const SECTION_MARKERS: &[&str] = &["IPV4_START", "IPV4_END", "IPV6_START", "IPV6_END"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("candidate source unavailable: {reason}")]
pub struct SourceUnavailable {
    pub reason: String,
}

impl SourceUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        SourceUnavailable { reason: reason.into() }
    }
}

#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Short human label for logs.
    fn describe(&self) -> String;

    /// Fetch and sanitize the list. Safe to call again after a failure.
    async fn fetch_candidates(&self) -> Result<Vec<CandidateAddress>, SourceUnavailable>;
}

/// Split a range list into entries: blank lines, `#` comments and section
/// markers are skipped, and lines that are neither a network nor an address
/// are dropped. Input order is kept.
pub fn parse_candidate_list(text: &str) -> Vec<CandidateAddress> {
    let mut out = Vec::new();
    for line in text.lines() {
        let t = line.trim();
        if t.is_empty() || t.starts_with('#') || SECTION_MARKERS.contains(&t) {
            continue;
        }
        match CandidateAddress::parse_entry(t) {
            Some(c) => out.push(c),
            None => tracing::warn!(line = %t, "ignoring unparseable range entry"),
        }
    }
    out
}

fn parse_non_empty(text: &str, origin: &str) -> Result<Vec<CandidateAddress>, SourceUnavailable> {
    let list = parse_candidate_list(text);
    if list.is_empty() {
        return Err(SourceUnavailable::new(format!("{origin}: no parseable ranges")));
    }
    tracing::debug!(origin, count = list.len(), "parsed candidate list");
    Ok(list)
}

/// Fetches all list URLs at once; succeeds if any of them answers. Bodies
/// are joined in URL order.
pub struct HttpListSource {
    client: Client,
    urls: Vec<String>,
}

impl HttpListSource {
    pub fn new(urls: Vec<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("reality-wizard/{}", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()?;
        Ok(Self::with_client(client, urls))
    }

    pub fn with_client(client: Client, urls: Vec<String>) -> Self {
        HttpListSource { client, urls }
    }

    pub fn default_urls() -> Vec<String> {
        DEFAULT_LIST_URLS.iter().map(|s| s.to_string()).collect()
    }

    async fn fetch_text(&self, url: &str) -> anyhow::Result<String> {
        let resp = self.client.get(url).send().await?.error_for_status()?;
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl CandidateSource for HttpListSource {
    fn describe(&self) -> String {
        self.urls.join(", ")
    }

    async fn fetch_candidates(&self) -> Result<Vec<CandidateAddress>, SourceUnavailable> {
        if self.urls.is_empty() {
            return Err(SourceUnavailable::new("no list urls configured"));
        }
        let fetched = join_all(self.urls.iter().map(|url| self.fetch_text(url))).await;
        let mut bodies = Vec::new();
        let mut errors = Vec::new();
        for (url, outcome) in self.urls.iter().zip(fetched) {
            match outcome {
                Ok(body) => bodies.push(body),
                Err(e) => {
                    tracing::warn!(%url, error = %e, "range list fetch failed");
                    errors.push(format!("{url}: {e}"));
                }
            }
        }
        if bodies.is_empty() {
            return Err(SourceUnavailable::new(errors.join("; ")));
        }
        parse_non_empty(&bodies.join("\n"), &self.describe())
    }
}

/// A fixed list, e.g. [`BUILTIN_EDGE_LIST`].
pub struct StaticListSource {
    text: String,
}

impl StaticListSource {
    pub fn new(text: impl Into<String>) -> Self {
        StaticListSource { text: text.into() }
    }

    pub fn builtin() -> Self {
        Self::new(BUILTIN_EDGE_LIST)
    }
}

#[async_trait]
impl CandidateSource for StaticListSource {
    fn describe(&self) -> String {
        "built-in list".into()
    }

    async fn fetch_candidates(&self) -> Result<Vec<CandidateAddress>, SourceUnavailable> {
        parse_non_empty(&self.text, "built-in list")
    }
}

/// Newline-delimited list on disk.
pub struct FileListSource {
    path: PathBuf,
}

impl FileListSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileListSource { path: path.into() }
    }
}

#[async_trait]
impl CandidateSource for FileListSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch_candidates(&self) -> Result<Vec<CandidateAddress>, SourceUnavailable> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SourceUnavailable::new(format!("{}: {e}", self.path.display())))?;
        parse_non_empty(&text, &self.describe())
    }
}
