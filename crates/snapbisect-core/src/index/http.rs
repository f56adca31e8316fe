//! Snapshot index read from a remote directory listing.
//!
//! Works with autoindex-style HTML pages (every `href` is a candidate) and
//! with plain-text listings holding one entry per line.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use tracing::{debug, info, warn};

use super::patterns::PatternSet;
use super::{ArtifactIndex, UnmatchedPolicy};
use crate::config::BisectConfig;
use crate::domain::{ArtifactLocator, BisectError, Result, SnapshotCatalog};
use crate::history::HistoryProvider;

/// One link or line of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Target as written in the listing, relative or absolute.
    pub href: String,
    /// Last path segment, matched against the name patterns.
    pub name: String,
}

fn href_regex() -> &'static Regex {
    static HREF: OnceLock<Regex> = OnceLock::new();
    HREF.get_or_init(|| {
        Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).expect("href regex is valid")
    })
}

/// Extract candidate entries from a listing body, in listing order.
pub fn parse_listing(body: &str) -> Vec<ListingEntry> {
    let mut targets: Vec<&str> = href_regex()
        .captures_iter(body)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    if targets.is_empty() {
        targets = body
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('<'))
            .collect();
    }

    let mut seen = HashSet::new();
    targets
        .into_iter()
        .filter_map(|href| {
            if href.starts_with('?') || href.starts_with('#') {
                return None;
            }
            let path = href.split(|c: char| c == '?' || c == '#').next().unwrap_or(href);
            let name = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
            if name.is_empty() || name == "." || name == ".." {
                return None;
            }
            seen.insert(href).then(|| ListingEntry {
                href: href.to_string(),
                name: name.to_string(),
            })
        })
        .collect()
}

/// [`ArtifactIndex`] over an HTTP listing, resolving ids through history.
pub struct HttpArtifactIndex {
    http: reqwest::Client,
    base: Url,
    patterns: PatternSet,
    policy: UnmatchedPolicy,
    history: Arc<dyn HistoryProvider>,
}

impl HttpArtifactIndex {
    pub fn new(config: &BisectConfig, history: Arc<dyn HistoryProvider>) -> Result<Self> {
        let base = listing_url(config.require_index_url()?)?;
        let patterns = PatternSet::from_sources(&config.patterns)?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("snapbisect/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BisectError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(HttpArtifactIndex {
            http,
            base,
            patterns,
            policy: config.on_unmatched,
            history,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    async fn fetch_listing(&self) -> Result<String> {
        let index_err = |e: reqwest::Error| BisectError::Index(format!("{}: {e}", self.base));
        self.http
            .get(self.base.clone())
            .send()
            .await
            .map_err(index_err)?
            .error_for_status()
            .map_err(index_err)?
            .text()
            .await
            .map_err(index_err)
    }

    /// Build the catalog from an already fetched listing body.
    pub async fn catalog_from_listing(&self, body: &str) -> Result<SnapshotCatalog> {
        let mut catalog = SnapshotCatalog::new();
        let mut skipped = 0usize;

        for entry in parse_listing(body) {
            let Some(matched) = self.patterns.match_name(&entry.name) else {
                match self.policy {
                    UnmatchedPolicy::Fail => {
                        return Err(BisectError::UnparsableArtifactName(entry.name))
                    }
                    UnmatchedPolicy::Skip => {
                        warn!(entry = %entry.name, "listing entry matches no artifact pattern");
                        skipped += 1;
                        continue;
                    }
                }
            };

            let commit = match self.history.resolve_commit(&matched.commit_ref).await {
                Ok(commit) => commit,
                Err(err) if self.policy == UnmatchedPolicy::Skip => {
                    warn!(entry = %entry.name, error = %err, "skipping snapshot for unknown commit");
                    skipped += 1;
                    continue;
                }
                Err(err) => {
                    return Err(BisectError::Index(format!(
                        "{}: no commit for {}: {err}",
                        entry.name, matched.commit_ref
                    )))
                }
            };

            let url = self
                .base
                .join(&entry.href)
                .map_err(|e| BisectError::Index(format!("{}: {e}", entry.href)))?;
            debug!(entry = %entry.name, %commit, pattern = %matched.pattern, "parsed artifact name");

            let name = entry.name.clone();
            if !catalog.insert(commit.clone(), ArtifactLocator { name, url }) {
                debug!(entry = %entry.name, %commit, "commit already has an artifact; keeping the first");
            }
        }

        info!(snapshots = catalog.len(), skipped, "indexed snapshot listing");
        Ok(catalog)
    }
}

#[async_trait]
impl ArtifactIndex for HttpArtifactIndex {
    async fn list_snapshot_artifacts(&self) -> Result<SnapshotCatalog> {
        info!(url = %self.base, "fetching snapshot listing");
        let body = self.fetch_listing().await?;
        self.catalog_from_listing(&body).await
    }
}

/// Parse the listing URL, treating it as a directory so hrefs join under it.
fn listing_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw).map_err(|e| BisectError::Config(format!("index URL {raw}: {e}")))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_autoindex_html() {
        let body = r#"
            <html><body><h1>Index of /nightly</h1>
            <a href="?C=N;O=D">Name</a>
            <a href="../">Parent Directory</a>
            <a href="Viewer-3fa2c1d.dmg">Viewer-3fa2c1d.dmg</a>
            <a href='Viewer-9b01ac2.dmg'>Viewer-9b01ac2.dmg</a>
            <a href="Viewer-3fa2c1d.dmg">again</a>
            <a HREF="builds/0123456789abcdef0123456789abcdef01234567/">dir</a>
            </body></html>
        "#;
        let entries = parse_listing(body);
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Viewer-3fa2c1d.dmg",
                "Viewer-9b01ac2.dmg",
                "0123456789abcdef0123456789abcdef01234567",
            ]
        );
        assert_eq!(entries[2].href, "builds/0123456789abcdef0123456789abcdef01234567/");
    }

    #[test]
    fn parses_plain_text_listing() {
        let entries = parse_listing("viewer-aaaaaaa.zip\n\n  viewer-bbbbbbb.zip  \n");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].name, "viewer-bbbbbbb.zip");
    }

    #[test]
    fn strips_query_from_names() {
        let entries = parse_listing(r#"<a href="/files/viewer-ccccccc.zip?download=1">x</a>"#);
        assert_eq!(entries[0].name, "viewer-ccccccc.zip");
        assert_eq!(entries[0].href, "/files/viewer-ccccccc.zip?download=1");
    }

    #[test]
    fn listing_url_gains_trailing_slash() {
        let url = listing_url("https://snapshots.example.com/nightly").unwrap();
        assert_eq!(url.as_str(), "https://snapshots.example.com/nightly/");
        assert_eq!(
            url.join("Viewer-3fa2c1d.dmg").unwrap().as_str(),
            "https://snapshots.example.com/nightly/Viewer-3fa2c1d.dmg"
        );
        assert!(listing_url("not a url").is_err());
    }
}
