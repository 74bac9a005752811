use anyhow::{anyhow, Result};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use url::Url;

pub const SEARCH_HOST: &str = "http://searxng:8080";
pub const SEARCH_MAX_RESULTS: usize = 10;
pub const SEARCH_BLOCKLIST: &str = r"^https:\/\/(?:old\.)?reddit\.com.*$";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the SearXNG instance
    pub host: String,
    pub max_results: usize,
    /// Regex of URLs to exclude
    pub blocklist: String,
    /// Check the blocklist against each result URL instead of the outgoing request URL.
    ///
    /// Off by default, in which case the pattern is compared with the outgoing request URL.
    /// The default pattern never matches that URL, so results pass unfiltered.
    pub filter_result_urls: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            host: SEARCH_HOST.to_string(),
            max_results: SEARCH_MAX_RESULTS,
            blocklist: SEARCH_BLOCKLIST.to_string(),
            filter_result_urls: false,
        }
    }
}

/// One result URL, with its 1-based position in the upstream result list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCandidate {
    pub rank: usize,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    parsed_url: Option<Vec<Value>>,
}

/// Queries SearXNG and turns its result list into fetch candidates
pub struct SearchSelector {
    client: Client,
    config: SearchConfig,
    blocklist: Regex,
}

impl SearchSelector {
    pub fn new(client: Client, config: SearchConfig) -> Result<Self> {
        let blocklist = Regex::new(&config.blocklist)
            .map_err(|e| anyhow!("Invalid search blocklist {:?}: {}", config.blocklist, e))?;
        Ok(Self {
            client,
            config,
            blocklist,
        })
    }

    pub fn max_results(&self) -> usize {
        self.config.max_results
    }

    fn request_url(&self, query: &str) -> Result<Url> {
        let base = format!("{}/search", self.config.host.trim_end_matches('/'));
        Url::parse_with_params(
            &base,
            &[("q", query), ("format", "json"), ("safesearch", "1")],
        )
        .map_err(|e| anyhow!("Invalid search endpoint {}: {}", base, e))
    }

    /// Run one query, returning candidates from the first `count` upstream positions in order.
    ///
    /// Entries that cannot be read still occupy a position. With `filter_result_urls`,
    /// blocklisted results are passed over without using one.
    pub async fn select(&self, query: &str, count: usize) -> Result<Vec<SearchCandidate>> {
        let started = Instant::now();
        let url = self.request_url(query)?;
        tracing::info!(url = %url, "Querying search engine");

        let response = self
            .client
            .get(url.clone())
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Search request failed: {}", status));
        }
        let body: Value = response.json().await?;

        let Some(results) = body.get("results").and_then(Value::as_array) else {
            tracing::error!("No 'results' key found or it's not an array");
            return Ok(Vec::new());
        };

        if !self.config.filter_result_urls && self.blocklist.is_match(url.as_str()) {
            tracing::warn!(url = %url, "Search request URL is blocklisted, dropping all results");
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        let mut positions = 0;
        for entry in results {
            if positions >= count {
                break;
            }
            let parsed_url = SearxngResult::deserialize(entry)
                .ok()
                .and_then(|result| result.parsed_url);
            let full_url = parsed_url.as_deref().and_then(join_parsed_url);
            if let Some(url) = &full_url {
                if self.config.filter_result_urls && self.blocklist.is_match(url) {
                    tracing::debug!(url = %url, "Skipping blocklisted result");
                    continue;
                }
            }
            positions += 1;

            let Some(full_url) = full_url else {
                tracing::debug!(entry = %entry, "Skipping unreadable search result");
                continue;
            };
            candidates.push(SearchCandidate {
                rank: candidates.len() + 1,
                url: full_url,
            });
        }

        tracing::info!(
            query,
            candidates = candidates.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Search completed"
        );
        Ok(candidates)
    }
}

/// Reassemble SearXNG's `parsed_url` (scheme, host, path, params, query, fragment).
///
/// Needs at least scheme and host as strings; other segments are optional.
fn join_parsed_url(parts: &[Value]) -> Option<String> {
    let segment = |i: usize| parts.get(i).and_then(Value::as_str).unwrap_or_default();
    let scheme = parts.first()?.as_str()?;
    let host = parts.get(1)?.as_str()?;
    if scheme.is_empty() || host.is_empty() {
        return None;
    }

    let mut url = format!("{}://{}", scheme, host);
    let path = segment(2);
    if !path.starts_with('/') {
        url.push('/');
    }
    url.push_str(path);
    for (index, separator) in [(3, ';'), (4, '?'), (5, '#')] {
        let value = segment(index);
        if !value.is_empty() {
            url.push(separator);
            url.push_str(value);
        }
    }
    Some(url)
}
