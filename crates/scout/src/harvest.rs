use anyhow::Result;
use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::extract::EvidenceDocument;
use crate::search::SearchCandidate;
use crate::providers::configs::OPENAI_MODEL;
use crate::token_counter::{TokenCounter, TokenMeter};

pub const TOKEN_BUDGET: usize = 70_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Once the buffer holds more tokens than this, workers that have not started yet skip their fetch
    pub token_budget: usize,
    /// Model whose tokenizer measures the buffer
    pub tokenizer_model: String,
    /// Local `tokenizer.json`, used instead of downloading one for `tokenizer_model`
    pub tokenizer_file: Option<PathBuf>,
    /// Per-page fetch timeout; `None` waits as long as the page takes
    pub fetch_timeout_secs: Option<u64>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            token_budget: TOKEN_BUDGET,
            tokenizer_model: OPENAI_MODEL.to_string(),
            tokenizer_file: None,
            fetch_timeout_secs: None,
        }
    }
}

impl HarvestConfig {
    /// Load the configured tokenizer. Blocking; may hit the network.
    pub fn load_token_counter(&self) -> TokenCounter {
        match &self.tokenizer_file {
            Some(path) => TokenCounter::from_file(&self.tokenizer_model, path),
            None => TokenCounter::new(&self.tokenizer_model),
        }
    }
}

/// What one harvest produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Harvest {
    /// Envelopes in the order their fetches completed
    pub text: String,
    pub appended: usize,
    pub skipped: usize,
    /// Whether the cancellation signal was raised by the end of the run
    pub cancelled: bool,
}

/// Fetches candidate pages concurrently into one token-budgeted buffer.
///
/// Cancellation is advisory: a worker only checks the signal before it starts fetching,
/// so every worker that got past the check still appends its page in full. The buffer
/// can therefore end up above the budget by up to one page per concurrent worker.
pub struct EvidenceHarvester {
    client: Client,
    meter: Arc<dyn TokenMeter>,
    config: HarvestConfig,
}

enum WorkerOutcome {
    Skipped,
    Appended,
}

struct Worker {
    client: Client,
    meter: Arc<dyn TokenMeter>,
    buffer: Arc<Mutex<String>>,
    cancel: CancellationToken,
    token_budget: usize,
    fetch_timeout: Option<Duration>,
}

impl EvidenceHarvester {
    pub fn new(client: Client, meter: Arc<dyn TokenMeter>, config: HarvestConfig) -> Self {
        Self {
            client,
            meter,
            config,
        }
    }

    pub async fn harvest(&self, candidates: &[SearchCandidate]) -> Harvest {
        self.harvest_with(candidates, CancellationToken::new()).await
    }

    /// Harvest under a caller-provided cancellation signal
    pub async fn harvest_with(
        &self,
        candidates: &[SearchCandidate],
        cancel: CancellationToken,
    ) -> Harvest {
        let started = Instant::now();
        let buffer = Arc::new(Mutex::new(String::new()));

        let handles: Vec<_> = candidates
            .iter()
            .map(|candidate| {
                let worker = Worker {
                    client: self.client.clone(),
                    meter: Arc::clone(&self.meter),
                    buffer: Arc::clone(&buffer),
                    cancel: cancel.clone(),
                    token_budget: self.config.token_budget,
                    fetch_timeout: self.config.fetch_timeout_secs.map(Duration::from_secs),
                };
                tokio::spawn(worker.run(candidate.url.clone()).in_current_span())
            })
            .collect();

        let mut harvest = Harvest::default();
        for outcome in join_all(handles).await {
            match outcome {
                Ok(WorkerOutcome::Appended) => harvest.appended += 1,
                Ok(WorkerOutcome::Skipped) => harvest.skipped += 1,
                Err(e) => {
                    tracing::error!(error = %e, "Harvest worker failed");
                    harvest.skipped += 1;
                }
            }
        }

        harvest.text = buffer.lock().await.clone();
        harvest.cancelled = cancel.is_cancelled();

        tracing::info!(
            candidates = candidates.len(),
            appended = harvest.appended,
            skipped = harvest.skipped,
            cancelled = harvest.cancelled,
            evidence_length = harvest.text.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Harvest completed"
        );
        harvest
    }
}

impl Worker {
    async fn run(self, url: String) -> WorkerOutcome {
        if self.cancel.is_cancelled() {
            tracing::debug!(url = %url, "Token budget exhausted, skipping fetch");
            return WorkerOutcome::Skipped;
        }

        let url = with_scheme(&url);
        let document = match self.fetch(&url).await {
            Ok(body) => EvidenceDocument::from_html(&url, &body),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Failed to fetch page");
                EvidenceDocument::unreadable(&url, e)
            }
        };
        let envelope = document.render();

        let mut buffer = self.buffer.lock().await;
        buffer.push_str(&envelope);
        match self.meter.count_tokens(&buffer) {
            Some(tokens) if tokens > self.token_budget => {
                if !self.cancel.is_cancelled() {
                    tracing::info!(
                        url = %url,
                        tokens,
                        budget = self.token_budget,
                        "Token budget exceeded, cancelling remaining fetches"
                    );
                }
                self.cancel.cancel();
            }
            Some(_) => {}
            None => tracing::debug!(url = %url, "Token count unavailable"),
        }
        WorkerOutcome::Appended
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let mut request = self.client.get(url);
        if let Some(timeout) = self.fetch_timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

fn with_scheme(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}
