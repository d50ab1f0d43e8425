//! Fetch Orchestrator: concurrency-limited, retrying, deadline-bounded
//! multi-source retrieval
//!
//! This is the only I/O component in the aggregation path. Fetches are
//! started eagerly, bounded by a semaphore, retried per source, and raced
//! against a global collection deadline. Sources still in flight at the
//! deadline are abandoned and omitted from the output — they are not
//! errors. Output order is completion order and carries no meaning; the
//! Transform Pipeline's sort stage owns ordering.

use crate::config::{FetchConfig, Identity};
use crate::error::{Error, FetchError, Result};
use crate::retry::retry_with_backoff;
use crate::types::{FetchOutcome, Source};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};

/// Concurrency-limited multi-source fetcher
pub struct FetchOrchestrator {
    client: reqwest::Client,
    config: FetchConfig,
}

impl FetchOrchestrator {
    /// Create an orchestrator with its own HTTP client
    ///
    /// # Errors
    /// Returns an error when the HTTP client cannot be built.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.attempt_timeout)
            .build()
            .map_err(Error::Network)?;
        Ok(Self { client, config })
    }

    /// Fetch every source under the configured collection deadline
    pub async fn fetch_all(&self, sources: &[Source]) -> Vec<FetchOutcome> {
        self.fetch_all_within(sources, self.config.collection_deadline)
            .await
    }

    /// Fetch every source under an explicit collection deadline
    ///
    /// The returned outcomes are unordered. A fully-failed source appears
    /// with its error; a source abandoned at the deadline does not appear
    /// at all.
    pub async fn fetch_all_within(
        &self,
        sources: &[Source],
        deadline: Duration,
    ) -> Vec<FetchOutcome> {
        if sources.is_empty() {
            return Vec::new();
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let (tx, mut rx) = mpsc::unbounded_channel::<FetchOutcome>();
        let mut handles = Vec::with_capacity(sources.len());

        for source in sources {
            let semaphore = semaphore.clone();
            let tx = tx.clone();
            let client = self.client.clone();
            let retry = self.config.retry.clone();
            let attempt_timeout = self.config.attempt_timeout;
            let identity = resolve_identity(&self.config.identity, source.custom_identity.as_ref());
            let source_id = source.id.clone();
            let url = source.uri.clone();

            handles.push(tokio::spawn(async move {
                // Queueing is FIFO: permits hand out in acquire order
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                let result = retry_with_backoff(&retry, || {
                    attempt(client.clone(), url.clone(), identity.clone(), attempt_timeout)
                })
                .await;
                tx.send(FetchOutcome { source_id, result }).ok();
            }));
        }
        drop(tx);

        let mut outcomes = Vec::with_capacity(sources.len());
        let deadline_sleep = tokio::time::sleep(deadline);
        tokio::pin!(deadline_sleep);

        loop {
            tokio::select! {
                outcome = rx.recv() => match outcome {
                    Some(outcome) => {
                        outcomes.push(outcome);
                        if outcomes.len() == sources.len() {
                            break;
                        }
                    }
                    None => break,
                },
                _ = &mut deadline_sleep => {
                    tracing::debug!(
                        received = outcomes.len(),
                        total = sources.len(),
                        "collection deadline reached, abandoning in-flight sources"
                    );
                    for handle in &handles {
                        handle.abort();
                    }
                    break;
                }
            }
        }
        outcomes
    }
}

fn resolve_identity(default: &Identity, custom: Option<&Identity>) -> Identity {
    match custom {
        None => default.clone(),
        Some(custom) => Identity {
            user_agent: custom
                .user_agent
                .clone()
                .or_else(|| default.user_agent.clone()),
            headers: default
                .headers
                .iter()
                .chain(custom.headers.iter())
                .cloned()
                .collect(),
        },
    }
}

/// One fetch attempt against one source endpoint
async fn attempt(
    client: reqwest::Client,
    url: String,
    identity: Identity,
    timeout: Duration,
) -> std::result::Result<String, FetchError> {
    let timeout_ms = timeout.as_millis() as u64;
    let mut request = client.get(&url);
    if let Some(user_agent) = &identity.user_agent {
        request = request.header(reqwest::header::USER_AGENT, user_agent);
    }
    for (name, value) in &identity.headers {
        request = request.header(name.as_str(), value.as_str());
    }

    let response = tokio::time::timeout(timeout, request.send())
        .await
        .map_err(|_| FetchError::Timeout { timeout_ms })?
        .map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout { timeout_ms }
            } else {
                FetchError::Connect(e.to_string())
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
        });
    }

    tokio::time::timeout(timeout, response.text())
        .await
        .map_err(|_| FetchError::Timeout { timeout_ms })?
        .map_err(|e| FetchError::Connect(e.to_string()))
}
