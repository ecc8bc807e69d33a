use std::path::Path;
use std::time::Duration;

use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use async_trait::async_trait;

use crate::adapters::{
    Artifact, BgmAdapter, BgmRequest, classify_send_error, classify_status, retry_after_header,
};
use crate::errors::{AdapterError, AdapterFamily};

const FAMILY: AdapterFamily = AdapterFamily::Bgm;

/// Poll cadence while a composition task is running
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Poll budget before the task is treated as stuck
const MAX_POLLS: u32 = 60;

/// Beatoven composition client: create a track task, poll it, download the
/// finished track.
#[derive(Debug)]
pub struct Beatoven {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// API endpoint URL
    endpoint: String,
}

/// Track composition request
#[derive(Debug, Serialize)]
pub struct ComposeRequest {
    /// Natural-language track prompt
    prompt: ComposePrompt,

    /// Track length in seconds
    duration: u64,
}

#[derive(Debug, Serialize)]
struct ComposePrompt {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ComposeResponse {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct TaskResponse {
    status: String,
    #[serde(default)]
    meta: Option<TaskMeta>,
}

#[derive(Debug, Deserialize)]
struct TaskMeta {
    #[serde(default)]
    track_url: Option<String>,
}

impl ComposeRequest {
    /// Build a composition request from mood, genre, and target duration
    pub fn new(request: &BgmRequest) -> Self {
        Self {
            prompt: ComposePrompt {
                text: format!("{} {} instrumental track", request.mood, request.genre),
            },
            duration: request.target_duration.as_secs().max(10),
        }
    }
}

impl Beatoven {
    /// Create a new Beatoven client
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        }
    }

    /// Upper bound on one composition's polling phase.
    ///
    /// A per-call timeout wrapped around [`BgmAdapter::produce`] must cover
    /// at least this much or the poll budget can never be consumed.
    pub fn poll_budget() -> Duration {
        POLL_INTERVAL * MAX_POLLS
    }

    async fn start_compose(&self, request: &ComposeRequest) -> Result<String, AdapterError> {
        let api_url = format!("{}/api/v1/tracks/compose", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&api_url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| classify_send_error(FAMILY, e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_header(&response);
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            return Err(classify_status(FAMILY, status, retry_after, error_text));
        }

        let compose: ComposeResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::transient(FAMILY, format!("invalid response body: {}", e)))?;

        Ok(compose.task_id)
    }

    async fn poll_track(&self, task_id: &str) -> Result<String, AdapterError> {
        let api_url =
            format!("{}/api/v1/tasks/{}", self.endpoint.trim_end_matches('/'), task_id);

        for _ in 0..MAX_POLLS {
            let response = self
                .client
                .get(&api_url)
                .bearer_auth(&self.api_key)
                .send()
                .await
                .map_err(|e| classify_send_error(FAMILY, e))?;

            let status = response.status();
            if !status.is_success() {
                let retry_after = retry_after_header(&response);
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Failed to get error response text".to_string());
                return Err(classify_status(FAMILY, status, retry_after, error_text));
            }

            let task: TaskResponse = response.json().await.map_err(|e| {
                AdapterError::transient(FAMILY, format!("invalid response body: {}", e))
            })?;

            match task.status.as_str() {
                "composed" => {
                    return task
                        .meta
                        .and_then(|m| m.track_url)
                        .ok_or_else(|| {
                            AdapterError::permanent(
                                FAMILY,
                                "composed task carried no track URL".to_string(),
                            )
                        });
                }
                "failed" => {
                    return Err(AdapterError::transient(
                        FAMILY,
                        format!("composition task {} failed", task_id),
                    ));
                }
                other => {
                    debug!("Composition task {} still {}", task_id, other);
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }

        Err(AdapterError::transient(
            FAMILY,
            format!("composition task {} did not finish within the poll budget", task_id),
        ))
    }

    async fn download(&self, url: &str, output: &Path) -> Result<(), AdapterError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_send_error(FAMILY, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(FAMILY, status, None, "track download failed".to_string()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AdapterError::transient(FAMILY, format!("track download failed: {}", e)))?;

        std::fs::write(output, &bytes).map_err(|e| {
            AdapterError::permanent(FAMILY, format!("failed to write {}: {}", output.display(), e))
        })
    }
}

#[async_trait]
impl BgmAdapter for Beatoven {
    async fn produce(&self, request: &BgmRequest, output: &Path) -> Result<Artifact, AdapterError> {
        debug!(
            "Composing BGM: mood={}, genre={}, target={:?}",
            request.mood, request.genre, request.target_duration
        );

        let compose = ComposeRequest::new(request);
        let task_id = self.start_compose(&compose).await?;
        let track_url = self.poll_track(&task_id).await?;
        self.download(&track_url, output).await?;

        Ok(Artifact::timed(output.to_path_buf(), request.target_duration))
    }
}
