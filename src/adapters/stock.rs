use std::path::Path;
use std::time::Duration;

use log::debug;
use reqwest::Client;
use serde::Deserialize;

use async_trait::async_trait;

use crate::adapters::{
    Artifact, StockAdapter, StockQuery, classify_send_error, classify_status, retry_after_header,
};
use crate::errors::{AdapterError, AdapterFamily};

const FAMILY: AdapterFamily = AdapterFamily::Stock;

/// Pexels video search client: one search per requested unit, downloading the
/// first matching clip file.
#[derive(Debug)]
pub struct PexelsVideo {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// API endpoint URL
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    videos: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Video {
    /// Clip length in whole seconds
    #[serde(default)]
    duration: u64,

    #[serde(default)]
    video_files: Vec<VideoFile>,
}

#[derive(Debug, Deserialize)]
struct VideoFile {
    link: String,
}

impl PexelsVideo {
    /// Create a new Pexels client
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

    async fn search(&self, query: &StockQuery) -> Result<Video, AdapterError> {
        let api_url = format!("{}/videos/search", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .get(&api_url)
            .header("Authorization", &self.api_key)
            .query(&[
                ("query", query.query.as_str()),
                ("per_page", &query.per_page.to_string()),
                ("orientation", query.orientation.as_str()),
            ])
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

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::transient(FAMILY, format!("invalid response body: {}", e)))?;

        body.videos.into_iter().next().ok_or_else(|| {
            AdapterError::permanent(FAMILY, format!("no footage found for {:?}", query.query))
        })
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
            return Err(classify_status(FAMILY, status, None, "clip download failed".to_string()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AdapterError::transient(FAMILY, format!("clip download failed: {}", e)))?;

        std::fs::write(output, &bytes).map_err(|e| {
            AdapterError::permanent(FAMILY, format!("failed to write {}: {}", output.display(), e))
        })
    }
}

#[async_trait]
impl StockAdapter for PexelsVideo {
    async fn produce(&self, query: &StockQuery, output: &Path) -> Result<Artifact, AdapterError> {
        debug!("Searching stock footage: {:?}", query.query);

        let video = self.search(query).await?;
        let file = video.video_files.first().ok_or_else(|| {
            AdapterError::permanent(FAMILY, format!("hit for {:?} carried no files", query.query))
        })?;

        self.download(&file.link, output).await?;

        let duration =
            (video.duration > 0).then(|| Duration::from_secs(video.duration));
        Ok(Artifact { path: output.to_path_buf(), duration })
    }
}
