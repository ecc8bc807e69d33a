use std::path::Path;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use async_trait::async_trait;

use crate::adapters::{
    Artifact, ImageAdapter, ImageOptions, classify_send_error, classify_status,
    retry_after_header,
};
use crate::errors::{AdapterError, AdapterFamily};
use crate::prompt_parser::SceneDescriptor;

const FAMILY: AdapterFamily = AdapterFamily::Image;

/// Gemini image generation client.
#[derive(Debug)]
pub struct GeminiImage {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// API endpoint URL
    endpoint: String,
    /// Model name
    model: String,
}

/// Gemini generateContent request for image output
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    /// The prompt contents
    contents: Vec<RequestContent>,

    /// Generation settings selecting image output
    generation_config: ImageGenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageGenerationConfig {
    response_modalities: Vec<String>,
    candidate_count: u32,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    candidates: Vec<ImageCandidate>,
}

#[derive(Debug, Deserialize)]
struct ImageCandidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    inline_data: Option<ImageData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

impl ImageRequest {
    /// Build an image request; the aspect ratio travels in the prompt the
    /// way the service expects it
    pub fn new(prompt: impl Into<String>, options: &ImageOptions) -> Self {
        let prompt = format!("{} (aspect ratio {})", prompt.into(), options.aspect_ratio);
        Self {
            contents: vec![RequestContent { parts: vec![RequestPart { text: prompt }] }],
            generation_config: ImageGenerationConfig {
                response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
                candidate_count: options.image_count.max(1),
            },
        }
    }
}

impl GeminiImage {
    /// Create a new Gemini image client
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            model: model.into(),
        }
    }

    async fn generate(&self, request: &ImageRequest) -> Result<Vec<u8>, AdapterError> {
        let api_url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        );

        let response = self
            .client
            .post(&api_url)
            .header("x-goog-api-key", &self.api_key)
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

        let body: ImageResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::transient(FAMILY, format!("invalid response body: {}", e)))?;

        // First candidate part carrying inline image data wins
        let encoded = body
            .candidates
            .iter()
            .flat_map(|c| c.content.parts.iter())
            .find_map(|p| p.inline_data.as_ref())
            .map(|d| d.data.as_str())
            .ok_or_else(|| {
                AdapterError::permanent(FAMILY, "response carried no image data".to_string())
            })?;

        BASE64
            .decode(encoded)
            .map_err(|e| AdapterError::permanent(FAMILY, format!("invalid image payload: {}", e)))
    }
}

#[async_trait]
impl ImageAdapter for GeminiImage {
    async fn produce(
        &self,
        scene: &SceneDescriptor,
        options: &ImageOptions,
        output: &Path,
    ) -> Result<Artifact, AdapterError> {
        debug!("Generating image for scene {}", scene.scene_index);

        let request = ImageRequest::new(&scene.prompt_text, options);
        let bytes = self.generate(&request).await?;

        std::fs::write(output, &bytes).map_err(|e| {
            AdapterError::permanent(FAMILY, format!("failed to write {}: {}", output.display(), e))
        })?;

        Ok(Artifact::file(output.to_path_buf()))
    }
}
