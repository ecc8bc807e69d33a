/*!
 * Generation adapter contracts.
 *
 * Each external media service is modeled as a capability trait exposing a
 * single `produce` operation: given one unit descriptor, a small option set,
 * and a pre-reserved output path, it either writes the artifact and returns
 * a reference to it or returns a classified error. The orchestrator depends
 * only on these traits, never on a concrete provider, so any family can be
 * substituted or mocked in tests.
 *
 * Calls are idempotent on retry: a repeated call for the same unit writes to
 * the same unique path and overwrites any partial output.
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::Config;
use crate::errors::{AdapterError, AdapterFamily};
use crate::prompt_parser::SceneDescriptor;
use crate::script_parser::Utterance;

pub mod bgm;
pub mod image;
pub mod stock;
pub mod tts;

/// Reference to one generated artifact on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Where the artifact was written
    pub path: PathBuf,

    /// Measured media duration, when the family has one (audio, stock)
    pub duration: Option<Duration>,
}

impl Artifact {
    /// An artifact without a measurable duration
    pub fn file(path: PathBuf) -> Self {
        Self { path, duration: None }
    }

    /// An artifact with a measured duration
    pub fn timed(path: PathBuf, duration: Duration) -> Self {
        Self { path, duration: Some(duration) }
    }
}

/// Options for one narration synthesis call
#[derive(Debug, Clone)]
pub struct VoiceOptions {
    /// Prebuilt voice name for the speaker
    pub voice_name: String,
    /// BCP-47 language code
    pub language_code: String,
}

/// Options for one image generation call
#[derive(Debug, Clone)]
pub struct ImageOptions {
    /// Requested aspect ratio, e.g. "16:9"
    pub aspect_ratio: String,
    /// Number of candidate images to request
    pub image_count: u32,
}

/// Request for one background-music composition
#[derive(Debug, Clone)]
pub struct BgmRequest {
    /// Track mood, e.g. "neutral"
    pub mood: String,
    /// Track genre, e.g. "background"
    pub genre: String,
    /// Target track length, sized to total narration runtime
    pub target_duration: Duration,
}

/// One stock-footage search request
#[derive(Debug, Clone)]
pub struct StockQuery {
    /// Search keywords
    pub query: String,
    /// Clip orientation (landscape, portrait, square)
    pub orientation: String,
    /// Results requested per search
    pub per_page: u32,
}

/// Narration synthesis for one utterance
#[async_trait]
pub trait AudioAdapter: Send + Sync + Debug {
    /// Synthesize narration for `utterance`, writing the audio to `output`.
    /// The returned artifact carries the measured audio duration.
    async fn produce(
        &self,
        utterance: &Utterance,
        options: &VoiceOptions,
        output: &Path,
    ) -> Result<Artifact, AdapterError>;
}

/// Illustrative image generation for one scene
#[async_trait]
pub trait ImageAdapter: Send + Sync + Debug {
    /// Generate an image for `scene`, writing it to `output`.
    async fn produce(
        &self,
        scene: &SceneDescriptor,
        options: &ImageOptions,
        output: &Path,
    ) -> Result<Artifact, AdapterError>;
}

/// Background-music composition sized to a target duration
#[async_trait]
pub trait BgmAdapter: Send + Sync + Debug {
    /// Compose a track for `request`, writing it to `output`.
    async fn produce(&self, request: &BgmRequest, output: &Path) -> Result<Artifact, AdapterError>;
}

/// Stock-footage search and download
#[async_trait]
pub trait StockAdapter: Send + Sync + Debug {
    /// Search for footage matching `query` and download the best hit to `output`.
    async fn produce(&self, query: &StockQuery, output: &Path) -> Result<Artifact, AdapterError>;
}

/// Adapter handles for one pipeline run.
///
/// Constructed once per run and passed to the orchestrator; there is no
/// process-wide client state.
#[derive(Debug, Clone)]
pub struct AdapterSet {
    /// Narration synthesis
    pub audio: Arc<dyn AudioAdapter>,
    /// Image generation
    pub image: Arc<dyn ImageAdapter>,
    /// Background music
    pub bgm: Arc<dyn BgmAdapter>,
    /// Stock footage
    pub stock: Arc<dyn StockAdapter>,
}

impl AdapterSet {
    /// Build the production adapter set from configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            audio: Arc::new(tts::GeminiTts::new(
                &config.audio.endpoint,
                &config.audio.api_key,
                &config.audio.model,
                config.audio.sample_rate_hz,
            )),
            image: Arc::new(image::GeminiImage::new(
                &config.image.endpoint,
                &config.image.api_key,
                &config.image.model,
            )),
            bgm: Arc::new(bgm::Beatoven::new(&config.bgm.endpoint, &config.bgm.api_key)),
            stock: Arc::new(stock::PexelsVideo::new(&config.stock.endpoint, &config.stock.api_key)),
        }
    }
}

/// Map an HTTP response status to a classified adapter error.
///
/// 429 is a rate limit honoring Retry-After when present, 5xx is transient,
/// any other non-success status is permanent.
pub(crate) fn classify_status(
    family: AdapterFamily,
    status: reqwest::StatusCode,
    retry_after: Option<Duration>,
    message: String,
) -> AdapterError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        AdapterError::rate_limited(family, message, retry_after)
    } else if status.is_server_error() {
        AdapterError::transient(family, format!("{}: {}", status, message))
    } else {
        AdapterError::permanent(family, format!("{}: {}", status, message))
    }
}

/// Classified error for a failed request send (network layer); transient.
pub(crate) fn classify_send_error(family: AdapterFamily, error: reqwest::Error) -> AdapterError {
    AdapterError::transient(family, format!("request failed: {}", error))
}

/// Read the Retry-After header as a whole-second wait, when present and valid.
pub(crate) fn retry_after_header(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
