use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::errors::ConfigError;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Output mode for a run
    #[serde(default)]
    pub output_mode: OutputMode,

    /// Per-speaker voice settings, keyed by normalized speaker id
    #[serde(default = "default_speakers")]
    pub speakers: HashMap<String, SpeakerConfig>,

    /// Narration (TTS) adapter settings
    #[serde(default)]
    pub audio: AudioConfig,

    /// Image generation adapter settings
    #[serde(default)]
    pub image: ImageConfig,

    /// Background music adapter settings
    #[serde(default)]
    pub bgm: BgmConfig,

    /// Stock footage adapter settings
    #[serde(default)]
    pub stock: StockConfig,

    /// Retry and per-call timeout settings shared by all adapters
    #[serde(default)]
    pub retry: RetryConfig,

    /// Per-family worker pool sizes
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    /// Render-mode output format table
    #[serde(default)]
    pub render: RenderConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Output mode for a pipeline run
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Numbered per-unit assets plus a timeline table for manual assembly
    #[default]
    Bundle,
    /// Assembled timeline handed to an external compositor via a manifest
    Render,
}

impl std::fmt::Display for OutputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bundle => write!(f, "bundle"),
            Self::Render => write!(f, "render"),
        }
    }
}

impl std::str::FromStr for OutputMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "bundle" => Ok(Self::Bundle),
            "render" => Ok(Self::Render),
            _ => Err(anyhow::anyhow!("Invalid output mode: {}", s)),
        }
    }
}

/// Voice settings for one speaker
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SpeakerConfig {
    // @field: Prebuilt voice name
    pub voice_name: String,

    // @field: BCP-47 language code for synthesis
    #[serde(default = "default_language_code")]
    pub language_code: String,
}

/// Narration adapter settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AudioConfig {
    // @field: Service URL
    #[serde(default = "default_audio_endpoint")]
    pub endpoint: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Model name
    #[serde(default = "default_audio_model")]
    pub model: String,

    // @field: PCM sample rate of synthesized audio
    #[serde(default = "default_sample_rate_hz")]
    pub sample_rate_hz: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            endpoint: default_audio_endpoint(),
            api_key: String::new(),
            model: default_audio_model(),
            sample_rate_hz: default_sample_rate_hz(),
        }
    }
}

/// Image generation adapter settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImageConfig {
    // @field: Stage toggle
    #[serde(default = "default_true")]
    pub enabled: bool,

    // @field: Service URL
    #[serde(default = "default_image_endpoint")]
    pub endpoint: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Model name
    #[serde(default = "default_image_model")]
    pub model: String,

    // @field: Aspect ratio requested per image
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,

    // @field: Candidate images requested per scene
    #[serde(default = "default_image_count")]
    pub image_count: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_image_endpoint(),
            api_key: String::new(),
            model: default_image_model(),
            aspect_ratio: default_aspect_ratio(),
            image_count: default_image_count(),
        }
    }
}

/// Background music adapter settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BgmConfig {
    // @field: Stage toggle
    #[serde(default = "default_true")]
    pub enabled: bool,

    // @field: Service URL
    #[serde(default = "default_bgm_endpoint")]
    pub endpoint: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Track mood
    #[serde(default = "default_bgm_mood")]
    pub mood: String,

    // @field: Track genre
    #[serde(default = "default_bgm_genre")]
    pub genre: String,

    // @field: Per-call timeout for one composition in seconds; composition
    // polls a long-running task, so this must cover the whole poll budget
    // rather than the shared retry.call_timeout_secs
    #[serde(default = "default_compose_timeout_secs")]
    pub compose_timeout_secs: u64,

    // @field: Seconds credited to an audio slot whose duration could not be
    // measured, both for BGM sizing and that slot's timeline window
    #[serde(default = "default_fallback_line_secs")]
    pub fallback_line_secs: u64,
}

impl Default for BgmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_bgm_endpoint(),
            api_key: String::new(),
            mood: default_bgm_mood(),
            genre: default_bgm_genre(),
            compose_timeout_secs: default_compose_timeout_secs(),
            fallback_line_secs: default_fallback_line_secs(),
        }
    }
}

/// One requested stock-footage search unit
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StockUnit {
    // @field: Scene index the clip is intended for
    pub scene_index: usize,

    // @field: Search keywords
    pub query: String,
}

/// Stock footage adapter settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StockConfig {
    // @field: Stage toggle
    #[serde(default)]
    pub enabled: bool,

    // @field: Service URL
    #[serde(default = "default_stock_endpoint")]
    pub endpoint: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Clip orientation (landscape, portrait, square)
    #[serde(default = "default_orientation")]
    pub orientation: String,

    // @field: Results requested per search
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    // @field: Requested search units
    #[serde(default)]
    pub units: Vec<StockUnit>,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_stock_endpoint(),
            api_key: String::new(),
            orientation: default_orientation(),
            per_page: default_per_page(),
            units: Vec::new(),
        }
    }
}

/// Retry and timeout settings shared by every adapter call
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryConfig {
    // @field: Attempt budget, including the first attempt
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    // @field: Base backoff in milliseconds, doubled on each retry
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    // @field: Upper bound for a single backoff wait
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    // @field: Fixed per-call timeout in seconds
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

/// Worker pool sizes per adapter family
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConcurrencyConfig {
    // @field: Concurrent narration calls
    #[serde(default = "default_audio_workers")]
    pub audio: usize,

    // @field: Concurrent image calls
    #[serde(default = "default_image_workers")]
    pub image: usize,

    // @field: Concurrent stock searches
    #[serde(default = "default_stock_workers")]
    pub stock: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            audio: default_audio_workers(),
            image: default_image_workers(),
            stock: default_stock_workers(),
        }
    }
}

/// One render-mode output format
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VideoFormat {
    // @field: Platform name used for the output filename
    pub name: String,
    // @field: Frame width in pixels
    pub width: u32,
    // @field: Frame height in pixels
    pub height: u32,
}

/// Render-mode settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RenderConfig {
    // @field: Target formats, one output per entry
    #[serde(default = "default_formats")]
    pub formats: Vec<VideoFormat>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { formats: default_formats() }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_speakers() -> HashMap<String, SpeakerConfig> {
    let mut speakers = HashMap::new();
    speakers.insert(
        "speaker1".to_string(),
        SpeakerConfig { voice_name: "Kore".to_string(), language_code: default_language_code() },
    );
    speakers.insert(
        "speaker2".to_string(),
        SpeakerConfig { voice_name: "Puck".to_string(), language_code: default_language_code() },
    );
    speakers
}

fn default_language_code() -> String {
    "ja-JP".to_string()
}

fn default_audio_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_audio_model() -> String {
    "gemini-2.5-flash-preview-tts".to_string()
}

fn default_sample_rate_hz() -> u32 {
    24_000
}

fn default_image_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_image_model() -> String {
    "gemini-2.0-flash-exp".to_string()
}

fn default_aspect_ratio() -> String {
    "16:9".to_string()
}

fn default_image_count() -> u32 {
    1
}

fn default_bgm_endpoint() -> String {
    "https://public-api.beatoven.ai".to_string()
}

fn default_bgm_mood() -> String {
    "neutral".to_string()
}

fn default_bgm_genre() -> String {
    "background".to_string()
}

fn default_compose_timeout_secs() -> u64 {
    330 // full 60-poll x 5s budget plus the compose and download calls
}

fn default_fallback_line_secs() -> u64 {
    5
}

fn default_stock_endpoint() -> String {
    "https://api.pexels.com".to_string()
}

fn default_orientation() -> String {
    "landscape".to_string()
}

fn default_per_page() -> u32 {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000 // 1 second base backoff time, doubled on each retry
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_call_timeout_secs() -> u64 {
    120
}

fn default_audio_workers() -> usize {
    2
}

fn default_image_workers() -> usize {
    2
}

fn default_stock_workers() -> usize {
    4
}

fn default_true() -> bool {
    true
}

fn default_formats() -> Vec<VideoFormat> {
    vec![
        VideoFormat { name: "youtube".to_string(), width: 1920, height: 1080 },
        VideoFormat { name: "shorts".to_string(), width: 1080, height: 1920 },
    ]
}

impl Config {
    /// Load a configuration file (JSON)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let file = File::open(path.as_ref())
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.as_ref().display(), e)))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.as_ref().display(), e)))
    }

    /// Write this configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let file = File::create(path.as_ref())
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.as_ref().display(), e)))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Validate the configuration for consistency and required values.
    ///
    /// Fails before any job is dispatched; the message names the exact
    /// missing credential or invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audio.api_key.is_empty() {
            return Err(ConfigError::MissingCredential(
                "audio.api_key is required for narration synthesis".to_string(),
            ));
        }
        if self.image.enabled && self.image.api_key.is_empty() {
            return Err(ConfigError::MissingCredential(
                "image.api_key is required while the image stage is enabled".to_string(),
            ));
        }
        if self.bgm.enabled && self.bgm.api_key.is_empty() {
            return Err(ConfigError::MissingCredential(
                "bgm.api_key is required while the bgm stage is enabled".to_string(),
            ));
        }
        if self.stock.enabled && self.stock.api_key.is_empty() {
            return Err(ConfigError::MissingCredential(
                "stock.api_key is required while the stock stage is enabled".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidSetting(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.bgm.fallback_line_secs == 0 {
            return Err(ConfigError::InvalidSetting(
                "bgm.fallback_line_secs must be at least 1".to_string(),
            ));
        }
        if self.bgm.enabled && self.bgm.compose_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting(
                "bgm.compose_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.concurrency.audio == 0 || self.concurrency.image == 0 || self.concurrency.stock == 0
        {
            return Err(ConfigError::InvalidSetting(
                "concurrency pool sizes must be at least 1".to_string(),
            ));
        }

        // Stock units reserve one output path per scene index, so a repeated
        // index would hand two concurrent jobs the same file
        let mut seen_indices = std::collections::HashSet::new();
        for unit in &self.stock.units {
            if !seen_indices.insert(unit.scene_index) {
                return Err(ConfigError::InvalidSetting(format!(
                    "stock.units contains scene_index {} more than once",
                    unit.scene_index
                )));
            }
        }

        Ok(())
    }

    /// Voice settings for a speaker, when one is configured
    pub fn speaker(&self, speaker_id: &str) -> Option<&SpeakerConfig> {
        self.speakers.get(speaker_id)
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            output_mode: OutputMode::default(),
            speakers: default_speakers(),
            audio: AudioConfig::default(),
            image: ImageConfig::default(),
            bgm: BgmConfig::default(),
            stock: StockConfig::default(),
            retry: RetryConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            render: RenderConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
