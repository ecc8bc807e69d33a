use std::io::Write;
use std::path::Path;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use async_trait::async_trait;

use crate::adapters::{
    Artifact, AudioAdapter, VoiceOptions, classify_send_error, classify_status,
    retry_after_header,
};
use crate::errors::{AdapterError, AdapterFamily};
use crate::script_parser::Utterance;

const FAMILY: AdapterFamily = AdapterFamily::Audio;

/// Gemini TTS client for narration synthesis.
///
/// The service returns base64 PCM (s16le, mono); the adapter writes a WAV
/// container and derives the measured duration from the PCM length.
#[derive(Debug)]
pub struct GeminiTts {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// API endpoint URL
    endpoint: String,
    /// Model name
    model: String,
    /// PCM sample rate of the returned audio
    sample_rate_hz: u32,
}

/// Gemini generateContent request for speech synthesis
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechRequest {
    /// The text contents to synthesize
    contents: Vec<Content>,

    /// Generation settings selecting audio output and the voice
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
    speech_config: SpeechConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Debug, Deserialize)]
struct SpeechResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

impl SpeechRequest {
    /// Build a synthesis request for one pronunciation text and voice
    pub fn new(text: impl Into<String>, voice_name: impl Into<String>) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part { text: Some(text.into()), inline_data: None }],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: voice_name.into(),
                        },
                    },
                },
            },
        }
    }
}

impl GeminiTts {
    /// Create a new Gemini TTS client
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        sample_rate_hz: u32,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            model: model.into(),
            sample_rate_hz,
        }
    }

    async fn synthesize(&self, text: &str, voice_name: &str) -> Result<Vec<u8>, AdapterError> {
        let api_url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        );

        let request = SpeechRequest::new(text, voice_name);
        let response = self
            .client
            .post(&api_url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
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

        let speech: SpeechResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::transient(FAMILY, format!("invalid response body: {}", e)))?;

        let encoded = speech
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .and_then(|p| p.inline_data.as_ref())
            .map(|d| d.data.as_str())
            .ok_or_else(|| {
                AdapterError::permanent(FAMILY, "response carried no audio data".to_string())
            })?;

        BASE64
            .decode(encoded)
            .map_err(|e| AdapterError::permanent(FAMILY, format!("invalid audio payload: {}", e)))
    }
}

#[async_trait]
impl AudioAdapter for GeminiTts {
    async fn produce(
        &self,
        utterance: &Utterance,
        options: &VoiceOptions,
        output: &Path,
    ) -> Result<Artifact, AdapterError> {
        debug!(
            "Synthesizing line {} ({}, voice {})",
            utterance.sequence_index, utterance.speaker_id, options.voice_name
        );

        // Pronunciation text carries the readings, not the surface forms
        let pcm = self.synthesize(&utterance.reading_text(), &options.voice_name).await?;

        write_wav(output, &pcm, self.sample_rate_hz)
            .map_err(|e| AdapterError::permanent(FAMILY, format!("failed to write {}: {}", output.display(), e)))?;

        Ok(Artifact::timed(output.to_path_buf(), pcm_duration(pcm.len(), self.sample_rate_hz)))
    }
}

/// Measured duration of a mono s16le PCM buffer
pub fn pcm_duration(pcm_len: usize, sample_rate_hz: u32) -> Duration {
    let bytes_per_second = sample_rate_hz as f64 * 2.0;
    Duration::from_secs_f64(pcm_len as f64 / bytes_per_second)
}

/// Write mono s16le PCM into a minimal WAV container
pub fn write_wav(path: &Path, pcm: &[u8], sample_rate_hz: u32) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;

    let data_len = pcm.len() as u32;
    let byte_rate = sample_rate_hz * 2;

    file.write_all(b"RIFF")?;
    file.write_all(&(36 + data_len).to_le_bytes())?;
    file.write_all(b"WAVE")?;
    file.write_all(b"fmt ")?;
    file.write_all(&16u32.to_le_bytes())?;
    file.write_all(&1u16.to_le_bytes())?; // PCM
    file.write_all(&1u16.to_le_bytes())?; // mono
    file.write_all(&sample_rate_hz.to_le_bytes())?;
    file.write_all(&byte_rate.to_le_bytes())?;
    file.write_all(&2u16.to_le_bytes())?; // block align
    file.write_all(&16u16.to_le_bytes())?; // bits per sample
    file.write_all(b"data")?;
    file.write_all(&data_len.to_le_bytes())?;
    file.write_all(pcm)?;

    Ok(())
}
