/*!
 * Mock adapter implementations for testing
 *
 * This module provides mock implementations of all generation adapters to
 * avoid external API calls in tests. Each adapter implements its capability
 * trait, writes a small placeholder artifact, and can be scripted to fail
 * specific units with specific error classes.
 */

use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use scriptreel::adapters::{
    AdapterSet, Artifact, AudioAdapter, BgmAdapter, BgmRequest, ImageAdapter, ImageOptions,
    StockAdapter, StockQuery, VoiceOptions,
};
use scriptreel::errors::{AdapterError, AdapterFamily};
use scriptreel::prompt_parser::SceneDescriptor;
use scriptreel::script_parser::Utterance;

/// Type of error to simulate
#[derive(Debug, Clone, Copy)]
pub enum MockErrorType {
    /// Retryable failure (network error, 5xx)
    Transient,
    /// Non-retryable failure (bad request, auth rejection)
    Permanent,
    /// Rate limit carrying a suggested wait
    RateLimit(Option<Duration>),
}

impl MockErrorType {
    fn build(self, family: AdapterFamily) -> AdapterError {
        match self {
            Self::Transient => AdapterError::transient(family, "simulated transient failure"),
            Self::Permanent => AdapterError::permanent(family, "simulated permanent failure"),
            Self::RateLimit(wait) => {
                AdapterError::rate_limited(family, "simulated rate limit", wait)
            }
        }
    }
}

/// Per-unit scripted failures plus call accounting, shared by all mocks
#[derive(Debug, Default)]
struct CallPlan {
    /// Errors to return, consumed front to back, keyed by sequence index
    failures: HashMap<usize, VecDeque<MockErrorType>>,
    /// Total produce() calls made, across all units
    call_count: usize,
    /// Calls per unit
    calls_per_unit: HashMap<usize, usize>,
}

impl CallPlan {
    // @returns: The next scripted error for a unit, consuming it
    fn next_failure(&mut self, sequence_index: usize) -> Option<MockErrorType> {
        self.call_count += 1;
        *self.calls_per_unit.entry(sequence_index).or_insert(0) += 1;
        self.failures.get_mut(&sequence_index).and_then(|queue| queue.pop_front())
    }
}

/// Shared handle for scripting and inspecting one mock adapter
#[derive(Debug, Clone, Default)]
pub struct MockController {
    plan: Arc<Mutex<CallPlan>>,
}

impl MockController {
    /// Script the next `count` calls for a unit to fail with `error_type`
    pub fn fail_next(&self, sequence_index: usize, count: usize, error_type: MockErrorType) {
        let mut plan = self.plan.lock().unwrap();
        let queue = plan.failures.entry(sequence_index).or_default();
        for _ in 0..count {
            queue.push_back(error_type);
        }
    }

    /// Total produce() calls made
    pub fn call_count(&self) -> usize {
        self.plan.lock().unwrap().call_count
    }

    /// Calls made for one unit
    pub fn calls_for(&self, sequence_index: usize) -> usize {
        self.plan.lock().unwrap().calls_per_unit.get(&sequence_index).copied().unwrap_or(0)
    }

    fn next_failure(&self, sequence_index: usize) -> Option<MockErrorType> {
        self.plan.lock().unwrap().next_failure(sequence_index)
    }
}

// @writes: A tiny placeholder artifact so timeline paths point at real files
fn write_placeholder(output: &Path, family: AdapterFamily) -> Result<(), AdapterError> {
    std::fs::write(output, b"mock artifact")
        .map_err(|e| AdapterError::permanent(family, format!("write failed: {}", e)))
}

/// Mock narration adapter with per-utterance scripted durations
#[derive(Debug)]
pub struct MockAudio {
    controller: MockController,
    /// Duration reported per sequence index; unlisted units get the default
    durations: HashMap<usize, Duration>,
    default_duration: Duration,
}

impl MockAudio {
    pub fn new() -> Self {
        Self {
            controller: MockController::default(),
            durations: HashMap::new(),
            default_duration: Duration::from_secs(2),
        }
    }

    /// Report `secs` as the measured duration for one utterance
    pub fn with_duration(mut self, sequence_index: usize, secs: f64) -> Self {
        self.durations.insert(sequence_index, Duration::from_secs_f64(secs));
        self
    }

    pub fn controller(&self) -> MockController {
        self.controller.clone()
    }
}

#[async_trait]
impl AudioAdapter for MockAudio {
    async fn produce(
        &self,
        utterance: &Utterance,
        _options: &VoiceOptions,
        output: &Path,
    ) -> Result<Artifact, AdapterError> {
        if let Some(error_type) = self.controller.next_failure(utterance.sequence_index) {
            return Err(error_type.build(AdapterFamily::Audio));
        }
        write_placeholder(output, AdapterFamily::Audio)?;
        let duration = self
            .durations
            .get(&utterance.sequence_index)
            .copied()
            .unwrap_or(self.default_duration);
        Ok(Artifact::timed(output.to_path_buf(), duration))
    }
}

/// Mock image adapter
#[derive(Debug, Default)]
pub struct MockImage {
    controller: MockController,
}

impl MockImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn controller(&self) -> MockController {
        self.controller.clone()
    }
}

#[async_trait]
impl ImageAdapter for MockImage {
    async fn produce(
        &self,
        scene: &SceneDescriptor,
        _options: &ImageOptions,
        output: &Path,
    ) -> Result<Artifact, AdapterError> {
        if let Some(error_type) = self.controller.next_failure(scene.scene_index) {
            return Err(error_type.build(AdapterFamily::Image));
        }
        write_placeholder(output, AdapterFamily::Image)?;
        Ok(Artifact::file(output.to_path_buf()))
    }
}

/// Mock BGM adapter recording the requested target duration
#[derive(Debug, Default)]
pub struct MockBgm {
    controller: MockController,
    last_target: Arc<Mutex<Option<Duration>>>,
}

impl MockBgm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn controller(&self) -> MockController {
        self.controller.clone()
    }

    /// Target duration from the most recent compose request
    pub fn last_target(&self) -> Arc<Mutex<Option<Duration>>> {
        self.last_target.clone()
    }
}

#[async_trait]
impl BgmAdapter for MockBgm {
    async fn produce(
        &self,
        request: &BgmRequest,
        output: &Path,
    ) -> Result<Artifact, AdapterError> {
        *self.last_target.lock().unwrap() = Some(request.target_duration);
        if let Some(error_type) = self.controller.next_failure(0) {
            return Err(error_type.build(AdapterFamily::Bgm));
        }
        write_placeholder(output, AdapterFamily::Bgm)?;
        Ok(Artifact::timed(output.to_path_buf(), request.target_duration))
    }
}

/// Mock stock-footage adapter
#[derive(Debug, Default)]
pub struct MockStock {
    controller: MockController,
}

impl MockStock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn controller(&self) -> MockController {
        self.controller.clone()
    }
}

#[async_trait]
impl StockAdapter for MockStock {
    async fn produce(
        &self,
        _query: &StockQuery,
        output: &Path,
    ) -> Result<Artifact, AdapterError> {
        // Stock queries carry no index, so failures are keyed on 0
        if let Some(error_type) = self.controller.next_failure(0) {
            return Err(error_type.build(AdapterFamily::Stock));
        }
        write_placeholder(output, AdapterFamily::Stock)?;
        Ok(Artifact::timed(output.to_path_buf(), Duration::from_secs(8)))
    }
}

/// Build an adapter set from the four mocks
pub fn mock_adapter_set(
    audio: MockAudio,
    image: MockImage,
    bgm: MockBgm,
    stock: MockStock,
) -> AdapterSet {
    AdapterSet {
        audio: Arc::new(audio),
        image: Arc::new(image),
        bgm: Arc::new(bgm),
        stock: Arc::new(stock),
    }
}
