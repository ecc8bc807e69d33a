/*!
 * Pipeline orchestration.
 *
 * Sequences per-unit generation (audio, image, stock) through bounded
 * per-family worker pools, waits on the audio barrier, sizes background
 * music to the measured narration runtime, and folds every terminal job
 * into the final timeline. A failed job never aborts the run: it becomes a
 * `failed` row, and the run result reports exactly which units failed so a
 * caller can re-request only those. Media generation against third-party
 * services fails intermittently, and re-running a whole script for one bad
 * scene is unacceptable cost.
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use futures::stream::{self, StreamExt};
use log::{info, warn};
use serde_json::json;
use tokio::sync::Semaphore;

use crate::adapters::{AdapterSet, BgmRequest, ImageOptions, StockQuery, VoiceOptions};
use crate::app_config::{Config, OutputMode};
use crate::errors::AppError;
use crate::file_utils::BundleLayout;
use crate::pipeline::job::{GenerationJob, JobKind};
use crate::pipeline::timeline::{Timeline, TimelineAssembler};
use crate::prompt_parser::SceneDescriptor;
use crate::retry::RetryPolicy;
use crate::script_parser::Utterance;

/// One unit that reached the failed terminal state
#[derive(Debug, Clone)]
pub struct FailedUnit {
    /// Owning unit index
    pub sequence_index: usize,
    /// What the unit was supposed to produce
    pub kind: JobKind,
    /// The terminal error, rendered
    pub error: String,
}

/// Run-level result: the timeline plus the per-unit failure report
#[derive(Debug)]
pub struct RunOutcome {
    /// The assembled timeline, failures marked per row
    pub timeline: Timeline,
    /// True only if every dispatched job succeeded
    pub all_ok: bool,
    /// Exactly the units that failed, for targeted re-requests
    pub failed_units: Vec<FailedUnit>,
    /// The run directory artifacts were written to
    pub run_dir: PathBuf,
}

/// Per-stage progress callback: (kind, completed, total)
pub type ProgressCallback = Arc<dyn Fn(JobKind, usize, usize) + Send + Sync>;

/// Drives one pipeline run to completion.
///
/// Owns every [`GenerationJob`] for the run; the utterance and scene lists
/// are shared read-only across jobs.
pub struct PipelineOrchestrator {
    config: Config,
    adapters: AdapterSet,
    retry: RetryPolicy,
    cancel: Arc<AtomicBool>,
    progress: Option<ProgressCallback>,
}

impl PipelineOrchestrator {
    /// Create an orchestrator for one run
    pub fn new(config: Config, adapters: AdapterSet) -> Self {
        let retry = RetryPolicy::from_config(&config.retry);
        Self { config, adapters, retry, cancel: Arc::new(AtomicBool::new(false)), progress: None }
    }

    /// Attach a progress callback
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Handle that stops dispatch of new jobs when set; in-flight jobs
    /// finish or fail naturally and the partial timeline stays valid
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Run the pipeline over parsed units, writing artifacts under `run_dir`.
    ///
    /// Configuration problems abort before any dispatch; per-unit failures
    /// are folded into the timeline instead.
    pub async fn run(
        &self,
        utterances: &[Utterance],
        scenes: &[SceneDescriptor],
        run_dir: &Path,
    ) -> Result<RunOutcome, AppError> {
        self.config.validate()?;
        let layout = BundleLayout::prepare(run_dir).map_err(AppError::from)?;

        info!(
            "Starting run: {} utterances, {} scenes, mode {}",
            utterances.len(),
            scenes.len(),
            self.config.output_mode
        );

        // Audio, image, and stock have no ordering dependency on each other;
        // only BGM waits, on the audio barrier below
        let (audio_jobs, image_jobs, stock_jobs) = tokio::join!(
            self.run_audio_stage(utterances, &layout),
            self.run_image_stage(scenes, &layout),
            self.run_stock_stage(&layout),
        );

        // Audio barrier passed: every audio job is terminal (or was never
        // dispatched), so narration timing is now deterministic
        let assembler = TimelineAssembler::new(std::time::Duration::from_secs(
            self.config.bgm.fallback_line_secs,
        ));
        let narration_total = assembler.narration_total(&audio_jobs);

        let bgm_job = self.run_bgm_stage(narration_total, &layout).await;

        let timeline =
            assembler.assemble(&audio_jobs, scenes, &image_jobs, &stock_jobs, bgm_job.as_ref());

        match self.config.output_mode {
            OutputMode::Bundle => {
                timeline.write_table(&layout.timeline_path()).map_err(AppError::from)?;
            }
            OutputMode::Render => {
                self.write_render_manifest(&timeline, &layout)?;
            }
        }

        let mut failed_units = Vec::new();
        for job in audio_jobs
            .iter()
            .chain(image_jobs.iter())
            .chain(stock_jobs.iter())
            .chain(bgm_job.iter())
        {
            if let Some(error) = &job.last_error {
                failed_units.push(FailedUnit {
                    sequence_index: job.sequence_index,
                    kind: job.kind,
                    error: error.to_string(),
                });
            }
        }

        let all_ok = failed_units.is_empty() && !self.cancel.load(Ordering::SeqCst);
        let (ok, failed, skipped) = timeline.status_counts();
        info!(
            "Run finished: {} ok, {} failed, {} skipped, narration {:.1}s",
            ok,
            failed,
            skipped,
            narration_total.as_secs_f64()
        );

        Ok(RunOutcome { timeline, all_ok, failed_units, run_dir: run_dir.to_path_buf() })
    }

    async fn run_audio_stage(
        &self,
        utterances: &[Utterance],
        layout: &BundleLayout,
    ) -> Vec<GenerationJob> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.audio));
        let total = utterances.len();
        let completed = Arc::new(AtomicUsize::new(0));

        let mut jobs = stream::iter(utterances.iter())
            .map(|utterance| {
                let semaphore = semaphore.clone();
                let completed = completed.clone();
                let voice = self.voice_options_for(&utterance.speaker_id);
                let output = layout.audio_path(utterance.sequence_index, &utterance.speaker_id);

                async move {
                    let mut job = GenerationJob::new(utterance.sequence_index, JobKind::Audio);
                    if self.cancel.load(Ordering::SeqCst) {
                        return job;
                    }
                    let _permit = semaphore.acquire().await.unwrap();

                    job.begin();
                    let label = format!("audio line {}", utterance.sequence_index);
                    let adapter = self.adapters.audio.as_ref();
                    let voice_ref = &voice;
                    let output_ref = output.as_path();
                    let outcome = self
                        .retry
                        .run_observed(
                            JobKind::Audio.family(),
                            &label,
                            move || adapter.produce(utterance, voice_ref, output_ref),
                            |_, _| job.mark_retrying(),
                        )
                        .await;
                    match outcome.result {
                        Ok(artifact) => job.succeed(outcome.attempts, artifact),
                        Err(error) => job.fail(outcome.attempts, error),
                    }

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    self.report_progress(JobKind::Audio, done, total);
                    job
                }
            })
            .buffer_unordered(self.config.concurrency.audio)
            .collect::<Vec<_>>()
            .await;

        // Completion order never leaks into output order
        jobs.sort_by_key(|job| job.sequence_index);
        jobs
    }

    async fn run_image_stage(
        &self,
        scenes: &[SceneDescriptor],
        layout: &BundleLayout,
    ) -> Vec<GenerationJob> {
        if !self.config.image.enabled {
            return Vec::new();
        }

        let options = ImageOptions {
            aspect_ratio: self.config.image.aspect_ratio.clone(),
            image_count: self.config.image.image_count,
        };
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.image));
        let total = scenes.len();
        let completed = Arc::new(AtomicUsize::new(0));

        let mut jobs = stream::iter(scenes.iter())
            .map(|scene| {
                let semaphore = semaphore.clone();
                let completed = completed.clone();
                let options = options.clone();
                let output = layout.image_path(scene.scene_index);

                async move {
                    let mut job = GenerationJob::new(scene.scene_index, JobKind::Image);
                    if self.cancel.load(Ordering::SeqCst) {
                        return job;
                    }
                    let _permit = semaphore.acquire().await.unwrap();

                    job.begin();
                    let label = format!("image scene {}", scene.scene_index);
                    let adapter = self.adapters.image.as_ref();
                    let options_ref = &options;
                    let output_ref = output.as_path();
                    let outcome = self
                        .retry
                        .run_observed(
                            JobKind::Image.family(),
                            &label,
                            move || adapter.produce(scene, options_ref, output_ref),
                            |_, _| job.mark_retrying(),
                        )
                        .await;
                    match outcome.result {
                        Ok(artifact) => job.succeed(outcome.attempts, artifact),
                        Err(error) => job.fail(outcome.attempts, error),
                    }

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    self.report_progress(JobKind::Image, done, total);
                    job
                }
            })
            .buffer_unordered(self.config.concurrency.image)
            .collect::<Vec<_>>()
            .await;

        jobs.sort_by_key(|job| job.sequence_index);
        jobs
    }

    async fn run_stock_stage(&self, layout: &BundleLayout) -> Vec<GenerationJob> {
        if !self.config.stock.enabled || self.config.stock.units.is_empty() {
            return Vec::new();
        }

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.stock));
        let total = self.config.stock.units.len();
        let completed = Arc::new(AtomicUsize::new(0));

        let mut jobs = stream::iter(self.config.stock.units.iter())
            .map(|unit| {
                let semaphore = semaphore.clone();
                let completed = completed.clone();
                let query = StockQuery {
                    query: unit.query.clone(),
                    orientation: self.config.stock.orientation.clone(),
                    per_page: self.config.stock.per_page,
                };
                let output = layout.stock_path(unit.scene_index);

                async move {
                    let mut job = GenerationJob::new(unit.scene_index, JobKind::Stock);
                    if self.cancel.load(Ordering::SeqCst) {
                        return job;
                    }
                    let _permit = semaphore.acquire().await.unwrap();

                    job.begin();
                    let label = format!("stock scene {}", unit.scene_index);
                    let adapter = self.adapters.stock.as_ref();
                    let query_ref = &query;
                    let output_ref = output.as_path();
                    let outcome = self
                        .retry
                        .run_observed(
                            JobKind::Stock.family(),
                            &label,
                            move || adapter.produce(query_ref, output_ref),
                            |_, _| job.mark_retrying(),
                        )
                        .await;
                    match outcome.result {
                        Ok(artifact) => job.succeed(outcome.attempts, artifact),
                        Err(error) => job.fail(outcome.attempts, error),
                    }

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    self.report_progress(JobKind::Stock, done, total);
                    job
                }
            })
            .buffer_unordered(self.config.concurrency.stock)
            .collect::<Vec<_>>()
            .await;

        jobs.sort_by_key(|job| job.sequence_index);
        jobs
    }

    async fn run_bgm_stage(
        &self,
        narration_total: std::time::Duration,
        layout: &BundleLayout,
    ) -> Option<GenerationJob> {
        if !self.config.bgm.enabled {
            return None;
        }

        let mut job = GenerationJob::new(0, JobKind::Bgm);
        if self.cancel.load(Ordering::SeqCst) {
            return Some(job);
        }

        let request = BgmRequest {
            mood: self.config.bgm.mood.clone(),
            genre: self.config.bgm.genre.clone(),
            target_duration: narration_total,
        };
        let output = layout.bgm_path();

        job.begin();
        let adapter = self.adapters.bgm.as_ref();
        let request_ref = &request;
        let output_ref = output.as_path();
        // One compose call spans task creation, polling, and download, so it
        // runs under its own timeout rather than the one-shot call default
        let retry = self.retry.clone().with_call_timeout(std::time::Duration::from_secs(
            self.config.bgm.compose_timeout_secs,
        ));
        let outcome = retry
            .run_observed(
                JobKind::Bgm.family(),
                "bgm track",
                move || adapter.produce(request_ref, output_ref),
                |_, _| job.mark_retrying(),
            )
            .await;
        match outcome.result {
            Ok(artifact) => job.succeed(outcome.attempts, artifact),
            Err(error) => job.fail(outcome.attempts, error),
        }

        self.report_progress(JobKind::Bgm, 1, 1);
        Some(job)
    }

    // @returns: Voice settings for a speaker, falling back with a warning
    fn voice_options_for(&self, speaker_id: &str) -> VoiceOptions {
        match self.config.speaker(speaker_id) {
            Some(speaker) => VoiceOptions {
                voice_name: speaker.voice_name.clone(),
                language_code: speaker.language_code.clone(),
            },
            None => {
                warn!("No voice configured for {}, using default voice", speaker_id);
                VoiceOptions { voice_name: "Kore".to_string(), language_code: "ja-JP".to_string() }
            }
        }
    }

    fn write_render_manifest(
        &self,
        timeline: &Timeline,
        layout: &BundleLayout,
    ) -> Result<(), AppError> {
        let rows: Vec<serde_json::Value> = timeline
            .entries
            .iter()
            .map(|entry| {
                json!({
                    "sequence_index": entry.sequence_index,
                    "kind": entry.kind.to_string(),
                    "start_time": entry.start_time.as_secs_f64(),
                    "end_time": entry.end_time.as_secs_f64(),
                    "artifact_path": entry.artifact_path.as_ref().map(|p| p.to_string_lossy().into_owned()),
                    "status": entry.status.to_string(),
                })
            })
            .collect();

        let formats: Vec<serde_json::Value> = self
            .config
            .render
            .formats
            .iter()
            .map(|format| {
                json!({
                    "name": format.name,
                    "width": format.width,
                    "height": format.height,
                })
            })
            .collect();

        let manifest = json!({
            "total_duration": timeline.total_duration.as_secs_f64(),
            "formats": formats,
            "timeline": rows,
        });

        let body = serde_json::to_string_pretty(&manifest)
            .map_err(|e| AppError::Unknown(e.to_string()))?;
        std::fs::write(layout.manifest_path(), body).map_err(AppError::from)
    }

    fn report_progress(&self, kind: JobKind, completed: usize, total: usize) {
        if let Some(progress) = &self.progress {
            progress(kind, completed, total);
        }
    }
}
