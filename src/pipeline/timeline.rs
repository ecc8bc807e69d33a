/*!
 * Timeline assembly.
 *
 * Folds terminal generation jobs into the final time-indexed rows. Audio
 * timing is cumulative over measured durations in sequence order, never
 * wall-clock generation time; failed rows keep their place with an explicit
 * status so downstream tooling can re-request exactly the missing units.
 */

use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::warn;

use crate::pipeline::job::{GenerationJob, JobKind, JobState};
use crate::prompt_parser::SceneDescriptor;

/// Outcome recorded on one timeline row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// The unit's artifact was generated
    Ok,
    /// Generation failed terminally; the artifact reference is empty
    Failed,
    /// The unit was never dispatched (cancellation)
    Skipped,
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "ok",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        write!(f, "{}", name)
    }
}

/// One row of the final index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    /// Owning unit index; rows are ordered by `(sequence_index, kind)`
    pub sequence_index: usize,

    /// What the row refers to
    pub kind: JobKind,

    /// Row start offset from the beginning of the piece
    pub start_time: Duration,

    /// Row end offset
    pub end_time: Duration,

    /// Artifact location; empty for failed and skipped rows
    pub artifact_path: Option<PathBuf>,

    /// Row outcome
    pub status: EntryStatus,
}

impl fmt::Display for TimelineEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{}",
            self.sequence_index,
            self.kind,
            fmt_secs(self.start_time),
            fmt_secs(self.end_time),
            self.artifact_path.as_deref().map(Path::to_string_lossy).unwrap_or_default(),
            self.status
        )
    }
}

/// The final ordered index for one run
#[derive(Debug, Default)]
pub struct Timeline {
    /// Rows, ordered by `(sequence_index, kind)`
    pub entries: Vec<TimelineEntry>,

    /// Total narration runtime (the audio track's extent)
    pub total_duration: Duration,
}

impl Timeline {
    /// Rows that failed, as `(sequence_index, kind)` pairs in table order
    pub fn failed_units(&self) -> Vec<(usize, JobKind)> {
        self.entries
            .iter()
            .filter(|e| e.status == EntryStatus::Failed)
            .map(|e| (e.sequence_index, e.kind))
            .collect()
    }

    /// Generated image rows whose scene windows overlap, as
    /// `(earlier, later)` scene-index pairs in start order.
    ///
    /// Sweeps with the widest window seen so far, so a wide window that
    /// spills past several later ones is reported against each of them,
    /// not only its immediate neighbor.
    pub fn overlapping_images(&self) -> Vec<(usize, usize)> {
        let mut images: Vec<&TimelineEntry> = self
            .entries
            .iter()
            .filter(|e| e.kind == JobKind::Image && e.status == EntryStatus::Ok)
            .collect();
        images.sort_by_key(|e| e.start_time);

        let mut pairs = Vec::new();
        let mut widest: Option<&TimelineEntry> = None;
        for entry in images {
            if let Some(prev) = widest {
                if entry.start_time < prev.end_time {
                    pairs.push((prev.sequence_index, entry.sequence_index));
                }
            }
            if widest.is_none_or(|prev| entry.end_time > prev.end_time) {
                widest = Some(entry);
            }
        }
        pairs
    }

    /// Row count per status, as (ok, failed, skipped)
    pub fn status_counts(&self) -> (usize, usize, usize) {
        let mut counts = (0, 0, 0);
        for entry in &self.entries {
            match entry.status {
                EntryStatus::Ok => counts.0 += 1,
                EntryStatus::Failed => counts.1 += 1,
                EntryStatus::Skipped => counts.2 += 1,
            }
        }
        counts
    }

    /// Serialize to the delimited table format
    pub fn to_table(&self) -> String {
        let mut table =
            String::from("sequence_index,kind,start_time,end_time,artifact_path,status\n");
        for entry in &self.entries {
            table.push_str(&entry.to_string());
            table.push('\n');
        }
        table
    }

    /// Write the table to a file
    pub fn write_table(&self, path: &Path) -> Result<()> {
        let mut file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        file.write_all(self.to_table().as_bytes())
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

// @formats: Duration as seconds with millisecond precision
fn fmt_secs(duration: Duration) -> String {
    format!("{:.3}", duration.as_secs_f64())
}

/// Folds terminal job states into a [`Timeline`].
pub struct TimelineAssembler {
    /// Window credited to an audio slot without a measured duration
    fallback_line_duration: Duration,
}

impl TimelineAssembler {
    /// Create an assembler with the configured fallback window
    pub fn new(fallback_line_duration: Duration) -> Self {
        Self { fallback_line_duration }
    }

    /// Total narration runtime over all audio jobs: measured durations for
    /// successes, the fallback window for every failed or skipped slot.
    /// Deterministic given the jobs' terminal states; this is also the BGM
    /// sizing input.
    pub fn narration_total(&self, audio_jobs: &[GenerationJob]) -> Duration {
        audio_jobs
            .iter()
            .map(|job| job.measured_duration().unwrap_or(self.fallback_line_duration))
            .sum()
    }

    /// Fold all jobs into the final sorted timeline.
    ///
    /// `audio_jobs` must be ordered by `sequence_index`; image and stock jobs
    /// are placed on their scene windows; the BGM row spans the narration
    /// total. Failed rows are never reordered or dropped.
    pub fn assemble(
        &self,
        audio_jobs: &[GenerationJob],
        scenes: &[SceneDescriptor],
        image_jobs: &[GenerationJob],
        stock_jobs: &[GenerationJob],
        bgm_job: Option<&GenerationJob>,
    ) -> Timeline {
        let mut timeline = Timeline {
            entries: Vec::new(),
            total_duration: self.narration_total(audio_jobs),
        };

        // Audio rows: cumulative starts from measured durations in speaker
        // order, independent of the order jobs completed in
        let mut cursor = Duration::ZERO;
        for job in audio_jobs {
            let duration = job.measured_duration().unwrap_or(self.fallback_line_duration);
            timeline.entries.push(Self::entry(job, cursor, cursor + duration));
            cursor += duration;
        }

        for job in image_jobs {
            let window = Self::scene_window(scenes, job.sequence_index);
            let (start, end) = window.unwrap_or((Duration::ZERO, Duration::ZERO));
            timeline.entries.push(Self::entry(job, start, end));
        }

        for job in stock_jobs {
            // A stock unit without a matching scene keeps its row with a
            // zero-width window so downstream tooling still sees the unit
            let (start, end) =
                Self::scene_window(scenes, job.sequence_index).unwrap_or_default();
            timeline.entries.push(Self::entry(job, start, end));
        }

        if let Some(job) = bgm_job {
            timeline.entries.push(Self::entry(job, Duration::ZERO, timeline.total_duration));
        }

        timeline
            .entries
            .sort_by_key(|e| (e.sequence_index, e.kind));

        // Overlapping windows are a caller error surfaced here, once the
        // media they conflict over actually exists
        for (earlier, later) in timeline.overlapping_images() {
            warn!(
                "Scene windows overlap: scene {} extends past the start of scene {}",
                earlier, later
            );
        }

        timeline
    }

    // @maps: one terminal (or never-dispatched) job to its row
    fn entry(job: &GenerationJob, start: Duration, end: Duration) -> TimelineEntry {
        let status = match job.state {
            JobState::Succeeded => EntryStatus::Ok,
            JobState::Failed => EntryStatus::Failed,
            // Pending here means dispatch was cancelled before the job ran
            _ => EntryStatus::Skipped,
        };
        TimelineEntry {
            sequence_index: job.sequence_index,
            kind: job.kind,
            start_time: start,
            end_time: end,
            artifact_path: job.artifact.as_ref().map(|a| a.path.clone()),
            status,
        }
    }

    fn scene_window(
        scenes: &[SceneDescriptor],
        scene_index: usize,
    ) -> Option<(Duration, Duration)> {
        scenes
            .iter()
            .find(|s| s.scene_index == scene_index)
            .map(|s| (s.start_offset, s.end_offset))
    }
}
