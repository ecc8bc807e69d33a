use std::fmt;

use crate::adapters::Artifact;
use crate::errors::{AdapterError, AdapterFamily};

// @module: Generation job bookkeeping

/// What a job produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobKind {
    /// Per-utterance narration audio
    Audio,
    /// Per-scene illustrative image
    Image,
    /// Background music track
    Bgm,
    /// Supplementary stock footage
    Stock,
}

impl JobKind {
    /// The adapter family serving this kind
    pub fn family(&self) -> AdapterFamily {
        match self {
            Self::Audio => AdapterFamily::Audio,
            Self::Image => AdapterFamily::Image,
            Self::Bgm => AdapterFamily::Bgm,
            Self::Stock => AdapterFamily::Stock,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Audio => "audio",
            Self::Image => "image",
            Self::Bgm => "bgm",
            Self::Stock => "stock",
        };
        write!(f, "{}", name)
    }
}

/// Job lifecycle state.
///
/// `Pending → InProgress → (Succeeded | Retrying → InProgress | Failed)`;
/// `Succeeded` and `Failed` are terminal, a job never dispatched stays
/// `Pending` and surfaces as a skipped timeline row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    InProgress,
    Retrying,
    Succeeded,
    Failed,
}

/// Work item binding one utterance or scene to one adapter call.
///
/// Jobs are owned exclusively by the orchestrator for the duration of a run
/// and mutated only by it; the unit they reference is shared read-only.
#[derive(Debug)]
pub struct GenerationJob {
    /// Index of the owning unit (utterance or scene)
    pub sequence_index: usize,

    /// What this job produces
    pub kind: JobKind,

    /// Current lifecycle state
    pub state: JobState,

    /// Attempts made so far (1-based once dispatched)
    pub attempt_count: u32,

    /// Error from the most recent failed attempt
    pub last_error: Option<AdapterError>,

    /// Artifact reference, set on success
    pub artifact: Option<Artifact>,
}

impl GenerationJob {
    /// Create a pending job for a unit
    pub fn new(sequence_index: usize, kind: JobKind) -> Self {
        Self {
            sequence_index,
            kind,
            state: JobState::Pending,
            attempt_count: 0,
            last_error: None,
            artifact: None,
        }
    }

    /// Mark the first attempt as started
    pub fn begin(&mut self) {
        debug_assert_eq!(self.state, JobState::Pending, "begin() from non-pending state");
        self.state = JobState::InProgress;
    }

    /// Record a retryable failure; the next attempt re-enters `InProgress`
    pub fn mark_retrying(&mut self) {
        debug_assert!(
            matches!(self.state, JobState::InProgress | JobState::Retrying),
            "mark_retrying() from terminal or pending state"
        );
        self.state = JobState::Retrying;
    }

    /// Fold a successful outcome into the job
    pub fn succeed(&mut self, attempts: u32, artifact: Artifact) {
        debug_assert!(!self.is_terminal(), "succeed() on a terminal job");
        self.state = JobState::Succeeded;
        self.attempt_count = attempts;
        self.artifact = Some(artifact);
    }

    /// Fold a failed outcome into the job
    pub fn fail(&mut self, attempts: u32, error: AdapterError) {
        debug_assert!(!self.is_terminal(), "fail() on a terminal job");
        self.state = JobState::Failed;
        self.attempt_count = attempts;
        self.last_error = Some(error);
    }

    /// Whether the job reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, JobState::Succeeded | JobState::Failed)
    }

    /// Whether the job succeeded
    pub fn succeeded(&self) -> bool {
        self.state == JobState::Succeeded
    }

    /// Measured artifact duration, when the job succeeded with one
    pub fn measured_duration(&self) -> Option<std::time::Duration> {
        self.artifact.as_ref().and_then(|a| a.duration)
    }
}
