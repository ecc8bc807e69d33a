/*!
 * Pipeline orchestration and timeline assembly.
 *
 * - `job`: generation job bookkeeping and its state machine
 * - `orchestrator`: drives per-unit generation through bounded worker pools
 * - `timeline`: folds terminal jobs into the final time-indexed rows
 */

pub mod job;
pub mod orchestrator;
pub mod timeline;

pub use job::{GenerationJob, JobKind, JobState};
pub use orchestrator::{FailedUnit, PipelineOrchestrator, RunOutcome};
pub use timeline::{EntryStatus, Timeline, TimelineAssembler, TimelineEntry};
